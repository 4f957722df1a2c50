use crate::config;
use crate::ledger::LedgerClient;
use crate::rate_limit;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<config::Config>,
    /// Shared HTTP client for both collaborators (connection pooling).
    pub http: reqwest::Client,
    pub ledger: Arc<LedgerClient>,
    pub rate_limiter: Arc<Mutex<rate_limit::RateLimiter>>,
}
