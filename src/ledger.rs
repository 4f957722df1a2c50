//! Client for the settlement ledger's read API.
//!
//! The ledger is the system of record; this engine only shadows it. We fetch
//! pool balances and the registry (targets + the ledger's *cached* prices) as
//! one version-stamped document so a quote never mixes balances from one
//! instant with prices from another.
//!
//! Collaborator failures surface uniformly as `PoolStateUnavailable`
//! regardless of the underlying transport cause.

use crate::currency::Currency;
use crate::pricing::{Prices, MICRO_USD};
use crate::types::QuoteError;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

/// Pool balances: one reserve for the reference coin, one liability per
/// regional. All integer base units; mutated only by the ledger itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolState {
    pub usdc_reserve: u64,
    pub chfx_liability: u64,
    pub tryb_liability: u64,
    pub sekx_liability: u64,
}

impl PoolState {
    /// Reserve for the reference coin, liability for regionals.
    pub fn balance(&self, c: Currency) -> u64 {
        match c {
            Currency::Usdc => self.usdc_reserve,
            Currency::Chfx => self.chfx_liability,
            Currency::Tryb => self.tryb_liability,
            Currency::Sekx => self.sekx_liability,
        }
    }

    pub fn set_balance(&mut self, c: Currency, v: u64) {
        match c {
            Currency::Usdc => self.usdc_reserve = v,
            Currency::Chfx => self.chfx_liability = v,
            Currency::Tryb => self.tryb_liability = v,
            Currency::Sekx => self.sekx_liability = v,
        }
    }
}

/// Per-regional registry values, in registry order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegionalValues {
    pub chfx: u64,
    pub tryb: u64,
    pub sekx: u64,
}

impl RegionalValues {
    fn get(&self, c: Currency) -> Option<u64> {
        match c {
            Currency::Usdc => None,
            Currency::Chfx => Some(self.chfx),
            Currency::Tryb => Some(self.tryb),
            Currency::Sekx => Some(self.sekx),
        }
    }
}

/// Policy targets and the ledger's last-cached prices.
///
/// Fee-tier math MUST run on these cached prices, not on fresher feed
/// prices: the ledger decides fees with its own cache, and a quote computed
/// from anything else will not match settlement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegistryState {
    pub target_bps: RegionalValues,
    pub cached_price_micro_usd: RegionalValues,
}

impl RegistryState {
    /// Target basket share in bps; the reference coin has none.
    pub fn target_bps(&self, c: Currency) -> u64 {
        self.target_bps.get(c).unwrap_or(0)
    }

    /// Cached micro-dollar price. The reference coin is its own unit of
    /// account, so it prices at par.
    pub fn cached_price_micro_usd(&self, c: Currency) -> u64 {
        self.cached_price_micro_usd.get(c).unwrap_or(MICRO_USD)
    }

    /// The cached prices as a normalized price set.
    pub fn cached_prices(&self) -> Prices {
        let mut p = Prices::default();
        for c in Currency::ALL {
            p.set(c, self.cached_price_micro_usd(c));
        }
        p
    }
}

/// One consistent read of pool + registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u64,
    pub pool: PoolState,
    pub registry: RegistryState,
}

pub struct LedgerClient {
    http: reqwest::Client,
    base: String,
    attempts: u32,
    backoff_ms: u64,
}

impl LedgerClient {
    pub fn new(http: reqwest::Client, base: &str, attempts: u32, backoff_ms: u64) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            attempts: attempts.max(1),
            backoff_ms,
        }
    }

    /// Fetch one snapshot, with bounded retries and exponential backoff.
    pub async fn fetch_state(&self) -> Result<LedgerSnapshot, QuoteError> {
        let url = format!("{}/v1/state", self.base);
        let mut delay = Duration::from_millis(self.backoff_ms.max(1));
        let mut last_err = String::new();
        for attempt in 0..self.attempts {
            if attempt > 0 {
                sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            match self.try_fetch(&url).await {
                Ok(snap) => return Ok(snap),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "ledger state fetch failed");
                    last_err = e;
                }
            }
        }
        Err(QuoteError::PoolStateUnavailable(format!(
            "ledger fetch failed after {} attempts: {last_err}",
            self.attempts
        )))
    }

    async fn try_fetch(&self, url: &str) -> Result<LedgerSnapshot, String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("ledger HTTP {}", resp.status()));
        }
        resp.json::<LedgerSnapshot>()
            .await
            .map_err(|e| format!("ledger JSON parse failed: {e}"))
    }
}
