//! Environment-driven configuration for `basket-quoter`.
//!
//! We keep this intentionally small and explicit:
//! - collaborator endpoints (settlement ledger reader, rate feed)
//! - admin token + bind address
//! - fetch/caching knobs
//!
//! Settlement-critical numbers (the fee bucket table, tier thresholds, the
//! depth-penalty formula, fixed-point scales) are deliberately NOT here: a
//! config override could only make a quote diverge from what the ledger
//! executes. See `fees.rs` / `rates.rs`.

use anyhow::Context;
use std::env;
use url::Url;

#[derive(Clone)]
pub struct Config {
    /// Unified admin token (required). Used to gate **admin-only** HTTP
    /// endpoints. Send via `Authorization: Bearer <token>` (or
    /// `x-admin-token`).
    pub admin_token: String,
    /// Base URL of the settlement ledger's read API.
    pub ledger_url: String,
    /// Base URL of the external rate feed.
    pub feed_url: String,
    /// Axum bind address, host:port.
    pub api_bind: String,

    /// Background feed cache refresh interval (ms).
    pub feed_refresh_ms: u64,
    /// Treat feed rates older than this as unavailable.
    pub feed_max_staleness_secs: u64,

    /// Per-request timeout for collaborator HTTP calls (ms).
    pub fetch_timeout_ms: u64,
    /// Bounded retry attempts for the ledger snapshot fetch.
    pub fetch_attempts: u32,
    /// Initial backoff between retries (ms); doubles per attempt.
    pub fetch_backoff_ms: u64,
}

fn env_required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("Missing env var: {key}"))
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn validate_collaborator_url(key: &str, raw: &str) -> anyhow::Result<String> {
    let u = Url::parse(raw).with_context(|| format!("Invalid {key}: {raw}"))?;
    if u.scheme() != "http" && u.scheme() != "https" {
        anyhow::bail!("{key} must be http(s): {raw}");
    }
    if u.host_str().is_none() {
        anyhow::bail!("{key} missing host: {raw}");
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}

pub fn load_config() -> anyhow::Result<Config> {
    let admin_token = env::var("ADMIN_TOKEN")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            env::var("QUOTER_ADMIN_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty())
        })
        .ok_or_else(|| anyhow::anyhow!("Missing env var: ADMIN_TOKEN (or QUOTER_ADMIN_TOKEN)"))?;
    if admin_token.trim().len() < 32 {
        anyhow::bail!("ADMIN_TOKEN must be at least 32 characters");
    }

    let ledger_url = validate_collaborator_url("LEDGER_URL", &env_required("LEDGER_URL")?)?;
    let feed_url = validate_collaborator_url("FEED_URL", &env_required("FEED_URL")?)?;

    // Secure-by-default bind: only listen on loopback unless explicitly configured.
    let api_bind = env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:9696".to_string());

    let feed_refresh_ms = env_u64("FEED_REFRESH_MS", 1_000);
    let mut feed_max_staleness_secs = env_u64("FEED_MAX_STALENESS_SECS", 300);

    let fetch_timeout_ms = env_u64("FETCH_TIMEOUT_MS", 2_000);
    let mut fetch_attempts = env_u64("FETCH_ATTEMPTS", 3) as u32;
    let fetch_backoff_ms = env_u64("FETCH_BACKOFF_MS", 200);

    // --- Safety clamps ---
    //
    // A zero staleness window would mark every rate unavailable the moment
    // the feed's clock trails ours; a huge retry count turns one bad quote
    // request into a collaborator hammer.
    if feed_max_staleness_secs == 0 {
        tracing::warn!("FEED_MAX_STALENESS_SECS=0 is invalid; defaulting to 300");
        feed_max_staleness_secs = 300;
    }
    if fetch_attempts == 0 || fetch_attempts > 10 {
        tracing::warn!(
            "FETCH_ATTEMPTS={} out of range (1..=10); clamping",
            fetch_attempts
        );
        fetch_attempts = fetch_attempts.clamp(1, 10);
    }

    Ok(Config {
        admin_token,
        ledger_url,
        feed_url,
        api_bind,
        feed_refresh_ms,
        feed_max_staleness_secs,
        fetch_timeout_ms,
        fetch_attempts,
        fetch_backoff_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_urls_must_be_http() {
        assert!(validate_collaborator_url("LEDGER_URL", "http://127.0.0.1:8900").is_ok());
        assert!(validate_collaborator_url("LEDGER_URL", "https://ledger.internal").is_ok());
        assert!(validate_collaborator_url("LEDGER_URL", "ftp://ledger.internal").is_err());
        assert!(validate_collaborator_url("LEDGER_URL", "not a url").is_err());
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        let u = validate_collaborator_url("FEED_URL", "http://feed.internal:9000/").unwrap();
        assert_eq!(u, "http://feed.internal:9000");
    }
}
