//! Rate feed client (external price collaborator).
//!
//! The feed serves `GET /api/price?pair=USD/TRY` style requests with a raw
//! float rate and a publish timestamp. We keep a small in-process cache,
//! refreshed in the background, so `/quote` stays off the per-request HTTP
//! path; a cold cache falls back to a single direct fetch.
//!
//! Normalization (and the zero-means-unavailable signal) lives in `pricing`;
//! this module only moves raw rates around and enforces staleness.

use crate::currency::Currency;
use crate::pricing::{normalize_rate, Prices};
use crate::types::QuoteError;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, Copy)]
pub struct FeedRate {
    /// Raw rate in the pair's native convention (see `Currency::feed_pair`).
    pub price: f64,
    /// Publish time, unix seconds.
    pub timestamp: i64,
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[derive(serde::Deserialize)]
struct FeedPriceResponse {
    price: f64,
    timestamp: i64,
}

static FEED_CACHE: OnceLock<RwLock<HashMap<Currency, FeedRate>>> = OnceLock::new();

fn feed_cache() -> &'static RwLock<HashMap<Currency, FeedRate>> {
    FEED_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

pub fn get_cached_rate(c: Currency) -> Option<FeedRate> {
    feed_cache().read().ok().and_then(|m| m.get(&c).copied())
}

fn upsert_cached_rate(c: Currency, rate: FeedRate) {
    if let Ok(mut g) = feed_cache().write() {
        g.insert(c, rate);
    }
}

fn is_fresh(rate: &FeedRate, max_age_secs: u64) -> bool {
    // Slight clock skew makes age negative; treat that as fresh.
    let age = now_unix().saturating_sub(rate.timestamp).max(0);
    age as u64 <= max_age_secs
}

/// Fetch one pair, with bounded retries and exponential backoff.
///
/// Retry policy belongs here, in the collaborator client, not in the engine:
/// by the time the engine runs, a price either exists or the quote fails.
pub async fn load_feed_rate(
    http: &reqwest::Client,
    feed_url: &str,
    currency: Currency,
    attempts: u32,
    backoff_ms: u64,
) -> Result<FeedRate, QuoteError> {
    let url = format!(
        "{}/api/price?pair={}",
        feed_url.trim_end_matches('/'),
        currency.feed_pair()
    );
    let mut delay = Duration::from_millis(backoff_ms.max(1));
    let mut last_err = String::new();
    for attempt in 0..attempts.max(1) {
        if attempt > 0 {
            sleep(delay).await;
            delay = delay.saturating_mul(2);
        }
        match try_fetch(http, &url).await {
            Ok(r) => return Ok(r),
            Err(e) => {
                tracing::warn!(pair = currency.feed_pair(), attempt, error = %e, "feed fetch failed");
                last_err = e;
            }
        }
    }
    Err(QuoteError::PriceUnavailable(format!(
        "{} feed fetch failed: {last_err}",
        currency.feed_pair()
    )))
}

async fn try_fetch(http: &reqwest::Client, url: &str) -> Result<FeedRate, String> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    if !resp.status().is_success() {
        return Err(format!("feed HTTP {}", resp.status()));
    }
    let body: FeedPriceResponse = resp
        .json()
        .await
        .map_err(|e| format!("feed JSON parse failed: {e}"))?;
    Ok(FeedRate {
        price: body.price,
        timestamp: body.timestamp,
    })
}

/// Background cache refresher for all basket pairs.
pub async fn feed_cache_loop(http: reqwest::Client, feed_url: String, refresh_ms: u64) {
    let refresh_ms = refresh_ms.max(250);
    loop {
        for c in Currency::ALL {
            match load_feed_rate(&http, &feed_url, c, 1, 0).await {
                Ok(rate) => upsert_cached_rate(c, rate),
                Err(e) => tracing::warn!(pair = c.feed_pair(), "feed cache refresh failed: {e}"),
            }
        }
        sleep(Duration::from_millis(refresh_ms)).await;
    }
}

/// Current normalized prices for the whole basket.
///
/// Best-effort per currency: cached-and-fresh wins, otherwise one direct
/// fetch. A currency that still cannot be priced stays at `0` so the engine's
/// per-leg validation rejects quotes that need it.
pub async fn live_prices(
    http: &reqwest::Client,
    feed_url: &str,
    max_staleness_secs: u64,
) -> Prices {
    let mut prices = Prices::default();
    for c in Currency::ALL {
        let mut rate = get_cached_rate(c).filter(|r| is_fresh(r, max_staleness_secs));
        if rate.is_none() {
            rate = load_feed_rate(http, feed_url, c, 1, 0)
                .await
                .ok()
                .filter(|r| is_fresh(r, max_staleness_secs));
        }
        if let Some(r) = rate {
            prices.set(c, normalize_rate(c, r.price));
        }
    }
    prices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_window_is_inclusive() {
        let fresh = FeedRate {
            price: 1.0,
            timestamp: now_unix(),
        };
        assert!(is_fresh(&fresh, 0));
        let old = FeedRate {
            price: 1.0,
            timestamp: now_unix() - 120,
        };
        assert!(!is_fresh(&old, 60));
        assert!(is_fresh(&old, 600));
    }

    #[test]
    fn future_timestamps_count_as_fresh() {
        let skewed = FeedRate {
            price: 1.0,
            timestamp: now_unix() + 3,
        };
        assert!(is_fresh(&skewed, 60));
    }

    #[test]
    fn cache_upsert_and_read_back() {
        upsert_cached_rate(
            Currency::Sekx,
            FeedRate {
                price: 10.5,
                timestamp: 1,
            },
        );
        let got = get_cached_rate(Currency::Sekx).unwrap();
        assert_eq!(got.price, 10.5);
        assert_eq!(got.timestamp, 1);
    }
}
