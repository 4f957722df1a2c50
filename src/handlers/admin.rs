use crate::currency::Currency;
use crate::oracle::feed;
use crate::state::AppState;
use crate::types::{api_err, ApiResult};
use axum::{extract::State, Json};

#[derive(serde::Serialize)]
pub struct SnapshotPriceRow {
    pub currency: &'static str,
    pub feed_pair: &'static str,
    pub raw_rate: Option<f64>,
    pub feed_timestamp: Option<i64>,
    pub live_price_micro_usd: u64,
    pub cached_price_micro_usd: u64,
}

#[derive(serde::Serialize)]
pub struct SnapshotResponse {
    pub snapshot: crate::ledger::LedgerSnapshot,
    pub prices: Vec<SnapshotPriceRow>,
}

/// Raw ledger snapshot plus the prices exactly as the engine sees them right
/// now. The interesting column pair is live vs cached: any quote/settlement
/// drift investigation starts by diffing those two.
pub async fn snapshot(State(st): State<AppState>) -> ApiResult<SnapshotResponse> {
    let snap = match st.ledger.fetch_state().await {
        Ok(s) => s,
        Err(e) => return api_err(e.into()),
    };
    let live = feed::live_prices(&st.http, &st.cfg.feed_url, st.cfg.feed_max_staleness_secs).await;
    let prices = Currency::ALL
        .iter()
        .map(|&c| {
            let cached_rate = feed::get_cached_rate(c);
            SnapshotPriceRow {
                currency: c.code(),
                feed_pair: c.feed_pair(),
                raw_rate: cached_rate.map(|r| r.price),
                feed_timestamp: cached_rate.map(|r| r.timestamp),
                live_price_micro_usd: live.get(c),
                cached_price_micro_usd: snap.registry.cached_price_micro_usd(c),
            }
        })
        .collect();
    Ok(Json(SnapshotResponse {
        snapshot: snap,
        prices,
    }))
}
