use crate::currency::Currency;
use crate::engine;
use crate::ledger::LedgerSnapshot;
use crate::metrics;
use crate::oracle::feed;
use crate::rate_limit;
use crate::state::AppState;
use crate::types::{
    api_err, ApiResult, AppError, FeeBreakdown, QuoteError, QuoteResult, StakeFeeRequest,
    SwapQuoteRequest, UnstakeQuoteRequest,
};
use crate::valuation;
use axum::{extract::ConnectInfo, extract::State, Json};
use std::net::SocketAddr;
use std::time::Instant;

pub async fn health() -> &'static str {
    "ok"
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub ledger_ok: bool,
    pub feed_ok: bool,
}

/// "ready" means a quote request right now would have everything it needs:
/// a reachable ledger and a warm rate cache for every basket pair.
pub async fn ready(State(st): State<AppState>) -> ApiResult<ReadyResponse> {
    let ledger_ok = st.ledger.fetch_state().await.is_ok();
    let feed_ok = Currency::ALL
        .iter()
        .all(|c| feed::get_cached_rate(*c).is_some());
    Ok(Json(ReadyResponse {
        ready: ledger_ok && feed_ok,
        ledger_ok,
        feed_ok,
    }))
}

#[derive(serde::Serialize)]
pub struct BasketRow {
    pub currency: &'static str,
    pub balance: u64,
    pub value_micro_usd: u64,
    pub coverage_bps: u64,
    pub target_bps: u64,
}

#[derive(serde::Serialize)]
pub struct BasketResponse {
    pub snapshot_version: u64,
    pub total_micro_usd: u64,
    pub rows: Vec<BasketRow>,
}

/// Read-only valuation overview at the registry's cached prices (the
/// ledger's own view of the basket).
pub async fn basket(State(st): State<AppState>) -> ApiResult<BasketResponse> {
    let snap: LedgerSnapshot = match st.ledger.fetch_state().await {
        Ok(s) => s,
        Err(e) => return api_err(e.into()),
    };
    let v = valuation::value_basket(&snap.pool, &snap.registry.cached_prices());
    let rows = Currency::ALL
        .iter()
        .map(|&c| BasketRow {
            currency: c.code(),
            balance: snap.pool.balance(c),
            value_micro_usd: v.value(c),
            coverage_bps: v.coverage_bps(c),
            target_bps: snap.registry.target_bps(c),
        })
        .collect();
    Ok(Json(BasketResponse {
        snapshot_version: snap.version,
        total_micro_usd: v.total,
        rows,
    }))
}

fn parse_currency(field: &str, s: &str) -> Result<Currency, AppError> {
    Currency::parse(s)
        .ok_or_else(|| AppError::BadRequest(format!("{field}: unknown currency {:?}", s.trim())))
}

/// Shared error choreography for the quote endpoints: count, classify,
/// charge the bad-request budget where it applies.
async fn quote_error(st: &AppState, peer_ip: std::net::IpAddr, e: QuoteError) -> AppError {
    metrics::metrics().quote_errors_total.inc();
    match &e {
        QuoteError::PriceUnavailable(_) => {
            metrics::metrics().price_unavailable_total.inc();
        }
        QuoteError::InvalidInput(_) | QuoteError::UnsupportedPair(_) => {
            metrics::metrics().bad_requests_total.inc();
            if let Err(rl) = rate_limit::rate_limit_bad(st, peer_ip).await {
                metrics::metrics().rate_limited_total.inc();
                return rl;
            }
        }
        QuoteError::PoolStateUnavailable(_) => {}
    }
    e.into()
}

/// Swap quote endpoint. Deterministic and side-effect free: one ledger
/// snapshot, one price set, pure simulation.
pub async fn quote_swap(
    State(st): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<SwapQuoteRequest>,
) -> ApiResult<QuoteResult> {
    let t0 = Instant::now();
    metrics::metrics().quote_requests_total.inc();
    if let Err(e) = req.validate() {
        metrics::metrics().bad_payload_total.inc();
        if let Err(rl) = rate_limit::rate_limit_bad(&st, peer.ip()).await {
            metrics::metrics().rate_limited_total.inc();
            return api_err(rl);
        }
        return api_err(e);
    }
    if let Err(rl) = rate_limit::rate_limit_ok(&st, peer.ip()).await {
        metrics::metrics().rate_limited_total.inc();
        return api_err(rl);
    }
    let from = match parse_currency("from", &req.from) {
        Ok(c) => c,
        Err(e) => {
            metrics::metrics().bad_payload_total.inc();
            return api_err(e);
        }
    };
    let to = match parse_currency("to", &req.to) {
        Ok(c) => c,
        Err(e) => {
            metrics::metrics().bad_payload_total.inc();
            return api_err(e);
        }
    };
    let res = engine::quote_swap(&st, from, to, req.amount_in).await;
    metrics::metrics()
        .quote_ms
        .observe(t0.elapsed().as_millis() as f64);
    match res {
        Ok(v) => Ok(Json(v)),
        Err(e) => api_err(quote_error(&st, peer.ip(), e).await),
    }
}

/// Unstake quote endpoint. The source side is the basket share; see
/// `engine::Op` for how it is priced.
pub async fn quote_unstake(
    State(st): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<UnstakeQuoteRequest>,
) -> ApiResult<QuoteResult> {
    let t0 = Instant::now();
    metrics::metrics().quote_requests_total.inc();
    if let Err(e) = req.validate() {
        metrics::metrics().bad_payload_total.inc();
        if let Err(rl) = rate_limit::rate_limit_bad(&st, peer.ip()).await {
            metrics::metrics().rate_limited_total.inc();
            return api_err(rl);
        }
        return api_err(e);
    }
    if let Err(rl) = rate_limit::rate_limit_ok(&st, peer.ip()).await {
        metrics::metrics().rate_limited_total.inc();
        return api_err(rl);
    }
    let to = match parse_currency("to", &req.to) {
        Ok(c) => c,
        Err(e) => {
            metrics::metrics().bad_payload_total.inc();
            return api_err(e);
        }
    };
    let res = engine::quote_unstake(&st, to, req.amount_in).await;
    metrics::metrics()
        .quote_ms
        .observe(t0.elapsed().as_millis() as f64);
    match res {
        Ok(v) => Ok(Json(v)),
        Err(e) => api_err(quote_error(&st, peer.ip(), e).await),
    }
}

/// Deposit fee endpoint. Flat 10 bps; no pool state, no tiering.
pub async fn stake_fee(
    State(st): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<StakeFeeRequest>,
) -> ApiResult<FeeBreakdown> {
    metrics::metrics().stake_fee_requests_total.inc();
    if let Err(e) = req.validate() {
        metrics::metrics().bad_payload_total.inc();
        if let Err(rl) = rate_limit::rate_limit_bad(&st, peer.ip()).await {
            metrics::metrics().rate_limited_total.inc();
            return api_err(rl);
        }
        return api_err(e);
    }
    if let Err(rl) = rate_limit::rate_limit_ok(&st, peer.ip()).await {
        metrics::metrics().rate_limited_total.inc();
        return api_err(rl);
    }
    let currency = match parse_currency("currency", &req.currency) {
        Ok(c) => c,
        Err(e) => {
            metrics::metrics().bad_payload_total.inc();
            return api_err(e);
        }
    };
    match engine::quote_stake_fee(&st, currency, req.amount_in).await {
        Ok(v) => Ok(Json(v)),
        Err(e) => api_err(quote_error(&st, peer.ip(), e).await),
    }
}
