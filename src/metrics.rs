use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use std::sync::OnceLock;

use crate::currency::Currency;
use crate::ledger::LedgerSnapshot;
use crate::state::AppState;
use crate::utils::now_ms;
use crate::valuation;

pub struct Metrics {
    registry: Registry,
    pub quote_requests_total: Counter,
    pub quote_errors_total: Counter,
    pub stake_fee_requests_total: Counter,
    pub price_unavailable_total: Counter,
    pub bad_payload_total: Counter,
    /// Bad requests that passed basic handler validation but failed deeper
    /// checks (unknown currency, unsupported pair).
    pub bad_requests_total: Counter,
    pub rate_limited_total: Counter,
    pub quote_ms: Histogram,
    pub ledger_fetch_ms: Histogram,
    pub feed_fetch_ms: Histogram,
    pub quote_compute_ms: Histogram,

    // Basket coverage gauges (computed from the last ledger snapshot at the
    // registry's cached prices, i.e. the ledger's own view).
    pub basket_total_micro_usd: Gauge<i64>,
    pub basket_currency: Family<CurrencyLabel, Gauge<i64>>,
}

fn buckets_ms() -> Vec<f64> {
    vec![
        1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 150.0, 200.0, 300.0, 500.0, 750.0, 1000.0,
        1500.0, 2000.0, 3000.0, 5000.0,
    ]
}

static METRICS: OnceLock<Metrics> = OnceLock::new();
static SNAPSHOT_CACHE: OnceLock<tokio::sync::Mutex<(u128, Option<LedgerSnapshot>)>> =
    OnceLock::new();

#[derive(Debug, Clone, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct CurrencyLabel {
    pub currency: &'static str,
    pub kind: &'static str, // balance | value_micro_usd | coverage_bps | target_bps
}

pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let mut registry = Registry::default();
        let quote_requests_total = Counter::default();
        registry.register(
            "basket_quoter_quote_requests_total",
            "Quote requests total (swap + unstake)",
            quote_requests_total.clone(),
        );
        let quote_errors_total = Counter::default();
        registry.register(
            "basket_quoter_quote_errors_total",
            "Quote errors total",
            quote_errors_total.clone(),
        );
        let stake_fee_requests_total = Counter::default();
        registry.register(
            "basket_quoter_stake_fee_requests_total",
            "Stake fee requests total",
            stake_fee_requests_total.clone(),
        );
        let price_unavailable_total = Counter::default();
        registry.register(
            "basket_quoter_price_unavailable_total",
            "Quotes rejected because a required price was unavailable",
            price_unavailable_total.clone(),
        );
        let bad_payload_total = Counter::default();
        registry.register(
            "basket_quoter_bad_payload_total",
            "Bad payloads / validation failures total",
            bad_payload_total.clone(),
        );
        let bad_requests_total = Counter::default();
        registry.register(
            "basket_quoter_bad_requests_total",
            "Bad requests total (post-validation failures)",
            bad_requests_total.clone(),
        );
        let rate_limited_total = Counter::default();
        registry.register(
            "basket_quoter_rate_limited_total",
            "Requests rate-limited total",
            rate_limited_total.clone(),
        );

        let quote_ms = Histogram::new(buckets_ms().into_iter());
        registry.register(
            "basket_quoter_quote_ms",
            "Quote handler latency (ms)",
            quote_ms.clone(),
        );
        let ledger_fetch_ms = Histogram::new(buckets_ms().into_iter());
        registry.register(
            "basket_quoter_ledger_fetch_ms",
            "Quote: ledger snapshot fetch latency (ms)",
            ledger_fetch_ms.clone(),
        );
        let feed_fetch_ms = Histogram::new(buckets_ms().into_iter());
        registry.register(
            "basket_quoter_feed_fetch_ms",
            "Quote: rate feed latency (ms) (cache fast path; may include HTTP on cold cache)",
            feed_fetch_ms.clone(),
        );
        let quote_compute_ms = Histogram::new(buckets_ms().into_iter());
        registry.register(
            "basket_quoter_quote_compute_ms",
            "Quote: pure simulation latency (ms) (no network)",
            quote_compute_ms.clone(),
        );

        let basket_total_micro_usd = Gauge::<i64>::default();
        registry.register(
            "basket_quoter_basket_total_micro_usd",
            "Total basket value at the registry's cached prices (micro-dollars)",
            basket_total_micro_usd.clone(),
        );
        let basket_currency: Family<CurrencyLabel, Gauge<i64>> = Family::default();
        registry.register(
            "basket_quoter_basket_currency",
            "Per-currency basket values (kind=balance|value_micro_usd|coverage_bps|target_bps)",
            basket_currency.clone(),
        );

        Metrics {
            registry,
            quote_requests_total,
            quote_errors_total,
            stake_fee_requests_total,
            price_unavailable_total,
            bad_payload_total,
            bad_requests_total,
            rate_limited_total,
            quote_ms,
            ledger_fetch_ms,
            feed_fetch_ms,
            quote_compute_ms,
            basket_total_micro_usd,
            basket_currency,
        }
    })
}

async fn refresh_basket_metrics(st: &AppState) {
    // Prometheus scrapes every 10s or so; keep this cheap with a small
    // cache. If the ledger is flaky we keep the last snapshot and do not
    // fail the scrape.
    const TTL_MS: u128 = 8_000;

    let cache = SNAPSHOT_CACHE.get_or_init(|| tokio::sync::Mutex::new((0, None)));
    let mut guard = cache.lock().await;
    let (last_ms, last) = &mut *guard;
    let now = now_ms();
    if now.saturating_sub(*last_ms) >= TTL_MS {
        if let Ok(snap) = st.ledger.fetch_state().await {
            *last = Some(snap);
            *last_ms = now;
        }
    }
    let Some(snap) = last else { return };

    let m = metrics();
    let cached = snap.registry.cached_prices();
    let v = valuation::value_basket(&snap.pool, &cached);
    m.basket_total_micro_usd
        .set(v.total.min(i64::MAX as u64) as i64);
    for c in Currency::ALL {
        for (kind, val) in [
            ("balance", snap.pool.balance(c)),
            ("value_micro_usd", v.value(c)),
            ("coverage_bps", v.coverage_bps(c)),
            ("target_bps", snap.registry.target_bps(c)),
        ] {
            m.basket_currency
                .get_or_create(&CurrencyLabel {
                    currency: c.code(),
                    kind,
                })
                .set(val.min(i64::MAX as u64) as i64);
        }
    }
}

pub async fn metrics_handler(State(st): State<AppState>) -> impl IntoResponse {
    refresh_basket_metrics(&st).await;
    let m = metrics();
    let mut out = String::new();
    if let Err(e) = encode(&mut out, &m.registry) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("encode metrics failed: {e}"),
        )
            .into_response();
    }
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        out,
    )
        .into_response()
}
