//! Basket Quoter (off-chain pricing shadow of the settlement ledger)
//!
//! Quotes swaps, unstakes and deposit fees for the regional stablecoin
//! basket. The engine only reads: pool balances and registry (targets +
//! cached prices) come from the ledger's API, raw FX rates from the feed,
//! and every quote must reproduce the ledger's integer arithmetic to the
//! unit so users are never shown a number settlement will not also produce.
//!
//! API shape:
//! - `GET  /health`        -> simple liveness check
//! - `GET  /ready`         -> collaborator readiness
//! - `GET  /basket`        -> valuation overview (cached registry prices)
//! - `POST /quote/swap`    -> swap quote (rate, depth penalty, fee tier)
//! - `POST /quote/unstake` -> unstake quote (30 bps base fee)
//! - `POST /fee/stake`     -> flat 10 bps deposit fee breakdown
//!
//! Admin (token-gated): `GET /metrics`, `GET /admin/snapshot`.

mod auth;
mod config;
mod currency;
mod engine;
mod fees;
mod handlers;
mod ledger;
mod metrics;
mod oracle;
mod pricing;
mod rate_limit;
mod rates;
mod router;
mod state;
mod types;
mod utils;
mod valuation;

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,basket_quoter=debug".into()),
        )
        .init();

    let cfg = config::load_config()?;
    info!(
        "starting basket-quoter (bind={}, ledger_url={}, feed_url={})",
        cfg.api_bind, cfg.ledger_url, cfg.feed_url
    );
    info!(
        "fetch policy: timeout_ms={} attempts={} backoff_ms={} feed_refresh_ms={} feed_max_staleness_secs={}",
        cfg.fetch_timeout_ms,
        cfg.fetch_attempts,
        cfg.fetch_backoff_ms,
        cfg.feed_refresh_ms,
        cfg.feed_max_staleness_secs
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(cfg.fetch_timeout_ms.max(100)))
        .build()?;
    let ledger = Arc::new(ledger::LedgerClient::new(
        http.clone(),
        &cfg.ledger_url,
        cfg.fetch_attempts,
        cfg.fetch_backoff_ms,
    ));

    let state = state::AppState {
        cfg: Arc::new(cfg),
        http,
        ledger,
        rate_limiter: Arc::new(tokio::sync::Mutex::new(rate_limit::RateLimiter::from_env())),
    };

    // Feed cache: refresh in the background so quote paths don't do feed
    // HTTP per request.
    {
        let enabled = std::env::var("FEED_CACHE_ENABLED")
            .ok()
            .map(|v| v.trim().to_lowercase() != "false")
            .unwrap_or(true);
        if enabled {
            let http_c = state.http.clone();
            let feed_url = state.cfg.feed_url.clone();
            let refresh_ms = state.cfg.feed_refresh_ms;
            tokio::spawn(async move {
                crate::oracle::feed::feed_cache_loop(http_c, feed_url, refresh_ms).await;
            });
            info!("started feed cache (refresh_ms={})", refresh_ms);
        } else {
            info!("feed cache disabled (FEED_CACHE_ENABLED=false)");
        }
    }

    let bind = state.cfg.api_bind.clone();
    let app = router::build(state);

    let listener = tokio::net::TcpListener::bind(bind.as_str()).await?;
    info!("api listening on http://{}", bind);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}
