use crate::auth;
use crate::handlers;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build(state: AppState) -> Router {
    // Public routes are intended to be reached via the trusted web proxy.
    // They are read-only and per-IP rate-limited in the handlers.
    let public_routes = Router::new()
        .route("/health", get(handlers::public::health))
        .route("/ready", get(handlers::public::ready))
        .route("/basket", get(handlers::public::basket))
        .route("/quote/swap", post(handlers::public::quote_swap))
        .route("/quote/unstake", post(handlers::public::quote_unstake))
        .route("/fee/stake", post(handlers::public::stake_fee));

    let admin_routes = Router::new()
        .route("/metrics", get(crate::metrics::metrics_handler))
        .route("/admin/snapshot", get(handlers::admin::snapshot))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin_token,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(state)
        // Hard cap request body size; all endpoints are small JSON.
        .layer(DefaultBodyLimit::max(16 * 1024))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
