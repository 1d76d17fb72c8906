pub mod errors;
pub mod transactions;
pub mod webhooks;

use {
    crate::AppState,
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    std::time::Duration,
    tower::ServiceBuilder,
    tower_http::timeout::TimeoutLayer,
};

/// Gateway events are a few KB.
const WEBHOOK_BODY_LIMIT: usize = 64 * 1024;

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let webhooks = Router::new()
        .route("/webhooks/gateway", post(webhooks::wh_handler))
        .route("/webhooks/{id}/replay", post(webhooks::replay_handler))
        .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT));

    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/transactions", post(transactions::create_transaction))
        .route(
            "/transactions/{external_id}",
            get(transactions::get_transaction),
        )
        .route(
            "/transactions/{external_id}/confirm",
            post(transactions::confirm_transaction),
        )
        .route(
            "/transactions/{external_id}/void",
            post(transactions::void_transaction),
        )
        .route("/payment-links", post(transactions::create_payment_link))
        .route(
            "/reports/pending-purchases",
            get(transactions::pending_purchases),
        )
        .merge(webhooks)
        .layer(ServiceBuilder::new().layer(TimeoutLayer::new(request_timeout)))
        .with_state(state)
}
