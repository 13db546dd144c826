//! Transaction and webhook route definitions

use axum::Router;

use crate::handlers::*;
use crate::state::AppState;

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/api/transactions", axum::routing::get(list_transactions))
        .route(
            "/api/transactions/repayments",
            axum::routing::post(create_repayment),
        )
        .route(
            "/api/transactions/:id",
            axum::routing::get(get_transaction),
        )
        .route(
            "/api/transactions/:id/reconcile",
            axum::routing::post(reconcile_transaction),
        )
        .route(
            "/api/webhooks/payments",
            axum::routing::post(payment_webhook),
        )
}
