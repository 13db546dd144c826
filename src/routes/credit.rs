//! Credit scoring route definitions

use axum::Router;

use crate::handlers::*;
use crate::state::AppState;

pub fn credit_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/users/:id/credit",
            axum::routing::get(get_credit_profile),
        )
        .route(
            "/api/users/:id/credit/history",
            axum::routing::get(get_score_history),
        )
        .route(
            "/api/users/:id/credit/adjustments",
            axum::routing::post(adjust_score),
        )
}
