//! Analytics route definitions

use axum::Router;

use crate::handlers::*;
use crate::state::AppState;

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/loans", axum::routing::get(get_loan_stats))
        .route(
            "/api/analytics/loans/export",
            axum::routing::get(export_loans),
        )
}
