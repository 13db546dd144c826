//! Support ticket route definitions

use axum::Router;

use crate::handlers::*;
use crate::state::AppState;

pub fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tickets", axum::routing::get(list_tickets))
        .route("/api/tickets", axum::routing::post(create_ticket))
        .route("/api/tickets/:id", axum::routing::get(get_ticket))
        .route("/api/tickets/:id", axum::routing::patch(update_ticket))
}
