//! Support ticket API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::models::{ApiResponse, Page};
use crate::tickets::{
    CreateTicketRequest, ListTicketsQuery, Ticket, TicketService, UpdateTicketRequest,
};

/// POST /api/tickets - Open a support ticket
pub async fn create_ticket(
    State(ticket_service): State<Arc<TicketService>>,
    Json(request): Json<CreateTicketRequest>,
) -> ApiResult<Json<ApiResponse<Ticket>>> {
    request.validate()?;

    let ticket = ticket_service.create_ticket(request).await?;

    Ok(Json(ApiResponse::ok(ticket)))
}

/// GET /api/tickets/:id - Get a single ticket
pub async fn get_ticket(
    State(ticket_service): State<Arc<TicketService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Ticket>>> {
    let ticket = ticket_service
        .get_ticket(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Ticket {}", id)))?;

    Ok(Json(ApiResponse::ok(ticket)))
}

/// PATCH /api/tickets/:id - Update status or assignment
pub async fn update_ticket(
    State(ticket_service): State<Arc<TicketService>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTicketRequest>,
) -> ApiResult<Json<ApiResponse<Ticket>>> {
    let ticket = ticket_service.update_ticket(id, request).await?;

    Ok(Json(ApiResponse::ok(ticket)))
}

/// GET /api/tickets - List tickets with filtering and pagination
pub async fn list_tickets(
    State(ticket_service): State<Arc<TicketService>>,
    Query(query): Query<ListTicketsQuery>,
) -> ApiResult<Json<ApiResponse<Page<Ticket>>>> {
    let page = ticket_service.list_tickets(query).await?;

    Ok(Json(ApiResponse::ok(page)))
}
