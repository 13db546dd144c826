//! Credit scoring API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiResult;
use crate::middleware::auth::AdminAuth;
use crate::models::{ApiResponse, CreditProfile, Page, PaginationParams, User};
use crate::scoring::{LedgerEntry, ScoringService};

/// GET /api/users/:id/credit - Current credit position
pub async fn get_credit_profile(
    State(scoring_service): State<Arc<ScoringService>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<CreditProfile>>> {
    let profile = scoring_service.credit_profile(user_id).await?;

    Ok(Json(ApiResponse::ok(profile)))
}

/// GET /api/users/:id/credit/history - Score history, newest first
pub async fn get_score_history(
    State(scoring_service): State<Arc<ScoringService>>,
    Path(user_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<Page<LedgerEntry>>>> {
    let history = scoring_service.score_history(user_id, &pagination).await?;

    Ok(Json(ApiResponse::ok(history)))
}

/// Body for a manual score adjustment
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdjustScoreRequest {
    pub points: i32,
    #[validate(length(min = 1, max = 500))]
    pub note: String,
}

/// Result of a manual adjustment: the ledger entry and updated user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustScoreResponse {
    pub entry: LedgerEntry,
    pub user: User,
}

/// POST /api/users/:id/credit/adjustments - Manual score adjustment
pub async fn adjust_score(
    admin: AdminAuth,
    State(scoring_service): State<Arc<ScoringService>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<AdjustScoreRequest>,
) -> ApiResult<Json<ApiResponse<AdjustScoreResponse>>> {
    request.validate()?;

    let (entry, user) = scoring_service
        .manual_adjustment(user_id, request.points, &request.note, admin.admin_id)
        .await?;

    Ok(Json(ApiResponse::ok(AdjustScoreResponse { entry, user })))
}
