//! Loan analytics API handlers

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::middleware::auth::AdminAuth;
use crate::models::ApiResponse;
use crate::services::analytics::{ExportLoansQuery, LoanStats};
use crate::services::AnalyticsService;

/// GET /api/analytics/loans - Aggregate loan statistics
pub async fn get_loan_stats(
    State(analytics_service): State<Arc<AnalyticsService>>,
) -> ApiResult<Json<ApiResponse<LoanStats>>> {
    let stats = analytics_service.loan_stats().await?;

    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /api/analytics/loans/export - Download the filtered loan book as CSV
pub async fn export_loans(
    _admin: AdminAuth,
    State(analytics_service): State<Arc<AnalyticsService>>,
    Query(query): Query<ExportLoansQuery>,
) -> ApiResult<Response> {
    let csv = analytics_service.export_loans(query).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"loans.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}
