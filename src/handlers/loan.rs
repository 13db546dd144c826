//! Loan lifecycle API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::loan::{CreateLoanRequest, ListLoansQuery, Loan, LoanService, RejectLoanRequest};
use crate::middleware::auth::AdminAuth;
use crate::models::{ApiResponse, Page};
use crate::transactions::Transaction;

/// POST /api/loans - Request a new loan
pub async fn create_loan(
    State(loan_service): State<Arc<LoanService>>,
    Json(request): Json<CreateLoanRequest>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    request.validate()?;

    let loan = loan_service.create_loan(request).await?;

    Ok(Json(ApiResponse::ok(loan)))
}

/// GET /api/loans/:id - Get a single loan
pub async fn get_loan(
    State(loan_service): State<Arc<LoanService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    let loan = loan_service
        .get_loan(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Loan {}", id)))?;

    Ok(Json(ApiResponse::ok(loan)))
}

/// GET /api/loans - List loans with filtering and pagination
pub async fn list_loans(
    State(loan_service): State<Arc<LoanService>>,
    Query(query): Query<ListLoansQuery>,
) -> ApiResult<Json<ApiResponse<Page<Loan>>>> {
    let page = loan_service.list_loans(query).await?;

    Ok(Json(ApiResponse::ok(page)))
}

/// POST /api/loans/:id/approve - Approve a requested loan
pub async fn approve_loan(
    admin: AdminAuth,
    State(loan_service): State<Arc<LoanService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    let loan = loan_service.approve_loan(id, admin.admin_id).await?;

    Ok(Json(ApiResponse::ok(loan)))
}

/// POST /api/loans/:id/reject - Reject a requested loan
pub async fn reject_loan(
    admin: AdminAuth,
    State(loan_service): State<Arc<LoanService>>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectLoanRequest>,
) -> ApiResult<Json<ApiResponse<Loan>>> {
    request.validate()?;

    let loan = loan_service
        .reject_loan(id, admin.admin_id, &request.reason)
        .await?;

    Ok(Json(ApiResponse::ok(loan)))
}

/// Response for a disbursement: the updated loan and its pending payout
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisburseResponse {
    pub loan: Loan,
    pub transaction: Transaction,
}

/// POST /api/loans/:id/disburse - Disburse an approved loan
pub async fn disburse_loan(
    admin: AdminAuth,
    State(loan_service): State<Arc<LoanService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<DisburseResponse>>> {
    let (loan, transaction) = loan_service.disburse_loan(id, admin.admin_id).await?;

    Ok(Json(ApiResponse::ok(DisburseResponse { loan, transaction })))
}
