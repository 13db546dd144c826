//! Transaction and reconciliation API handlers

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::AdminAuth;
use crate::models::{ApiResponse, Page};
use crate::reconciliation::{PaymentWebhookPayload, ReconciliationResult, ReconciliationService};
use crate::state::AppState;
use crate::transactions::{
    CreateRepaymentRequest, ListTransactionsQuery, Transaction, TransactionService,
    TransactionStatus,
};

/// POST /api/transactions/repayments - Register an inbound repayment
pub async fn create_repayment(
    State(transaction_service): State<Arc<TransactionService>>,
    Json(request): Json<CreateRepaymentRequest>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    request.validate()?;

    let transaction = transaction_service.create_repayment(request).await?;

    Ok(Json(ApiResponse::ok(transaction)))
}

/// GET /api/transactions/:id - Get a single transaction
pub async fn get_transaction(
    State(transaction_service): State<Arc<TransactionService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    let transaction = transaction_service
        .get_transaction(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Transaction {}", id)))?;

    Ok(Json(ApiResponse::ok(transaction)))
}

/// GET /api/transactions - List transactions with filtering and pagination
pub async fn list_transactions(
    State(transaction_service): State<Arc<TransactionService>>,
    Query(query): Query<ListTransactionsQuery>,
) -> ApiResult<Json<ApiResponse<Page<Transaction>>>> {
    let page = transaction_service.list_transactions(query).await?;

    Ok(Json(ApiResponse::ok(page)))
}

/// Body for a manual reconciliation by support staff
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub status: TransactionStatus,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
}

/// POST /api/transactions/:id/reconcile - Manually reconcile a transaction
pub async fn reconcile_transaction(
    _admin: AdminAuth,
    State(reconciliation_service): State<Arc<ReconciliationService>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReconcileRequest>,
) -> ApiResult<Json<ApiResponse<ReconciliationResult>>> {
    request.validate()?;

    let result = reconciliation_service
        .reconcile(id, request.status, request.amount)
        .await?;

    Ok(Json(ApiResponse::ok(result)))
}

/// POST /api/webhooks/payments - Payment gateway status callback
///
/// The gateway may deliver the same notification more than once; the
/// processor treats duplicates as no-ops, so this endpoint always answers
/// 200 for a transaction it recognizes.
pub async fn payment_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PaymentWebhookPayload>,
) -> ApiResult<Json<ApiResponse<ReconciliationResult>>> {
    verify_webhook_secret(&app_state, &headers)?;
    payload.validate()?;

    // Resolve the pending row by internal ID or gateway reference
    let transaction_id = match (payload.transaction_id, payload.reference.as_deref()) {
        (Some(id), _) => id,
        (None, Some(reference)) => app_state
            .transaction_service
            .get_by_reference(reference)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Transaction with reference '{}'", reference))
            })?
            .id,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "transactionId or reference is required".to_string(),
            ))
        }
    };

    let result = app_state
        .reconciliation_service
        .reconcile(transaction_id, payload.status, payload.amount)
        .await?;

    Ok(Json(ApiResponse::ok(result)))
}

// Shared-secret webhook authentication. Fail-closed: with no secret
// configured, every delivery is rejected.
fn verify_webhook_secret(app_state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    match &app_state.payment_webhook_secret {
        Some(secret) if !secret.is_empty() => {
            let provided = headers
                .get("x-webhook-secret")
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default();
            if provided != secret {
                return Err(ApiError::Unauthorized(
                    "Invalid webhook secret".to_string(),
                ));
            }
            Ok(())
        }
        _ => {
            tracing::error!("Payment webhook secret not configured - rejecting request");
            Err(ApiError::ServiceUnavailable(
                "Webhook endpoint is not configured".to_string(),
            ))
        }
    }
}
