//! Transaction models and data structures

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Direction of a money movement
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Disbursement,
    Repayment,
}

/// Transaction status; `Pending` is the only non-terminal state
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// Transaction model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: i64,
    pub payment_method: String,
    /// Gateway/operator reference; unique, used to correlate webhook
    /// deliveries with the pending row
    pub reference: String,
    pub network: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to register an inbound repayment (creates a pending transaction
/// that the payment gateway later confirms or fails via webhook)
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepaymentRequest {
    pub loan_id: Uuid,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
    #[validate(length(min = 1, max = 64))]
    pub payment_method: String,
    /// Reference assigned by the gateway; generated when absent
    pub reference: Option<String>,
}

/// Query for listing transactions
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsQuery {
    pub loan_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
    pub tx_type: Option<TransactionType>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}
