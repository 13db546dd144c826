//! Loan models and data structures for the microlend backend

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Loan lifecycle status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Requested,
    Approved,
    Rejected,
    Disbursed,
    Repaying,
    Completed,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Requested => "requested",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Disbursed => "disbursed",
            LoanStatus::Repaying => "repaying",
            LoanStatus::Completed => "completed",
            LoanStatus::Defaulted => "defaulted",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Rejected | LoanStatus::Completed | LoanStatus::Defaulted
        )
    }

    /// States in which the loan counts against the borrower's credit limit
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            LoanStatus::Requested
                | LoanStatus::Approved
                | LoanStatus::Disbursed
                | LoanStatus::Repaying
        )
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loan model
///
/// `loan_ref` is the business-facing identifier printed on statements;
/// `id` is internal. Invariant maintained by the lifecycle and
/// reconciliation services: `outstanding_amount = amount_due - amount_paid`,
/// never negative, and `amount_paid` never decreases.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: Uuid,
    pub loan_ref: String,
    pub user_id: Uuid,
    pub amount: i64,
    pub disbursed_amount: i64,
    pub interest_rate_bps: i32,
    pub repayment_period_days: i32,
    pub amount_due: i64,
    pub amount_paid: i64,
    pub outstanding_amount: i64,
    pub due_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub network: String,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub disbursed_by: Option<Uuid>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a new loan
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    pub user_id: Uuid,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
    #[validate(length(min = 1, max = 64))]
    pub network: String,
    #[validate(range(min = 1, max = 365))]
    pub repayment_period_days: Option<i32>,
    #[validate(range(min = 0, max = 10_000))]
    pub interest_rate_bps: Option<i32>,
}

/// Request to reject a loan
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RejectLoanRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Query for listing loans
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLoansQuery {
    pub user_id: Option<Uuid>,
    pub status: Option<LoanStatus>,
    pub network: Option<String>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

/// Summary of one overdue-sweep pass
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub marked_late: u64,
    pub defaulted: u64,
}
