//! Data models for the microlend backend

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Where a borrower stands with their outstanding obligations
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "repayment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RepaymentStatus {
    None,
    Pending,
    Late,
    Defaulted,
}

/// Borrower account and aggregate credit state
///
/// `credit_score`, `credit_limit` and the running totals are projections
/// maintained exclusively by the reconciliation and lifecycle services; the
/// credit score history table is the source of truth for score changes.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub credit_score: i32,
    pub credit_limit: i64,
    pub total_loans: i32,
    pub total_borrowed: i64,
    pub total_repaid: i64,
    pub repayment_status: RepaymentStatus,
    pub auto_limit_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's credit position as returned to the admin console
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditProfile {
    pub user_id: Uuid,
    pub credit_score: i32,
    pub credit_limit: i64,
    pub available_credit: i64,
    pub total_loans: i32,
    pub total_borrowed: i64,
    pub total_repaid: i64,
    pub repayment_status: RepaymentStatus,
}

/// Row of the generic configuration store
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct SystemConfig {
    pub id: Uuid,
    pub category: String,
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

impl PaginationParams {
    /// Clamp page/limit into sane bounds and return (page, limit, offset)
    pub fn resolve(&self) -> (i32, i32, i32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        (page, limit, (page - 1) * limit)
    }
}

/// Paginated response
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i32,
    pub limit: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let params = PaginationParams {
            page: None,
            limit: None,
        };
        assert_eq!(params.resolve(), (1, 20, 0));
    }

    #[test]
    fn test_pagination_clamps() {
        let params = PaginationParams {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(params.resolve(), (1, 100, 0));

        let params = PaginationParams {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(params.resolve(), (3, 10, 20));
    }
}
