//! Loan analytics: aggregate statistics and CSV export
//!
//! Read-only projections over the loan book; nothing here mutates state.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::loan::{Loan, LoanStatus};

/// Aggregate statistics over the loan book
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoanStats {
    pub total_loans: i64,
    pub requested: i64,
    pub approved: i64,
    pub rejected: i64,
    pub disbursed: i64,
    pub repaying: i64,
    pub completed: i64,
    pub defaulted: i64,
    pub total_principal: i64,
    pub total_disbursed: i64,
    pub total_repaid: i64,
    pub total_outstanding: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct LoanStatsRow {
    total_loans: Option<i64>,
    requested: Option<i64>,
    approved: Option<i64>,
    rejected: Option<i64>,
    disbursed: Option<i64>,
    repaying: Option<i64>,
    completed: Option<i64>,
    defaulted: Option<i64>,
    total_principal: Option<i64>,
    total_disbursed: Option<i64>,
    total_repaid: Option<i64>,
    total_outstanding: Option<i64>,
}

/// Filters for the CSV export
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportLoansQuery {
    pub status: Option<LoanStatus>,
    pub user_id: Option<Uuid>,
    pub network: Option<String>,
}

/// Analytics service over the loan book
#[derive(Clone)]
pub struct AnalyticsService {
    db_pool: PgPool,
}

impl AnalyticsService {
    /// Create a new analytics service instance
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Aggregate loan statistics
    pub async fn loan_stats(&self) -> ApiResult<LoanStats> {
        let row = sqlx::query_as::<_, LoanStatsRow>(
            r#"
            SELECT
                COUNT(*) as total_loans,
                COUNT(*) FILTER (WHERE status = 'requested') as requested,
                COUNT(*) FILTER (WHERE status = 'approved') as approved,
                COUNT(*) FILTER (WHERE status = 'rejected') as rejected,
                COUNT(*) FILTER (WHERE status = 'disbursed') as disbursed,
                COUNT(*) FILTER (WHERE status = 'repaying') as repaying,
                COUNT(*) FILTER (WHERE status = 'completed') as completed,
                COUNT(*) FILTER (WHERE status = 'defaulted') as defaulted,
                COALESCE(SUM(amount), 0) as total_principal,
                COALESCE(SUM(disbursed_amount), 0) as total_disbursed,
                COALESCE(SUM(amount_paid), 0) as total_repaid,
                COALESCE(SUM(outstanding_amount), 0) as total_outstanding
            FROM loans
            "#,
        )
        .fetch_one(&self.db_pool)
        .await?;

        Ok(LoanStats {
            total_loans: row.total_loans.unwrap_or(0),
            requested: row.requested.unwrap_or(0),
            approved: row.approved.unwrap_or(0),
            rejected: row.rejected.unwrap_or(0),
            disbursed: row.disbursed.unwrap_or(0),
            repaying: row.repaying.unwrap_or(0),
            completed: row.completed.unwrap_or(0),
            defaulted: row.defaulted.unwrap_or(0),
            total_principal: row.total_principal.unwrap_or(0),
            total_disbursed: row.total_disbursed.unwrap_or(0),
            total_repaid: row.total_repaid.unwrap_or(0),
            total_outstanding: row.total_outstanding.unwrap_or(0),
        })
    }

    /// Export filtered loans as CSV
    pub async fn export_loans(&self, query: ExportLoansQuery) -> ApiResult<String> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM loans WHERE 1=1");

        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status);
        }
        if let Some(user_id) = query.user_id {
            builder.push(" AND user_id = ");
            builder.push_bind(user_id);
        }
        if let Some(ref network) = query.network {
            builder.push(" AND network = ");
            builder.push_bind(network.clone());
        }
        builder.push(" ORDER BY created_at DESC");

        let loans = builder
            .build_query_as::<Loan>()
            .fetch_all(&self.db_pool)
            .await?;

        loans_to_csv(&loans)
    }
}

/// Serialize loans into a CSV document with a header row
fn loans_to_csv(loans: &[Loan]) -> ApiResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "loanRef",
            "userId",
            "status",
            "amount",
            "disbursedAmount",
            "interestRateBps",
            "amountDue",
            "amountPaid",
            "outstandingAmount",
            "network",
            "dueDate",
            "createdAt",
        ])
        .map_err(|e| ApiError::InternalError(format!("CSV write failed: {}", e)))?;

    for loan in loans {
        writer
            .write_record([
                loan.loan_ref.clone(),
                loan.user_id.to_string(),
                loan.status.to_string(),
                loan.amount.to_string(),
                loan.disbursed_amount.to_string(),
                loan.interest_rate_bps.to_string(),
                loan.amount_due.to_string(),
                loan.amount_paid.to_string(),
                loan.outstanding_amount.to_string(),
                loan.network.clone(),
                loan.due_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
                loan.created_at.to_rfc3339(),
            ])
            .map_err(|e| ApiError::InternalError(format!("CSV write failed: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ApiError::InternalError(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| ApiError::InternalError(format!("CSV encoding: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::chrono::Utc;

    fn sample_loan() -> Loan {
        Loan {
            id: Uuid::new_v4(),
            loan_ref: "LN-TEST0001".to_string(),
            user_id: Uuid::new_v4(),
            amount: 10_000,
            disbursed_amount: 8_500,
            interest_rate_bps: 1_500,
            repayment_period_days: 30,
            amount_due: 10_000,
            amount_paid: 5_000,
            outstanding_amount: 5_000,
            due_date: Some(Utc::now()),
            status: LoanStatus::Repaying,
            network: "mtn".to_string(),
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_reason: None,
            rejected_at: None,
            disbursed_by: None,
            disbursed_at: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_csv_has_header_and_rows() {
        let csv = loans_to_csv(&[sample_loan(), sample_loan()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("loanRef,userId,status"));
        assert!(lines[1].contains("LN-TEST0001"));
        assert!(lines[1].contains("repaying"));
    }

    #[test]
    fn test_csv_empty_loan_book() {
        let csv = loans_to_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
