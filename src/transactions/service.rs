//! Transaction service layer

use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::PgPool;
use sqlx::types::chrono::Utc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::loan::{Loan, LoanStatus};
use crate::models::{Page, PaginationParams};
use crate::transactions::{
    CreateRepaymentRequest, ListTransactionsQuery, Transaction, TransactionStatus, TransactionType,
};

/// Generate a gateway-style reference: `TXN-` plus 10 uppercase alphanumerics
pub fn generate_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("TXN-{}", suffix)
}

/// Transaction service for registering and querying money movements
#[derive(Clone)]
pub struct TransactionService {
    db_pool: PgPool,
}

impl TransactionService {
    /// Create a new transaction service instance
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Register an inbound repayment as a pending transaction. The loan must
    /// be in a repayable state; balance updates happen only when the gateway
    /// confirms the payment through reconciliation.
    pub async fn create_repayment(&self, request: CreateRepaymentRequest) -> ApiResult<Transaction> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(request.loan_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Loan {}", request.loan_id)))?;

        if !matches!(loan.status, LoanStatus::Disbursed | LoanStatus::Repaying) {
            return Err(ApiError::InvalidLoanTransition {
                from: loan.status,
                to: LoanStatus::Repaying,
            });
        }

        let reference = request.reference.unwrap_or_else(generate_reference);

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (id, loan_id, user_id, tx_type, status, amount, payment_method, reference, network, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(loan.id)
        .bind(loan.user_id)
        .bind(TransactionType::Repayment)
        .bind(TransactionStatus::Pending)
        .bind(request.amount)
        .bind(&request.payment_method)
        .bind(&reference)
        .bind(&loan.network)
        .bind(Utc::now())
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict(format!("Transaction reference '{}' already exists", reference))
            }
            _ => e.into(),
        })?;

        Ok(transaction)
    }

    /// Get a transaction by ID
    pub async fn get_transaction(&self, id: Uuid) -> ApiResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(transaction)
    }

    /// Resolve a transaction by its gateway reference (webhook correlation)
    pub async fn get_by_reference(&self, reference: &str) -> ApiResult<Option<Transaction>> {
        let transaction =
            sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE reference = $1")
                .bind(reference)
                .fetch_optional(&self.db_pool)
                .await?;
        Ok(transaction)
    }

    /// List transactions with filtering and pagination
    pub async fn list_transactions(
        &self,
        query: ListTransactionsQuery,
    ) -> ApiResult<Page<Transaction>> {
        let pagination = PaginationParams {
            page: query.page,
            limit: query.limit,
        };
        let (page, limit, offset) = pagination.resolve();

        let mut count_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM transactions WHERE 1=1");
        let mut list_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM transactions WHERE 1=1");

        for builder in [&mut count_builder, &mut list_builder] {
            if let Some(loan_id) = query.loan_id {
                builder.push(" AND loan_id = ");
                builder.push_bind(loan_id);
            }
            if let Some(user_id) = query.user_id {
                builder.push(" AND user_id = ");
                builder.push_bind(user_id);
            }
            if let Some(status) = query.status {
                builder.push(" AND status = ");
                builder.push_bind(status);
            }
            if let Some(tx_type) = query.tx_type {
                builder.push(" AND tx_type = ");
                builder.push_bind(tx_type);
            }
        }

        let (total,): (i64,) = count_builder
            .build_query_as()
            .fetch_one(&self.db_pool)
            .await?;

        list_builder.push(" ORDER BY created_at DESC LIMIT ");
        list_builder.push_bind(i64::from(limit));
        list_builder.push(" OFFSET ");
        list_builder.push_bind(i64::from(offset));

        let transactions = list_builder
            .build_query_as::<Transaction>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(Page {
            data: transactions,
            total,
            page,
            limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_reference_shape() {
        let reference = generate_reference();
        assert!(reference.starts_with("TXN-"));
        assert_eq!(reference.len(), 14);
        assert!(reference[4..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }
}
