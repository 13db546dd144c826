//! Loan service layer - business logic for the loan lifecycle
//!
//! All loan row mutations go through this service or the reconciliation
//! processor; both validate transitions against the lifecycle table before
//! touching state.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::types::chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::loan::state::{disbursed_amount, ensure_transition};
use crate::loan::{CreateLoanRequest, ListLoansQuery, Loan, LoanStatus, SweepSummary};
use crate::models::{Page, PaginationParams, RepaymentStatus};
use crate::notify::{NotificationEvent, Notifier};
use crate::scoring::{self, NewLedgerEntry, ScoreReason, ScoringService};
use crate::transactions::{
    generate_reference, Transaction, TransactionStatus, TransactionType,
};

/// Compiled defaults applied when a loan request leaves them unspecified
#[derive(Debug, Clone)]
pub struct LoanDefaults {
    pub interest_rate_bps: i32,
    pub repayment_period_days: i32,
    /// Days past due before a repaying loan is defaulted by the sweep
    pub default_after_days: i64,
    /// Score penalty applied when a loan defaults
    pub default_penalty_points: i32,
}

/// Generate a business-facing loan reference: `LN-` plus 8 uppercase
/// alphanumerics
fn generate_loan_ref() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("LN-{}", suffix)
}

/// Loan service for managing the loan lifecycle
#[derive(Clone)]
pub struct LoanService {
    db_pool: PgPool,
    scoring: ScoringService,
    notifier: Arc<Notifier>,
    defaults: LoanDefaults,
}

impl LoanService {
    /// Create a new loan service instance
    pub fn new(
        db_pool: PgPool,
        scoring: ScoringService,
        notifier: Arc<Notifier>,
        defaults: LoanDefaults,
    ) -> Self {
        Self {
            db_pool,
            scoring,
            notifier,
            defaults,
        }
    }

    /// Create a loan in `requested` status.
    ///
    /// The requested amount must fit inside the user's credit limit after
    /// subtracting committed exposure on active loans: the full amount for
    /// loans not yet disbursed, the outstanding balance afterwards. The user
    /// row is locked so concurrent requests cannot both pass the check.
    pub async fn create_loan(&self, request: CreateLoanRequest) -> ApiResult<Loan> {
        let mut tx = self.db_pool.begin().await?;

        let user = sqlx::query_as::<_, (i64,)>(
            "SELECT credit_limit FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(request.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", request.user_id)))?;

        let (exposure,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(
                CASE WHEN status IN ('requested', 'approved') THEN amount
                     ELSE outstanding_amount END), 0)
            FROM loans
            WHERE user_id = $1 AND status IN ('requested', 'approved', 'disbursed', 'repaying')
            "#,
        )
        .bind(request.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let available = (user.0 - exposure).max(0);
        if request.amount > available {
            return Err(ApiError::CreditLimitExceeded {
                requested: request.amount,
                available,
            });
        }

        let now = Utc::now();
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (
                id, loan_ref, user_id, amount, disbursed_amount, interest_rate_bps,
                repayment_period_days, amount_due, amount_paid, outstanding_amount,
                status, network, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, 0, $5, $6, 0, 0, 0, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(generate_loan_ref())
        .bind(request.user_id)
        .bind(request.amount)
        .bind(
            request
                .interest_rate_bps
                .unwrap_or(self.defaults.interest_rate_bps),
        )
        .bind(
            request
                .repayment_period_days
                .unwrap_or(self.defaults.repayment_period_days),
        )
        .bind(LoanStatus::Requested)
        .bind(&request.network)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(loan_ref = %loan.loan_ref, user_id = %loan.user_id, amount = loan.amount, "Loan requested");

        Ok(loan)
    }

    /// Approve a requested loan, stamping the approver and time
    pub async fn approve_loan(&self, loan_id: Uuid, approver: Uuid) -> ApiResult<Loan> {
        let mut tx = self.db_pool.begin().await?;

        let loan = self.lock_loan(&mut tx, loan_id).await?;
        ensure_transition(loan.status, LoanStatus::Approved)?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = $1, approved_by = $2, approved_at = $3, updated_at = $3
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(LoanStatus::Approved)
        .bind(approver)
        .bind(Utc::now())
        .bind(loan_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.notifier.dispatch(NotificationEvent::LoanApproved {
            loan_ref: loan.loan_ref.clone(),
            user_id: loan.user_id,
        });

        Ok(loan)
    }

    /// Reject a requested loan with a reason. Terminal.
    pub async fn reject_loan(&self, loan_id: Uuid, actor: Uuid, reason: &str) -> ApiResult<Loan> {
        let mut tx = self.db_pool.begin().await?;

        let loan = self.lock_loan(&mut tx, loan_id).await?;
        ensure_transition(loan.status, LoanStatus::Rejected)?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = $1, rejected_by = $2, rejected_reason = $3, rejected_at = $4, updated_at = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(LoanStatus::Rejected)
        .bind(actor)
        .bind(reason)
        .bind(Utc::now())
        .bind(loan_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.notifier.dispatch(NotificationEvent::LoanRejected {
            loan_ref: loan.loan_ref.clone(),
            user_id: loan.user_id,
            reason: reason.to_string(),
        });

        Ok(loan)
    }

    /// Disburse an approved loan.
    ///
    /// Interest is taken up front: the borrower receives
    /// `amount - amount * bps / 10_000`, owes the full principal, and the
    /// due date starts counting from now. A pending disbursement transaction
    /// is created in the same database transaction; the gateway confirms it
    /// through reconciliation, which starts the repayment bookkeeping.
    pub async fn disburse_loan(
        &self,
        loan_id: Uuid,
        actor: Uuid,
    ) -> ApiResult<(Loan, Transaction)> {
        let mut tx = self.db_pool.begin().await?;

        let loan = self.lock_loan(&mut tx, loan_id).await?;
        ensure_transition(loan.status, LoanStatus::Disbursed)?;

        let now = Utc::now();
        let disbursed = disbursed_amount(loan.amount, loan.interest_rate_bps);
        let due_date = now + chrono::Duration::days(i64::from(loan.repayment_period_days));

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = $1, disbursed_amount = $2, amount_due = $3, outstanding_amount = $3,
                due_date = $4, disbursed_by = $5, disbursed_at = $6, updated_at = $6
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(LoanStatus::Disbursed)
        .bind(disbursed)
        .bind(loan.amount)
        .bind(due_date)
        .bind(actor)
        .bind(now)
        .bind(loan_id)
        .fetch_one(&mut *tx)
        .await?;

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (id, loan_id, user_id, tx_type, status, amount, payment_method, reference, network, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(loan.id)
        .bind(loan.user_id)
        .bind(TransactionType::Disbursement)
        .bind(TransactionStatus::Pending)
        .bind(disbursed)
        .bind(&loan.network)
        .bind(generate_reference())
        .bind(&loan.network)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE users
            SET total_loans = total_loans + 1, total_borrowed = total_borrowed + $1,
                repayment_status = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(loan.amount)
        .bind(RepaymentStatus::Pending)
        .bind(now)
        .bind(loan.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.notifier.dispatch(NotificationEvent::LoanDisbursed {
            loan_ref: loan.loan_ref.clone(),
            user_id: loan.user_id,
            amount: disbursed,
        });

        Ok((loan, transaction))
    }

    /// Get a loan by internal ID
    pub async fn get_loan(&self, id: Uuid) -> ApiResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(loan)
    }

    /// List loans with filtering and pagination
    pub async fn list_loans(&self, query: ListLoansQuery) -> ApiResult<Page<Loan>> {
        let pagination = PaginationParams {
            page: query.page,
            limit: query.limit,
        };
        let (page, limit, offset) = pagination.resolve();

        let mut count_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM loans WHERE 1=1");
        let mut list_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM loans WHERE 1=1");

        for builder in [&mut count_builder, &mut list_builder] {
            if let Some(user_id) = query.user_id {
                builder.push(" AND user_id = ");
                builder.push_bind(user_id);
            }
            if let Some(status) = query.status {
                builder.push(" AND status = ");
                builder.push_bind(status);
            }
            if let Some(ref network) = query.network {
                builder.push(" AND network = ");
                builder.push_bind(network.clone());
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

        let loans = list_builder
            .build_query_as::<Loan>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(Page {
            data: loans,
            total,
            page,
            limit,
        })
    }

    /// One pass over repaying loans past their due date: mark borrowers
    /// late, and default loans past the grace window (with a score penalty
    /// recorded in the ledger).
    pub async fn sweep_overdue(&self) -> ApiResult<SweepSummary> {
        let now = Utc::now();
        let mut summary = SweepSummary::default();

        let overdue = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE status = 'repaying' AND due_date IS NOT NULL AND due_date < $1",
        )
        .bind(now)
        .fetch_all(&self.db_pool)
        .await?;

        if overdue.is_empty() {
            return Ok(summary);
        }

        let curve = self.scoring.limit_curve().await?;

        for loan in overdue {
            let due_date = match loan.due_date {
                Some(d) => d,
                None => continue,
            };
            let days_over = (now - due_date).num_days();

            if days_over > self.defaults.default_after_days {
                match self.default_loan(&loan, &curve).await {
                    Ok(true) => summary.defaulted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(loan_ref = %loan.loan_ref, error = %e, "Failed to default overdue loan");
                    }
                }
            } else {
                let result = sqlx::query(
                    "UPDATE users SET repayment_status = 'late', updated_at = $1 WHERE id = $2 AND repayment_status = 'pending'",
                )
                .bind(now)
                .bind(loan.user_id)
                .execute(&self.db_pool)
                .await?;
                summary.marked_late += result.rows_affected();
            }
        }

        Ok(summary)
    }

    // Default a single loan in its own transaction. Returns false when a
    // concurrent repayment already moved the loan out of `repaying`.
    async fn default_loan(
        &self,
        loan: &Loan,
        curve: &crate::scoring::LimitCurve,
    ) -> ApiResult<bool> {
        let mut tx = self.db_pool.begin().await?;

        let current = self.lock_loan(&mut tx, loan.id).await?;
        if current.status != LoanStatus::Repaying {
            return Ok(false);
        }
        ensure_transition(current.status, LoanStatus::Defaulted)?;

        let now = Utc::now();
        sqlx::query("UPDATE loans SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(LoanStatus::Defaulted)
            .bind(now)
            .bind(loan.id)
            .execute(&mut *tx)
            .await?;

        let penalty = self.defaults.default_penalty_points;
        scoring::record_award(
            &mut *tx,
            NewLedgerEntry {
                user_id: current.user_id,
                transaction_id: None,
                points_awarded: -penalty,
                reason: ScoreReason::Penalty,
                metadata: serde_json::json!({
                    "loanRef": current.loan_ref,
                    "outstanding": current.outstanding_amount,
                    "daysOverdue": (now - current.due_date.unwrap_or(now)).num_days(),
                }),
            },
        )
        .await?;

        scoring::apply_score_delta(&mut tx, current.user_id, -penalty, curve).await?;

        sqlx::query("UPDATE users SET repayment_status = 'defaulted', updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(current.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.notifier.dispatch(NotificationEvent::LoanDefaulted {
            loan_ref: current.loan_ref.clone(),
            user_id: current.user_id,
            outstanding: current.outstanding_amount,
        });

        tracing::warn!(loan_ref = %current.loan_ref, outstanding = current.outstanding_amount, "Loan defaulted");

        Ok(true)
    }

    async fn lock_loan(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        loan_id: Uuid,
    ) -> ApiResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(loan_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Loan {}", loan_id)))
    }
}

/// Background job for overdue detection
pub async fn overdue_detector(loan_service: Arc<LoanService>, interval_secs: u64) {
    tracing::info!(interval_secs, "Starting overdue detector");

    loop {
        tokio::time::sleep(StdDuration::from_secs(interval_secs)).await;

        match loan_service.sweep_overdue().await {
            Ok(summary) => {
                if summary.marked_late > 0 || summary.defaulted > 0 {
                    tracing::info!(
                        marked_late = summary.marked_late,
                        defaulted = summary.defaulted,
                        "Overdue sweep completed"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Error sweeping overdue loans");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_loan_ref_shape() {
        let loan_ref = generate_loan_ref();
        assert!(loan_ref.starts_with("LN-"));
        assert_eq!(loan_ref.len(), 11);
        assert!(loan_ref[3..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
