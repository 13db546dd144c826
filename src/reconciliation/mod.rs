//! Reconciliation / repayment processor
//!
//! Consumes a transaction status change from the payment gateway and applies
//! it to the matching loan, the user's credit state, and the score ledger as
//! one atomic unit. This is the single entry point that couples loan state,
//! transaction state, and scoring; no other code path writes
//! `outstanding_amount`, `credit_score`, or `credit_limit`.

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::loan::{ensure_transition, plan_repayment, Loan, LoanStatus};
use crate::models::RepaymentStatus;
use crate::notify::{NotificationEvent, Notifier};
use crate::scoring::{
    self, compute_award, AwardInput, LimitCurve, NewLedgerEntry, ScoreReason, ScoringPolicy,
    ScoringService,
};
use crate::transactions::{Transaction, TransactionStatus, TransactionType};

/// Inbound webhook payload from the payment gateway. Exactly one of
/// `transaction_id` / `reference` identifies the pending transaction.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhookPayload {
    pub transaction_id: Option<Uuid>,
    pub reference: Option<String>,
    pub status: TransactionStatus,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
}

/// Outcome of a reconciliation call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    /// False when the transaction was already terminal and the call was an
    /// idempotent no-op returning the prior state
    pub applied: bool,
    pub transaction: Transaction,
    pub loan: Option<Loan>,
    pub points_awarded: Option<i32>,
    pub reason: Option<ScoreReason>,
    pub is_full_repayment: bool,
    /// The submitted amount exceeded the remaining balance; internal state
    /// was capped and the excess recorded in the ledger metadata
    pub over_repayment: bool,
}

// Internal error split: retryable transient conflicts vs everything else.
enum TryError {
    Retryable(sqlx::Error),
    Fatal(ApiError),
}

impl From<sqlx::Error> for TryError {
    fn from(err: sqlx::Error) -> Self {
        if db::is_retryable(&err) {
            TryError::Retryable(err)
        } else {
            TryError::Fatal(err.into())
        }
    }
}

impl From<ApiError> for TryError {
    fn from(err: ApiError) -> Self {
        TryError::Fatal(err)
    }
}

/// Reconciliation service
#[derive(Clone)]
pub struct ReconciliationService {
    db_pool: PgPool,
    scoring: ScoringService,
    notifier: Arc<Notifier>,
    statement_timeout_ms: u64,
    max_retries: u32,
}

impl ReconciliationService {
    /// Create a new reconciliation service instance
    pub fn new(
        db_pool: PgPool,
        scoring: ScoringService,
        notifier: Arc<Notifier>,
        statement_timeout_ms: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            db_pool,
            scoring,
            notifier,
            statement_timeout_ms,
            max_retries,
        }
    }

    /// Reconcile a transaction to a terminal status.
    ///
    /// Safe to call more than once with identical arguments: the pending
    /// status guard and the ledger's unique transaction constraint make
    /// duplicate deliveries no-ops. Transient database conflicts are retried
    /// with backoff up to the configured bound; on exhaustion the caller
    /// sees a transient failure and no partial state.
    pub async fn reconcile(
        &self,
        transaction_id: Uuid,
        new_status: TransactionStatus,
        amount: i64,
    ) -> ApiResult<ReconciliationResult> {
        if !new_status.is_terminal() {
            return Err(ApiError::BadRequest(
                "reconciliation target status must be completed or failed".to_string(),
            ));
        }
        if new_status == TransactionStatus::Completed && amount <= 0 {
            return Err(ApiError::InvalidAmount(format!(
                "reconciled amount must be positive, got {}",
                amount
            )));
        }

        // Policy reads stay outside the atomic unit; the policy is read-only
        // to this processor.
        let policy = self.scoring.repayment_policy().await?;
        let curve = self.scoring.limit_curve().await?;

        let mut attempt: u32 = 0;
        loop {
            match self
                .try_reconcile(transaction_id, new_status, amount, &policy, &curve)
                .await
            {
                Ok(result) => {
                    if result.applied {
                        self.announce(&result);
                    }
                    return Ok(result);
                }
                Err(TryError::Retryable(e)) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        transaction_id = %transaction_id,
                        attempt = attempt,
                        error = %e,
                        "Transient conflict during reconciliation, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(50 * 2u64.pow(attempt))).await;
                }
                Err(TryError::Retryable(e)) => {
                    return Err(ApiError::Transient(format!(
                        "reconciliation retries exhausted: {}",
                        e
                    )));
                }
                Err(TryError::Fatal(e)) => return Err(e),
            }
        }
    }

    async fn try_reconcile(
        &self,
        transaction_id: Uuid,
        new_status: TransactionStatus,
        amount: i64,
        policy: &ScoringPolicy,
        curve: &LimitCurve,
    ) -> Result<ReconciliationResult, TryError> {
        let mut tx = self.db_pool.begin().await?;

        // Bound the whole atomic unit; a timeout aborts it and surfaces as a
        // retryable failure.
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout_ms
        ))
        .execute(&mut *tx)
        .await?;

        // Lock order: transaction, then loan, then user.
        let transaction = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(transaction_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            TryError::Fatal(ApiError::NotFound(format!("Transaction {}", transaction_id)))
        })?;

        // Already terminal: duplicate delivery. Return the prior state.
        if transaction.status.is_terminal() {
            let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
                .bind(transaction.loan_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(ReconciliationResult {
                applied: false,
                transaction,
                loan,
                points_awarded: None,
                reason: None,
                is_full_repayment: false,
                over_repayment: false,
            });
        }

        if new_status == TransactionStatus::Failed {
            let transaction = sqlx::query_as::<_, Transaction>(
                "UPDATE transactions SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *",
            )
            .bind(TransactionStatus::Failed)
            .bind(Utc::now())
            .bind(transaction_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(ReconciliationResult {
                applied: true,
                transaction,
                loan: None,
                points_awarded: None,
                reason: None,
                is_full_repayment: false,
                over_repayment: false,
            });
        }

        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(transaction.loan_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                TryError::Fatal(ApiError::NotFound(format!("Loan {}", transaction.loan_id)))
            })?;

        match transaction.tx_type {
            TransactionType::Disbursement => {
                self.complete_disbursement(tx, transaction, loan).await
            }
            TransactionType::Repayment => {
                self.complete_repayment(tx, transaction, loan, amount, policy, curve)
                    .await
            }
        }
    }

    /// Confirmed disbursement: the money reached the borrower, repayment
    /// bookkeeping begins. No scoring side effects.
    async fn complete_disbursement(
        &self,
        mut tx: sqlx::Transaction<'_, sqlx::Postgres>,
        transaction: Transaction,
        loan: Loan,
    ) -> Result<ReconciliationResult, TryError> {
        ensure_transition(loan.status, LoanStatus::Repaying)?;

        let loan = sqlx::query_as::<_, Loan>(
            "UPDATE loans SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(LoanStatus::Repaying)
        .bind(Utc::now())
        .bind(loan.id)
        .fetch_one(&mut *tx)
        .await?;

        let transaction = sqlx::query_as::<_, Transaction>(
            "UPDATE transactions SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(TransactionStatus::Completed)
        .bind(Utc::now())
        .bind(transaction.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReconciliationResult {
            applied: true,
            transaction,
            loan: Some(loan),
            points_awarded: None,
            reason: None,
            is_full_repayment: false,
            over_repayment: false,
        })
    }

    /// Confirmed repayment: apply the payment to the loan, award points,
    /// update the user's aggregate credit state. One commit covers the
    /// transaction, loan, ledger and user rows.
    async fn complete_repayment(
        &self,
        mut tx: sqlx::Transaction<'_, sqlx::Postgres>,
        transaction: Transaction,
        loan: Loan,
        amount: i64,
        policy: &ScoringPolicy,
        curve: &LimitCurve,
    ) -> Result<ReconciliationResult, TryError> {
        let plan = plan_repayment(loan.status, loan.amount_due, loan.amount_paid, amount)?;
        let next_status = if plan.completed {
            LoanStatus::Completed
        } else {
            LoanStatus::Repaying
        };
        ensure_transition(loan.status, next_status)?;

        let now = Utc::now();

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET amount_paid = $1, outstanding_amount = $2, status = $3, updated_at = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(plan.new_amount_paid)
        .bind(plan.new_outstanding)
        .bind(next_status)
        .bind(now)
        .bind(loan.id)
        .fetch_one(&mut *tx)
        .await?;

        let transaction = sqlx::query_as::<_, Transaction>(
            "UPDATE transactions SET status = $1, amount = $2, updated_at = $3 WHERE id = $4 RETURNING *",
        )
        .bind(TransactionStatus::Completed)
        .bind(amount)
        .bind(now)
        .bind(transaction.id)
        .fetch_one(&mut *tx)
        .await?;

        let days_elapsed = loan
            .disbursed_at
            .or(loan.approved_at)
            .map(|t| (now - t).num_days())
            .unwrap_or(0);

        let breakdown = compute_award(
            &AwardInput {
                repayment_amount: plan.amount_applied,
                days_elapsed,
                is_full_repayment: plan.completed,
            },
            policy,
        );

        let metadata = serde_json::json!({
            "repaymentAmount": amount,
            "amountApplied": plan.amount_applied,
            "partial": !plan.completed,
            "overRepayment": plan.over_repayment,
            "daysElapsed": days_elapsed,
            "amountMultiplier": breakdown.amount_multiplier,
            "durationMultiplier": breakdown.duration_multiplier,
        });

        let entry = scoring::record_award(
            &mut *tx,
            NewLedgerEntry {
                user_id: transaction.user_id,
                transaction_id: Some(transaction.id),
                points_awarded: breakdown.points,
                reason: breakdown.reason,
                metadata,
            },
        )
        .await?;

        let mut points_awarded = None;
        let mut reason = None;
        if let Some(entry) = entry {
            scoring::apply_score_delta(&mut tx, transaction.user_id, entry.points_awarded, curve)
                .await?;

            let repayment_status = if plan.completed {
                let (other_active,): (i64,) = sqlx::query_as(
                    "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND status IN ('disbursed', 'repaying') AND id <> $2",
                )
                .bind(transaction.user_id)
                .bind(loan.id)
                .fetch_one(&mut *tx)
                .await?;
                if other_active == 0 {
                    RepaymentStatus::None
                } else {
                    RepaymentStatus::Pending
                }
            } else {
                RepaymentStatus::Pending
            };

            sqlx::query(
                "UPDATE users SET total_repaid = total_repaid + $1, repayment_status = $2, updated_at = $3 WHERE id = $4",
            )
            .bind(plan.amount_applied)
            .bind(repayment_status)
            .bind(now)
            .bind(transaction.user_id)
            .execute(&mut *tx)
            .await?;

            points_awarded = Some(entry.points_awarded);
            reason = Some(entry.reason);
        }

        tx.commit().await?;

        Ok(ReconciliationResult {
            applied: true,
            transaction,
            loan: Some(loan),
            points_awarded,
            reason,
            is_full_repayment: plan.completed,
            over_repayment: plan.over_repayment,
        })
    }

    // Notification happens strictly after the atomic unit committed; a
    // delivery failure never rolls back financial state.
    fn announce(&self, result: &ReconciliationResult) {
        match (&result.loan, result.transaction.status) {
            (_, TransactionStatus::Failed) => {
                self.notifier.dispatch(NotificationEvent::TransactionFailed {
                    transaction_id: result.transaction.id,
                    reference: result.transaction.reference.clone(),
                });
            }
            (Some(loan), TransactionStatus::Completed)
                if result.transaction.tx_type == TransactionType::Repayment =>
            {
                if result.is_full_repayment {
                    self.notifier.dispatch(NotificationEvent::LoanCompleted {
                        loan_ref: loan.loan_ref.clone(),
                        user_id: loan.user_id,
                        points_awarded: result.points_awarded.unwrap_or(0),
                    });
                } else {
                    self.notifier.dispatch(NotificationEvent::RepaymentReceived {
                        loan_ref: loan.loan_ref.clone(),
                        user_id: loan.user_id,
                        amount: result.transaction.amount,
                        outstanding: loan.outstanding_amount,
                    });
                }
            }
            _ => {}
        }
    }
}
