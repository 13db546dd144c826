//! Scoring service: policy loading and user credit state maintenance
//!
//! The user row's score, limit and totals are mutated only here and by the
//! reconciliation processor; both go through `apply_score_delta` so the
//! bounds and limit-curve policy hold everywhere.

use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{CreditProfile, Page, PaginationParams, SystemConfig, User};
use crate::scoring::ledger::{self, LedgerEntry, NewLedgerEntry, ScoreReason};
use crate::scoring::policy::{clamp_score, LimitCurve, ScoringPolicy};

/// Scoring service backed by the configuration store and user table
#[derive(Clone)]
pub struct ScoringService {
    db_pool: PgPool,
}

impl ScoringService {
    /// Create a new scoring service instance
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Load the repayment scoring policy from the configuration store,
    /// falling back to compiled-in defaults when no row is present or the
    /// stored document does not decode.
    pub async fn repayment_policy(&self) -> ApiResult<ScoringPolicy> {
        self.load_config("repayment_scoring").await
    }

    /// Load the credit limit curve from the configuration store.
    pub async fn limit_curve(&self) -> ApiResult<LimitCurve> {
        self.load_config("limit_curve").await
    }

    async fn load_config<T>(&self, key: &str) -> ApiResult<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        let row = sqlx::query_as::<_, SystemConfig>(
            "SELECT * FROM system_config WHERE category = 'credit_score' AND key = $1",
        )
        .bind(key)
        .fetch_optional(&self.db_pool)
        .await?;

        match row {
            Some(config) => match serde_json::from_value(config.value) {
                Ok(decoded) => Ok(decoded),
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Stored config does not decode, using defaults");
                    Ok(T::default())
                }
            },
            None => Ok(T::default()),
        }
    }

    /// A user's current credit position, including available credit after
    /// committed exposure on active loans.
    pub async fn credit_profile(&self, user_id: Uuid) -> ApiResult<CreditProfile> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User {}", user_id)))?;

        let (exposure,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(
                CASE WHEN status IN ('requested', 'approved') THEN amount
                     ELSE outstanding_amount END), 0)
            FROM loans
            WHERE user_id = $1 AND status IN ('requested', 'approved', 'disbursed', 'repaying')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(CreditProfile {
            user_id: user.id,
            credit_score: user.credit_score,
            credit_limit: user.credit_limit,
            available_credit: (user.credit_limit - exposure).max(0),
            total_loans: user.total_loans,
            total_borrowed: user.total_borrowed,
            total_repaid: user.total_repaid,
            repayment_status: user.repayment_status,
        })
    }

    /// Paginated score history for a user, newest first.
    pub async fn score_history(
        &self,
        user_id: Uuid,
        pagination: &PaginationParams,
    ) -> ApiResult<Page<LedgerEntry>> {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?;
        if exists.is_none() {
            return Err(ApiError::NotFound(format!("User {}", user_id)));
        }

        Ok(ledger::history(&self.db_pool, user_id, pagination).await?)
    }

    /// Manual score adjustment by an administrator. Appends a ledger entry
    /// (no triggering transaction) and applies the delta in one database
    /// transaction.
    pub async fn manual_adjustment(
        &self,
        user_id: Uuid,
        points: i32,
        note: &str,
        actor: Uuid,
    ) -> ApiResult<(LedgerEntry, User)> {
        if points == 0 {
            return Err(ApiError::InvalidAmount(
                "adjustment must be non-zero".to_string(),
            ));
        }

        let curve = self.limit_curve().await?;

        let mut tx = self.db_pool.begin().await?;

        let entry = ledger::record_award(
            &mut *tx,
            NewLedgerEntry {
                user_id,
                transaction_id: None,
                points_awarded: points,
                reason: ScoreReason::ManualAdjustment,
                metadata: json!({ "note": note, "adjustedBy": actor }),
            },
        )
        .await?
        .ok_or_else(|| ApiError::InternalError("ledger insert returned no row".to_string()))?;

        let user = apply_score_delta(&mut tx, user_id, points, &curve).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            points = points,
            actor = %actor,
            "Manual credit score adjustment applied"
        );

        Ok((entry, user))
    }
}

/// Apply a score delta to a user on the caller's open transaction.
///
/// The new score is clamped into the policy bounds. When the user opted into
/// automatic limits the credit limit is recomputed from the curve; limits
/// only ever grow (`max(current, curve(new_score))`).
pub async fn apply_score_delta(
    conn: &mut PgConnection,
    user_id: Uuid,
    delta: i32,
    curve: &LimitCurve,
) -> Result<User, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", user_id)))?;

    let new_score = clamp_score(i64::from(user.credit_score) + i64::from(delta));
    let new_limit = if user.auto_limit_enabled {
        user.credit_limit.max(curve.limit_for(new_score))
    } else {
        user.credit_limit
    };

    let updated = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET credit_score = $1, credit_limit = $2, updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(new_score)
    .bind(new_limit)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(updated)
}
