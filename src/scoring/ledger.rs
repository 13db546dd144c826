//! Credit score ledger
//!
//! Append-only history of point-awarding events per user. Rows are never
//! updated or deleted; the running score on the user row is a cached
//! projection and this table is the source of truth for audit.

use serde::{Deserialize, Serialize};
use sqlx::postgres::Postgres;
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Page, PaginationParams};

/// Why points were awarded or deducted
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "score_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScoreReason {
    PartialRepayment,
    LoanCompleted,
    Penalty,
    ManualAdjustment,
}

/// One immutable ledger entry
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Triggering transaction; NULL for penalties and manual adjustments.
    /// Unique when present, which is what makes duplicate reconciliation a
    /// no-op at the ledger level.
    pub transaction_id: Option<Uuid>,
    pub points_awarded: i32,
    pub reason: ScoreReason,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Entry to append
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub points_awarded: i32,
    pub reason: ScoreReason,
    pub metadata: serde_json::Value,
}

/// Append an entry on the caller's executor (usually an open transaction so
/// the ledger row commits with the loan and user mutations).
///
/// Returns `None` when an award for the same transaction already exists:
/// the same repayment notification may be delivered more than once, and the
/// second delivery must not award twice.
pub async fn record_award<'e, E>(
    executor: E,
    entry: NewLedgerEntry,
) -> Result<Option<LedgerEntry>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, LedgerEntry>(
        r#"
        INSERT INTO credit_score_history (id, user_id, transaction_id, points_awarded, reason, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (transaction_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.user_id)
    .bind(entry.transaction_id)
    .bind(entry.points_awarded)
    .bind(entry.reason)
    .bind(entry.metadata)
    .bind(Utc::now())
    .fetch_optional(executor)
    .await
}

/// List a user's ledger entries, newest first, paginated.
pub async fn history(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    pagination: &PaginationParams,
) -> Result<Page<LedgerEntry>, sqlx::Error> {
    let (page, limit, offset) = pagination.resolve();

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM credit_score_history WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    let entries = sqlx::query_as::<_, LedgerEntry>(
        r#"
        SELECT * FROM credit_score_history
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(i64::from(limit))
    .bind(i64::from(offset))
    .fetch_all(pool)
    .await?;

    Ok(Page {
        data: entries,
        total: total.0,
        page,
        limit,
    })
}
