//! Support ticket service layer

use sqlx::types::chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Page, PaginationParams};
use crate::tickets::{
    CreateTicketRequest, ListTicketsQuery, Ticket, TicketStatus, UpdateTicketRequest,
};

/// Ticket service for support workflows
#[derive(Clone)]
pub struct TicketService {
    db_pool: PgPool,
}

impl TicketService {
    /// Create a new ticket service instance
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Open a ticket for a user
    pub async fn create_ticket(&self, request: CreateTicketRequest) -> ApiResult<Ticket> {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(request.user_id)
            .fetch_optional(&self.db_pool)
            .await?;
        if exists.is_none() {
            return Err(ApiError::NotFound(format!("User {}", request.user_id)));
        }

        let now = Utc::now();
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (id, user_id, subject, body, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.subject)
        .bind(&request.body)
        .bind(TicketStatus::Open)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(ticket)
    }

    /// Get a ticket by ID
    pub async fn get_ticket(&self, id: Uuid) -> ApiResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(ticket)
    }

    /// Update status and/or assignment
    pub async fn update_ticket(&self, id: Uuid, request: UpdateTicketRequest) -> ApiResult<Ticket> {
        let current = self
            .get_ticket(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Ticket {}", id)))?;

        let status = request.status.unwrap_or(current.status);
        let assigned_to = request.assigned_to.or(current.assigned_to);

        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET status = $1, assigned_to = $2, updated_at = $3
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(assigned_to)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(ticket)
    }

    /// List tickets with filtering and pagination
    pub async fn list_tickets(&self, query: ListTicketsQuery) -> ApiResult<Page<Ticket>> {
        let pagination = PaginationParams {
            page: query.page,
            limit: query.limit,
        };
        let (page, limit, offset) = pagination.resolve();

        let mut count_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM tickets WHERE 1=1");
        let mut list_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM tickets WHERE 1=1");

        for builder in [&mut count_builder, &mut list_builder] {
            if let Some(user_id) = query.user_id {
                builder.push(" AND user_id = ");
                builder.push_bind(user_id);
            }
            if let Some(status) = query.status {
                builder.push(" AND status = ");
                builder.push_bind(status);
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

        let tickets = list_builder
            .build_query_as::<Ticket>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(Page {
            data: tickets,
            total,
            page,
            limit,
        })
    }
}
