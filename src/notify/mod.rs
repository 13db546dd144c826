//! Outbound notification dispatch
//!
//! Fire-and-forget delivery of lending events (email/activity log fan-out
//! happens downstream). Dispatch always runs after the triggering database
//! transaction has committed, and a delivery failure never propagates into
//! the operation that raised the event.

use anyhow::Context;
use serde::Serialize;
use uuid::Uuid;

/// Events the backend announces to the notification channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    LoanApproved {
        #[serde(rename = "loanRef")]
        loan_ref: String,
        #[serde(rename = "userId")]
        user_id: Uuid,
    },
    LoanRejected {
        #[serde(rename = "loanRef")]
        loan_ref: String,
        #[serde(rename = "userId")]
        user_id: Uuid,
        reason: String,
    },
    LoanDisbursed {
        #[serde(rename = "loanRef")]
        loan_ref: String,
        #[serde(rename = "userId")]
        user_id: Uuid,
        amount: i64,
    },
    RepaymentReceived {
        #[serde(rename = "loanRef")]
        loan_ref: String,
        #[serde(rename = "userId")]
        user_id: Uuid,
        amount: i64,
        outstanding: i64,
    },
    LoanCompleted {
        #[serde(rename = "loanRef")]
        loan_ref: String,
        #[serde(rename = "userId")]
        user_id: Uuid,
        #[serde(rename = "pointsAwarded")]
        points_awarded: i32,
    },
    LoanDefaulted {
        #[serde(rename = "loanRef")]
        loan_ref: String,
        #[serde(rename = "userId")]
        user_id: Uuid,
        outstanding: i64,
    },
    TransactionFailed {
        #[serde(rename = "transactionId")]
        transaction_id: Uuid,
        reference: String,
    },
}

/// Notification dispatcher posting events to a configured webhook
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl Notifier {
    /// Create a dispatcher. With no URL configured, events are logged and
    /// dropped (useful in development).
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    /// Dispatch an event without waiting for delivery.
    pub fn dispatch(&self, event: NotificationEvent) {
        let Some(url) = self.url.clone() else {
            tracing::debug!(?event, "Notification channel not configured, dropping event");
            return;
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = deliver(&client, &url, &event).await {
                tracing::warn!(?event, error = %e, "Notification delivery failed");
            }
        });
    }
}

async fn deliver(
    client: &reqwest::Client,
    url: &str,
    event: &NotificationEvent,
) -> anyhow::Result<()> {
    let response = client
        .post(url)
        .json(event)
        .send()
        .await
        .context("Failed to reach notification endpoint")?;

    anyhow::ensure!(
        response.status().is_success(),
        "Notification endpoint returned {}",
        response.status()
    );

    Ok(())
}
