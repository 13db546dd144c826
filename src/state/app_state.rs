//! Application state shared across handlers

use std::sync::Arc;

use crate::loan::LoanService;
use crate::middleware::auth::AdminToken;
use crate::reconciliation::ReconciliationService;
use crate::scoring::ScoringService;
use crate::services::AnalyticsService;
use crate::tickets::TicketService;
use crate::transactions::TransactionService;

use axum::extract::FromRef;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub loan_service: Arc<LoanService>,
    pub transaction_service: Arc<TransactionService>,
    pub reconciliation_service: Arc<ReconciliationService>,
    pub scoring_service: Arc<ScoringService>,
    pub ticket_service: Arc<TicketService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub admin_token: AdminToken,
    pub payment_webhook_secret: Option<String>,
}

impl FromRef<AppState> for Arc<LoanService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.loan_service.clone()
    }
}

impl FromRef<AppState> for Arc<TransactionService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.transaction_service.clone()
    }
}

impl FromRef<AppState> for Arc<ReconciliationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.reconciliation_service.clone()
    }
}

impl FromRef<AppState> for Arc<ScoringService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.scoring_service.clone()
    }
}

impl FromRef<AppState> for Arc<TicketService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ticket_service.clone()
    }
}

impl FromRef<AppState> for Arc<AnalyticsService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.analytics_service.clone()
    }
}

impl FromRef<AppState> for AdminToken {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.admin_token.clone()
    }
}
