//! Loan domain module
//!
//! Contains models, the lifecycle state machine, and the loan service.

mod model;
mod service;
mod state;

pub use model::*;
pub use service::{overdue_detector, LoanDefaults, LoanService};
pub use state::{disbursed_amount, ensure_transition, plan_repayment, RepaymentPlan};
