//! Transaction domain module
//!
//! Money movements tied to loans: disbursements out, repayments in. Rows are
//! created pending and move exactly once to a terminal status through the
//! reconciliation processor.

mod model;
mod service;

pub use model::*;
pub use service::{generate_reference, TransactionService};
