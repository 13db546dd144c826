//! Credit scoring domain module
//!
//! Contains the tiered scoring policy engine, the append-only credit score
//! ledger, and the service maintaining each user's aggregate credit state.

mod ledger;
mod policy;
mod service;

pub use ledger::*;
pub use policy::*;
pub use service::{apply_score_delta, ScoringService};
