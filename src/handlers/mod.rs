//! API handlers for the microlend backend

pub mod analytics;
pub mod credit;
pub mod loan;
pub mod ticket;
pub mod transaction;

pub use analytics::*;
pub use credit::*;
pub use loan::*;
pub use ticket::*;
pub use transaction::*;

// Re-export the admin identity extractor for handler use
pub use crate::middleware::auth::AdminAuth;
