//! Route definitions for the microlend API

mod analytics;
mod credit;
mod loan;
mod ticket;
mod transaction;

pub use analytics::analytics_routes;
pub use credit::credit_routes;
pub use loan::loan_routes;
pub use ticket::ticket_routes;
pub use transaction::transaction_routes;
