//! Business logic services for the microlend backend

pub mod analytics;

pub use analytics::AnalyticsService;
