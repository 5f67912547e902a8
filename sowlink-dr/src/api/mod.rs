//! HTTP API handlers for sowlink-dr

pub mod health;
pub mod report;

pub use health::health_routes;
pub use report::report_routes;
