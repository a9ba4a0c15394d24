//! Request/response data transfer objects

pub mod analytics;
pub mod tiss;
