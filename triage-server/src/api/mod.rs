//! HTTP handlers for both surfaces

pub mod auth;
pub mod enrich;
pub mod export;
pub mod health;
pub mod query;
pub mod reviews;
pub mod sse;
pub mod submit;
pub mod ui;
