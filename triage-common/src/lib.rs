//! # Review Triage Common Library
//!
//! Shared code for the review triage service:
//! - Review model and submission validation
//! - View pipeline (filter, sort, paginate, metrics)
//! - Backing stores (CSV file, in-memory, SQLite)
//! - CSV / JSON export
//! - Configuration loading
//! - Event bus and SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod review;
pub mod sse;
pub mod store;
pub mod time;
pub mod view;

pub use error::{Error, Result};
pub use review::{NewReview, Rating, Review, RowId};
pub use store::ReviewStore;
