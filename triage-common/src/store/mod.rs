//! Backing store for reviews
//!
//! An ordered table keyed by row identity. Implementations: delimited file
//! ([`CsvStore`]), in-process table ([`MemoryStore`]) and SQLite
//! ([`SqliteStore`]). Callers hold an `Arc<dyn ReviewStore>` created once at
//! startup.
//!
//! Enrichment writes carry a pending guard: the store rejects the write with
//! [`Error::Conflict`] if the row already holds enrichment, so two writers
//! racing on the same row cannot both land.

mod csv_file;
mod memory;
#[cfg(feature = "sqlx")]
mod sqlite;

pub use csv_file::CsvStore;
pub use memory::MemoryStore;
#[cfg(feature = "sqlx")]
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::review::{Column, Enrichment, NewReview, RawRow, Rating, Review, RowId};
use crate::{Error, Result};

/// Field assignments applied to one row as a single logical write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUpdate {
    values: Vec<(Column, String)>,
    require_pending: bool,
}

impl FieldUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one column; a later value for the same column replaces an earlier one
    pub fn set(mut self, column: Column, value: impl Into<String>) -> Self {
        self.values.retain(|(c, _)| *c != column);
        self.values.push((column, value.into()));
        self
    }

    /// Reject the write if the row is no longer pending
    pub fn require_pending(mut self) -> Self {
        self.require_pending = true;
        self
    }

    /// All three enrichment fields, guarded by the pending check
    pub fn enrichment(enrichment: &Enrichment) -> Self {
        enrichment
            .fields()
            .into_iter()
            .fold(FieldUpdate::new(), |update, (column, value)| update.set(column, value))
            .require_pending()
    }

    pub fn values(&self) -> &[(Column, String)] {
        &self.values
    }

    pub fn requires_pending(&self) -> bool {
        self.require_pending
    }

    /// Reject values that could never be read back as intended
    pub fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(Error::InvalidInput("Update has no fields".to_string()));
        }
        for (column, value) in &self.values {
            match column {
                Column::Rating => {
                    let parsed = value
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| Error::InvalidInput(format!("Rating is not a number: {}", value)))?;
                    Rating::new(parsed).map_err(|e| Error::InvalidInput(e.to_string()))?;
                }
                Column::Timestamp if crate::time::parse_timestamp(value).is_none() => {
                    return Err(Error::InvalidInput(format!("Invalid timestamp: {}", value)));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Apply to an in-memory row, enforcing the pending guard
    pub(crate) fn apply_to(&self, id: RowId, row: &mut RawRow) -> Result<()> {
        if self.require_pending && !row.is_pending() {
            return Err(Error::Conflict(format!("Review {} is already enriched", id)));
        }
        for (column, value) in &self.values {
            row.set(*column, value.clone());
        }
        Ok(())
    }
}

/// Review persistence
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;

    /// Every review in insertion order
    async fn list_all(&self) -> Result<Vec<Review>>;

    /// Append a new (pending) review and return it with its row identity
    async fn append(&self, review: &NewReview) -> Result<Review>;

    /// Apply `update` to the row identified by `id` and return the updated review
    async fn update_fields(&self, id: RowId, update: &FieldUpdate) -> Result<Review>;

    /// Fetch one review
    async fn get(&self, id: RowId) -> Result<Review> {
        self.list_all()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("Review {}", id)))
    }
}

/// Open the configured store
pub async fn open_store(config: &StoreConfig, data_dir: &Path) -> Result<Arc<dyn ReviewStore>> {
    let path = config.resolved_path(data_dir);
    let store: Arc<dyn ReviewStore> = match config.backend {
        StoreBackend::Csv => {
            info!("Using CSV review store at {}", path.display());
            Arc::new(CsvStore::open(path)?)
        }
        StoreBackend::Memory => {
            info!("Using in-memory review store (contents are lost on exit)");
            Arc::new(MemoryStore::new())
        }
        #[cfg(feature = "sqlx")]
        StoreBackend::Sqlite => {
            info!("Using SQLite review store at {}", path.display());
            Arc::new(SqliteStore::open(&path).await?)
        }
        #[cfg(not(feature = "sqlx"))]
        StoreBackend::Sqlite => {
            return Err(Error::Config(
                "SQLite store requires the 'sqlx' feature".to_string(),
            ))
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrichment_update_sets_three_fields_with_guard() {
        let update = FieldUpdate::enrichment(&Enrichment {
            ai_response: "Thanks".into(),
            ai_summary: "Happy customer".into(),
            recommended_actions: "• Share".into(),
        });
        assert!(update.requires_pending());
        let cols: Vec<_> = update.values().iter().map(|(c, _)| *c).collect();
        assert_eq!(cols, Column::ENRICHMENT.to_vec());
    }

    #[test]
    fn test_set_replaces_same_column() {
        let update = FieldUpdate::new()
            .set(Column::AiSummary, "first")
            .set(Column::AiSummary, "second");
        assert_eq!(update.values(), &[(Column::AiSummary, "second".to_string())]);
    }

    #[test]
    fn test_validate() {
        assert!(FieldUpdate::new().validate().is_err());
        assert!(FieldUpdate::new().set(Column::Rating, "6").validate().is_err());
        assert!(FieldUpdate::new().set(Column::Rating, "x").validate().is_err());
        assert!(FieldUpdate::new().set(Column::Timestamp, "soon").validate().is_err());
        assert!(FieldUpdate::new().set(Column::Rating, "2").validate().is_ok());
    }

    #[test]
    fn test_guard_rejects_enriched_row() {
        let mut row = RawRow {
            ai_summary: "done".into(),
            ..RawRow::default()
        };
        let update = FieldUpdate::new().set(Column::AiResponse, "x").require_pending();
        let err = update.apply_to(RowId(4), &mut row).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(row.ai_response, "");
    }
}
