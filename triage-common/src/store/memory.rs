//! In-process review table

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{FieldUpdate, ReviewStore};
use crate::review::{NewReview, RawRow, Review, RowId};
use crate::{Error, Result};

/// Reviews held in memory; row identity is the position in the table
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<RawRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table with existing rows (malformed cells allowed)
    pub fn with_rows(rows: Vec<RawRow>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list_all(&self) -> Result<Vec<Review>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, raw)| Review::from_raw(RowId(i as u64), raw))
            .collect())
    }

    async fn append(&self, review: &NewReview) -> Result<Review> {
        let mut rows = self.rows.write().await;
        let raw = review.to_raw();
        let id = RowId(rows.len() as u64);
        let stored = Review::from_raw(id, &raw);
        rows.push(raw);
        Ok(stored)
    }

    async fn update_fields(&self, id: RowId, update: &FieldUpdate) -> Result<Review> {
        update.validate()?;
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(id.0 as usize)
            .ok_or_else(|| Error::NotFound(format!("Review {}", id)))?;
        update.apply_to(id, row)?;
        Ok(Review::from_raw(id, row))
    }

    async fn get(&self, id: RowId) -> Result<Review> {
        let rows = self.rows.read().await;
        rows.get(id.0 as usize)
            .map(|raw| Review::from_raw(id, raw))
            .ok_or_else(|| Error::NotFound(format!("Review {}", id)))
    }
}
