//! Delimited-file review store
//!
//! One header row plus one row per review, columns in [`Column::ALL`] order.
//! Files written by other tools may order columns differently or omit some;
//! columns are matched by header name and missing ones read as empty.
//!
//! Every read goes to disk. Writes rewrite the whole file through a temporary
//! sibling and a rename, serialized by a single-writer lock.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{FieldUpdate, ReviewStore};
use crate::review::{Column, NewReview, RawRow, Review, RowId};
use crate::{Error, Result};

pub struct CsvStore {
    path: Arc<PathBuf>,
    write_lock: Mutex<()>,
}

impl CsvStore {
    /// Open (or prepare to create) the file at `path`
    ///
    /// Creates the parent directory if missing. The file itself is created on
    /// first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: Arc::new(path),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<RawRow>> {
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || read_rows(&path))
            .await
            .map_err(|e| Error::Internal(format!("CSV read task failed: {}", e)))?
    }

    async fn save(&self, rows: Vec<RawRow>) -> Result<()> {
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || write_rows(&path, &rows))
            .await
            .map_err(|e| Error::Internal(format!("CSV write task failed: {}", e)))?
    }
}

#[async_trait]
impl ReviewStore for CsvStore {
    fn backend_name(&self) -> &'static str {
        "csv"
    }

    async fn list_all(&self) -> Result<Vec<Review>> {
        let rows = self.load().await?;
        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, raw)| Review::from_raw(RowId(i as u64), raw))
            .collect())
    }

    async fn append(&self, review: &NewReview) -> Result<Review> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load().await?;
        let raw = review.to_raw();
        let id = RowId(rows.len() as u64);
        let stored = Review::from_raw(id, &raw);
        rows.push(raw);
        self.save(rows).await?;
        debug!(row = id.0, "Appended review to {}", self.path.display());
        Ok(stored)
    }

    async fn update_fields(&self, id: RowId, update: &FieldUpdate) -> Result<Review> {
        update.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load().await?;
        let row = rows
            .get_mut(id.0 as usize)
            .ok_or_else(|| Error::NotFound(format!("Review {}", id)))?;
        update.apply_to(id, row)?;
        let updated = Review::from_raw(id, row);
        self.save(rows).await?;
        debug!(row = id.0, "Updated review in {}", self.path.display());
        Ok(updated)
    }
}

/// Read every row; a missing or empty file is an empty table
pub(crate) fn read_rows(path: &Path) -> Result<Vec<RawRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    // Cells that are not valid UTF-8 are decoded lossily rather than failing the read
    let columns: Vec<Option<Column>> = reader
        .byte_headers()?
        .iter()
        .map(|name| Column::from_name(&String::from_utf8_lossy(name)))
        .collect();

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let mut raw = RawRow::default();
        for (i, cell) in record.iter().enumerate() {
            if let Some(Some(column)) = columns.get(i) {
                raw.set(*column, String::from_utf8_lossy(cell).into_owned());
            }
        }
        rows.push(raw);
    }
    Ok(rows)
}

/// Replace the file contents with `rows`
pub(crate) fn write_rows(path: &Path, rows: &[RawRow]) -> Result<()> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)?;
        writer.write_record(Column::ALL.iter().map(|c| c.name()))?;
        for row in rows {
            writer.write_record(Column::ALL.iter().map(|c| row.get(*c)))?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
