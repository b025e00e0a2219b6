//! SQLite review store
//!
//! Row identity is the table's integer primary key. Cells are kept as TEXT so
//! rows edited by hand go through the same coercion as the CSV store.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

use super::{FieldUpdate, ReviewStore};
use crate::review::{NewReview, RawRow, Review, RowId};
use crate::{Error, Result};

const SELECT_ROWS: &str = "SELECT row_id,
        CAST(timestamp AS TEXT) AS timestamp,
        CAST(rating AS TEXT) AS rating,
        CAST(review AS TEXT) AS review,
        CAST(ai_response AS TEXT) AS ai_response,
        CAST(ai_summary AS TEXT) AS ai_summary,
        CAST(recommended_actions AS TEXT) AS recommended_actions
     FROM reviews";

const PENDING_CLAUSE: &str = "TRIM(COALESCE(ai_response, '')) = ''
     AND TRIM(COALESCE(ai_summary, '')) = ''
     AND TRIM(COALESCE(recommended_actions, '')) = ''";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create the database file and ensure the table exists
    pub async fn open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database (single connection)
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        create_reviews_table(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch(&self, id: RowId) -> Result<Option<Review>> {
        let row = sqlx::query(&format!("{} WHERE row_id = ?", SELECT_ROWS))
            .bind(id.0 as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| review_from_row(&r)).transpose()
    }
}

async fn create_reviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            rating TEXT NOT NULL,
            review TEXT NOT NULL DEFAULT '',
            ai_response TEXT NOT NULL DEFAULT '',
            ai_summary TEXT NOT NULL DEFAULT '',
            recommended_actions TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

fn review_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Review> {
    let text = |name: &str| -> String {
        row.try_get::<Option<String>, _>(name)
            .ok()
            .flatten()
            .unwrap_or_default()
    };
    let raw = RawRow {
        timestamp: text("timestamp"),
        rating: text("rating"),
        review: text("review"),
        ai_response: text("ai_response"),
        ai_summary: text("ai_summary"),
        recommended_actions: text("recommended_actions"),
    };
    let id: i64 = row.try_get("row_id")?;
    let id = u64::try_from(id).map_err(|_| Error::Internal(format!("Negative row_id {}", id)))?;
    Ok(Review::from_raw(RowId(id), &raw))
}

#[async_trait]
impl ReviewStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn list_all(&self) -> Result<Vec<Review>> {
        let rows = sqlx::query(&format!("{} ORDER BY row_id", SELECT_ROWS))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(review_from_row).collect()
    }

    async fn append(&self, review: &NewReview) -> Result<Review> {
        let raw = review.to_raw();
        let result = sqlx::query("INSERT INTO reviews (timestamp, rating, review) VALUES (?, ?, ?)")
            .bind(raw.timestamp.as_str())
            .bind(raw.rating.as_str())
            .bind(raw.review.as_str())
            .execute(&self.pool)
            .await?;

        let id = RowId(result.last_insert_rowid().max(0) as u64);
        debug!(row = id.0, "Inserted review");
        Ok(Review::from_raw(id, &raw))
    }

    async fn update_fields(&self, id: RowId, update: &FieldUpdate) -> Result<Review> {
        update.validate()?;

        let assignments: Vec<String> = update
            .values()
            .iter()
            .map(|(column, _)| format!("{} = ?", column.name()))
            .collect();
        let mut sql = format!("UPDATE reviews SET {} WHERE row_id = ?", assignments.join(", "));
        if update.requires_pending() {
            sql.push_str(" AND ");
            sql.push_str(PENDING_CLAUSE);
        }

        let mut query = sqlx::query(&sql);
        for (_, value) in update.values() {
            query = query.bind(value.as_str());
        }
        let result = query.bind(id.0 as i64).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from a lost pending race
            return match self.fetch(id).await? {
                Some(_) => Err(Error::Conflict(format!("Review {} is already enriched", id))),
                None => Err(Error::NotFound(format!("Review {}", id))),
            };
        }

        self.fetch(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Review {}", id)))
    }

    async fn get(&self, id: RowId) -> Result<Review> {
        self.fetch(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Review {}", id)))
    }
}
