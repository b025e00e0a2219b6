//! Batch enrichment of pending reviews
//!
//! The batch snapshots the pending rows when it starts and walks them once,
//! sequentially, pausing between rows. A row that fails never aborts the batch:
//! generation failures become fallback text, a row enriched by someone else
//! in the meantime is skipped, and a failed store write is counted and left
//! pending.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use triage_common::events::{EventBus, TriageEvent};
use triage_common::{Error, Result, ReviewStore};

use super::Enricher;

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Pause between consecutive rows
    pub delay: Duration,
    /// Process at most this many pending rows
    pub limit: Option<usize>,
}

/// Counts reported when a batch ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Pending rows in the snapshot (after the limit)
    pub total: usize,
    pub processed: usize,
    /// Rows written with all three fields
    pub enriched: usize,
    /// Enriched rows whose fields were all generated
    pub generated: usize,
    /// Enriched rows with at least one fallback field
    pub fallback: usize,
    /// Rows no longer pending (or gone) when their turn came
    pub skipped: usize,
    /// Rows whose store write failed; they stay pending
    pub failed: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

pub struct BatchProcessor {
    store: Arc<dyn ReviewStore>,
    enricher: Arc<Enricher>,
    event_bus: EventBus,
    options: BatchOptions,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        enricher: Arc<Enricher>,
        event_bus: EventBus,
        options: BatchOptions,
    ) -> Self {
        Self {
            store,
            enricher,
            event_bus,
            options,
        }
    }

    /// Run one batch until done or `cancel` fires
    ///
    /// Fails only when the initial snapshot cannot be read.
    pub async fn run(&self, cancel: CancellationToken) -> Result<BatchSummary> {
        let started = Instant::now();

        let mut pending: Vec<_> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|r| r.is_pending())
            .collect();
        if let Some(limit) = self.options.limit {
            pending.truncate(limit);
        }

        let mut summary = BatchSummary {
            total: pending.len(),
            ..BatchSummary::default()
        };

        info!(
            total = summary.total,
            generator = self.enricher.generator_name(),
            "Enrichment batch started"
        );
        self.event_bus.emit_lossy(TriageEvent::BatchStarted {
            total: summary.total,
            timestamp: Utc::now(),
        });

        for (index, review) in pending.iter().enumerate() {
            if index > 0 && !self.options.delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.options.delay) => {}
                }
            }
            if cancel.is_cancelled() {
                summary.cancelled = true;
                info!(processed = summary.processed, "Enrichment batch cancelled");
                break;
            }

            match self.enricher.enrich_review(self.store.as_ref(), review).await {
                Ok(enriched) => {
                    summary.enriched += 1;
                    let used_fallback = enriched.outcome.used_fallback();
                    if used_fallback {
                        summary.fallback += 1;
                    } else {
                        summary.generated += 1;
                    }
                    self.event_bus.emit_lossy(TriageEvent::ReviewEnriched {
                        row: review.id,
                        used_fallback,
                        timestamp: Utc::now(),
                    });
                }
                Err(Error::Conflict(_)) | Err(Error::NotFound(_)) => {
                    summary.skipped += 1;
                    info!(row = review.id.0, "Review no longer pending; skipped");
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(row = review.id.0, error = %e, "Enrichment write failed; review left pending");
                    summary.last_error = Some(e.to_string());
                }
            }

            summary.processed += 1;
            self.event_bus.emit_lossy(TriageEvent::BatchProgress {
                processed: summary.processed,
                total: summary.total,
                row: review.id,
                timestamp: Utc::now(),
            });
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            enriched = summary.enriched,
            generated = summary.generated,
            fallback = summary.fallback,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Enrichment batch finished in {} ms",
            summary.duration_ms
        );
        self.event_bus.emit_lossy(TriageEvent::BatchCompleted {
            enriched: summary.enriched,
            generated: summary.generated,
            fallback: summary.fallback,
            skipped: summary.skipped,
            failed: summary.failed,
            cancelled: summary.cancelled,
            timestamp: Utc::now(),
        });

        Ok(summary)
    }
}
