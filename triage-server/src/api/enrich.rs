//! Enrichment endpoints: batch, cancel, single review
//!
//! Only one batch runs at a time; a second request gets 409. The batch runs
//! in its own task so a client disconnect does not abandon it half-way.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use triage_common::events::TriageEvent;
use triage_common::review::RowId;

use super::ui;
use crate::enrich::{BatchOptions, BatchProcessor, BatchSummary, EnrichedReview};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct BatchQuery {
    /// Process at most this many pending reviews
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// Whether a batch was running when the request arrived
    pub cancelled: bool,
}

/// Hidden fields of the dashboard's action forms
#[derive(Debug, Default, Deserialize)]
pub struct ActionForm {
    /// Dashboard query string to return to
    #[serde(default)]
    pub return_to: String,
    #[serde(default)]
    pub limit: Option<String>,
}

impl ActionForm {
    /// Dashboard URL to go back to
    fn back_href(&self) -> String {
        let query = self.return_to.trim_start_matches('?');
        if !query.is_empty() && query.chars().all(|c| c.is_ascii_graphic()) {
            format!("/?{}", query)
        } else {
            "/".to_string()
        }
    }

    fn redirect(&self) -> Redirect {
        Redirect::to(&self.back_href())
    }

    fn limit(&self) -> ApiResult<Option<usize>> {
        match self.limit.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(v) => v
                .parse::<usize>()
                .map(Some)
                .map_err(|_| ApiError::BadRequest(format!("Invalid limit: {}", v))),
        }
    }
}

/// Run one batch to completion
pub async fn run_batch(state: &AppState, limit: Option<usize>) -> ApiResult<BatchSummary> {
    if limit == Some(0) {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }
    let enricher = state.require_enricher()?;
    let Some((guard, cancel)) = state.try_begin_batch().await else {
        return Err(ApiError::Conflict("An enrichment batch is already running".to_string()));
    };

    let processor = BatchProcessor::new(
        state.store.clone(),
        enricher,
        state.event_bus.clone(),
        BatchOptions {
            delay: state.batch_delay,
            limit,
        },
    );

    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        let result = processor.run(cancel).await;
        task_state.end_batch().await;
        drop(guard);
        result
    });

    let result = handle
        .await
        .map_err(|e| ApiError::Internal(format!("Batch task failed: {}", e)))?;
    let summary = state.track(result).await?;
    if let Some(error) = &summary.last_error {
        state.record_error(error.clone()).await;
    }
    Ok(summary)
}

/// Enrich one review on demand and announce it
pub async fn run_single(state: &AppState, row: RowId) -> ApiResult<EnrichedReview> {
    let enricher = state.require_enricher()?;
    let enriched = state
        .track(enricher.enrich_row(state.store.as_ref(), row).await)
        .await?;

    info!(row = row.0, fallback = enriched.outcome.used_fallback(), "Review enriched on demand");
    state.event_bus.emit_lossy(TriageEvent::ReviewEnriched {
        row,
        used_fallback: enriched.outcome.used_fallback(),
        timestamp: Utc::now(),
    });
    Ok(enriched)
}

/// POST /api/enrich/batch
pub async fn enrich_batch(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
) -> ApiResult<Json<BatchSummary>> {
    Ok(Json(run_batch(&state, query.limit).await?))
}

/// POST /api/enrich/cancel
pub async fn cancel_batch(State(state): State<AppState>) -> Json<CancelResponse> {
    let cancelled = state.cancel_batch().await;
    if cancelled {
        info!("Batch cancellation requested");
    }
    Json(CancelResponse { cancelled })
}

/// POST /api/reviews/:row/enrich
pub async fn enrich_one(
    State(state): State<AppState>,
    Path(row): Path<u64>,
) -> ApiResult<Json<EnrichedReview>> {
    Ok(Json(run_single(&state, RowId(row)).await?))
}

fn error_page(error: ApiError, back_href: &str) -> Response {
    let status = error.status();
    let body = ui::render_message("Enrichment not run", error.message(), back_href);
    (status, Html(body)).into_response()
}

/// POST /enrich (dashboard form)
pub async fn enrich_batch_form(State(state): State<AppState>, Form(form): Form<ActionForm>) -> Response {
    let limit = match form.limit() {
        Ok(limit) => limit,
        Err(e) => return error_page(e, &form.back_href()),
    };
    match run_batch(&state, limit).await {
        Ok(_) => form.redirect().into_response(),
        Err(e) => error_page(e, &form.back_href()),
    }
}

/// POST /reviews/:row/enrich (dashboard form)
pub async fn enrich_one_form(
    State(state): State<AppState>,
    Path(row): Path<u64>,
    Form(form): Form<ActionForm>,
) -> Response {
    match run_single(&state, RowId(row)).await {
        // Someone else got there first: the dashboard shows their result
        Ok(_) | Err(ApiError::Conflict(_)) => form.redirect().into_response(),
        Err(e) => error_page(e, &form.back_href()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn test_redirect_keeps_dashboard_query() {
        let form = ActionForm {
            return_to: "?window=7d&page=2&token=abc".into(),
            limit: None,
        };
        let response = form.redirect().into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/?window=7d&page=2&token=abc");
    }

    #[test]
    fn test_redirect_rejects_unsafe_query() {
        let form = ActionForm {
            return_to: "page=1\r\nSet-Cookie: x".into(),
            limit: None,
        };
        let response = form.redirect().into_response();
        assert_eq!(response.headers()[header::LOCATION], "/");
    }

    #[test]
    fn test_form_limit() {
        let mut form = ActionForm::default();
        assert_eq!(form.limit().unwrap(), None);
        form.limit = Some("5".into());
        assert_eq!(form.limit().unwrap(), Some(5));
        form.limit = Some("five".into());
        assert!(form.limit().is_err());
    }
}
