//! Customer review submission
//!
//! Validation is fail-fast (rating, then body length) and nothing is stored
//! on failure. With submit-time enrichment enabled the new review is enriched
//! straight away and the generated reply is returned to the customer; an
//! enrichment failure at that point leaves the review pending for the batch.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use triage_common::events::TriageEvent;
use triage_common::review::{NewReview, Review};
use triage_common::time;

use super::ui;
use crate::enrich::EnrichmentOutcome;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub rating: i64,
    pub review: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub review: String,
}

/// A stored submission, with its enrichment when enriched on submit
#[derive(Debug, Serialize)]
pub struct Submission {
    pub review: Review,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentOutcome>,
}

/// Validate, store, announce and optionally enrich one submission
pub async fn submit_review(state: &AppState, rating: i64, text: &str) -> ApiResult<Submission> {
    let new_review = NewReview::validate(rating, text, time::now())?;
    let review = state.track(state.store.append(&new_review).await).await?;

    info!(row = review.id.0, rating = review.rating.value(), "Review submitted");
    state.event_bus.emit_lossy(TriageEvent::ReviewSubmitted {
        row: review.id,
        rating: review.rating.value(),
        timestamp: Utc::now(),
    });

    let enricher = match &state.enricher {
        Some(enricher) if state.enrich_on_submit => enricher.clone(),
        _ => {
            return Ok(Submission {
                review,
                enrichment: None,
            })
        }
    };

    match enricher.enrich_review(state.store.as_ref(), &review).await {
        Ok(enriched) => {
            state.event_bus.emit_lossy(TriageEvent::ReviewEnriched {
                row: review.id,
                used_fallback: enriched.outcome.used_fallback(),
                timestamp: Utc::now(),
            });
            Ok(Submission {
                review: enriched.review,
                enrichment: Some(enriched.outcome),
            })
        }
        Err(e) => {
            if e.is_store_failure() {
                state.record_error(e.to_string()).await;
            }
            warn!(row = review.id.0, error = %e, "Submit-time enrichment failed; review left pending");
            Ok(Submission {
                review,
                enrichment: None,
            })
        }
    }
}

/// POST /api/reviews
pub async fn submit_json(
    State(state): State<AppState>,
    request: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    let Json(request) =
        request.map_err(|e| ApiError::BadRequest(format!("Invalid submission: {}", e.body_text())))?;
    let submission = submit_review(&state, request.rating, &request.review).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// POST /submit (HTML form)
pub async fn submit_form(State(state): State<AppState>, Form(form): Form<SubmitForm>) -> Response {
    let rating = match form.rating.trim().parse::<i64>() {
        Ok(rating) => rating,
        Err(_) => {
            let page = ui::render_submission_form(Some("Please choose a rating from 1 to 5"), None, &form.review);
            return (StatusCode::BAD_REQUEST, Html(page)).into_response();
        }
    };

    match submit_review(&state, rating, &form.review).await {
        Ok(submission) => Html(ui::render_thank_you(&submission)).into_response(),
        Err(ApiError::BadRequest(message)) => {
            let page = ui::render_submission_form(Some(&message), Some(rating), &form.review);
            (StatusCode::BAD_REQUEST, Html(page)).into_response()
        }
        Err(e) => {
            let page = ui::render_submission_form(
                Some("We couldn't save your review right now. Please try again shortly."),
                Some(rating),
                &form.review,
            );
            (e.status(), Html(page)).into_response()
        }
    }
}
