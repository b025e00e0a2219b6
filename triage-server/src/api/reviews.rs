//! Review listing API
//!
//! The view is recomputed from a fresh read of the store on every request.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use triage_common::review::{Review, RowId};
use triage_common::time;
use triage_common::view::{build_view, ReviewView};

use super::query::ViewQuery;
use crate::{ApiResult, AppState};

/// Echo of the effective view parameters
#[derive(Debug, Serialize)]
pub struct AppliedFilters {
    pub window: &'static str,
    pub ratings: String,
    pub critical: bool,
    pub sort: &'static str,
    pub per_page: usize,
}

#[derive(Debug, Serialize)]
pub struct ReviewListResponse {
    pub filters: AppliedFilters,
    #[serde(flatten)]
    pub view: ReviewView,
}

/// Load every review and run the view pipeline for `query`
pub async fn load_view(state: &AppState, query: &ViewQuery) -> ApiResult<ReviewView> {
    let reviews = state.track(state.store.list_all().await).await?;
    Ok(build_view(reviews, &query.params, time::now()))
}

/// GET /api/reviews
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<ReviewListResponse>> {
    let query = ViewQuery::from_pairs(&pairs)?;
    let view = load_view(&state, &query).await?;
    let p = &query.params;

    Ok(Json(ReviewListResponse {
        filters: AppliedFilters {
            window: p.window.as_str(),
            ratings: p.ratings.to_string(),
            critical: p.critical_only,
            sort: p.sort.as_str(),
            per_page: view.page_size,
        },
        view,
    }))
}

/// GET /api/reviews/:row
pub async fn get_review(State(state): State<AppState>, Path(row): Path<u64>) -> ApiResult<Json<Review>> {
    let review = state.track(state.store.get(RowId(row)).await).await?;
    Ok(Json(review))
}
