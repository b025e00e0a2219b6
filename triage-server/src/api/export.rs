//! Export of the current filtered/sorted view (every page)

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::info;
use triage_common::export::{export_file_name, render, ExportFormat};
use triage_common::time;
use triage_common::view::select_reviews;

use super::query::ViewQuery;
use crate::{ApiError, ApiResult, AppState};

/// GET /api/export/:format
///
/// `format` is `csv` or `json`; the file is served as an attachment named
/// `reviews_YYYYMMDD_HHMMSS.<ext>`.
pub async fn export_reviews(
    State(state): State<AppState>,
    Path(format): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    let format = match format.as_str() {
        "csv" => ExportFormat::Csv,
        "json" => ExportFormat::Json,
        other => return Err(ApiError::NotFound(format!("Export format '{}'", other))),
    };
    let query = ViewQuery::from_pairs(&pairs)?;

    let now = time::now();
    let reviews = state.track(state.store.list_all().await).await?;
    let selected = select_reviews(reviews, &query.params, now);
    let body = render(format, &selected)?;
    let file_name = export_file_name(format, now);

    info!(records = selected.len(), file = %file_name, "Exported reviews");

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response())
}
