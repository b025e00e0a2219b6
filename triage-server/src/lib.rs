//! review-triage server library
//!
//! Two HTTP surfaces share one [`AppState`]: the customer surface (submission
//! form and JSON submission) and the admin surface (dashboard, review API,
//! export, enrichment, events). Both are served by the same process so that a
//! single store handle serialises every write.

pub mod api;
pub mod enrich;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::warn;
use triage_common::events::EventBus;
use triage_common::ReviewStore;

use crate::enrich::Enricher;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Backing store, opened once at startup
    pub store: Arc<dyn ReviewStore>,
    /// Absent when no API key is configured
    pub enricher: Option<Arc<Enricher>>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Bearer token for admin routes; `None` disables auth
    pub admin_token: Option<String>,
    /// Enrich each customer submission immediately
    pub enrich_on_submit: bool,
    /// Pause between rows during a batch
    pub batch_delay: Duration,
    /// Held for the duration of a batch
    batch_lock: Arc<Mutex<()>>,
    /// Cancellation token of the running batch
    active_batch: Arc<RwLock<Option<CancellationToken>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last store error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn ReviewStore>, event_bus: EventBus) -> Self {
        Self {
            store,
            enricher: None,
            event_bus,
            admin_token: None,
            enrich_on_submit: false,
            batch_delay: Duration::ZERO,
            batch_lock: Arc::new(Mutex::new(())),
            active_batch: Arc::new(RwLock::new(None)),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = Some(Arc::new(enricher));
        self
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_enrich_on_submit(mut self, enabled: bool) -> Self {
        self.enrich_on_submit = enabled;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// The enricher, or 503 when AI enrichment is not configured
    pub fn require_enricher(&self) -> ApiResult<Arc<Enricher>> {
        self.enricher.clone().ok_or_else(|| {
            ApiError::AiUnavailable("No API key configured; set TRIAGE_GEMINI_API_KEY".to_string())
        })
    }

    /// Convert a store result, remembering store failures for `/health`
    pub async fn track<T>(&self, result: triage_common::Result<T>) -> ApiResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_store_failure() {
                    self.record_error(e.to_string()).await;
                }
                Err(e.into())
            }
        }
    }

    pub async fn record_error(&self, message: String) {
        warn!("Store error: {}", message);
        *self.last_error.write().await = Some(message);
    }

    /// Claim the single batch slot, or `None` if a batch is running
    pub(crate) async fn try_begin_batch(&self) -> Option<(OwnedMutexGuard<()>, CancellationToken)> {
        let guard = self.batch_lock.clone().try_lock_owned().ok()?;
        let token = CancellationToken::new();
        *self.active_batch.write().await = Some(token.clone());
        Some((guard, token))
    }

    pub(crate) async fn end_batch(&self) {
        *self.active_batch.write().await = None;
    }

    /// Cancel the running batch; returns whether one was running
    pub async fn cancel_batch(&self) -> bool {
        match self.active_batch.read().await.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn batch_running(&self) -> bool {
        self.active_batch.read().await.is_some()
    }
}

/// Customer surface: submission form, JSON submission, health
pub fn build_customer_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/", get(api::ui::submission_page))
        .route("/submit", post(api::submit::submit_form))
        .route("/api/reviews", post(api::submit::submit_json))
        .route("/health", get(api::health::customer_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Admin surface: dashboard, review API, export, enrichment, events
///
/// Every route except `/health` sits behind the admin token check.
pub fn build_admin_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/", get(api::ui::dashboard_page))
        .route("/enrich", post(api::enrich::enrich_batch_form))
        .route("/reviews/:row/enrich", post(api::enrich::enrich_one_form))
        .route("/api/reviews", get(api::reviews::list_reviews))
        .route("/api/reviews/:row", get(api::reviews::get_review))
        .route("/api/reviews/:row/enrich", post(api::enrich::enrich_one))
        .route("/api/enrich/batch", post(api::enrich::enrich_batch))
        .route("/api/enrich/cancel", post(api::enrich::cancel_batch))
        .route("/api/export/:format", get(api::export::export_reviews))
        .route("/api/events", get(api::sse::event_stream))
        .layer(middleware::from_fn_with_state(state.clone(), api::auth::auth_middleware));

    let public = Router::new().route("/health", get(api::health::admin_health));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
