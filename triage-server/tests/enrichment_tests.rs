//! Enrichment pipeline tests: batch processor, events and the generation client

mod helpers;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use triage_common::events::{EventBus, TriageEvent};
use triage_common::review::{Column, NewReview};
use triage_common::store::{FieldUpdate, MemoryStore, ReviewStore};
use triage_common::time;
use triage_common::RowId;
use triage_server::enrich::{
    BatchOptions, BatchProcessor, Enricher, GeminiClient, GeminiSettings, GenerationError, TextGenerator,
};

use helpers::ScriptedGenerator;

async fn store_with(ratings: &[i64]) -> Arc<dyn ReviewStore> {
    let store: Arc<dyn ReviewStore> = Arc::new(MemoryStore::new());
    for (i, rating) in ratings.iter().enumerate() {
        let review = NewReview::validate(*rating, &format!("Review body number {}", i), time::now()).unwrap();
        store.append(&review).await.unwrap();
    }
    store
}

fn processor(
    store: &Arc<dyn ReviewStore>,
    generator: Arc<dyn TextGenerator>,
    bus: &EventBus,
    limit: Option<usize>,
) -> BatchProcessor {
    BatchProcessor::new(
        store.clone(),
        Arc::new(Enricher::new(generator)),
        bus.clone(),
        BatchOptions {
            delay: Duration::ZERO,
            limit,
        },
    )
}

// =============================================================================
// Batch processor
// =============================================================================

#[tokio::test]
async fn test_batch_enriches_every_pending_row() {
    let store = store_with(&[1, 3, 5]).await;
    let bus = EventBus::new(100);

    let summary = processor(&store, ScriptedGenerator::replying(), &bus, None)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.generated, 3);
    assert_eq!(summary.fallback, 0);
    assert!(!summary.cancelled);
    assert!(summary.last_error.is_none());

    for review in store.list_all().await.unwrap() {
        assert_eq!(review.ai_response, "Generated response");
        assert_eq!(review.ai_summary, "Generated summary");
        assert_eq!(review.recommended_actions, "Generated recommendations");
    }
}

#[tokio::test]
async fn test_generation_failure_falls_back_per_tier() {
    let store = store_with(&[2, 3, 4]).await;
    let bus = EventBus::new(100);

    let summary = processor(&store, ScriptedGenerator::failing(), &bus, None)
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.enriched, 3);
    assert_eq!(summary.fallback, 3);
    assert_eq!(summary.failed, 0);

    let reviews = store.list_all().await.unwrap();
    assert!(reviews[0].recommended_actions.contains("Contact customer immediately"));
    assert!(reviews[1].recommended_actions.contains("Follow up with customer"));
    assert!(reviews[2].recommended_actions.contains("Thank customer"));
    assert_eq!(reviews[0].ai_summary, "2-star review: Review body number 0...");
    assert!(reviews[0].ai_response.contains("sorry"));
}

#[tokio::test]
async fn test_batch_ignores_enriched_rows_and_honours_limit() {
    let store = store_with(&[1, 2, 3, 4, 5]).await;
    store
        .update_fields(RowId(1), &FieldUpdate::new().set(Column::AiSummary, "Handled by hand"))
        .await
        .unwrap();
    let bus = EventBus::new(100);

    let summary = processor(&store, ScriptedGenerator::replying(), &bus, Some(2))
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.enriched, 2);

    let reviews = store.list_all().await.unwrap();
    assert!(!reviews[0].is_pending());
    assert_eq!(reviews[1].ai_summary, "Handled by hand");
    assert!(reviews[1].ai_response.is_empty());
    assert!(!reviews[2].is_pending());
    assert!(reviews[3].is_pending());
    assert!(reviews[4].is_pending());
}

/// Enriches row 1 behind the batch's back during the first call
struct InterferingGenerator {
    store: Arc<dyn ReviewStore>,
    interfered: AtomicBool,
}

#[async_trait]
impl TextGenerator for InterferingGenerator {
    fn name(&self) -> &str {
        "interfering"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        if !self.interfered.swap(true, Ordering::SeqCst) {
            self.store
                .update_fields(
                    RowId(1),
                    &FieldUpdate::new().set(Column::AiResponse, "Answered by a colleague"),
                )
                .await
                .map_err(|e| GenerationError::Network(e.to_string()))?;
        }
        Ok("Batch text".to_string())
    }
}

#[tokio::test]
async fn test_row_enriched_elsewhere_is_skipped() {
    let store = store_with(&[1, 1]).await;
    let bus = EventBus::new(100);
    let generator = Arc::new(InterferingGenerator {
        store: store.clone(),
        interfered: AtomicBool::new(false),
    });

    let summary = processor(&store, generator, &bus, None)
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.enriched, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    let reviews = store.list_all().await.unwrap();
    assert_eq!(reviews[0].ai_response, "Batch text");
    assert_eq!(reviews[1].ai_response, "Answered by a colleague");
    assert!(reviews[1].ai_summary.is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start_touches_nothing() {
    let store = store_with(&[3, 3, 3]).await;
    let bus = EventBus::new(100);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = processor(&store, ScriptedGenerator::replying(), &bus, None)
        .run(cancel)
        .await
        .unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.processed, 0);
    assert!(store.list_all().await.unwrap().iter().all(|r| r.is_pending()));
}

#[tokio::test]
async fn test_cancel_during_delay_stops_batch() {
    let store = store_with(&[4, 4, 4, 4]).await;
    let bus = EventBus::new(100);
    let processor = BatchProcessor::new(
        store.clone(),
        Arc::new(Enricher::new(ScriptedGenerator::replying())),
        bus.clone(),
        BatchOptions {
            delay: Duration::from_secs(30),
            limit: None,
        },
    );

    let cancel = CancellationToken::new();
    let mut events = bus.subscribe();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { processor.run(cancel).await })
    };

    // First row completes immediately; the batch then waits out the delay
    loop {
        if let TriageEvent::BatchProgress { .. } = events.recv().await.unwrap() {
            break;
        }
    }
    cancel.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("Cancel should interrupt the delay")
        .unwrap()
        .unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.enriched, 1);
    assert_eq!(
        store.list_all().await.unwrap().iter().filter(|r| r.is_pending()).count(),
        3
    );
}

#[tokio::test]
async fn test_batch_events_in_order() {
    let store = store_with(&[2, 5]).await;
    let bus = EventBus::new(100);
    let mut events = bus.subscribe();

    processor(&store, ScriptedGenerator::failing(), &bus, None)
        .run(CancellationToken::new())
        .await
        .unwrap();

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let TriageEvent::BatchCompleted {
            enriched, fallback, ..
        } = &event
        {
            assert_eq!(*enriched, 2);
            assert_eq!(*fallback, 2);
        }
        if let TriageEvent::ReviewEnriched { used_fallback, .. } = &event {
            assert!(*used_fallback);
        }
        names.push(event.event_type());
    }

    assert_eq!(
        names,
        vec![
            "BatchStarted",
            "ReviewEnriched",
            "BatchProgress",
            "ReviewEnriched",
            "BatchProgress",
            "BatchCompleted",
        ]
    );
}

#[tokio::test]
async fn test_empty_batch_completes() {
    let store = store_with(&[]).await;
    let bus = EventBus::new(100);

    let summary = processor(&store, ScriptedGenerator::replying(), &bus, None)
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary, triage_server::enrich::BatchSummary {
        duration_ms: summary.duration_ms,
        ..Default::default()
    });
}

// =============================================================================
// Generation client against a local stand-in server
// =============================================================================

#[derive(Clone, Default)]
struct MockApi {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn generate_content(
    State(api): State<MockApi>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    api.calls.lock().unwrap().push((call, body));
    match headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) {
        Some("good-key") => (
            StatusCode::OK,
            Json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": " Thanks for visiting! "}], "role": "model"},
                    "finishReason": "STOP"
                }]
            })),
        ),
        Some("busy-key") => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": {"message": "quota"}})),
        ),
        Some("empty-key") => (StatusCode::OK, Json(json!({"candidates": []}))),
        _ => (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"message": "API key not valid"}})),
        ),
    }
}

async fn start_mock_api() -> (String, MockApi) {
    let api = MockApi::default();
    let app = Router::new()
        .route("/v1beta/models/:call", post(generate_content))
        .with_state(api.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/v1beta/", addr), api)
}

fn client(endpoint: &str, api_key: &str) -> GeminiClient {
    GeminiClient::new(GeminiSettings {
        api_key: api_key.to_string(),
        model: "test-model".to_string(),
        endpoint: endpoint.to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn test_client_returns_trimmed_candidate_text() {
    let (endpoint, api) = start_mock_api().await;

    let text = client(&endpoint, "good-key").generate("Say thanks").await.unwrap();
    assert_eq!(text, "Thanks for visiting!");

    let calls = api.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "test-model:generateContent");
    assert_eq!(calls[0].1["contents"][0]["parts"][0]["text"], "Say thanks");
}

#[tokio::test]
async fn test_client_error_mapping() {
    let (endpoint, _api) = start_mock_api().await;

    let err = client(&endpoint, "wrong-key").generate("x").await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidApiKey));

    let err = client(&endpoint, "busy-key").generate("x").await.unwrap_err();
    assert!(matches!(err, GenerationError::Api(429, ref body) if body.contains("quota")));

    let err = client(&endpoint, "empty-key").generate("x").await.unwrap_err();
    assert!(matches!(err, GenerationError::EmptyResponse));
}

#[tokio::test]
async fn test_unreachable_api_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{}/v1beta", addr), "good-key")
        .generate("x")
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Network(_)));
}

#[tokio::test]
async fn test_enricher_over_client_mixes_sources() {
    let (endpoint, _api) = start_mock_api().await;
    let enricher = Enricher::new(Arc::new(client(&endpoint, "good-key")));
    let rating = triage_common::Rating::new(5).unwrap();

    let outcome = enricher.enrich(rating, "Lovely staff and great food").await;
    assert!(outcome.fully_generated());
    assert_eq!(outcome.enrichment.ai_summary, "Thanks for visiting!");

    let enricher = Enricher::new(Arc::new(client(&endpoint, "wrong-key")));
    let outcome = enricher.enrich(rating, "Lovely staff and great food").await;
    assert!(outcome.used_fallback());
    assert!(outcome.enrichment.is_complete());
}
