//! Test helper utilities shared by the triage-server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use triage_common::events::EventBus;
use triage_common::store::MemoryStore;
use triage_server::enrich::{Enricher, GenerationError, TextGenerator};
use triage_server::AppState;

/// Deterministic stand-in for the generation API
pub struct ScriptedGenerator {
    fail: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    /// Answers every prompt with text naming the prompt's task
    pub fn replying() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    /// Fails every call
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    /// Answers after `delay`
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(GenerationError::Api(503, "model overloaded".to_string()));
        }
        let task = prompt.lines().last().unwrap_or_default().trim_end_matches(':');
        Ok(format!("Generated {}", task.to_lowercase()))
    }
}

/// State over an empty in-memory store, AI disabled
pub fn memory_state() -> AppState {
    AppState::new(Arc::new(MemoryStore::new()), EventBus::new(100))
}

/// State over an empty in-memory store with the given generator
pub fn state_with(generator: Arc<ScriptedGenerator>) -> AppState {
    memory_state().with_enricher(Enricher::new(generator))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).expect("Should parse JSON")
}
