//! Shared fixtures for router-level tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use fraudguard_api::{
    create_router,
    features::{FeatureSchema, FeatureVector},
    inference::{InferenceError, Score, Scorer},
    store::MemoryStore,
    AppState, PredictionService,
};
use tower::ServiceExt;

/// Deterministic scorer returning a fixed probability and label
pub struct StubScorer {
    schema: FeatureSchema,
    probability: f64,
    label: i64,
    loaded: bool,
    pub calls: AtomicUsize,
    pub last_vector: parking_lot::Mutex<Option<FeatureVector>>,
}

impl StubScorer {
    pub fn new(probability: f64, label: i64) -> Self {
        Self {
            schema: FeatureSchema::default_layout(),
            probability,
            label,
            loaded: true,
            calls: AtomicUsize::new(0),
            last_vector: parking_lot::Mutex::new(None),
        }
    }

    pub fn unloaded() -> Self {
        Self {
            loaded: false,
            ..Self::new(0.0, 0)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Scorer for StubScorer {
    fn score(&self, vector: &FeatureVector) -> Result<Score, InferenceError> {
        if !self.loaded {
            return Err(InferenceError::NotLoaded);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_vector.lock() = Some(vector.clone());
        Score::new(self.probability, self.label)
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

pub struct TestApp {
    pub router: Router,
    pub scorer: Arc<StubScorer>,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new(scorer: StubScorer) -> Self {
        let scorer = Arc::new(scorer);
        let store = Arc::new(MemoryStore::new());
        let service = PredictionService::new(scorer.clone(), store.clone(), 4, 100);
        Self {
            router: create_router(AppState::new(service)),
            scorer,
            store,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, body)
    }

    pub async fn predict(&self, payload: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.send(predict_request(payload, None)).await
    }

    pub async fn history(&self, query: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("GET")
            .uri(format!("/api/v1/history{}", query))
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }
}

pub fn predict_request(payload: serde_json::Value, idempotency_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/predict")
        .header("content-type", "application/json");
    if let Some(key) = idempotency_key {
        builder = builder.header("Idempotency-Key", key);
    }
    builder
        .body(Body::from(payload.to_string()))
        .expect("valid request")
}

pub fn sample_transaction() -> serde_json::Value {
    serde_json::json!({
        "time": 0.0,
        "amount": 149.62,
        "pca_features": {
            "V1": -1.36,
            "V2": -0.07,
            "V3": 2.54,
            "V4": 1.38
        }
    })
}
