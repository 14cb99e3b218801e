//! End-to-end tests through the HTTP router with a stub model and an
//! in-memory store.

mod common;

use std::collections::HashSet;

use axum::{body::Body, http::{Request, StatusCode}};
use fraudguard_api::features::FEATURE_COUNT;
use serde_json::json;

use common::{predict_request, sample_transaction, StubScorer, TestApp};

#[tokio::test]
async fn test_health_is_ok() {
    let app = TestApp::new(StubScorer::unloaded());
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_safe_transaction_round_trips_through_history() {
    let app = TestApp::new(StubScorer::new(0.02, 0));

    let (status, outcome) = app.predict(sample_transaction()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["risk_score"], 0.02);
    assert_eq!(outcome["is_fraud"], false);
    assert_eq!(outcome["status"], "Safe");
    assert!(outcome["transaction_id"].is_string());

    let (status, history) = app.history("?limit=1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(history, json!([outcome]));
}

#[tokio::test]
async fn test_fraud_label_marks_suspicious() {
    let app = TestApp::new(StubScorer::new(0.91, 1));

    let (status, outcome) = app.predict(sample_transaction()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["risk_score"], 0.91);
    assert_eq!(outcome["is_fraud"], true);
    assert_eq!(outcome["status"], "Suspicious");
}

#[tokio::test]
async fn test_label_not_probability_decides_status() {
    let app = TestApp::new(StubScorer::new(0.35, 1));

    let (_, outcome) = app.predict(sample_transaction()).await;

    assert_eq!(outcome["is_fraud"], true);
    assert_eq!(outcome["status"], "Suspicious");
}

#[tokio::test]
async fn test_missing_features_default_to_zero() {
    let app = TestApp::new(StubScorer::new(0.1, 0));

    let (status, _) = app
        .predict(json!({ "time": 12.0, "amount": 5.0, "pca_features": { "V4": 1.5 } }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let vector = app.scorer.last_vector.lock().clone().unwrap();
    let values = vector.as_slice();
    assert_eq!(values.len(), FEATURE_COUNT);
    assert_eq!(values[0], 12.0);
    assert_eq!(values[4], 1.5);
    assert!(values[1..=28]
        .iter()
        .enumerate()
        .all(|(i, v)| i == 3 || *v == 0.0));
    assert_eq!(values[29], 5.0);

    let (status, _) = app.predict(json!({ "time": 1.0, "amount": 2.0 })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected_before_scoring() {
    let app = TestApp::new(StubScorer::new(0.5, 0));

    for amount in [0.0, -12.5] {
        let mut payload = sample_transaction();
        payload["amount"] = json!(amount);

        let (status, body) = app.predict(payload).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
    }

    assert_eq!(app.scorer.call_count(), 0);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_client_error() {
    let app = TestApp::new(StubScorer::new(0.5, 0));

    let (status, body) = app.predict(json!({ "time": 1.0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = app
        .predict(json!({ "time": "yesterday", "amount": 3.0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.scorer.call_count(), 0);
}

#[tokio::test]
async fn test_store_failure_is_opaque() {
    let app = TestApp::new(StubScorer::new(0.5, 0));
    app.store.set_fail_writes(true);

    let (status, body) = app.predict(sample_transaction()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_unloaded_model_is_service_unavailable() {
    let app = TestApp::new(StubScorer::unloaded());

    let (status, body) = app.predict(sample_transaction()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Model unavailable");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_history_is_newest_first_and_bounded() {
    let app = TestApp::new(StubScorer::new(0.2, 0));

    let mut ids = Vec::new();
    for _ in 0..12 {
        let (_, outcome) = app.predict(sample_transaction()).await;
        ids.push(outcome["transaction_id"].clone());
    }

    let (status, history) = app.history("").await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 10);
    assert_eq!(history[0]["transaction_id"], ids[11]);
    assert_eq!(history[9]["transaction_id"], ids[2]);

    for limit in [0usize, 1, 5, 12, 50] {
        let (_, page) = app.history(&format!("?limit={}", limit)).await;
        assert_eq!(page.as_array().unwrap().len(), limit.min(12));
    }
}

#[tokio::test]
async fn test_history_rejects_bad_limits() {
    let app = TestApp::new(StubScorer::new(0.2, 0));

    let (status, _) = app.history("?limit=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.history("?limit=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_idempotent_retry_returns_same_record() {
    let app = TestApp::new(StubScorer::new(0.2, 0));

    let (status, first) = app
        .send(predict_request(sample_transaction(), Some("order-7781")))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, second) = app
        .send(predict_request(sample_transaction(), Some("order-7781")))
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(first, second);
    assert_eq!(app.store.len(), 1);
    assert_eq!(app.scorer.call_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_get_distinct_ids() {
    let app = TestApp::new(StubScorer::new(0.3, 0));
    let requests = 32;

    let handles: Vec<_> = (0..requests)
        .map(|_| {
            let router = app.router.clone();
            tokio::spawn(async move {
                use tower::ServiceExt;
                let response = router
                    .oneshot(predict_request(sample_transaction(), None))
                    .await
                    .unwrap();
                assert_eq!(response.status(), StatusCode::OK);
                let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                    .await
                    .unwrap();
                let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                body["transaction_id"].as_str().unwrap().to_string()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }

    assert_eq!(ids.len(), requests);
    assert_eq!(app.store.len(), requests);
}
