//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::TimeZone;
use fabula_core::auth::LocalTokenVerifier;
use fabula_core::clock::Clock;
use fabula_core::gateway::ModelGateway;
use fabula_core::store::ConversationStore;
use fabula_scheduler::{ContinuationScheduler, TaskRegistry};
use fabula_store::{MemoryStore, PendingUnitCache};
use fabula_test_support::{FixedClock, MemoryMediaStore, ScriptedGateway};
use http_body_util::BodyExt;
use tower::ServiceExt;

use fabula_api::routes;
use fabula_api::state::AppState;

/// Everything a test needs to drive the app and its doubles.
pub struct TestContext {
    /// Application state the router was built with.
    pub state: AppState,
    /// The scripted gateway, for verdict and failure injection.
    pub gateway: Arc<ScriptedGateway>,
    /// The task registry, for awaiting background pre-generation.
    pub tasks: Arc<TaskRegistry>,
}

impl TestContext {
    /// Builds the full app router, same route structure as `main.rs`.
    pub fn app(&self) -> Router {
        Router::new()
            .merge(routes::health::router())
            .nest(
                "/api/v1/stories",
                routes::stories::router().merge(routes::stream::router()),
            )
            .with_state(self.state.clone())
    }
}

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Builds app state over in-memory stores and a scripted gateway.
pub fn test_context() -> TestContext {
    let clock = fixed_clock();
    let store: Arc<dyn ConversationStore> = Arc::new(MemoryStore::new(Arc::clone(&clock)));
    let gateway = Arc::new(ScriptedGateway::new());
    let tasks = Arc::new(TaskRegistry::new());
    let scheduler = Arc::new(ContinuationScheduler::new(
        store,
        Arc::clone(&gateway) as Arc<dyn ModelGateway>,
        Arc::new(MemoryMediaStore::new()),
        Arc::new(PendingUnitCache::new()),
        Arc::clone(&tasks),
        clock,
    ));
    TestContext {
        state: AppState::new(scheduler, Arc::new(LocalTokenVerifier), Arc::clone(&tasks)),
        gateway,
        tasks,
    }
}

/// Send a POST request with a JSON body and a bearer token.
pub async fn post_json(
    app: Router,
    uri: &str,
    token: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request with a bearer token.
pub async fn get_json(app: Router, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
