//! Story endpoints: create, list, fetch, and drawing submission.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::{Json, Router, routing::get, routing::post};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use fabula_core::error::DomainError;
use fabula_core::gateway::{AudioClip, Drawing};
use fabula_core::story::{Conversation, ConversationSummary, Submission, Unit};
use fabula_scheduler::OpenStoryRequest;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::state::AppState;

/// A base64-encoded media payload (drawing or spoken prompt).
#[derive(Debug, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded bytes.
    pub data: String,
    /// MIME type of the encoded bytes.
    pub media_type: String,
}

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateStoryRequest {
    /// Typed story instruction.
    pub instruction: Option<String>,
    /// Spoken prompt, transcribed when no instruction is given.
    pub audio: Option<MediaPayload>,
    /// Narration voice for the story.
    pub voice: Option<String>,
}

/// Request body for POST /{id}/submissions.
#[derive(Debug, Deserialize)]
pub struct SubmitDrawingRequest {
    /// The child's drawing.
    pub image: MediaPayload,
}

/// Response body for a graded submission.
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    /// The graded submission.
    pub submission: Submission,
    /// The next story unit, present iff the drawing was correct.
    pub next_unit: Option<Unit>,
}

fn decode(payload: MediaPayload, what: &str) -> Result<Vec<u8>, ApiError> {
    BASE64.decode(payload.data).map_err(|e| {
        ApiError(DomainError::Validation(format!(
            "{what} payload is not valid base64: {e}"
        )))
    })
}

/// POST /
#[instrument(skip_all)]
async fn create_story(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateStoryRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let owner_id = authenticate(&state, &headers).await?;

    let audio = match request.audio {
        Some(payload) => {
            let media_type = payload.media_type.clone();
            Some(AudioClip {
                data: decode(payload, "audio")?,
                media_type,
            })
        }
        None => None,
    };

    let conversation = state
        .scheduler
        .open_story(
            &owner_id,
            OpenStoryRequest {
                instruction: request.instruction,
                audio,
                voice: request.voice,
            },
        )
        .await?;

    info!(conversation_id = %conversation.id, "story created");
    Ok(Json(conversation))
}

/// GET /
#[instrument(skip_all)]
async fn list_stories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let owner_id = authenticate(&state, &headers).await?;
    let summaries = state.scheduler.store().list_conversations(&owner_id).await?;
    Ok(Json(summaries))
}

/// GET /{id}
#[instrument(skip(state, headers))]
async fn get_story(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError> {
    let owner_id = authenticate(&state, &headers).await?;
    let conversation = state.scheduler.store().get_conversation(&owner_id, id).await?;
    Ok(Json(conversation))
}

/// POST /{id}/submissions
#[instrument(skip(state, headers, request))]
async fn submit_drawing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitDrawingRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let owner_id = authenticate(&state, &headers).await?;
    let media_type = request.image.media_type.clone();
    let drawing = Drawing {
        data: decode(request.image, "image")?,
        media_type,
    };

    let result = state.scheduler.submit_drawing(&owner_id, id, drawing).await?;

    info!(
        conversation_id = %id,
        is_correct = result.submission.is_correct,
        advanced = result.next_unit.is_some(),
        "drawing graded"
    );
    Ok(Json(SubmissionResponse {
        submission: result.submission,
        next_unit: result.next_unit,
    }))
}

/// Returns the story router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_story).get(list_stories))
        .route("/{id}", get(get_story))
        .route("/{id}/submissions", post(submit_drawing))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use fabula_core::auth::LocalTokenVerifier;
    use fabula_core::clock::Clock;
    use fabula_core::gateway::ModelGateway;
    use fabula_core::store::ConversationStore;
    use fabula_scheduler::{ContinuationScheduler, TaskRegistry};
    use fabula_store::{MemoryStore, PendingUnitCache};
    use fabula_test_support::{FailingGateway, FixedClock, MemoryMediaStore, ScriptedGateway};
    use serde_json::Value;
    use tower::ServiceExt;

    fn state_with(gateway: Arc<dyn ModelGateway>) -> AppState {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        let store: Arc<dyn ConversationStore> = Arc::new(MemoryStore::new(Arc::clone(&clock)));
        let tasks = Arc::new(TaskRegistry::new());
        let scheduler = Arc::new(ContinuationScheduler::new(
            store,
            gateway,
            Arc::new(MemoryMediaStore::new()),
            Arc::new(PendingUnitCache::new()),
            Arc::clone(&tasks),
            clock,
        ));
        AppState::new(scheduler, Arc::new(LocalTokenVerifier), tasks)
    }

    fn test_state() -> AppState {
        state_with(Arc::new(ScriptedGateway::new()))
    }

    fn post_request(uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_story_returns_conversation_with_unit_zero() {
        // Arrange
        let app = router().with_state(test_state());
        let body = serde_json::json!({ "instruction": "a story about a dragon" });

        // Act
        let response = app
            .oneshot(post_request("/", &body, Some("device-1234")))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["title"], "A Scripted Story");
        assert_eq!(json["units"].as_array().unwrap().len(), 1);
        assert_eq!(json["units"][0]["index"], 0);
    }

    #[tokio::test]
    async fn test_create_story_without_prompt_returns_400() {
        // Arrange
        let app = router().with_state(test_state());
        let body = serde_json::json!({});

        // Act
        let response = app
            .oneshot(post_request("/", &body, Some("device-1234")))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_create_story_without_token_returns_401() {
        // Arrange
        let app = router().with_state(test_state());
        let body = serde_json::json!({ "instruction": "a story about a dragon" });

        // Act
        let response = app.oneshot(post_request("/", &body, None)).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_story_returns_502_when_generation_fails() {
        // Arrange
        let app = router().with_state(state_with(Arc::new(FailingGateway)));
        let body = serde_json::json!({ "instruction": "a story about a dragon" });

        // Act
        let response = app
            .oneshot(post_request("/", &body, Some("device-1234")))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"], "generation_failed");
    }

    #[tokio::test]
    async fn test_get_unknown_story_returns_404() {
        // Arrange
        let app = router().with_state(test_state());
        let request = Request::builder()
            .method("GET")
            .uri(format!("/{}", Uuid::new_v4()))
            .header("authorization", "Bearer device-1234")
            .body(Body::empty())
            .unwrap();

        // Act
        let response = app.oneshot(request).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_drawing_with_invalid_base64_returns_400() {
        // Arrange
        let state = test_state();
        let conversation = state
            .scheduler
            .open_story(
                "device-1234",
                OpenStoryRequest {
                    instruction: Some("a story about a dragon".to_owned()),
                    ..OpenStoryRequest::default()
                },
            )
            .await
            .unwrap();
        let app = router().with_state(state);
        let body = serde_json::json!({
            "image": { "data": "@@not-base64@@", "media_type": "image/png" }
        });

        // Act
        let response = app
            .oneshot(post_request(
                &format!("/{}/submissions", conversation.id),
                &body,
                Some("device-1234"),
            ))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submit_drawing_returns_submission_and_next_unit() {
        // Arrange
        let state = test_state();
        let conversation = state
            .scheduler
            .open_story(
                "device-1234",
                OpenStoryRequest {
                    instruction: Some("a story about a dragon".to_owned()),
                    ..OpenStoryRequest::default()
                },
            )
            .await
            .unwrap();
        let app = router().with_state(state);
        let body = serde_json::json!({
            "image": { "data": BASE64.encode([1u8, 2, 3]), "media_type": "image/png" }
        });

        // Act
        let response = app
            .oneshot(post_request(
                &format!("/{}/submissions", conversation.id),
                &body,
                Some("device-1234"),
            ))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["submission"]["is_correct"], true);
        assert_eq!(json["next_unit"]["index"], 1);
    }
}
