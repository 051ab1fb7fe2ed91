//! Integration tests for story creation, listing, and retrieval.

mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_create_list_get_roundtrip() {
    // Arrange
    let context = common::test_context();

    // Act — create a story, then read it back through both endpoints.
    let (status, created) = common::post_json(
        context.app(),
        "/api/v1/stories",
        "device-1234",
        &json!({ "instruction": "a story about a dragon" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (list_status, listed) =
        common::get_json(context.app(), "/api/v1/stories", "device-1234").await;
    let (get_status, fetched) = common::get_json(
        context.app(),
        &format!("/api/v1/stories/{}", created["id"].as_str().unwrap()),
        "device-1234",
    )
    .await;

    // Assert
    assert_eq!(list_status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["title"], "A Scripted Story");
    assert_eq!(listed[0]["unit_count"], 1);

    assert_eq!(get_status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);
    assert_eq!(fetched["units"].as_array().unwrap().len(), 1);
    assert_eq!(fetched["units"][0]["target"], "dragon");
    assert_eq!(fetched["voice"], "Kore");
}

#[tokio::test]
async fn test_stories_are_scoped_to_their_owner() {
    // Arrange — one story owned by device-1234.
    let context = common::test_context();
    let (_, created) = common::post_json(
        context.app(),
        "/api/v1/stories",
        "device-1234",
        &json!({ "instruction": "a story about a dragon" }),
    )
    .await;

    // Act — another owner lists and fetches.
    let (_, listed) = common::get_json(context.app(), "/api/v1/stories", "other-device").await;
    let (get_status, body) = common::get_json(
        context.app(),
        &format!("/api/v1/stories/{}", created["id"].as_str().unwrap()),
        "other-device",
    )
    .await;

    // Assert — someone else's conversation behaves like a missing one.
    assert_eq!(listed.as_array().unwrap().len(), 0);
    assert_eq!(get_status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_create_story_with_spoken_prompt_transcribes_it() {
    // Arrange
    let context = common::test_context();
    let audio = json!({
        "audio": {
            "data": "AAAA",
            "media_type": "audio/wav"
        },
        "voice": "Puck"
    });

    // Act
    let (status, created) =
        common::post_json(context.app(), "/api/v1/stories", "device-1234", &audio).await;

    // Assert — the scripted transcription opens a dragon story.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["units"][0]["target"], "dragon");
    assert_eq!(created["voice"], "Puck");
}

#[tokio::test]
async fn test_create_story_with_empty_body_is_unprocessable() {
    // Arrange — no JSON body at all.
    let context = common::test_context();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/stories")
        .header("content-type", "application/json")
        .header("authorization", "Bearer device-1234")
        .body(axum::body::Body::from("not json"))
        .unwrap();

    // Act
    let response = tower::ServiceExt::oneshot(context.app(), request).await.unwrap();

    // Assert — axum rejects the body before the handler runs.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
