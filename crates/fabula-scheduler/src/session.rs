//! Streaming session protocol.
//!
//! A session is a persistent, bidirectional message channel tied to one
//! conversation and one submission attempt. The client authenticates, sends
//! one drawing, receives feedback, and — when the drawing was correct — the
//! next story unit, after which the session ends. Any malformed or
//! out-of-order message terminates the session with a typed error message.
//!
//! The state machine is written against [`SessionTransport`] rather than a
//! concrete socket, so the protocol is testable without a network and the
//! HTTP layer only supplies a thin adapter.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use fabula_core::auth::TokenVerifier;
use fabula_core::error::DomainError;
use fabula_core::gateway::Drawing;
use fabula_core::media::MediaRef;
use fabula_core::story::Unit;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::scheduler::ContinuationScheduler;

/// Messages a client may send, in protocol order.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Credential presentation. Must be the first message of the session.
    Auth {
        /// Bearer token.
        token: String,
    },
    /// The drawing to grade. Must be the second message of the session.
    SubmitImage {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type of the encoded image.
        media_type: String,
    },
}

/// Messages the server sends.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Grading result. Sent exactly once per completed session.
    Feedback {
        /// Index of the graded unit.
        index: u32,
        /// Verdict from the vision model.
        is_correct: bool,
        /// Encouraging feedback text.
        feedback: String,
        /// Rendered feedback audio.
        feedback_audio: MediaRef,
        /// Stored drawing reference, present when correct.
        image: Option<MediaRef>,
    },
    /// The next story unit. Sent after feedback iff the drawing was correct.
    NewMessage {
        /// The delivered unit.
        unit: Unit,
    },
    /// Terminal error. The session closes after sending it.
    Error {
        /// Stable machine-readable code.
        code: &'static str,
        /// Human-readable description.
        message: String,
    },
}

/// How a session ended.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The full exchange ran to completion. `advanced` is `true` when a
    /// correct drawing moved the story forward.
    Completed {
        /// Whether a new unit was delivered.
        advanced: bool,
    },
    /// The client went away mid-protocol. Normal termination, not an error.
    Disconnected,
    /// A protocol violation or a domain failure ended the session after a
    /// typed error message.
    Errored,
}

/// Transport seam between the protocol state machine and the socket.
#[async_trait]
pub trait SessionTransport: Send {
    /// Receives the next text frame, or `None` once the peer disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Storage`] for transport-level failures.
    async fn recv(&mut self) -> Result<Option<String>, DomainError>;

    /// Sends one message to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Storage`] if the peer is no longer writable.
    async fn send(&mut self, message: &ServerMessage) -> Result<(), DomainError>;
}

/// Runs one session over `transport` for `conversation_id`.
///
/// Delivery failures on the way out are treated as disconnects: the result
/// of any generation already in flight is simply discarded, per the
/// no-retry contract of the protocol.
pub async fn run_session<T: SessionTransport>(
    scheduler: &ContinuationScheduler,
    verifier: &dyn TokenVerifier,
    conversation_id: Uuid,
    transport: &mut T,
) -> SessionOutcome {
    // CONNECTED → AUTHENTICATED
    let owner_id = match expect_frame(transport).await {
        Frame::Message(ClientMessage::Auth { token }) => {
            match verifier.verify(&token).await {
                Ok(owner_id) => owner_id,
                Err(error) => return fail(transport, conversation_id, &error).await,
            }
        }
        Frame::Message(ClientMessage::SubmitImage { .. }) => {
            return violation(transport, conversation_id, "expected an auth message first")
                .await;
        }
        Frame::Malformed(detail) => {
            return violation(transport, conversation_id, &detail).await;
        }
        Frame::Disconnected => {
            debug!(%conversation_id, "client disconnected before authenticating");
            return SessionOutcome::Disconnected;
        }
    };

    // AUTHENTICATED → AWAITING_IMAGE → PROCESSING
    let drawing = match expect_frame(transport).await {
        Frame::Message(ClientMessage::SubmitImage { data, media_type }) => {
            match BASE64.decode(data) {
                Ok(bytes) => Drawing {
                    data: bytes,
                    media_type,
                },
                Err(error) => {
                    return violation(
                        transport,
                        conversation_id,
                        &format!("image payload is not valid base64: {error}"),
                    )
                    .await;
                }
            }
        }
        Frame::Message(ClientMessage::Auth { .. }) => {
            return violation(transport, conversation_id, "already authenticated").await;
        }
        Frame::Malformed(detail) => {
            return violation(transport, conversation_id, &detail).await;
        }
        Frame::Disconnected => {
            debug!(%conversation_id, "client disconnected before submitting");
            return SessionOutcome::Disconnected;
        }
    };

    let outcome = match scheduler
        .evaluate_submission(&owner_id, conversation_id, drawing)
        .await
    {
        Ok(outcome) => outcome,
        Err(error) => return fail(transport, conversation_id, &error).await,
    };

    // PROCESSING → FEEDBACK_SENT
    let submission = outcome.submission;
    let feedback = ServerMessage::Feedback {
        index: submission.index,
        is_correct: submission.is_correct,
        feedback: submission.feedback,
        feedback_audio: submission.feedback_audio,
        image: submission.image,
    };
    if transport.send(&feedback).await.is_err() {
        debug!(%conversation_id, "client went away before feedback delivery");
        return SessionOutcome::Disconnected;
    }
    if !submission.is_correct {
        info!(%conversation_id, index = submission.index, "session complete, drawing incorrect");
        return SessionOutcome::Completed { advanced: false };
    }

    // FEEDBACK_SENT → AWAITING_NEXT_UNIT → NEXT_UNIT_SENT
    let advance = match scheduler
        .advance(&owner_id, conversation_id, submission.index + 1)
        .await
    {
        Ok(advance) => advance,
        Err(error) => return fail(transport, conversation_id, &error).await,
    };
    let delivery = ServerMessage::NewMessage { unit: advance.unit };
    if transport.send(&delivery).await.is_err() {
        // The unit is already persisted; the client will see it on reconnect.
        debug!(%conversation_id, "client went away before unit delivery");
        return SessionOutcome::Disconnected;
    }

    info!(
        %conversation_id,
        index = submission.index,
        from_cache = advance.from_cache,
        "session complete, story advanced"
    );
    SessionOutcome::Completed { advanced: true }
}

enum Frame {
    Message(ClientMessage),
    Malformed(String),
    Disconnected,
}

async fn expect_frame<T: SessionTransport>(transport: &mut T) -> Frame {
    match transport.recv().await {
        Ok(Some(text)) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => Frame::Message(message),
            Err(error) => Frame::Malformed(format!("malformed message: {error}")),
        },
        Ok(None) | Err(_) => Frame::Disconnected,
    }
}

async fn violation<T: SessionTransport>(
    transport: &mut T,
    conversation_id: Uuid,
    detail: &str,
) -> SessionOutcome {
    warn!(%conversation_id, detail, "session protocol violation");
    let message = ServerMessage::Error {
        code: "protocol_error",
        message: detail.to_owned(),
    };
    if transport.send(&message).await.is_err() {
        return SessionOutcome::Disconnected;
    }
    SessionOutcome::Errored
}

async fn fail<T: SessionTransport>(
    transport: &mut T,
    conversation_id: Uuid,
    error: &DomainError,
) -> SessionOutcome {
    warn!(%conversation_id, %error, "session ended by domain error");
    let message = ServerMessage::Error {
        code: error_code(error),
        message: error.to_string(),
    };
    if transport.send(&message).await.is_err() {
        return SessionOutcome::Disconnected;
    }
    SessionOutcome::Errored
}

fn error_code(error: &DomainError) -> &'static str {
    match error {
        DomainError::Unauthorized => "unauthorized",
        DomainError::NotFound(_) => "not_found",
        DomainError::Validation(_) => "validation_error",
        DomainError::Generation(_) => "generation_failed",
        DomainError::OutOfOrder { .. } => "out_of_order",
        DomainError::Storage(_) => "storage_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use fabula_core::auth::LocalTokenVerifier;
    use fabula_core::clock::Clock;
    use fabula_core::gateway::ModelGateway;
    use fabula_core::store::ConversationStore;
    use fabula_store::{MemoryStore, PendingUnitCache};
    use fabula_test_support::{FixedClock, MemoryMediaStore, ScriptedGateway};
    use serde_json::{Value, json};

    use crate::scheduler::OpenStoryRequest;
    use crate::tasks::TaskRegistry;

    /// Feeds scripted inbound frames and records everything sent back.
    #[derive(Default)]
    struct ScriptTransport {
        inbound: VecDeque<String>,
        sent: Vec<Value>,
    }

    impl ScriptTransport {
        fn with_frames(frames: &[Value]) -> Self {
            Self {
                inbound: frames.iter().map(Value::to_string).collect(),
                sent: Vec::new(),
            }
        }

        fn sent_types(&self) -> Vec<&str> {
            self.sent
                .iter()
                .filter_map(|m| m["type"].as_str())
                .collect()
        }
    }

    #[async_trait]
    impl SessionTransport for ScriptTransport {
        async fn recv(&mut self) -> Result<Option<String>, DomainError> {
            Ok(self.inbound.pop_front())
        }

        async fn send(&mut self, message: &ServerMessage) -> Result<(), DomainError> {
            let value = serde_json::to_value(message)
                .map_err(|e| DomainError::Storage(e.to_string()))?;
            self.sent.push(value);
            Ok(())
        }
    }

    struct Fixture {
        scheduler: ContinuationScheduler,
        gateway: Arc<ScriptedGateway>,
        conversation_id: Uuid,
    }

    async fn fixture_with_story() -> Fixture {
        let fixed_now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(fixed_now));
        let store: Arc<dyn ConversationStore> = Arc::new(MemoryStore::new(Arc::clone(&clock)));
        let gateway = Arc::new(ScriptedGateway::new());
        let tasks = Arc::new(TaskRegistry::new());
        let scheduler = ContinuationScheduler::new(
            store,
            Arc::clone(&gateway) as Arc<dyn ModelGateway>,
            Arc::new(MemoryMediaStore::new()),
            Arc::new(PendingUnitCache::new()),
            Arc::clone(&tasks),
            clock,
        );
        let conversation = scheduler
            .open_story(
                "device-1234",
                OpenStoryRequest {
                    instruction: Some("a story about a dragon".to_owned()),
                    ..OpenStoryRequest::default()
                },
            )
            .await
            .unwrap();
        tasks.shutdown().await;
        Fixture {
            scheduler,
            gateway,
            conversation_id: conversation.id,
        }
    }

    fn auth_frame() -> Value {
        json!({"type": "auth", "token": "device-1234"})
    }

    fn submit_frame() -> Value {
        json!({
            "type": "submit_image",
            "data": BASE64.encode([1u8, 2, 3]),
            "media_type": "image/png",
        })
    }

    #[tokio::test]
    async fn test_correct_drawing_gets_feedback_then_new_message() {
        // Arrange
        let fixture = fixture_with_story().await;
        let mut transport = ScriptTransport::with_frames(&[auth_frame(), submit_frame()]);

        // Act
        let outcome = run_session(
            &fixture.scheduler,
            &LocalTokenVerifier,
            fixture.conversation_id,
            &mut transport,
        )
        .await;

        // Assert — exactly one feedback, then exactly one new_message.
        assert_eq!(outcome, SessionOutcome::Completed { advanced: true });
        assert_eq!(transport.sent_types(), vec!["feedback", "new_message"]);
        assert_eq!(transport.sent[0]["is_correct"], json!(true));
        assert_eq!(transport.sent[1]["unit"]["index"], json!(1));
    }

    #[tokio::test]
    async fn test_incorrect_drawing_gets_feedback_only() {
        // Arrange
        let fixture = fixture_with_story().await;
        fixture.gateway.push_verdict(false, "give it another go!");
        let mut transport = ScriptTransport::with_frames(&[auth_frame(), submit_frame()]);

        // Act
        let outcome = run_session(
            &fixture.scheduler,
            &LocalTokenVerifier,
            fixture.conversation_id,
            &mut transport,
        )
        .await;

        // Assert
        assert_eq!(outcome, SessionOutcome::Completed { advanced: false });
        assert_eq!(transport.sent_types(), vec!["feedback"]);
        assert_eq!(transport.sent[0]["is_correct"], json!(false));
        assert_eq!(transport.sent[0]["image"], Value::Null);
    }

    #[tokio::test]
    async fn test_image_before_auth_is_a_protocol_error() {
        // Arrange
        let fixture = fixture_with_story().await;
        let mut transport = ScriptTransport::with_frames(&[submit_frame(), auth_frame()]);

        // Act
        let outcome = run_session(
            &fixture.scheduler,
            &LocalTokenVerifier,
            fixture.conversation_id,
            &mut transport,
        )
        .await;

        // Assert
        assert_eq!(outcome, SessionOutcome::Errored);
        assert_eq!(transport.sent_types(), vec!["error"]);
        assert_eq!(transport.sent[0]["code"], json!("protocol_error"));
    }

    #[tokio::test]
    async fn test_blank_token_is_unauthorized() {
        // Arrange
        let fixture = fixture_with_story().await;
        let mut transport = ScriptTransport::with_frames(&[
            json!({"type": "auth", "token": "  "}),
            submit_frame(),
        ]);

        // Act
        let outcome = run_session(
            &fixture.scheduler,
            &LocalTokenVerifier,
            fixture.conversation_id,
            &mut transport,
        )
        .await;

        // Assert
        assert_eq!(outcome, SessionOutcome::Errored);
        assert_eq!(transport.sent[0]["code"], json!("unauthorized"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_protocol_error() {
        // Arrange
        let fixture = fixture_with_story().await;
        let mut transport = ScriptTransport {
            inbound: VecDeque::from(["not json at all".to_owned()]),
            sent: Vec::new(),
        };

        // Act
        let outcome = run_session(
            &fixture.scheduler,
            &LocalTokenVerifier,
            fixture.conversation_id,
            &mut transport,
        )
        .await;

        // Assert
        assert_eq!(outcome, SessionOutcome::Errored);
        assert_eq!(transport.sent[0]["code"], json!("protocol_error"));
    }

    #[tokio::test]
    async fn test_invalid_base64_payload_is_a_protocol_error() {
        // Arrange
        let fixture = fixture_with_story().await;
        let mut transport = ScriptTransport::with_frames(&[
            auth_frame(),
            json!({"type": "submit_image", "data": "@@not-base64@@", "media_type": "image/png"}),
        ]);

        // Act
        let outcome = run_session(
            &fixture.scheduler,
            &LocalTokenVerifier,
            fixture.conversation_id,
            &mut transport,
        )
        .await;

        // Assert
        assert_eq!(outcome, SessionOutcome::Errored);
        assert_eq!(transport.sent_types(), vec!["error"]);
    }

    #[tokio::test]
    async fn test_disconnect_before_auth_is_normal_termination() {
        // Arrange
        let fixture = fixture_with_story().await;
        let mut transport = ScriptTransport::default();

        // Act
        let outcome = run_session(
            &fixture.scheduler,
            &LocalTokenVerifier,
            fixture.conversation_id,
            &mut transport,
        )
        .await;

        // Assert — nothing sent, nothing persisted as an error.
        assert_eq!(outcome, SessionOutcome::Disconnected);
        assert!(transport.sent.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_conversation_surfaces_not_found() {
        // Arrange
        let fixture = fixture_with_story().await;
        let mut transport = ScriptTransport::with_frames(&[auth_frame(), submit_frame()]);

        // Act — a conversation id the owner does not have.
        let outcome = run_session(
            &fixture.scheduler,
            &LocalTokenVerifier,
            Uuid::new_v4(),
            &mut transport,
        )
        .await;

        // Assert
        assert_eq!(outcome, SessionOutcome::Errored);
        assert_eq!(transport.sent[0]["code"], json!("not_found"));
    }
}
