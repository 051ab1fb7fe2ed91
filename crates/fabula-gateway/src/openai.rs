//! OpenAI-compatible HTTP backend.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use fabula_core::error::DomainError;
use fabula_core::gateway::{
    AudioClip, Drawing, ModelGateway, StoryDraft, StoryOpening, Verdict,
};
use fabula_core::media::{MediaRef, MediaStore, extension_for};
use fabula_core::story::StoryContext;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::GatewayConfig;
use crate::prompts;

/// Scene illustrations render in a 3:4 portrait frame.
const SCENE_SIZE: &str = "1024x1536";

/// `ModelGateway` over an OpenAI-compatible HTTP API. Story rounds go
/// through `chat/completions` with JSON responses; rendering goes through
/// the image and speech endpoints and persists artifacts into the media
/// store under per-call-unique filenames.
pub struct OpenAiGateway {
    http: reqwest::Client,
    config: GatewayConfig,
    media: Arc<dyn MediaStore>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Debug, Deserialize)]
struct ChatMessageBody {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct OpeningPayload {
    title: String,
    icon: String,
    target: String,
    narration: String,
    intro: String,
    scene_description: String,
}

#[derive(Debug, Deserialize)]
struct DraftPayload {
    target: String,
    narration: String,
    intro: String,
    scene_description: String,
}

impl From<DraftPayload> for StoryDraft {
    fn from(payload: DraftPayload) -> Self {
        Self {
            target: payload.target,
            narration: payload.narration,
            intro: payload.intro,
            scene_description: payload.scene_description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReviewPayload {
    approved: bool,
    objection: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerdictPayload {
    is_correct: bool,
    feedback: String,
}

impl OpenAiGateway {
    /// Creates a gateway from the given configuration, writing rendered
    /// artifacts through `media`.
    #[must_use]
    pub fn new(config: GatewayConfig, media: Arc<dyn MediaStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            media,
        }
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<reqwest::Response, DomainError> {
        let response = self
            .http
            .post(format!("{}/{endpoint}", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::Generation(format!("{endpoint} request failed: {e}")))?;
        check_status(endpoint, response).await
    }

    /// One chat round with a forced JSON object response, parsed into `T`.
    async fn chat_json<T: DeserializeOwned>(&self, messages: Value) -> Result<T, DomainError> {
        let body = json!({
            "model": self.config.chat_model,
            "messages": messages,
            "response_format": {"type": "json_object"},
        });
        let response: ChatResponse = self
            .post_json("chat/completions", &body)
            .await?
            .json()
            .await
            .map_err(|e| DomainError::Generation(format!("malformed chat response: {e}")))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| DomainError::Generation("chat response had no choices".to_owned()))?;
        serde_json::from_str(strip_fences(&content))
            .map_err(|e| DomainError::Generation(format!("unparseable model payload: {e}")))
    }

    async fn prompt_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, DomainError> {
        self.chat_json(json!([{"role": "system", "content": prompt}]))
            .await
    }
}

/// Models occasionally wrap JSON in a markdown fence despite the response
/// format; tolerate it.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim)
}

async fn check_status(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, DomainError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DomainError::Generation(format!(
        "{endpoint} returned {status}: {body}"
    )))
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn open_story(&self, instruction: &str) -> Result<StoryOpening, DomainError> {
        let payload: OpeningPayload = self.prompt_json(&prompts::open_story(instruction)).await?;
        debug!(title = %payload.title, target = %payload.target, "opening draft generated");
        Ok(StoryOpening {
            title: payload.title,
            icon: payload.icon,
            draft: StoryDraft {
                target: payload.target,
                narration: payload.narration,
                intro: payload.intro,
                scene_description: payload.scene_description,
            },
        })
    }

    async fn continue_story(&self, context: &StoryContext) -> Result<StoryDraft, DomainError> {
        let payload: DraftPayload = self.prompt_json(&prompts::continue_story(context)).await?;
        Ok(payload.into())
    }

    async fn review_draft(
        &self,
        context: &StoryContext,
        draft: &StoryDraft,
    ) -> Result<Option<String>, DomainError> {
        let payload: ReviewPayload = self
            .prompt_json(&prompts::review_draft(context, draft))
            .await?;
        if payload.approved {
            return Ok(None);
        }
        Ok(Some(payload.objection.unwrap_or_else(|| {
            "the continuation was rejected without a stated reason".to_owned()
        })))
    }

    async fn revise_draft(
        &self,
        context: &StoryContext,
        draft: &StoryDraft,
        objection: &str,
    ) -> Result<StoryDraft, DomainError> {
        let payload: DraftPayload = self
            .prompt_json(&prompts::revise_draft(context, draft, objection))
            .await?;
        Ok(payload.into())
    }

    async fn render_scene(
        &self,
        description: &str,
        path_hint: &str,
    ) -> Result<MediaRef, DomainError> {
        let body = json!({
            "model": self.config.image_model,
            "prompt": description,
            "size": SCENE_SIZE,
            "n": 1,
            "response_format": "b64_json",
        });
        let response: ImagesResponse = self
            .post_json("images/generations", &body)
            .await?
            .json()
            .await
            .map_err(|e| DomainError::Generation(format!("malformed image response: {e}")))?;
        let datum = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::Generation("image response had no data".to_owned()))?;
        let bytes = BASE64
            .decode(datum.b64_json)
            .map_err(|e| DomainError::Generation(format!("image payload is not base64: {e}")))?;
        self.media
            .put(&format!("{path_hint}/scene-{}", Uuid::new_v4()), "image/png", bytes)
            .await
    }

    async fn render_speech(
        &self,
        text: &str,
        voice: &str,
        path_hint: &str,
    ) -> Result<MediaRef, DomainError> {
        let body = json!({
            "model": self.config.speech_model,
            "input": text,
            "voice": voice,
            "response_format": "mp3",
        });
        let bytes = self
            .post_json("audio/speech", &body)
            .await?
            .bytes()
            .await
            .map_err(|e| DomainError::Generation(format!("speech download failed: {e}")))?;
        self.media
            .put(
                &format!("{path_hint}/speech-{}", Uuid::new_v4()),
                "audio/mpeg",
                bytes.to_vec(),
            )
            .await
    }

    async fn grade_drawing(
        &self,
        drawing: &Drawing,
        expected_target: &str,
    ) -> Result<Verdict, DomainError> {
        let data_url = format!(
            "data:{};base64,{}",
            drawing.media_type,
            BASE64.encode(&drawing.data)
        );
        let messages = json!([
            {"role": "system", "content": prompts::grade_drawing(expected_target)},
            {"role": "user", "content": [
                {"type": "image_url", "image_url": {"url": data_url}},
            ]},
        ]);
        let payload: VerdictPayload = self.chat_json(messages).await?;
        Ok(Verdict {
            is_correct: payload.is_correct,
            feedback: payload.feedback,
        })
    }

    async fn transcribe(&self, audio: &AudioClip) -> Result<String, DomainError> {
        let file_name = format!("prompt.{}", extension_for(&audio.media_type));
        let part = reqwest::multipart::Part::bytes(audio.data.clone())
            .file_name(file_name)
            .mime_str(&audio.media_type)
            .map_err(|e| DomainError::Validation(format!("invalid audio media type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.config.transcription_model.clone())
            .part("file", part);
        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DomainError::Generation(format!("transcription request failed: {e}")))?;
        let response: TranscriptionResponse = check_status("audio/transcriptions", response)
            .await?
            .json()
            .await
            .map_err(|e| {
                DomainError::Generation(format!("malformed transcription response: {e}"))
            })?;
        Ok(response.text)
    }
}
