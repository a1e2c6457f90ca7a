use anyhow::{Context, Result, anyhow};
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::persona::Persona;

pub const DEFAULT_API_URL: &str = "https://api.elevenlabs.io/v1";
pub const DEFAULT_AGENT_ID: &str = "agent_01jz75m4ncf1arcc872dz8jj6p";
pub const DEFAULT_VOICE_ID: &str = "pNInz6obpgDQGcFmaJgB";

/// Number of most recent messages sent along as conversation context.
const HISTORY_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ConversationRequest<'a> {
    agent_id: &'a str,
    text: &'a str,
    conversation_history: &'a [HistoryEntry],
    mode: Persona,
    system_prompt: &'static str,
}

#[derive(Debug, Deserialize)]
struct ConversationResponse {
    response: Option<String>,
    text: Option<String>,
    audio_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    detail: Option<ErrorDetail>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'static str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    /// `None` when the service answered without any text.
    pub text: Option<String>,
    pub audio_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    client: reqwest::Client,
    api_key: String,
    agent_id: String,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            agent_id: DEFAULT_AGENT_ID.to_string(),
            base_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sends one user turn to the conversational agent.
    ///
    /// Rejections by the service come back as plain errors carrying a
    /// user-presentable message; failures to reach the service or to read its
    /// answer keep the underlying `reqwest::Error` (see [`is_transport_error`]).
    pub async fn converse(
        &self,
        text: &str,
        persona: Persona,
        history: &[HistoryEntry],
    ) -> Result<AgentReply> {
        let request = ConversationRequest {
            agent_id: &self.agent_id,
            text,
            conversation_history: recent_history(history),
            mode: persona,
            system_prompt: persona.system_prompt(),
        };

        let response = self
            .client
            .post(format!("{}/convai/conversation", self.base_url))
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to ElevenLabs API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.unwrap_or_default();
            return Err(anyhow!(service_error_message(status, &body)));
        }

        let body: ConversationResponse = response
            .json()
            .await
            .context("Failed to parse ElevenLabs API response")?;

        let non_empty = |text: Option<String>| text.filter(|text| !text.trim().is_empty());
        Ok(AgentReply {
            text: non_empty(body.response).or_else(|| non_empty(body.text)),
            audio_url: body.audio_url,
        })
    }

    /// Streams synthesized speech for `text` into `file_path`.
    pub async fn synthesize(&self, text: &str, voice_id: &str, file_path: &Path) -> Result<()> {
        let request_body = SpeechRequest {
            text,
            model_id: "eleven_monolingual_v1",
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.5,
            },
        };

        let response = self
            .client
            .post(format!("{}/text-to-speech/{}", self.base_url, voice_id))
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to ElevenLabs API")?
            .error_for_status()
            .context("ElevenLabs API error")?;

        let mut file = File::create(file_path)
            .await
            .context("Failed to create output file")?;

        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read chunk from response")?;
            file.write_all(&chunk)
                .await
                .context("Failed to write chunk to file")?;
        }

        file.flush().await.context("Failed to flush file")?;

        Ok(())
    }
}

/// Whether `error` comes from failing to reach or read from the service, as
/// opposed to the service rejecting the request.
pub fn is_transport_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| cause.is::<reqwest::Error>())
}

fn recent_history(history: &[HistoryEntry]) -> &[HistoryEntry] {
    &history[history.len().saturating_sub(HISTORY_WINDOW)..]
}

fn service_error_message(status: StatusCode, body: &ErrorBody) -> String {
    match status {
        StatusCode::UNAUTHORIZED => {
            "ElevenLabs API key is invalid. Please check your API key configuration.".to_string()
        }
        StatusCode::TOO_MANY_REQUESTS => {
            "ElevenLabs API rate limit reached. Please wait a moment before trying again."
                .to_string()
        }
        StatusCode::PAYMENT_REQUIRED => {
            "ElevenLabs account requires payment. Please update your billing information."
                .to_string()
        }
        status if status.is_server_error() => {
            "ElevenLabs services are temporarily unavailable. Please try again in a few minutes."
                .to_string()
        }
        status => {
            let detail = body
                .detail
                .as_ref()
                .and_then(|detail| detail.message.as_deref())
                .or(body.message.as_deref())
                .unwrap_or("Unknown error");
            format!("ElevenLabs API error ({}): {detail}", status.as_u16())
        }
    }
}
