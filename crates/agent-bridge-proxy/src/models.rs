//! OpenAI API data models for the chat-completion surface.
//!
//! Only the fields the bridge reads or writes are modelled; unknown request
//! fields are ignored.

use serde::{Deserialize, Serialize};

// =============================================================================
// Chat Completion Types
// =============================================================================

/// Request to /v1/chat/completions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model name to use. Falls back to the configured default.
    #[serde(default)]
    pub model: Option<String>,
    /// Array of chat messages.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Top-p sampling parameter.
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Accepted for compatibility; the answer is always streamed.
    #[serde(default)]
    pub stream: Option<bool>,
}

/// A single chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", "assistant", ...
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// Message content: a plain string or a list of typed parts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One typed part of a structured message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        #[serde(default)]
        text: String,
    },
    /// A file inlined by the client.
    FileContent {
        #[serde(default)]
        file_path: String,
        #[serde(default)]
        content: String,
    },
    /// Images, audio and anything else; contributes nothing to the prompt.
    #[serde(other)]
    Other,
}

/// Streaming chunk from /v1/chat/completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChunkChoice>,
}

impl ChatCompletionChunk {
    /// Single-choice chunk.
    pub fn new(
        id: impl Into<String>,
        created: i64,
        model: impl Into<String>,
        delta: ChatDelta,
        finish_reason: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.into(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }
}

/// A single streaming choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChunkChoice {
    pub index: u32,
    pub delta: ChatDelta,
    /// Serialized as `null` while the answer is still open.
    pub finish_reason: Option<String>,
}

/// Delta content in streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatDelta {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            role: None,
            content: Some(content.into()),
        }
    }
}

// =============================================================================
// Models Endpoint Types
// =============================================================================

/// Model ids advertised on `/v1/models`.
pub const MODEL_CATALOG: &[&str] = &[
    "kingfall-ab-test",
    "gemini-2.5-pro-exp-03-25",
    "gemini-2.5-pro-preview-05-06",
    "gemini-2.5-pro-preview-03-25",
    "gemini-2.5-flash-preview-05-20",
    "gemini-2.5-pro-preview-06-05",
];

/// Response for /v1/models endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

impl ModelsResponse {
    /// The static catalog, stamped with `created`.
    pub fn catalog(created: i64) -> Self {
        Self {
            object: "list".to_string(),
            data: MODEL_CATALOG
                .iter()
                .map(|id| ModelInfo {
                    id: (*id).to_string(),
                    object: "model".to_string(),
                    created,
                    owned_by: "google".to_string(),
                })
                .collect(),
        }
    }
}

/// Information about a single model (OpenAI format).
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}
