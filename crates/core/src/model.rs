//! Model client trait: the abstraction over the inference backend.
//!
//! A client streams chat completions as a channel of chunks and, optionally,
//! produces embeddings. The core never sees the wire protocol.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ModelError;
use crate::message::ChatMessage;

/// A chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g., "qwen3:0.6b")
    pub model: String,

    /// The conversation, in order
    pub messages: Vec<ChatMessage>,

    #[serde(default)]
    pub options: SamplingOptions,
}

/// Sampling options forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
        }
    }
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: String,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
        }
    }
}

pub type ChunkReceiver = mpsc::Receiver<Result<StreamChunk, ModelError>>;

/// An embedding request for a single text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: String,
}

/// An embedding response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// One vector per input
    pub embeddings: Vec<Vec<f32>>,

    /// Which model was used
    #[serde(default)]
    pub model: String,
}

impl EmbeddingResponse {
    /// The first non-empty vector, if any.
    pub fn first(&self) -> Option<&[f32]> {
        self.embeddings
            .first()
            .map(Vec::as_slice)
            .filter(|v| !v.is_empty())
    }
}

/// The core model client trait.
///
/// Implementations must be safe to share between sessions; every call is
/// independent.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "ollama").
    fn name(&self) -> &str;

    /// Start a streaming chat completion.
    ///
    /// The stream ends when the sender is dropped or a chunk has `done` set.
    /// Dropping the receiver aborts the generation.
    async fn chat(&self, request: ChatRequest) -> Result<ChunkReceiver, ModelError>;

    /// Generate embeddings for a text.
    ///
    /// Default implementation returns an error indicating embeddings aren't supported.
    async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse, ModelError> {
        Err(ModelError::NotConfigured(format!(
            "Model client '{}' does not support embeddings",
            self.name()
        )))
    }

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> Result<bool, ModelError> {
        Ok(true)
    }
}
