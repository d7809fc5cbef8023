//! Streaming generation client
//!
//! Talks to an OpenAI-compatible `/chat/completions` endpoint with
//! `stream: true` and feeds the `data:` frames through [`SseFrameDecoder`].
//! Callers observe the stream through a [`GenerationHandler`].

use async_trait::async_trait;
use futures::StreamExt;
use governor::{Quota, RateLimiter};
use redraft_common::config::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

const DONE_SENTINEL: &str = "[DONE]";
const ERROR_BODY_PREVIEW_CHARS: usize = 300;

/// Generation errors
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No API key from any configuration source
    #[error("generation API key is not configured")]
    NotConfigured,

    /// Failure before any streamed content was read
    #[error("generation request failed: {0}")]
    Transport(String),

    /// Read failure after streaming started
    #[error("generation stream interrupted: {0}")]
    Stream(String),
}

/// One chat message (`system` / `user`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Receives stream progress for one generation request
#[async_trait]
pub trait GenerationHandler: Send + Sync {
    /// A content fragment arrived
    async fn on_chunk(&self, fragment: &str);

    /// The stream finished; `full_text` is every fragment concatenated
    async fn on_complete(&self, full_text: &str);

    /// The stream broke after it started
    async fn on_error(&self, message: &str);
}

/// Anything that can turn chat messages into streamed text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one generation, reporting through `handler`
    ///
    /// Returns the accumulated text on success. Transport errors are returned
    /// without calling the handler; stream errors call `on_error` first.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        handler: &dyn GenerationHandler,
    ) -> Result<String, GenerationError>;
}

/// Decoded stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    Done,
}

#[derive(Debug, Deserialize)]
struct ChunkFrame {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental decoder for `data:`-prefixed stream lines
///
/// Bytes are buffered until a full `\n`-terminated line is available, so a
/// frame (or a multi-byte character) split across network chunks decodes
/// correctly. Undecodable frames are logged and skipped.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the completion sentinel or a finish reason was seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes; returns events for every complete line
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.decode_line(&line, &mut events);
        }
        events
    }

    /// Flush a trailing line that arrived without a newline
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            self.decode_line(&line, &mut events);
        }
        events
    }

    fn decode_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let line = line.trim_end_matches('\r');
        if self.done || line.trim().is_empty() || line.starts_with(':') {
            return;
        }

        let Some(payload) = line.strip_prefix("data:") else {
            trace!("Ignoring non-data stream line: {}", line);
            return;
        };
        let payload = payload.trim();

        if payload == DONE_SENTINEL {
            self.done = true;
            events.push(StreamEvent::Done);
            return;
        }

        let frame: ChunkFrame = match serde_json::from_str(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping malformed stream frame ({}): {}", e, payload);
                return;
            }
        };

        let Some(choice) = frame.choices.into_iter().next() else {
            return;
        };

        if let Some(content) = choice.delta.and_then(|d| d.content) {
            if !content.is_empty() {
                events.push(StreamEvent::Fragment(content));
            }
        }

        if choice.finish_reason.is_some() {
            self.done = true;
            events.push(StreamEvent::Done);
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

/// HTTP streaming client for OpenAI-compatible backends
pub struct StreamingGenerationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl StreamingGenerationClient {
    /// Build a client from configuration and an already-resolved API key
    pub fn new(config: &GenerationConfig, api_key: Option<String>) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Transport(format!("HTTP client build failed: {}", e)))?;

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn dispatch(&self, messages: &[ChatMessage]) -> Result<reqwest::Response, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::NotConfigured)?;

        self.rate_limiter.until_ready().await;

        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, messages = messages.len(), "Sending generation request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
            return Err(GenerationError::Transport(format!("HTTP {}: {}", status, preview)));
        }

        Ok(response)
    }
}

#[async_trait]
impl TextGenerator for StreamingGenerationClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        handler: &dyn GenerationHandler,
    ) -> Result<String, GenerationError> {
        let response = self.dispatch(messages).await?;

        let mut stream = response.bytes_stream();
        let mut decoder = SseFrameDecoder::new();
        let mut full_text = String::new();
        let mut received_bytes = 0usize;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    let message = e.to_string();
                    warn!("Generation stream read failed: {}", message);
                    handler.on_error(&message).await;
                    return Err(GenerationError::Stream(message));
                }
            };

            received_bytes += bytes.len();
            for event in decoder.push(&bytes) {
                if let StreamEvent::Fragment(fragment) = event {
                    trace!(chars = fragment.len(), "Stream fragment");
                    full_text.push_str(&fragment);
                    handler.on_chunk(&fragment).await;
                }
            }

            if decoder.is_done() {
                break;
            }
        }

        if received_bytes == 0 {
            return Err(GenerationError::Transport("empty response body".to_string()));
        }

        for event in decoder.finish() {
            if let StreamEvent::Fragment(fragment) = event {
                full_text.push_str(&fragment);
                handler.on_chunk(&fragment).await;
            }
        }

        if !decoder.is_done() {
            debug!("Generation stream ended without completion signal");
        }

        handler.on_complete(&full_text).await;
        Ok(full_text)
    }
}
