//! Streaming, length-capped generation against the model server.
//!
//! Generation never fails with an `Err`: transport and server problems are
//! turned into a [`GenerationResponse`] whose text is a short user-facing
//! error message and whose [`ErrorKind`] tells callers what went wrong.

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{ChatOptions, FragmentStream, OllamaApi};
use crate::error::OllamaError;
use crate::server::DEFAULT_MODEL;

/// Configuration for answer generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// First line of every prompt, naming the policy corpus.
    pub header: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Nucleus sampling threshold.
    pub top_p: f32,

    /// Token budget passed to the model.
    pub num_predict: u32,

    /// Output is cut off once it grows past this many characters.
    pub max_output_chars: usize,

    /// Timeout for a whole generation, in seconds.
    pub timeout_secs: u64,

    /// Timeout of the liveness check that precedes each generation.
    pub preflight_timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            header: "Airline Baggage Policy:".to_string(),
            temperature: 0.1,
            top_p: 0.9,
            num_predict: 512,
            max_output_chars: 1000,
            timeout_secs: 120,
            preflight_timeout_ms: 3000,
        }
    }
}

/// Why a generation produced no model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The liveness check failed before generation started.
    ServerUnresponsive,
    /// The request or stream timed out.
    Timeout,
    /// Any other transport or server failure.
    Generic,
}

/// A fully assembled generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_output_chars: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
}

/// Result of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    /// Trimmed model output, or an `Error: ...` message.
    pub text: String,

    /// Whether output was cut off at the length cap.
    pub truncated: bool,

    /// Set when `text` is an error message.
    pub error: Option<ErrorKind>,
}

impl GenerationResponse {
    fn failed(kind: ErrorKind, text: String) -> Self {
        Self {
            text,
            truncated: false,
            error: Some(kind),
        }
    }

    fn unresponsive() -> Self {
        Self::failed(
            ErrorKind::ServerUnresponsive,
            "Error: model server not responding. Restart with: ollama serve".to_string(),
        )
    }

    fn from_error(err: &OllamaError) -> Self {
        if err.is_timeout() {
            return Self::failed(
                ErrorKind::Timeout,
                "Error: Generation timeout. Consider using a smaller model.".to_string(),
            );
        }

        let detail: String = err.to_string().chars().take(100).collect();
        Self::failed(ErrorKind::Generic, format!("Error: {detail}"))
    }

    /// Whether the text is an error message rather than model output.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Assemble the prompt for `question` grounded in `passages`.
pub fn build_prompt(header: &str, question: &str, passages: &[String]) -> String {
    format!(
        "{header}\n{context}\n\nQ: {question}\nA:",
        context = passages.join("\n")
    )
}

/// Streams answers from the model server.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    api: OllamaApi,
    model: String,
    config: GenerationConfig,
    timeout: Duration,
}

impl GenerationClient {
    /// Create a client for `model` on the server behind `api`.
    pub fn new(api: OllamaApi, model: impl Into<String>, config: GenerationConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        Self {
            api,
            model: model.into(),
            config,
            timeout,
        }
    }

    /// Create a client for the default model on a local server.
    pub fn local() -> Self {
        Self::new(
            OllamaApi::new(crate::api::DEFAULT_BASE_URL),
            DEFAULT_MODEL,
            GenerationConfig::default(),
        )
    }

    /// Override the generation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Model used for generation.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the configuration.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Build the request that [`generate`](Self::generate) would send.
    pub fn request(&self, question: &str, passages: &[String]) -> GenerationRequest {
        GenerationRequest {
            prompt: build_prompt(&self.config.header, question, passages),
            max_output_chars: self.config.max_output_chars,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            num_predict: self.config.num_predict,
        }
    }

    /// Answer `question` from `passages`.
    pub async fn generate(&self, question: &str, passages: &[String]) -> GenerationResponse {
        let request = self.request(question, passages);
        self.execute(&request).await
    }

    /// Run a prepared request.
    pub async fn execute(&self, request: &GenerationRequest) -> GenerationResponse {
        let preflight = Duration::from_millis(self.config.preflight_timeout_ms);
        if let Err(err) = self.api.list_models(preflight).await {
            warn!("Model server pre-flight check failed: {err}");
            return GenerationResponse::unresponsive();
        }

        let options = ChatOptions {
            temperature: request.temperature,
            top_p: request.top_p,
            num_predict: request.num_predict,
        };

        debug!("Generating with {} ({} prompt chars)", self.model, request.prompt.len());
        match self
            .api
            .chat_stream(&self.model, &request.prompt, options, self.timeout)
            .await
        {
            Ok(stream) => collect_capped(stream, request.max_output_chars).await,
            Err(err) => {
                warn!("Generation request failed: {err}");
                GenerationResponse::from_error(&err)
            }
        }
    }
}

/// Accumulate fragments until the stream ends or the output exceeds
/// `max_output_chars`, whichever comes first.
async fn collect_capped(mut stream: FragmentStream, max_output_chars: usize) -> GenerationResponse {
    let mut text = String::new();
    let mut chars = 0usize;
    let mut truncated = false;

    while let Some(fragment) = stream.next().await {
        match fragment {
            Ok(fragment) => {
                chars += fragment.chars().count();
                text.push_str(&fragment);
                if chars > max_output_chars {
                    truncated = true;
                    break;
                }
            }
            Err(err) => {
                warn!("Generation stream failed: {err}");
                return GenerationResponse::from_error(&err);
            }
        }
    }

    if truncated {
        info!("Generation cut off after {chars} characters");
    }

    GenerationResponse {
        text: text.trim().to_string(),
        truncated,
        error: None,
    }
}
