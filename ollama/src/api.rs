//! Thin client for the Ollama HTTP API.
//!
//! Only the four endpoints the assistant needs are covered: `/api/tags` as
//! a read-only liveness probe, `/api/pull` to fetch a missing model,
//! `/api/chat` for streamed generation and (in `baggage-embeddings`)
//! `/api/embed`.

use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OllamaError, Result};

/// Default address of a local Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Lazily produced text fragments of one generation.
///
/// Finite and not restartable; dropping it stops reading the response.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Sampling options sent with a chat request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChatOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

/// One NDJSON line of a streamed chat response.
#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client bound to one Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaApi {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaApi {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// List the names of the models the server has locally.
    pub async fn list_models(&self, timeout: Duration) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(timeout)
            .send()
            .await?;

        let response = check_status(response).await?;
        let tags: TagsResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Download `model`, blocking until the server reports completion.
    pub async fn pull_model(&self, model: &str, timeout: Duration) -> Result<()> {
        info!("Pulling model: {model}");
        let response = self
            .client
            .post(self.url("/api/pull"))
            .timeout(timeout)
            .json(&serde_json::json!({ "model": model, "stream": false }))
            .send()
            .await?;

        let response = check_status(response).await?;
        let pulled: PullResponse = serde_json::from_slice(&response.bytes().await?)?;
        if let Some(error) = pulled.error {
            return Err(OllamaError::Server(error));
        }

        debug!(
            "Pull of {model} finished with status: {}",
            pulled.status.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    /// Start a streamed chat completion for a single user message.
    ///
    /// `timeout` bounds the whole exchange, including reading the body.
    pub async fn chat_stream(
        &self,
        model: &str,
        prompt: &str,
        options: ChatOptions,
        timeout: Duration,
    ) -> Result<FragmentStream> {
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: true,
            options,
        };

        let response = self
            .client
            .post(self.url("/api/chat"))
            .timeout(timeout)
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let mut body = response.bytes_stream();
        let stream = stream! {
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(bytes) = body.next().await {
                match bytes {
                    Ok(bytes) => buffer.extend_from_slice(&bytes),
                    Err(err) => {
                        yield Err(OllamaError::from(err));
                        return;
                    }
                }

                while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    match parse_line(&line) {
                        Ok(Some(fragment)) => {
                            if !fragment.content.is_empty() {
                                yield Ok(fragment.content);
                            }
                            if fragment.done {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            yield Err(err);
                            return;
                        }
                    }
                }
            }

            // Trailing line without a newline
            match parse_line(&buffer) {
                Ok(Some(fragment)) if !fragment.content.is_empty() => {
                    yield Ok(fragment.content);
                }
                Ok(_) => {}
                Err(err) => {
                    yield Err(err);
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

struct Fragment {
    content: String,
    done: bool,
}

fn parse_line(line: &[u8]) -> Result<Option<Fragment>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let parsed: ChatLine = serde_json::from_slice(line)?;
    if let Some(error) = parsed.error {
        return Err(OllamaError::Server(error));
    }

    Ok(Some(Fragment {
        content: parsed.message.map(|m| m.content).unwrap_or_default(),
        done: parsed.done,
    }))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);
    Err(OllamaError::Server(format!("{status}: {message}")))
}

/// Whether a model listed by the server satisfies a requested name.
///
/// `llama3.2:1b` only matches itself; an untagged request such as
/// `all-minilm` also matches any tag of that model (`all-minilm:latest`).
pub fn model_matches(listed: &str, wanted: &str) -> bool {
    listed == wanted
        || listed
            .strip_prefix(wanted)
            .is_some_and(|rest| rest.starts_with(':'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OPTIONS: ChatOptions = ChatOptions {
        temperature: 0.1,
        top_p: 0.9,
        num_predict: 512,
    };

    fn ndjson(lines: &[serde_json::Value]) -> String {
        lines
            .iter()
            .map(serde_json::Value::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_model_matches() {
        assert!(model_matches("llama3.2:1b", "llama3.2:1b"));
        assert!(model_matches("all-minilm:latest", "all-minilm"));
        assert!(!model_matches("llama3.2:3b", "llama3.2:1b"));
        assert!(!model_matches("all-minilm-l12:latest", "all-minilm"));
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{ "name": "llama3.2:1b" }, { "name": "all-minilm:latest" }]
            })))
            .mount(&server)
            .await;

        let api = OllamaApi::new(server.uri());
        let models = api.list_models(Duration::from_secs(3)).await.unwrap();
        assert_eq!(models, vec!["llama3.2:1b", "all-minilm:latest"]);
    }

    #[tokio::test]
    async fn test_pull_sends_blocking_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .and(body_partial_json(serde_json::json!({ "model": "llama3.2:1b", "stream": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "success" })))
            .expect(1)
            .mount(&server)
            .await;

        let api = OllamaApi::new(server.uri());
        api.pull_model("llama3.2:1b", Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_chat_stream_yields_fragments_in_order() {
        let server = MockServer::start().await;
        let body = ndjson(&[
            serde_json::json!({ "message": { "role": "assistant", "content": "The first " }, "done": false }),
            serde_json::json!({ "message": { "role": "assistant", "content": "bag is $35." }, "done": false }),
            serde_json::json!({ "message": { "role": "assistant", "content": "" }, "done": true }),
        ]);
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.2:1b",
                "stream": true,
                "messages": [{ "role": "user", "content": "Q" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let api = OllamaApi::new(server.uri());
        let stream = api
            .chat_stream("llama3.2:1b", "Q", OPTIONS, Duration::from_secs(5))
            .await
            .unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;

        assert_eq!(fragments, vec!["The first ", "bag is $35."]);
    }

    #[tokio::test]
    async fn test_chat_stream_surfaces_inline_errors() {
        let server = MockServer::start().await;
        let body = ndjson(&[
            serde_json::json!({ "message": { "content": "partial" }, "done": false }),
            serde_json::json!({ "error": "model runner crashed" }),
        ]);
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let api = OllamaApi::new(server.uri());
        let mut stream = api
            .chat_stream("llama3.2:1b", "Q", OPTIONS, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
        match stream.next().await {
            Some(Err(OllamaError::Server(message))) => assert_eq!(message, "model runner crashed"),
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_status_extracts_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({ "error": "model \"nope\" not found" })),
            )
            .mount(&server)
            .await;

        let api = OllamaApi::new(server.uri());
        let result = api
            .chat_stream("nope", "Q", OPTIONS, Duration::from_secs(5))
            .await;

        match result {
            Err(OllamaError::Server(message)) => {
                assert!(message.starts_with("404"));
                assert!(message.contains("model \"nope\" not found"));
            }
            Err(other) => panic!("expected server error, got {other}"),
            Ok(_) => panic!("expected server error, got a stream"),
        }
    }
}
