use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;

use crate::normalize::ImagePayload;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Inference request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Inference service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Inference response contained no text")]
    EmptyResponse,
}

/// Abstraction over the vision-capable inference service.
/// One request carries zero or more image payloads followed by an
/// instruction; the implementation returns the model's raw text reply.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn infer(&self, images: &[ImagePayload], prompt: &str)
        -> Result<String, InferenceError>;
}

// ── Claude backend ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Production backend speaking the Anthropic Messages API.
pub struct ClaudeBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(InferenceError::ClientBuild)?;
        Ok(Self {
            client,
            api_url: ANTHROPIC_API_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// Point the backend at a different endpoint (tests, proxies).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl InferenceBackend for ClaudeBackend {
    async fn infer(
        &self,
        images: &[ImagePayload],
        prompt: &str,
    ) -> Result<String, InferenceError> {
        let mut content: Vec<ContentBlock<'_>> = images
            .iter()
            .map(|img| ContentBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: img.media_type,
                    data: &img.data,
                },
            })
            .collect();
        content.push(ContentBlock::Text { text: prompt });

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message { role: "user", content }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api { status, body });
        }

        let parsed: MessagesResponse = response.json().await?;
        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or(InferenceError::EmptyResponse)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Serves scripted responses — lets the extraction and batch logic be
/// exercised without the external service.
pub struct MockBackend {
    responses: Mutex<VecDeque<String>>,
    /// Returned whenever the queue is empty: a fixed text, or an error.
    fallback: Result<String, String>,
    calls: Mutex<usize>,
}

impl MockBackend {
    /// Every call returns the same text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Ok(text.into()),
            calls: Mutex::new(0),
        }
    }

    /// Calls pop responses in order; an exhausted queue is an API error.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            fallback: Err("mock response queue exhausted".to_string()),
            calls: Mutex::new(0),
        }
    }

    /// Every call fails with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Err(message.into()),
            calls: Mutex::new(0),
        }
    }

    /// How many inference calls have been issued.
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    async fn infer(
        &self,
        _images: &[ImagePayload],
        _prompt: &str,
    ) -> Result<String, InferenceError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            return Ok(next);
        }
        match &self.fallback {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(InferenceError::Api { status: 500, body: message.clone() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> ImagePayload {
        ImagePayload { data: "aGVsbG8=".to_string(), media_type: "image/jpeg" }
    }

    #[tokio::test]
    async fn mock_repeats_single_response() {
        let backend = MockBackend::new("{\"amount\": 100}");
        assert_eq!(backend.infer(&[], "x").await.unwrap(), "{\"amount\": 100}");
        assert_eq!(backend.infer(&[], "x").await.unwrap(), "{\"amount\": 100}");
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_pops_scripted_responses_then_errors() {
        let backend = MockBackend::with_responses(["one", "two"]);
        assert_eq!(backend.infer(&[], "x").await.unwrap(), "one");
        assert_eq!(backend.infer(&[], "x").await.unwrap(), "two");
        assert!(backend.infer(&[], "x").await.is_err());
    }

    #[tokio::test]
    async fn claude_backend_sends_images_then_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{ "type": "text", "text": "{\"amount\": 550}" }]
            })))
            .mount(&server)
            .await;

        let backend = ClaudeBackend::new("test-key", "claude-sonnet-4-20250514")
            .unwrap()
            .with_api_url(format!("{}/v1/messages", server.uri()));
        let text = backend.infer(&[payload()], "extract").await.unwrap();
        assert_eq!(text, "{\"amount\": 550}");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["max_tokens"], 1024);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(content[1]["text"], "extract");
    }

    #[tokio::test]
    async fn claude_backend_maps_service_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let backend = ClaudeBackend::new("k", "m").unwrap().with_api_url(server.uri());
        let err = backend.infer(&[], "x").await.unwrap_err();
        assert!(matches!(err, InferenceError::Api { status: 429, .. }));
    }

    #[tokio::test]
    async fn claude_backend_requires_text_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "content": [] })),
            )
            .mount(&server)
            .await;

        let backend = ClaudeBackend::new("k", "m").unwrap().with_api_url(server.uri());
        let err = backend.infer(&[], "x").await.unwrap_err();
        assert!(matches!(err, InferenceError::EmptyResponse));
    }
}
