//! Chat-completion transport.
//!
//! Responsibilities:
//! - Define the [`ChatClient`] seam the summarizer talks to
//! - Send requests to an OpenAI-compatible `/chat/completions` endpoint
//! - Map transport, status and body failures onto [`SummaryError`]
//!
//! Notes:
//! - Only the first choice of a response is read.
//! - [`MockChatClient`] stands in for the endpoint in tests and dry runs.

use crate::config::SummaryConfig;
use crate::{SummaryError, SummaryResult};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

/// One chat-completion call: a system message, a user message and the sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Something that can answer a chat request with the assistant's text.
pub trait ChatClient {
    /// Send `request` and return the assistant's reply, which may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::Http`] for transport failures, [`SummaryError::Api`] for a non-2xx
    /// status, and [`SummaryError::ResponseParsing`] for a body without a usable choice.
    fn complete(&self, request: &ChatRequest) -> SummaryResult<String>;
}

/// Blocking client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChatClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiChatClient {
    /// Create a client for the endpoint and key in `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - Resolved configuration; its timeout applies to every request.
    ///
    /// # Returns
    ///
    /// A client ready to send requests. No request is made here.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::Http`] if the underlying HTTP client cannot be built.
    pub fn new(config: &SummaryConfig) -> SummaryResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs()))
            .build()
            .map_err(|e| SummaryError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url().to_string(),
            api_key: config.api_key().to_string(),
            client,
            timeout_secs: config.timeout_secs(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

impl<'a> From<&'a ChatRequest> for CompletionRequest<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        Self {
            model: &request.model,
            messages: [
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Pull the first choice's content out of a completion response body.
///
/// A missing or null content comes back as an empty string; the caller decides whether that is an
/// error.
fn parse_reply(body: &str) -> SummaryResult<String> {
    let parsed: CompletionResponse =
        serde_json::from_str(body).map_err(|e| SummaryError::ResponseParsing(e.to_string()))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| SummaryError::ResponseParsing("response has no choices".into()))?;

    Ok(choice.message.content.unwrap_or_default())
}

impl ChatClient for OpenAiChatClient {
    fn complete(&self, request: &ChatRequest) -> SummaryResult<String> {
        let url = self.endpoint();
        tracing::debug!(model = %request.model, url = %url, "sending chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest::from(request))
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    SummaryError::Http(format!("cannot connect to {}", self.base_url))
                } else if e.is_timeout() {
                    SummaryError::Http(format!("request timed out after {}s", self.timeout_secs))
                } else {
                    SummaryError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SummaryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .map_err(|e| SummaryError::ResponseParsing(e.to_string()))?;
        parse_reply(&body)
    }
}

/// Canned client for tests and dry runs. Records every request it receives.
pub struct MockChatClient {
    reply: Result<String, (u16, String)>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatClient {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A client whose every call fails as if the endpoint answered with `status`.
    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            reply: Err((status, body.to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl ChatClient for MockChatClient {
    fn complete(&self, request: &ChatRequest) -> SummaryResult<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err((status, body)) => Err(SummaryError::Api {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}
