//! # EMBR summary client
//!
//! Turns a patient record into a free-text clinical summary by embedding its EMBR encoding in a
//! prompt and sending it to an OpenAI-compatible chat-completion endpoint.
//!
//! - [`SummaryConfig`]: endpoint, model and credentials, resolved once at startup
//! - [`PromptTemplate`]: system message plus a user template with a `{patient_data}` slot
//! - [`ChatClient`]: the seam to the remote model ([`OpenAiChatClient`], [`MockChatClient`])
//! - [`Summarizer`]: glues the three together
//!
//! Each request is sent once, with no retry or backoff.

pub mod client;
pub mod config;
pub mod prompt;
pub mod summarizer;

pub use client::{ChatClient, ChatRequest, MockChatClient, OpenAiChatClient};
pub use config::{resolve_config, SummaryConfig};
pub use prompt::PromptTemplate;
pub use summarizer::{SummaryInput, Summarizer};

/// Errors returned by the summary client.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no API key configured")]
    MissingApiKey,

    #[error("record error: {0}")]
    Codec(#[from] embr::EmbrError),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("chat endpoint returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse chat response: {0}")]
    ResponseParsing(String),

    #[error("model returned an empty summary")]
    EmptyResponse,
}

/// Type alias for Results that can fail with a [`SummaryError`].
pub type SummaryResult<T> = Result<T, SummaryError>;
