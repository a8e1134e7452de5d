//! Boundary to the generative-AI service.
//!
//! Every call site here degrades to a neutral result (no alerts, no
//! suggestion fields, fallback text) when the service is unreachable or
//! returns something unparseable. Failures are logged, never surfaced.

pub mod assistant;
pub mod client;
pub mod guide;
pub mod interactions;
pub mod parser;
pub mod prompt;
pub mod speech;
pub mod suggestion;
pub mod types;

pub use assistant::*;
pub use client::*;
pub use guide::*;
pub use interactions::*;
pub use parser::*;
pub use speech::*;
pub use suggestion::*;
pub use types::*;

use thiserror::Error;

/// Model for structured extraction, safety checks and extended reasoning.
pub const PRO_MODEL: &str = "gemini-2.5-pro";
/// Model for regular assistant turns.
pub const FLASH_MODEL: &str = "gemini-2.5-flash";
/// Text-to-speech model.
pub const TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
/// Prebuilt voice for spoken reminders and replies.
pub const TTS_VOICE: &str = "Kore";
/// Thinking budget when extended reasoning is on.
pub const THINKING_BUDGET: u32 = 32768;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("No API key configured for the AI service")]
    MissingApiKey,

    #[error("AI service is not reachable at {0}")]
    Connection(String),

    #[error("AI service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Malformed model output: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),
}
