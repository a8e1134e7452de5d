use serde::Serialize;

use super::AiError;
use crate::models::{ChatRole, Citation};

/// One piece of a message: text or an inline binary payload (base64).
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: ChatRole,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            parts: vec![Part::Text(text.into())],
        }
    }
}

/// Callable function exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Tools offered with a request. Web grounding and function calling are
/// mutually exclusive on the service side.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolConfig {
    #[default]
    None,
    WebSearch,
    Functions(Vec<FunctionDeclaration>),
}

/// Provider-neutral generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub system: Option<String>,
    pub contents: Vec<Content>,
    /// Ask for a JSON body conforming to this schema.
    pub response_schema: Option<serde_json::Value>,
    pub tools: ToolConfig,
    pub thinking_budget: Option<u32>,
    /// Ask for spoken audio in this prebuilt voice instead of text.
    pub speech_voice: Option<String>,
}

impl GenerateRequest {
    pub fn new(model: &str, contents: Vec<Content>) -> Self {
        Self {
            model: model.to_string(),
            system: None,
            contents,
            response_schema: None,
            tools: ToolConfig::None,
            thinking_budget: None,
            speech_voice: None,
        }
    }

    /// Single user turn of plain text.
    pub fn prompt(model: &str, text: impl Into<String>) -> Self {
        Self::new(model, vec![Content::user_text(text)])
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// Function invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerateResponse {
    pub text: String,
    pub function_calls: Vec<FunctionCall>,
    pub citations: Vec<Citation>,
    /// Base64 audio payload, for speech requests.
    pub inline_audio: Option<String>,
}

impl GenerateResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Generative-AI client abstraction (allows mocking)
pub trait LlmClient {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, AiError>;
}
