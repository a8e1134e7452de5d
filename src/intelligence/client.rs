use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{
    FunctionCall, GenerateRequest, GenerateResponse, LlmClient, Part, ToolConfig,
};
use super::AiError;
use crate::config::AiConfig;
use crate::models::{ChatRole, Citation};

/// HTTP client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AiError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn from_env() -> Result<Self, AiError> {
        Self::new(&AiConfig::from_env())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

// ═══════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig<'a>>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<WireInlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: WireContent,
    #[serde(default)]
    grounding_metadata: Option<WireGroundingMetadata>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<WireGroundingChunk>,
}

#[derive(Deserialize)]
struct WireGroundingChunk {
    web: Option<WireWebSource>,
}

#[derive(Deserialize)]
struct WireWebSource {
    uri: String,
    title: Option<String>,
}

fn to_wire_part(part: &Part) -> WirePart {
    match part {
        Part::Text(text) => WirePart {
            text: Some(text.clone()),
            ..WirePart::default()
        },
        Part::InlineData { mime_type, data } => WirePart {
            inline_data: Some(WireInlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            }),
            ..WirePart::default()
        },
    }
}

fn to_wire_request(request: &GenerateRequest) -> WireRequest<'_> {
    let contents = request
        .contents
        .iter()
        .map(|c| WireContent {
            role: Some(
                match c.role {
                    ChatRole::User => "user",
                    ChatRole::Model => "model",
                }
                .to_string(),
            ),
            parts: c.parts.iter().map(to_wire_part).collect(),
        })
        .collect();

    let system_instruction = request.system.as_ref().map(|s| WireContent {
        role: None,
        parts: vec![to_wire_part(&Part::Text(s.clone()))],
    });

    let tools = match &request.tools {
        ToolConfig::None => Vec::new(),
        ToolConfig::WebSearch => vec![serde_json::json!({ "googleSearch": {} })],
        ToolConfig::Functions(decls) => {
            vec![serde_json::json!({ "functionDeclarations": decls })]
        }
    };

    let has_config = request.response_schema.is_some()
        || request.thinking_budget.is_some()
        || request.speech_voice.is_some();

    let generation_config = has_config.then(|| WireGenerationConfig {
        response_mime_type: request
            .response_schema
            .as_ref()
            .map(|_| "application/json"),
        response_schema: request.response_schema.as_ref(),
        thinking_config: request
            .thinking_budget
            .map(|budget| serde_json::json!({ "thinkingBudget": budget })),
        response_modalities: request.speech_voice.as_ref().map(|_| vec!["AUDIO"]),
        speech_config: request.speech_voice.as_ref().map(|voice| {
            serde_json::json!({
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
            })
        }),
    });

    WireRequest {
        contents,
        system_instruction,
        tools,
        generation_config,
    }
}

fn from_wire_response(wire: WireResponse) -> GenerateResponse {
    let Some(candidate) = wire.candidates.into_iter().next() else {
        return GenerateResponse::default();
    };

    let mut response = GenerateResponse::default();
    for part in candidate.content.parts {
        if let Some(text) = part.text {
            response.text.push_str(&text);
        }
        if let Some(call) = part.function_call {
            response.function_calls.push(FunctionCall {
                name: call.name,
                args: call.args,
            });
        }
        if let Some(inline) = part.inline_data {
            if response.inline_audio.is_none() {
                response.inline_audio = Some(inline.data);
            }
        }
    }

    if let Some(meta) = candidate.grounding_metadata {
        response.citations = meta
            .grounding_chunks
            .into_iter()
            .filter_map(|chunk| chunk.web)
            .map(|web| Citation {
                title: web.title,
                uri: web.uri,
            })
            .collect();
    }

    response
}

impl LlmClient for GeminiClient {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;
        let url = self.endpoint(&request.model);
        let body = to_wire_request(request);

        tracing::debug!(model = %request.model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    AiError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    AiError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
                } else {
                    AiError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AiError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: WireResponse = response
            .json()
            .map_err(|e| AiError::ResponseParsing(e.to_string()))?;

        Ok(from_wire_response(parsed))
    }
}

// ═══════════════════════════════════════════
// Mock client
// ═══════════════════════════════════════════

/// Mock LLM client for testing. Replays scripted responses in order and
/// records every request it receives. The last scripted response repeats.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<GenerateResponse, String>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockLlmClient {
    pub fn new(text: &str) -> Self {
        Self::scripted(vec![Ok(GenerateResponse::text(text))])
    }

    pub fn with_response(response: GenerateResponse) -> Self {
        Self::scripted(vec![Ok(response)])
    }

    /// Every call fails with a service error.
    pub fn failing(message: &str) -> Self {
        Self::scripted(vec![Err(message.to_string())])
    }

    pub fn scripted(responses: Vec<Result<GenerateResponse, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, AiError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| AiError::HttpClient("mock lock poisoned".into()))?;
        let next = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };

        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(body)) => Err(AiError::Service { status: 500, body }),
            None => Ok(GenerateResponse::default()),
        }
    }
}
