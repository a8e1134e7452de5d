//! Conversational health assistant.
//!
//! A turn either answers in text (optionally grounded with web citations)
//! or asks the app to act: prepare a reminder draft, or generate the
//! medication guide.

use chrono::NaiveDate;
use serde::Deserialize;

use super::prompt::{self, CREATE_GUIDE_TOOL, SET_REMINDER_TOOL};
use super::types::{Content, FunctionCall, GenerateRequest, LlmClient, Part, ToolConfig};
use super::{AiError, FLASH_MODEL, PRO_MODEL, THINKING_BUDGET};
use crate::models::{ChatMessage, Citation, GuideFormat, Medication, UserProfile};

/// Reply shown when the service could not be reached.
pub const CONNECTION_ERROR_REPLY: &str = "Error connecting. Try again.";
/// Spoken replies are cut to this many characters.
pub const SPEECH_EXCERPT_CHARS: usize = 300;

pub const GUIDE_CONFIRMATION: &str =
    "I've generated your comprehensive medication guide. You can view it now.";

pub struct AssistantContext<'a> {
    pub profile: &'a UserProfile,
    pub medications: &'a [Medication],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssistantOptions {
    /// Ground answers in web search. Disables the app tools.
    pub use_grounding: bool,
    /// Use the larger model with a thinking budget.
    pub use_thinking: bool,
}

/// Arguments of a `set_medication_reminder` call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReminderRequest {
    pub name: String,
    pub dosage: String,
    pub time: String,
    #[serde(default)]
    pub advice: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssistantAction {
    SetReminder(ReminderRequest),
    CreateGuide {
        include_interactions: bool,
        format: GuideFormat,
    },
}

impl AssistantAction {
    /// Message added to the conversation when the action is dispatched.
    pub fn confirmation(&self) -> String {
        match self {
            Self::SetReminder(req) => format!(
                "Understood. I've prepared a reminder for {}. Opening the setup window now.",
                req.name
            ),
            Self::CreateGuide { .. } => GUIDE_CONFIRMATION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssistantReply {
    pub text: String,
    pub citations: Vec<Citation>,
    pub actions: Vec<AssistantAction>,
    /// The service failed and `text` is the fallback.
    pub degraded: bool,
}

impl AssistantReply {
    fn fallback() -> Self {
        Self {
            text: CONNECTION_ERROR_REPLY.to_string(),
            degraded: true,
            ..Self::default()
        }
    }

    /// Text to read aloud: plain answers only, never action confirmations
    /// or the fallback.
    pub fn speech_text(&self) -> Option<&str> {
        if self.degraded || !self.actions.is_empty() {
            return None;
        }
        let excerpt = speech_excerpt(&self.text);
        (!excerpt.trim().is_empty()).then_some(excerpt)
    }
}

/// First [`SPEECH_EXCERPT_CHARS`] characters, on a char boundary.
pub fn speech_excerpt(text: &str) -> &str {
    match text.char_indices().nth(SPEECH_EXCERPT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ═══════════════════════════════════════════
// Request
// ═══════════════════════════════════════════

pub fn build_chat_request(
    history: &[ChatMessage],
    message: &str,
    context: &AssistantContext<'_>,
    options: AssistantOptions,
) -> GenerateRequest {
    let model = if options.use_thinking {
        PRO_MODEL
    } else {
        FLASH_MODEL
    };

    let mut contents: Vec<Content> = history
        .iter()
        .map(|m| Content {
            role: m.role,
            parts: vec![Part::Text(m.text.clone())],
        })
        .collect();
    contents.push(Content::user_text(message));

    let mut request = GenerateRequest::new(model, contents);
    request.system = Some(prompt::assistant_system_instruction(
        context.profile,
        context.medications,
    ));
    request.tools = if options.use_grounding {
        ToolConfig::WebSearch
    } else {
        ToolConfig::Functions(prompt::assistant_tools())
    };
    if options.use_thinking {
        request.thinking_budget = Some(THINKING_BUDGET);
    }
    request
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuideArgs {
    #[serde(default)]
    include_interactions: bool,
    #[serde(default)]
    format: Option<String>,
}

/// Map a model function call onto an app action. Unknown tools and
/// malformed arguments are skipped.
fn parse_action(call: &FunctionCall) -> Option<AssistantAction> {
    match call.name.as_str() {
        SET_REMINDER_TOOL => match serde_json::from_value::<ReminderRequest>(call.args.clone()) {
            Ok(req) => Some(AssistantAction::SetReminder(req)),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed reminder request from assistant");
                None
            }
        },
        CREATE_GUIDE_TOOL => {
            let args: GuideArgs = serde_json::from_value(call.args.clone()).unwrap_or(GuideArgs {
                include_interactions: false,
                format: None,
            });
            let format = args
                .format
                .as_deref()
                .and_then(|f| f.trim().to_lowercase().parse().ok())
                .unwrap_or(GuideFormat::Summary);
            Some(AssistantAction::CreateGuide {
                include_interactions: args.include_interactions,
                format,
            })
        }
        other => {
            tracing::debug!(tool = other, "Ignoring unknown assistant tool");
            None
        }
    }
}

// ═══════════════════════════════════════════
// Chat
// ═══════════════════════════════════════════

pub fn try_chat(
    client: &dyn LlmClient,
    history: &[ChatMessage],
    message: &str,
    context: &AssistantContext<'_>,
    options: AssistantOptions,
) -> Result<AssistantReply, AiError> {
    let request = build_chat_request(history, message, context, options);
    let response = client.generate(&request)?;

    let actions: Vec<AssistantAction> = response.function_calls.iter().filter_map(parse_action).collect();
    if !actions.is_empty() {
        let text = actions
            .iter()
            .map(AssistantAction::confirmation)
            .collect::<Vec<_>>()
            .join("\n");
        return Ok(AssistantReply {
            text,
            citations: Vec::new(),
            actions,
            degraded: false,
        });
    }

    Ok(AssistantReply {
        text: response.text,
        citations: response.citations,
        actions: Vec::new(),
        degraded: false,
    })
}

/// One assistant turn. Service failures become the connection-error reply.
pub fn chat(
    client: &dyn LlmClient,
    history: &[ChatMessage],
    message: &str,
    context: &AssistantContext<'_>,
    options: AssistantOptions,
) -> AssistantReply {
    try_chat(client, history, message, context, options).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Assistant turn failed");
        AssistantReply::fallback()
    })
}

/// Pre-filled medication form for a reminder the assistant set up.
pub fn prepare_reminder_draft(request: &ReminderRequest, today: NaiveDate) -> Medication {
    let mut draft = Medication::draft(today);
    draft.name = request.name.trim().to_string();
    draft.dosage = request.dosage.trim().to_string();
    draft.reminder_times = vec![request.time.trim().to_string()];
    draft.intake_advice = request.advice.clone().unwrap_or_default();
    draft
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::client::MockLlmClient;
    use crate::intelligence::types::GenerateResponse;
    use crate::models::{ChatRole, Gender};

    fn profile() -> UserProfile {
        UserProfile {
            name: "Ada".into(),
            dob: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
            age: 56,
            gender: Gender::Female,
            height: None,
            weight: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 2).unwrap()
    }

    fn run(mock: &MockLlmClient, options: AssistantOptions) -> AssistantReply {
        let profile = profile();
        let context = AssistantContext {
            profile: &profile,
            medications: &[],
        };
        let history = vec![ChatMessage::user("hi"), ChatMessage::model("Hello Ada")];
        chat(mock, &history, "What should I take?", &context, options)
    }

    #[test]
    fn default_turn_uses_flash_with_tools() {
        let mock = MockLlmClient::new("Take it with food.");
        let reply = run(&mock, AssistantOptions::default());
        assert_eq!(reply.text, "Take it with food.");
        assert_eq!(reply.speech_text(), Some("Take it with food."));

        let request = &mock.requests()[0];
        assert_eq!(request.model, FLASH_MODEL);
        assert!(request.thinking_budget.is_none());
        assert!(matches!(&request.tools, ToolConfig::Functions(t) if t.len() == 2));
        assert_eq!(request.contents.len(), 3);
        assert_eq!(request.contents[1].role, ChatRole::Model);
        assert_eq!(request.contents[2].role, ChatRole::User);
        assert!(request.system.as_deref().unwrap().contains("None."));
    }

    #[test]
    fn grounding_replaces_tools_and_thinking_selects_pro() {
        let mock = MockLlmClient::new("ok");
        run(
            &mock,
            AssistantOptions {
                use_grounding: true,
                use_thinking: true,
            },
        );
        let request = &mock.requests()[0];
        assert_eq!(request.model, PRO_MODEL);
        assert_eq!(request.thinking_budget, Some(THINKING_BUDGET));
        assert_eq!(request.tools, ToolConfig::WebSearch);
    }

    #[test]
    fn grounded_reply_keeps_citations() {
        let mock = MockLlmClient::with_response(GenerateResponse {
            text: "Per the label...".into(),
            citations: vec![Citation {
                title: Some("Label".into()),
                uri: "https://example.org".into(),
            }],
            ..Default::default()
        });
        let reply = run(&mock, AssistantOptions::default());
        assert_eq!(reply.citations.len(), 1);
    }

    #[test]
    fn reminder_call_becomes_action() {
        let mock = MockLlmClient::with_response(GenerateResponse {
            function_calls: vec![FunctionCall {
                name: SET_REMINDER_TOOL.into(),
                args: serde_json::json!({"name": "Aspirin", "dosage": "81mg", "time": "08:30"}),
            }],
            ..Default::default()
        });
        let reply = run(&mock, AssistantOptions::default());
        assert_eq!(
            reply.text,
            "Understood. I've prepared a reminder for Aspirin. Opening the setup window now."
        );
        assert!(reply.speech_text().is_none());

        let AssistantAction::SetReminder(req) = &reply.actions[0] else {
            panic!("expected reminder action");
        };
        let draft = prepare_reminder_draft(req, today());
        assert_eq!(draft.name, "Aspirin");
        assert_eq!(draft.reminder_times, vec!["08:30".to_string()]);
        assert_eq!(draft.intake_advice, "");
        assert_eq!(draft.start_date, today());
    }

    #[test]
    fn guide_call_becomes_action() {
        let mock = MockLlmClient::with_response(GenerateResponse {
            function_calls: vec![FunctionCall {
                name: CREATE_GUIDE_TOOL.into(),
                args: serde_json::json!({"includeInteractions": true, "format": "Detailed"}),
            }],
            ..Default::default()
        });
        let reply = run(&mock, AssistantOptions::default());
        assert_eq!(reply.text, GUIDE_CONFIRMATION);
        assert_eq!(
            reply.actions,
            vec![AssistantAction::CreateGuide {
                include_interactions: true,
                format: GuideFormat::Detailed
            }]
        );
    }

    #[test]
    fn malformed_and_unknown_calls_are_skipped() {
        let mock = MockLlmClient::with_response(GenerateResponse {
            text: "Here is what I found.".into(),
            function_calls: vec![
                FunctionCall {
                    name: SET_REMINDER_TOOL.into(),
                    args: serde_json::json!({"name": "NoDose"}),
                },
                FunctionCall {
                    name: "launch_rocket".into(),
                    args: serde_json::Value::Null,
                },
            ],
            ..Default::default()
        });
        let reply = run(&mock, AssistantOptions::default());
        assert!(reply.actions.is_empty());
        assert_eq!(reply.text, "Here is what I found.");
    }

    #[test]
    fn failure_yields_fallback() {
        let reply = run(&MockLlmClient::failing("down"), AssistantOptions::default());
        assert_eq!(reply.text, CONNECTION_ERROR_REPLY);
        assert!(reply.degraded);
        assert!(reply.speech_text().is_none());
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let long = "é".repeat(400);
        assert_eq!(speech_excerpt(&long).chars().count(), SPEECH_EXCERPT_CHARS);
        assert_eq!(speech_excerpt("short"), "short");
    }
}
