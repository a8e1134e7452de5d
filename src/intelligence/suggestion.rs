use base64::Engine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::parser::parse_json;
use super::prompt;
use super::types::{Content, GenerateRequest, LlmClient, Part};
use super::{AiError, PRO_MODEL};
use crate::models::{ChatRole, Medication, UserProfile, DEFAULT_REMINDER_TIME};

/// Partial medication filled in by the model from a free-text description.
/// Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationSuggestion {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub intake_advice: Option<String>,
    #[serde(default)]
    pub reminder_times: Option<Vec<String>>,
    #[serde(default)]
    pub safety_note: Option<String>,
    #[serde(default)]
    pub timeline_advice: Option<String>,
}

impl MedicationSuggestion {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Result of reading a medication box or prescription photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionAnalysis {
    #[serde(default)]
    pub medications: Vec<MedicationSuggestion>,
    #[serde(default)]
    pub comprehensive_guide: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawImageMedication {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    dosage: Option<String>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    intake_advice: Option<String>,
    #[serde(default)]
    suggested_times: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawImageAnalysis {
    #[serde(default)]
    medications: Vec<serde_json::Value>,
    #[serde(default)]
    comprehensive_guide: Option<String>,
}

impl From<RawImageMedication> for MedicationSuggestion {
    fn from(raw: RawImageMedication) -> Self {
        let reminder_times = raw
            .suggested_times
            .filter(|times| !times.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_REMINDER_TIME.to_string()]);
        Self {
            name: raw.name,
            dosage: raw.dosage,
            frequency: raw.frequency,
            intake_advice: raw.intake_advice,
            reminder_times: Some(reminder_times),
            safety_note: None,
            timeline_advice: None,
        }
    }
}

// ═══════════════════════════════════════════
// Calls
// ═══════════════════════════════════════════

pub fn try_suggest_medication_details(
    client: &dyn LlmClient,
    description: &str,
    profile: &UserProfile,
) -> Result<MedicationSuggestion, AiError> {
    let request = GenerateRequest::prompt(PRO_MODEL, prompt::suggestion_prompt(description, profile))
        .with_schema(prompt::suggestion_schema());
    let response = client.generate(&request)?;
    if response.text.trim().is_empty() {
        return Ok(MedicationSuggestion::default());
    }
    parse_json(&response.text)
}

/// Fill in the gaps of a free-text medication description.
/// Errors yield an empty suggestion, which leaves form defaults untouched.
pub fn suggest_medication_details(
    client: &dyn LlmClient,
    description: &str,
    profile: &UserProfile,
) -> MedicationSuggestion {
    try_suggest_medication_details(client, description, profile).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Medication suggestion failed");
        MedicationSuggestion::default()
    })
}

pub fn try_analyze_medication_image(
    client: &dyn LlmClient,
    jpeg: &[u8],
    is_prescription: bool,
) -> Result<PrescriptionAnalysis, AiError> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg);
    let content = Content {
        role: ChatRole::User,
        parts: vec![
            Part::InlineData {
                mime_type: "image/jpeg".to_string(),
                data: encoded,
            },
            Part::Text(prompt::image_prompt(is_prescription)),
        ],
    };
    let request =
        GenerateRequest::new(PRO_MODEL, vec![content]).with_schema(prompt::image_schema());
    let response = client.generate(&request)?;
    if response.text.trim().is_empty() {
        return Ok(PrescriptionAnalysis::default());
    }

    let raw: RawImageAnalysis = parse_json(&response.text)?;
    let medications = raw
        .medications
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawImageMedication>(v).ok())
        .map(MedicationSuggestion::from)
        .collect();

    Ok(PrescriptionAnalysis {
        medications,
        comprehensive_guide: raw.comprehensive_guide.filter(|g| !g.trim().is_empty()),
    })
}

/// Read medications off a JPEG photo. Errors yield an empty analysis.
pub fn analyze_medication_image(
    client: &dyn LlmClient,
    jpeg: &[u8],
    is_prescription: bool,
) -> PrescriptionAnalysis {
    try_analyze_medication_image(client, jpeg, is_prescription).unwrap_or_else(|e| {
        tracing::warn!(error = %e, is_prescription, "Image analysis failed");
        PrescriptionAnalysis::default()
    })
}

// ═══════════════════════════════════════════
// Merge
// ═══════════════════════════════════════════

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Merge a suggestion onto a form. Missing or blank fields keep the form's
/// value; an empty time list counts as missing. The safety note lands in
/// `notes`.
pub fn apply_suggestion(form: &mut Medication, suggestion: &MedicationSuggestion) {
    if let Some(name) = present(&suggestion.name) {
        form.name = name.to_string();
    }
    if let Some(dosage) = present(&suggestion.dosage) {
        form.dosage = dosage.to_string();
    }
    if let Some(frequency) = present(&suggestion.frequency) {
        form.frequency = frequency.to_string();
    }
    if let Some(advice) = present(&suggestion.intake_advice) {
        form.intake_advice = advice.to_string();
    }
    if let Some(times) = suggestion.reminder_times.as_ref().filter(|t| !t.is_empty()) {
        form.reminder_times = times.clone();
    }
    if let Some(note) = present(&suggestion.safety_note) {
        form.notes = Some(note.to_string());
    }
}

/// A fresh draft with the suggestion merged in.
pub fn draft_from_suggestion(suggestion: &MedicationSuggestion, today: NaiveDate) -> Medication {
    let mut draft = Medication::draft(today);
    apply_suggestion(&mut draft, suggestion);
    draft
}
