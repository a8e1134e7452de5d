use serde::Deserialize;

use super::parser::parse_array_lenient;
use super::prompt;
use super::types::{GenerateRequest, LlmClient};
use super::{AiError, PRO_MODEL};
use crate::models::{AlertSeverity, InteractionAlert, Medication};

/// Alert as the model writes it. Every field is optional so one sloppy
/// item does not sink the whole response.
#[derive(Debug, Deserialize)]
struct RawAlert {
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    drugs: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    recommendation: Option<String>,
}

impl RawAlert {
    fn into_alert(self) -> Option<InteractionAlert> {
        let description = self.description.unwrap_or_default().trim().to_string();
        if description.is_empty() && self.drugs.is_empty() {
            return None;
        }
        Some(InteractionAlert {
            severity: self
                .severity
                .as_deref()
                .and_then(AlertSeverity::parse_lenient)
                .unwrap_or(AlertSeverity::Medium),
            drugs: self.drugs,
            description,
            recommendation: self.recommendation.unwrap_or_default().trim().to_string(),
        })
    }
}

/// Ask the model for interactions among the cabinet entries.
///
/// Fewer than two medications never reaches the service.
pub fn try_check_interactions(
    client: &dyn LlmClient,
    medications: &[Medication],
) -> Result<Vec<InteractionAlert>, AiError> {
    if medications.len() < 2 {
        return Ok(Vec::new());
    }

    let request = GenerateRequest::prompt(PRO_MODEL, prompt::interaction_prompt(medications))
        .with_schema(prompt::interaction_schema());
    let response = client.generate(&request)?;

    if response.text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let raw: Vec<RawAlert> = parse_array_lenient(&response.text)?;
    let mut alerts: Vec<InteractionAlert> = raw.into_iter().filter_map(RawAlert::into_alert).collect();
    alerts.sort_by_key(|a| std::cmp::Reverse(a.severity.rank()));
    Ok(alerts)
}

/// Interaction check that never fails: errors yield no alerts.
pub fn check_interactions(
    client: &dyn LlmClient,
    medications: &[Medication],
) -> Vec<InteractionAlert> {
    match try_check_interactions(client, medications) {
        Ok(alerts) => {
            tracing::debug!(count = alerts.len(), "Interaction check complete");
            alerts
        }
        Err(e) => {
            tracing::warn!(error = %e, "Interaction check failed, showing no alerts");
            Vec::new()
        }
    }
}
