use super::prompt;
use super::types::{GenerateRequest, LlmClient};
use super::{AiError, PRO_MODEL};
use crate::models::{GuideFormat, Medication, UserProfile};

pub fn try_generate_medication_guide(
    client: &dyn LlmClient,
    profile: &UserProfile,
    medications: &[Medication],
    include_interactions: bool,
    format: GuideFormat,
) -> Result<String, AiError> {
    if medications.is_empty() {
        return Ok(String::new());
    }
    let request = GenerateRequest::prompt(
        PRO_MODEL,
        prompt::guide_prompt(profile, medications, include_interactions, format),
    );
    let response = client.generate(&request)?;
    Ok(response.text.trim().to_string())
}

/// Written guide covering the whole cabinet. Empty when the cabinet is
/// empty or the service fails.
pub fn generate_medication_guide(
    client: &dyn LlmClient,
    profile: &UserProfile,
    medications: &[Medication],
    include_interactions: bool,
    format: GuideFormat,
) -> String {
    try_generate_medication_guide(client, profile, medications, include_interactions, format)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Medication guide generation failed");
            String::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::client::MockLlmClient;
    use crate::models::Gender;
    use chrono::NaiveDate;

    fn profile() -> UserProfile {
        UserProfile {
            name: "Lee".into(),
            dob: NaiveDate::from_ymd_opt(1980, 8, 8).unwrap(),
            age: 46,
            gender: Gender::Other,
            height: None,
            weight: None,
        }
    }

    fn cabinet() -> Vec<Medication> {
        let mut m = Medication::draft(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        m.name = "Aspirin".into();
        m.dosage = "81mg".into();
        vec![m]
    }

    #[test]
    fn guide_text_is_returned_trimmed() {
        let mock = MockLlmClient::new("\n# Your guide\nAspirin: morning.\n");
        let guide = generate_medication_guide(&mock, &profile(), &cabinet(), true, GuideFormat::Summary);
        assert_eq!(guide, "# Your guide\nAspirin: morning.");
        assert_eq!(mock.requests()[0].model, PRO_MODEL);
    }

    #[test]
    fn empty_cabinet_skips_service() {
        let mock = MockLlmClient::new("unused");
        let guide = generate_medication_guide(&mock, &profile(), &[], false, GuideFormat::Detailed);
        assert!(guide.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn failure_yields_empty_guide() {
        let guide = generate_medication_guide(
            &MockLlmClient::failing("down"),
            &profile(),
            &cabinet(),
            false,
            GuideFormat::Summary,
        );
        assert!(guide.is_empty());
    }
}
