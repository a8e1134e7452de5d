//! Prompt text, response schemas and tool declarations sent to the model.

use serde_json::{json, Value};

use super::types::FunctionDeclaration;
use crate::models::{GuideFormat, Medication, UserProfile};

pub const SET_REMINDER_TOOL: &str = "set_medication_reminder";
pub const CREATE_GUIDE_TOOL: &str = "create_medication_guide";

/// `Name (dosage)` pairs joined by commas.
pub fn medication_list(medications: &[Medication]) -> String {
    medications
        .iter()
        .map(|m| format!("{} ({})", m.name, m.dosage))
        .collect::<Vec<_>>()
        .join(", ")
}

// ═══════════════════════════════════════════
// Interaction check
// ═══════════════════════════════════════════

pub fn interaction_prompt(medications: &[Medication]) -> String {
    format!(
        "Check interactions for: {}. Return JSON.",
        medication_list(medications)
    )
}

pub fn interaction_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "severity": { "type": "STRING" },
                "drugs": { "type": "ARRAY", "items": { "type": "STRING" } },
                "description": { "type": "STRING" },
                "recommendation": { "type": "STRING" }
            }
        }
    })
}

// ═══════════════════════════════════════════
// Suggestion & image analysis
// ═══════════════════════════════════════════

pub fn suggestion_prompt(description: &str, profile: &UserProfile) -> String {
    format!(
        "User description: \"{description}\". User Profile: Age {}, Gender {}.\n\
         Act as \"Jane & May\", specialized medical AI assistants. Your job is to fill in the gaps for the user.\n\
         1. Identify the Medication & Dosage from the description.\n\
         2. Create a medication timeline (e.g., \"Take at 8:00 AM with Breakfast\").\n\
         3. Tell the user if this is generally appropriate for them or if they should be cautious based on their profile.\n\
         4. Specify meal association clearly in intakeAdvice: Breakfast, Lunch, or Dinner.\n\
         Return JSON.",
        profile.age, profile.gender
    )
}

pub fn suggestion_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "dosage": { "type": "STRING" },
            "frequency": { "type": "STRING" },
            "intakeAdvice": { "type": "STRING" },
            "reminderTimes": { "type": "ARRAY", "items": { "type": "STRING" } },
            "safetyNote": { "type": "STRING" },
            "timelineAdvice": { "type": "STRING" }
        }
    })
}

pub fn image_prompt(is_prescription: bool) -> String {
    let subject = if is_prescription {
        "prescription"
    } else {
        "medication"
    };
    format!(
        "Analyze this {subject} image. Extract medications with dosage, frequency, suggested HH:MM times, \
         and intake advice (specifically if it should be with Breakfast, Lunch, or Dinner). Return JSON."
    )
}

pub fn image_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "medications": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "dosage": { "type": "STRING" },
                        "frequency": { "type": "STRING" },
                        "intakeAdvice": { "type": "STRING" },
                        "suggestedTimes": { "type": "ARRAY", "items": { "type": "STRING" } }
                    }
                }
            },
            "comprehensiveGuide": { "type": "STRING" }
        }
    })
}

// ═══════════════════════════════════════════
// Assistant
// ═══════════════════════════════════════════

/// System instruction giving the assistant the profile and cabinet.
pub fn assistant_system_instruction(profile: &UserProfile, medications: &[Medication]) -> String {
    let cabinet = if medications.is_empty() {
        "None.".to_string()
    } else {
        medications
            .iter()
            .map(|m| format!("- {} ({}): {}", m.name, m.dosage, m.intake_advice))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are Vitara Health Assistant, an expert medical intelligence.\n\
         You have FULL ACCESS to the user's profile and current medications.\n\
         \n\
         User Profile:\n\
         - Name: {}\n\
         - Age: {}\n\
         - Gender: {}\n\
         \n\
         Current Cabinet:\n\
         {cabinet}\n\
         \n\
         If the user asks to \"set a reminder\", use the {SET_REMINDER_TOOL} tool.\n\
         If the user asks for a \"medication guide\" or \"summary\", use the {CREATE_GUIDE_TOOL} tool.",
        profile.name, profile.age, profile.gender
    )
}

pub fn assistant_tools() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: CREATE_GUIDE_TOOL.to_string(),
            description: "Generates a comprehensive summary and guide for all current medications."
                .to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "includeInteractions": {
                        "type": "BOOLEAN",
                        "description": "Whether to include detailed drug interaction safety checks."
                    },
                    "format": {
                        "type": "STRING",
                        "description": "The desired format: \"summary\" or \"detailed\"."
                    }
                },
                "required": ["includeInteractions", "format"]
            }),
        },
        FunctionDeclaration {
            name: SET_REMINDER_TOOL.to_string(),
            description: "Sets a new medication reminder or adjusts an existing one.".to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "name": { "type": "STRING", "description": "Name of the medication" },
                    "dosage": { "type": "STRING", "description": "Dosage amount (e.g. 500mg)" },
                    "time": { "type": "STRING", "description": "Time in 24h format (e.g. 08:30)" },
                    "advice": { "type": "STRING", "description": "Instructions (e.g. \"take with food\")" }
                },
                "required": ["name", "dosage", "time"]
            }),
        },
    ]
}

// ═══════════════════════════════════════════
// Guide
// ═══════════════════════════════════════════

pub fn guide_prompt(
    profile: &UserProfile,
    medications: &[Medication],
    include_interactions: bool,
    format: GuideFormat,
) -> String {
    let mut lines = vec![format!(
        "Create a comprehensive medication guide for {} (age {}, {}).",
        profile.name, profile.age, profile.gender
    )];
    lines.push(String::from("Medications:"));
    for med in medications {
        let times = if med.reminder_times.is_empty() {
            String::from("no set time")
        } else {
            med.reminder_times.join(", ")
        };
        lines.push(format!(
            "- {} ({}), {}, at {}. Advice: {}",
            med.name, med.dosage, med.frequency, times, med.intake_advice
        ));
    }
    lines.push(match format {
        GuideFormat::Summary => String::from("Keep it to a short summary per medication."),
        GuideFormat::Detailed => {
            String::from("Give a detailed section per medication with timing, meals and precautions.")
        }
    });
    if include_interactions {
        lines.push(String::from(
            "Include a drug interaction safety section covering every pair of medications.",
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn med(name: &str, dosage: &str, advice: &str) -> Medication {
        let mut m = Medication::draft(today());
        m.name = name.into();
        m.dosage = dosage.into();
        m.intake_advice = advice.into();
        m
    }

    fn profile() -> UserProfile {
        UserProfile {
            name: "Jane Doe".into(),
            dob: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            age: 36,
            gender: Gender::Female,
            height: None,
            weight: None,
        }
    }

    #[test]
    fn interaction_prompt_lists_pairs() {
        let meds = vec![med("A", "10mg", ""), med("B", "5mg", "")];
        assert_eq!(
            interaction_prompt(&meds),
            "Check interactions for: A (10mg), B (5mg). Return JSON."
        );
    }

    #[test]
    fn suggestion_prompt_includes_profile() {
        let prompt = suggestion_prompt("blood pressure pill", &profile());
        assert!(prompt.contains("\"blood pressure pill\""));
        assert!(prompt.contains("Age 36, Gender Female"));
    }

    #[test]
    fn system_instruction_with_empty_cabinet() {
        let text = assistant_system_instruction(&profile(), &[]);
        assert!(text.contains("- Name: Jane Doe"));
        assert!(text.contains("Current Cabinet:\nNone."));
    }

    #[test]
    fn system_instruction_lists_cabinet() {
        let meds = vec![med("Aspirin", "81mg", "with Breakfast")];
        let text = assistant_system_instruction(&profile(), &meds);
        assert!(text.contains("- Aspirin (81mg): with Breakfast"));
        assert!(text.contains(SET_REMINDER_TOOL));
    }

    #[test]
    fn tools_declare_both_actions() {
        let names: Vec<String> = assistant_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec![CREATE_GUIDE_TOOL, SET_REMINDER_TOOL]);
    }

    #[test]
    fn guide_prompt_respects_options() {
        let meds = vec![med("Aspirin", "81mg", "with Breakfast")];
        let summary = guide_prompt(&profile(), &meds, false, GuideFormat::Summary);
        assert!(summary.contains("short summary"));
        assert!(!summary.contains("interaction"));

        let detailed = guide_prompt(&profile(), &meds, true, GuideFormat::Detailed);
        assert!(detailed.contains("detailed section"));
        assert!(detailed.contains("interaction safety"));
        assert!(detailed.contains("at 09:00"));
    }
}
