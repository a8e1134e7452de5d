use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{MealLabel, TimeOfDay};
use crate::config::LOW_STOCK_THRESHOLD;

pub const DEFAULT_FREQUENCY: &str = "Once Daily";
pub const DEFAULT_REMINDER_TIME: &str = "09:00";
pub const DEFAULT_COLOR: &str = "#4f46e5";
pub const DEFAULT_PILL_COUNT: u32 = 30;

/// One entry of the cabinet.
///
/// Field names serialize in camelCase so a cabinet saved by earlier
/// releases loads unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(default)]
    pub time_of_day: Vec<TimeOfDay>,
    /// `HH:MM` clock times, in display order.
    #[serde(default)]
    pub reminder_times: Vec<String>,
    #[serde(default)]
    pub intake_advice: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub remaining_pills: u32,
    pub total_pills: u32,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub taken_today: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reminder_sent: Option<NaiveDate>,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

/// Fresh opaque identifier for a new cabinet entry.
pub fn new_medication_id() -> String {
    Uuid::new_v4().simple().to_string()
}

impl Medication {
    /// The pre-filled form a new medication starts from.
    pub fn draft(today: NaiveDate) -> Self {
        Self {
            id: new_medication_id(),
            name: String::new(),
            dosage: String::new(),
            frequency: DEFAULT_FREQUENCY.to_string(),
            time_of_day: vec![TimeOfDay::Morning],
            reminder_times: vec![DEFAULT_REMINDER_TIME.to_string()],
            intake_advice: String::new(),
            color: default_color(),
            notes: None,
            remaining_pills: DEFAULT_PILL_COUNT,
            total_pills: DEFAULT_PILL_COUNT,
            start_date: today,
            taken_today: false,
            last_reminder_sent: None,
        }
    }

    /// `remaining / total`. An empty pack (total 0) counts as fully depleted.
    pub fn stock_ratio(&self) -> f64 {
        if self.total_pills == 0 {
            return 0.0;
        }
        f64::from(self.remaining_pills) / f64::from(self.total_pills)
    }

    /// Stock level as a whole percentage, for display.
    pub fn stock_percent(&self) -> u32 {
        (self.stock_ratio() * 100.0).round() as u32
    }

    /// Strictly below the threshold; exactly 20% is not low.
    pub fn is_low_stock(&self) -> bool {
        self.stock_ratio() < LOW_STOCK_THRESHOLD
    }

    /// Whether the intake advice mentions the meal, ignoring case.
    pub fn matches_meal(&self, meal: MealLabel) -> bool {
        self.intake_advice
            .to_lowercase()
            .contains(&meal.as_str().to_lowercase())
    }

    /// First reminder time, if any.
    pub fn first_reminder(&self) -> Option<&str> {
        self.reminder_times.first().map(String::as_str)
    }

    /// Clamp `remaining_pills` into `[0, total_pills]`.
    pub fn clamp_stock(&mut self) {
        self.remaining_pills = self.remaining_pills.min(self.total_pills);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn with_stock(remaining: u32, total: u32) -> Medication {
        let mut med = Medication::draft(today());
        med.remaining_pills = remaining;
        med.total_pills = total;
        med
    }

    #[test]
    fn draft_uses_form_defaults() {
        let med = Medication::draft(today());
        assert_eq!(med.frequency, "Once Daily");
        assert_eq!(med.reminder_times, vec!["09:00".to_string()]);
        assert_eq!(med.time_of_day, vec![TimeOfDay::Morning]);
        assert_eq!(med.color, "#4f46e5");
        assert_eq!(med.remaining_pills, 30);
        assert_eq!(med.total_pills, 30);
        assert_eq!(med.start_date, today());
        assert!(!med.taken_today);
        assert!(!med.id.is_empty());
    }

    #[test]
    fn drafts_get_distinct_ids() {
        assert_ne!(Medication::draft(today()).id, Medication::draft(today()).id);
    }

    #[test]
    fn low_stock_boundary_is_exclusive() {
        assert!(!with_stock(6, 30).is_low_stock()); // exactly 20%
        assert!(with_stock(5, 30).is_low_stock());
        assert!(!with_stock(2, 10).is_low_stock());
        assert!(with_stock(1, 10).is_low_stock());
    }

    #[test]
    fn empty_pack_is_low_stock() {
        assert!(with_stock(0, 0).is_low_stock());
        assert_eq!(with_stock(0, 0).stock_percent(), 0);
    }

    #[test]
    fn stock_percent_rounds() {
        assert_eq!(with_stock(10, 30).stock_percent(), 33);
        assert_eq!(with_stock(30, 30).stock_percent(), 100);
    }

    #[test]
    fn meal_match_is_case_insensitive() {
        let mut med = Medication::draft(today());
        med.intake_advice = "Take with food after BREAKFAST".into();
        assert!(med.matches_meal(MealLabel::Breakfast));
        assert!(!med.matches_meal(MealLabel::Dinner));
    }

    #[test]
    fn clamp_stock_caps_at_total() {
        let mut med = with_stock(40, 30);
        med.clamp_stock();
        assert_eq!(med.remaining_pills, 30);
    }

    #[test]
    fn deserializes_camel_case_without_optional_fields() {
        let json = r##"{
            "id": "abc123",
            "name": "Aspirin",
            "dosage": "81mg",
            "frequency": "Once Daily",
            "timeOfDay": ["Morning"],
            "reminderTimes": ["08:00", "20:00"],
            "intakeAdvice": "After breakfast",
            "color": "#ff0000",
            "remainingPills": 12,
            "totalPills": 30,
            "startDate": "2026-01-02"
        }"##;
        let med: Medication = serde_json::from_str(json).unwrap();
        assert_eq!(med.reminder_times.len(), 2);
        assert!(!med.taken_today);
        assert!(med.notes.is_none());
        assert!(med.last_reminder_sent.is_none());

        let out = serde_json::to_string(&med).unwrap();
        assert!(out.contains("\"remainingPills\":12"));
        assert!(!out.contains("lastReminderSent"));
    }
}
