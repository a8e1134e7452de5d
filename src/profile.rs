//! Profile onboarding: age derivation, input validation and the history
//! of previously used profiles.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use thiserror::Error;

use crate::models::{Gender, UserProfile};

pub const MIN_AGE: i32 = 12;
pub const MAX_AGE: i32 = 100;

static NAME_DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z\s]").unwrap());

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Please enter your name.")]
    EmptyName,

    #[error("You must be at least 12 years old to use Vitara.")]
    TooYoung,

    #[error("Please enter a valid birth year (limit 100 years).")]
    TooOld,

    #[error("No saved profile at position {0}.")]
    UnknownHistoryEntry(usize),
}

/// Raw onboarding form values.
#[derive(Debug, Clone)]
pub struct OnboardingInput {
    pub name: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    pub height: Option<String>,
    pub weight: Option<String>,
}

/// Whole years between `dob` and `today`, minus one if the birthday has
/// not come yet this year. Negative for future dates.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

/// Keep letters and whitespace only.
pub fn sanitize_name(raw: &str) -> String {
    NAME_DISALLOWED.replace_all(raw, "").into_owned()
}

/// Validate the onboarding form and build the profile.
pub fn complete_onboarding(
    input: OnboardingInput,
    today: NaiveDate,
) -> Result<UserProfile, ProfileError> {
    let name = sanitize_name(&input.name).trim().to_string();
    if name.is_empty() {
        return Err(ProfileError::EmptyName);
    }

    let age = age_on(input.dob, today);
    if age < MIN_AGE {
        return Err(ProfileError::TooYoung);
    }
    if age > MAX_AGE {
        return Err(ProfileError::TooOld);
    }

    Ok(UserProfile {
        name,
        dob: input.dob,
        age: age as u32,
        gender: input.gender,
        height: non_blank(input.height),
        weight: non_blank(input.weight),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Greeting for the hour of day (0-23).
pub fn greeting_for_hour(hour: u32) -> &'static str {
    if hour < 12 {
        "Good Morning"
    } else if hour < 18 {
        "Good Afternoon"
    } else {
        "Good Evening"
    }
}

/// Put `profile` at the front of the history, dropping older entries for
/// the same person.
pub fn remember_profile(history: &mut Vec<UserProfile>, profile: &UserProfile) {
    history.retain(|p| !p.same_person(profile));
    history.insert(0, profile.clone());
}

/// Re-activate a saved profile, refreshing its age for `today`.
pub fn select_from_history(
    history: &[UserProfile],
    index: usize,
    today: NaiveDate,
) -> Result<UserProfile, ProfileError> {
    let mut profile = history
        .get(index)
        .cloned()
        .ok_or(ProfileError::UnknownHistoryEntry(index))?;
    profile.age = age_on(profile.dob, today).max(0) as u32;
    Ok(profile)
}
