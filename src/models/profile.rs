use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::Gender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub dob: NaiveDate,
    pub age: u32,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
}

impl UserProfile {
    /// First whitespace-separated token of the name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }

    /// Two history entries describe the same person.
    pub fn same_person(&self, other: &UserProfile) -> bool {
        self.name.trim().eq_ignore_ascii_case(other.name.trim()) && self.dob == other.dob
    }
}
