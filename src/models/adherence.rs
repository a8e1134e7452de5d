use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AdherenceStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdherenceEntry {
    pub id: Uuid,
    pub medication_id: String,
    pub timestamp: NaiveDateTime,
    pub status: AdherenceStatus,
}

impl AdherenceEntry {
    pub fn new(medication_id: &str, timestamp: NaiveDateTime, status: AdherenceStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            medication_id: medication_id.to_string(),
            timestamp,
            status,
        }
    }
}

/// Counts of logged outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdherenceSummary {
    pub taken: usize,
    pub skipped: usize,
    pub missed: usize,
}

impl AdherenceSummary {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a AdherenceEntry>) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry.status {
                AdherenceStatus::Taken => summary.taken += 1,
                AdherenceStatus::Skipped => summary.skipped += 1,
                AdherenceStatus::Missed => summary.missed += 1,
            }
        }
        summary
    }

    /// Share of doses taken, as a whole percentage. `None` before any entry.
    pub fn taken_percent(&self) -> Option<u32> {
        let total = self.taken + self.skipped + self.missed;
        if total == 0 {
            return None;
        }
        Some(((self.taken as f64 / total as f64) * 100.0).round() as u32)
    }
}
