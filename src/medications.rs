//! Medication cabinet: the ordered, authoritative collection of medications.
//!
//! Mutations (upsert, delete, mark taken, refill, day rollover) and the
//! derived read-only views (today's schedule, meal timeline, low stock).
//! Operations addressing an unknown id are silent no-ops.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{MealLabel, Medication};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CabinetError {
    #[error("Medication {0} must not be empty")]
    MissingField(&'static str),
}

/// Whether an upsert appended a new entry or replaced one in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

// ═══════════════════════════════════════════
// View types
// ═══════════════════════════════════════════

/// One row of a meal slot in the daily timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub medication_id: String,
    pub name: String,
    pub reminder_time: Option<String>,
}

/// All medications associated with one meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSlot {
    pub meal: MealLabel,
    pub entries: Vec<TimelineEntry>,
}

// ═══════════════════════════════════════════
// MedicationStore
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct MedicationStore {
    medications: Vec<Medication>,
    current_day: Option<NaiveDate>,
}

impl MedicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted state. Out-of-range stock is clamped.
    pub fn from_saved(mut medications: Vec<Medication>, current_day: Option<NaiveDate>) -> Self {
        for med in &mut medications {
            med.clamp_stock();
        }
        Self {
            medications,
            current_day,
        }
    }

    pub fn list(&self) -> &[Medication] {
        &self.medications
    }

    pub fn len(&self) -> usize {
        self.medications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medications.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Medication> {
        self.medications.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Medication> {
        self.medications.iter_mut().find(|m| m.id == id)
    }

    pub fn current_day(&self) -> Option<NaiveDate> {
        self.current_day
    }

    /// Insert (append) or replace in place, keyed by id.
    pub fn upsert(&mut self, mut med: Medication) -> Result<UpsertOutcome, CabinetError> {
        if med.name.trim().is_empty() {
            return Err(CabinetError::MissingField("name"));
        }
        if med.dosage.trim().is_empty() {
            return Err(CabinetError::MissingField("dosage"));
        }
        med.clamp_stock();

        match self.medications.iter().position(|m| m.id == med.id) {
            Some(idx) => {
                self.medications[idx] = med;
                Ok(UpsertOutcome::Replaced)
            }
            None => {
                self.medications.push(med);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.medications.len();
        self.medications.retain(|m| m.id != id);
        self.medications.len() != before
    }

    /// Record a dose: flag as taken today and take one pill from stock.
    ///
    /// Repeated calls keep decrementing stock (floored at 0), matching the
    /// behaviour of earlier releases.
    pub fn mark_taken(&mut self, id: &str) -> Option<&Medication> {
        let med = self.get_mut(id)?;
        med.taken_today = true;
        med.remaining_pills = med.remaining_pills.saturating_sub(1);
        Some(med)
    }

    /// Restore stock to a full pack.
    pub fn refill(&mut self, id: &str) -> Option<&Medication> {
        let med = self.get_mut(id)?;
        med.remaining_pills = med.total_pills;
        Some(med)
    }

    /// Stamp the day a reminder was delivered for a medication.
    pub fn mark_reminder_sent(&mut self, id: &str, day: NaiveDate) -> bool {
        match self.get_mut(id) {
            Some(med) => {
                med.last_reminder_sent = Some(day);
                true
            }
            None => false,
        }
    }

    /// Advance to `today`, clearing every `taken_today` flag if the day changed.
    ///
    /// Returns the ids that had reminder times but were never taken on the
    /// day being closed. The first call (no day recorded yet) only records
    /// the day and keeps the flags as loaded.
    pub fn roll_over_day(&mut self, today: NaiveDate) -> Vec<String> {
        match self.current_day {
            Some(day) if day >= today => return Vec::new(),
            None => {
                self.current_day = Some(today);
                return Vec::new();
            }
            Some(_) => {}
        }

        let missed = self
            .medications
            .iter()
            .filter(|m| !m.taken_today && !m.reminder_times.is_empty())
            .map(|m| m.id.clone())
            .collect();

        for med in &mut self.medications {
            med.taken_today = false;
        }
        self.current_day = Some(today);
        missed
    }

    /// Medications still due today.
    pub fn daily_schedule(&self) -> Vec<&Medication> {
        self.medications.iter().filter(|m| !m.taken_today).collect()
    }

    /// Medications whose intake advice mentions the meal.
    pub fn timeline(&self, meal: MealLabel) -> Vec<&Medication> {
        self.medications
            .iter()
            .filter(|m| m.matches_meal(meal))
            .collect()
    }

    /// Breakfast, lunch and dinner slots, in that order.
    pub fn daily_timeline(&self) -> Vec<TimelineSlot> {
        MealLabel::all()
            .iter()
            .map(|meal| TimelineSlot {
                meal: *meal,
                entries: self
                    .timeline(*meal)
                    .into_iter()
                    .map(|m| TimelineEntry {
                        medication_id: m.id.clone(),
                        name: m.name.clone(),
                        reminder_time: m.first_reminder().map(str::to_string),
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn low_stock(&self) -> Vec<&Medication> {
        self.medications.iter().filter(|m| m.is_low_stock()).collect()
    }

    pub fn clear(&mut self) {
        self.medications.clear();
        self.current_day = None;
    }
}

/// `remaining / total < 20%`.
pub fn low_stock_flag(med: &Medication) -> bool {
    med.is_low_stock()
}
