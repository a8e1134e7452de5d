//! Reminder delivery: due-time detection and the active-reminder slot.
//!
//! State machine: `Idle → Pending(med) → {Acknowledged | Dismissed}`.
//! One reminder occupies the Pending slot at a time; reminders that come due
//! while the slot is busy wait in a FIFO queue (one entry per medication)
//! and are promoted when the active one resolves.

pub mod scheduler;

use std::collections::VecDeque;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::Medication;

static REMINDER_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([01]?\d|2[0-3]):([0-5]\d)\s*$").unwrap());

/// Parse a `HH:MM` reminder time. Anything else is ignored by the scheduler.
pub fn parse_reminder_time(raw: &str) -> Option<NaiveTime> {
    let caps = REMINDER_TIME.captures(raw)?;
    let hour = caps[1].parse().ok()?;
    let minute = caps[2].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

// ═══════════════════════════════════════════
// Types
// ═══════════════════════════════════════════

/// A reminder that has been delivered (or is waiting to be).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveReminder {
    pub medication_id: String,
    pub name: String,
    pub dosage: String,
    pub intake_advice: String,
    pub scheduled_time: String,
    pub triggered_at: NaiveDateTime,
}

impl ActiveReminder {
    pub fn for_medication(med: &Medication, scheduled_time: &str, now: NaiveDateTime) -> Self {
        Self {
            medication_id: med.id.clone(),
            name: med.name.clone(),
            dosage: med.dosage.clone(),
            intake_advice: med.intake_advice.clone(),
            scheduled_time: scheduled_time.to_string(),
            triggered_at: now,
        }
    }

    /// Spoken announcement played when the reminder appears.
    pub fn announcement(&self) -> String {
        format!(
            "Hi, it's Vitara. It's time for your {}. {}. I'll stay here until you take it.",
            self.name, self.intake_advice
        )
    }

    /// Short text-message style notice.
    pub fn text_notice(&self) -> String {
        format!("Time for your {}. Open Vitara to confirm.", self.name)
    }

    /// Advice shown on the reminder card.
    pub fn display_advice(&self) -> &str {
        if self.intake_advice.trim().is_empty() {
            "Please take your medication as scheduled."
        } else {
            &self.intake_advice
        }
    }
}

/// Observable state of the reminder slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ReminderState<'a> {
    Idle,
    Pending(&'a ActiveReminder),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderOutcome {
    /// User confirmed intake; the caller records the dose.
    Acknowledged,
    /// User closed the reminder; the medication stays due.
    Dismissed,
}

/// Result of resolving the Pending reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderResolution {
    pub reminder: ActiveReminder,
    pub outcome: ReminderOutcome,
    /// Reminder promoted from the queue into the Pending slot, if any.
    pub next: Option<ActiveReminder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Slot was Idle; the reminder is now Pending.
    Activated,
    /// Slot was busy; the reminder waits its turn.
    Queued,
    /// This medication already has a pending or queued reminder.
    Duplicate,
}

// ═══════════════════════════════════════════
// ReminderQueue
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ReminderQueue {
    active: Option<ActiveReminder>,
    waiting: VecDeque<ActiveReminder>,
}

impl ReminderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReminderState<'_> {
        match &self.active {
            Some(reminder) => ReminderState::Pending(reminder),
            None => ReminderState::Idle,
        }
    }

    pub fn active(&self) -> Option<&ActiveReminder> {
        self.active.as_ref()
    }

    pub fn waiting(&self) -> impl Iterator<Item = &ActiveReminder> {
        self.waiting.iter()
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    fn contains(&self, medication_id: &str) -> bool {
        self.active
            .iter()
            .chain(self.waiting.iter())
            .any(|r| r.medication_id == medication_id)
    }

    /// Enter Pending for a medication, or queue behind the active one.
    pub fn trigger(&mut self, reminder: ActiveReminder) -> TriggerOutcome {
        if self.contains(&reminder.medication_id) {
            return TriggerOutcome::Duplicate;
        }
        if self.active.is_none() {
            self.active = Some(reminder);
            TriggerOutcome::Activated
        } else {
            self.waiting.push_back(reminder);
            TriggerOutcome::Queued
        }
    }

    /// Pending → Acknowledged. No-op when Idle.
    pub fn acknowledge(&mut self) -> Option<ReminderResolution> {
        self.resolve(ReminderOutcome::Acknowledged)
    }

    /// Pending → Dismissed → Idle (or the next queued reminder). No-op when Idle.
    pub fn dismiss(&mut self) -> Option<ReminderResolution> {
        self.resolve(ReminderOutcome::Dismissed)
    }

    fn resolve(&mut self, outcome: ReminderOutcome) -> Option<ReminderResolution> {
        let reminder = self.active.take()?;
        self.active = self.waiting.pop_front();
        Some(ReminderResolution {
            reminder,
            outcome,
            next: self.active.clone(),
        })
    }

    /// Drop every reminder for a medication (taken elsewhere, or deleted).
    /// Returns the reminder promoted into the slot when the active one was removed.
    pub fn discard(&mut self, medication_id: &str) -> Option<&ActiveReminder> {
        self.waiting.retain(|r| r.medication_id != medication_id);
        let active_removed = self
            .active
            .as_ref()
            .is_some_and(|r| r.medication_id == medication_id);
        if active_removed {
            self.active = self.waiting.pop_front();
            return self.active.as_ref();
        }
        None
    }

    /// Drop reminders delivered before `day`. A stale active reminder is
    /// replaced by the oldest remaining one. Returns the dropped reminders.
    pub fn expire_before(&mut self, day: NaiveDate) -> Vec<ActiveReminder> {
        let mut expired = Vec::new();
        if self
            .active
            .as_ref()
            .is_some_and(|r| r.triggered_at.date() < day)
        {
            expired.extend(self.active.take());
        }
        let (stale, fresh): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut self.waiting)
            .into_iter()
            .partition(|r| r.triggered_at.date() < day);
        expired.extend(stale);
        self.waiting = fresh;
        if self.active.is_none() {
            self.active = self.waiting.pop_front();
        }
        expired
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.waiting.clear();
    }
}

// ═══════════════════════════════════════════
// Due detection
// ═══════════════════════════════════════════

/// A medication whose reminder time has arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct DueReminder {
    pub medication_id: String,
    pub scheduled_time: String,
}

/// Medications due at `now`: not taken today, not yet reminded today, and
/// with at least one reminder time at or before the current clock time.
///
/// The latest elapsed reminder time is reported for each medication.
pub fn due_reminders(medications: &[Medication], now: NaiveDateTime) -> Vec<DueReminder> {
    let today = now.date();
    let clock = now.time();

    medications
        .iter()
        .filter(|m| !m.taken_today)
        .filter(|m| m.last_reminder_sent != Some(today))
        .filter_map(|m| {
            let latest = m
                .reminder_times
                .iter()
                .filter_map(|raw| parse_reminder_time(raw).map(|t| (t, raw)))
                .filter(|(t, _)| *t <= clock)
                .max_by_key(|(t, _)| *t)?;
            Some(DueReminder {
                medication_id: m.id.clone(),
                scheduled_time: latest.1.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn med(id: &str, times: &[&str]) -> Medication {
        let mut m = Medication::draft(at(0, 0).date());
        m.id = id.into();
        m.name = format!("Med {id}");
        m.dosage = "5mg".into();
        m.reminder_times = times.iter().map(|t| t.to_string()).collect();
        m
    }

    fn reminder(id: &str) -> ActiveReminder {
        ActiveReminder::for_medication(&med(id, &["08:00"]), "08:00", at(8, 0))
    }

    #[test]
    fn parses_valid_times() {
        assert_eq!(parse_reminder_time("08:30"), NaiveTime::from_hms_opt(8, 30, 0));
        assert_eq!(parse_reminder_time("7:05"), NaiveTime::from_hms_opt(7, 5, 0));
        assert_eq!(parse_reminder_time(" 23:59 "), NaiveTime::from_hms_opt(23, 59, 0));
    }

    #[test]
    fn rejects_invalid_times() {
        for raw in ["24:00", "12:60", "noon", "", "8", "08:5"] {
            assert!(parse_reminder_time(raw).is_none(), "{raw} should not parse");
        }
    }

    #[test]
    fn idle_to_pending_to_acknowledged() {
        let mut queue = ReminderQueue::new();
        assert_eq!(queue.state(), ReminderState::Idle);

        assert_eq!(queue.trigger(reminder("a")), TriggerOutcome::Activated);
        assert!(matches!(queue.state(), ReminderState::Pending(r) if r.medication_id == "a"));

        let resolution = queue.acknowledge().unwrap();
        assert_eq!(resolution.outcome, ReminderOutcome::Acknowledged);
        assert_eq!(resolution.reminder.medication_id, "a");
        assert!(resolution.next.is_none());
        assert_eq!(queue.state(), ReminderState::Idle);
    }

    #[test]
    fn dismiss_returns_to_idle() {
        let mut queue = ReminderQueue::new();
        queue.trigger(reminder("a"));
        let resolution = queue.dismiss().unwrap();
        assert_eq!(resolution.outcome, ReminderOutcome::Dismissed);
        assert_eq!(queue.state(), ReminderState::Idle);
    }

    #[test]
    fn resolving_idle_is_no_op() {
        let mut queue = ReminderQueue::new();
        assert!(queue.acknowledge().is_none());
        assert!(queue.dismiss().is_none());
    }

    #[test]
    fn overlapping_reminders_queue_in_order() {
        let mut queue = ReminderQueue::new();
        assert_eq!(queue.trigger(reminder("a")), TriggerOutcome::Activated);
        assert_eq!(queue.trigger(reminder("b")), TriggerOutcome::Queued);
        assert_eq!(queue.trigger(reminder("c")), TriggerOutcome::Queued);
        assert_eq!(queue.waiting_len(), 2);

        let first = queue.dismiss().unwrap();
        assert_eq!(first.next.unwrap().medication_id, "b");
        let second = queue.acknowledge().unwrap();
        assert_eq!(second.reminder.medication_id, "b");
        assert_eq!(second.next.unwrap().medication_id, "c");
    }

    #[test]
    fn same_medication_is_not_queued_twice() {
        let mut queue = ReminderQueue::new();
        queue.trigger(reminder("a"));
        queue.trigger(reminder("b"));
        assert_eq!(queue.trigger(reminder("a")), TriggerOutcome::Duplicate);
        assert_eq!(queue.trigger(reminder("b")), TriggerOutcome::Duplicate);
        assert_eq!(queue.waiting_len(), 1);
    }

    #[test]
    fn discard_active_promotes_next() {
        let mut queue = ReminderQueue::new();
        queue.trigger(reminder("a"));
        queue.trigger(reminder("b"));
        let promoted = queue.discard("a").unwrap();
        assert_eq!(promoted.medication_id, "b");
        assert_eq!(queue.waiting_len(), 0);
    }

    #[test]
    fn expire_drops_previous_day_reminders() {
        let mut queue = ReminderQueue::new();
        queue.trigger(reminder("a"));
        queue.trigger(reminder("b"));
        let next_day = at(0, 0).date().succ_opt().unwrap();
        let late = ActiveReminder::for_medication(
            &med("c", &["00:05"]),
            "00:05",
            next_day.and_hms_opt(0, 5, 0).unwrap(),
        );
        queue.trigger(late);

        let expired = queue.expire_before(next_day);
        let ids: Vec<_> = expired.iter().map(|r| r.medication_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(queue.active().unwrap().medication_id, "c");
        assert_eq!(queue.waiting_len(), 0);
    }

    #[test]
    fn expire_keeps_same_day_reminders() {
        let mut queue = ReminderQueue::new();
        queue.trigger(reminder("a"));
        assert!(queue.expire_before(at(0, 0).date()).is_empty());
        assert_eq!(queue.active().unwrap().medication_id, "a");
    }

    #[test]
    fn discard_waiting_keeps_active() {
        let mut queue = ReminderQueue::new();
        queue.trigger(reminder("a"));
        queue.trigger(reminder("b"));
        assert!(queue.discard("b").is_none());
        assert_eq!(queue.active().unwrap().medication_id, "a");
        assert_eq!(queue.waiting_len(), 0);
    }

    #[test]
    fn due_reports_latest_elapsed_time() {
        let meds = vec![med("a", &["08:00", "12:00", "20:00"])];
        let due = due_reminders(&meds, at(13, 0));
        assert_eq!(
            due,
            vec![DueReminder {
                medication_id: "a".into(),
                scheduled_time: "12:00".into()
            }]
        );
    }

    #[test]
    fn not_due_before_first_time() {
        let meds = vec![med("a", &["08:00"])];
        assert!(due_reminders(&meds, at(7, 59)).is_empty());
        assert_eq!(due_reminders(&meds, at(8, 0)).len(), 1);
    }

    #[test]
    fn taken_or_already_reminded_is_not_due() {
        let mut taken = med("a", &["08:00"]);
        taken.taken_today = true;
        let mut reminded = med("b", &["08:00"]);
        reminded.last_reminder_sent = Some(at(0, 0).date());
        let mut reminded_yesterday = med("c", &["08:00"]);
        reminded_yesterday.last_reminder_sent = at(0, 0).date().pred_opt();

        let due = due_reminders(&[taken, reminded, reminded_yesterday], at(9, 0));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].medication_id, "c");
    }

    #[test]
    fn malformed_times_are_skipped() {
        let meds = vec![med("a", &["soon", "later"]), med("b", &[])];
        assert!(due_reminders(&meds, at(23, 0)).is_empty());
    }

    #[test]
    fn announcement_texts() {
        let mut m = med("a", &["08:00"]);
        m.name = "Aspirin".into();
        m.intake_advice = "Take with breakfast".into();
        let r = ActiveReminder::for_medication(&m, "08:00", at(8, 0));
        assert_eq!(
            r.announcement(),
            "Hi, it's Vitara. It's time for your Aspirin. Take with breakfast. I'll stay here until you take it."
        );
        assert_eq!(r.text_notice(), "Time for your Aspirin. Open Vitara to confirm.");
        assert_eq!(r.display_advice(), "Take with breakfast");
    }

    #[test]
    fn empty_advice_falls_back_on_card() {
        let r = reminder("a");
        assert_eq!(r.display_advice(), "Please take your medication as scheduled.");
    }
}
