//! Application state shared by the binary, the reminder scheduler and any
//! front end.
//!
//! `CoreState` owns the cabinet, the active profile and its history, the
//! reminder slot, the latest interaction alerts and the adherence log.
//! Every mutation is written through to the key-value store before the
//! call returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::config;
use crate::intelligence::{
    self, AssistantAction, AssistantContext, AssistantOptions, AssistantReply, LlmClient,
    PrescriptionAnalysis,
};
use crate::medications::{CabinetError, MedicationStore, UpsertOutcome};
use crate::models::{
    AdherenceEntry, AdherenceStatus, AdherenceSummary, ChatMessage, InteractionAlert, Medication,
    UserProfile,
};
use crate::profile::{self, OnboardingInput, ProfileError};
use crate::reminder::{
    due_reminders, ActiveReminder, ReminderQueue, ReminderResolution, TriggerOutcome,
};
use crate::storage::{self, KeyValueStore, StorageError};

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Cabinet(#[from] CabinetError),
    #[error("{0}")]
    Profile(#[from] ProfileError),
    #[error("No active profile")]
    NoProfile,
    #[error("Another request is still in progress")]
    Busy,
}

// ═══════════════════════════════════════════════════════════
// Results
// ═══════════════════════════════════════════════════════════

/// What one scheduler tick changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Medications closed out as missed by a day rollover.
    pub missed: Vec<String>,
    /// Reminders that became Pending or joined the queue.
    pub delivered: Vec<ActiveReminder>,
}

/// Assistant reply plus the results of any actions it requested.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantOutcome {
    pub reply: AssistantReply,
    /// Pre-filled forms awaiting the user's confirmation before upsert.
    pub drafts: Vec<Medication>,
    pub guide: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    store: Mutex<Box<dyn KeyValueStore>>,
    cabinet: RwLock<MedicationStore>,
    profile: RwLock<Option<UserProfile>>,
    profile_history: RwLock<Vec<UserProfile>>,
    reminders: Mutex<ReminderQueue>,
    alerts: RwLock<Vec<InteractionAlert>>,
    /// Bumped on every cabinet change; a check started under an older
    /// generation is discarded.
    cabinet_generation: AtomicU64,
    /// Cabinet generation the current alerts were computed for.
    alerts_generation: AtomicU64,
    adherence: Mutex<Vec<AdherenceEntry>>,
    /// Held for the duration of one AI submission.
    submission: Mutex<()>,
}

impl CoreState {
    /// Read all saved state once and close out any days that passed while
    /// the app was not running.
    pub fn load(store: Box<dyn KeyValueStore>, now: NaiveDateTime) -> Result<Self, CoreError> {
        let medications = storage::load_medications(store.as_ref());
        let current_day = storage::load_current_day(store.as_ref());
        let profile = storage::load_profile(store.as_ref());
        let profile_history = storage::load_profile_history(store.as_ref());
        let adherence = storage::load_adherence_log(store.as_ref());

        tracing::info!(
            medications = medications.len(),
            has_profile = profile.is_some(),
            "Loaded saved state"
        );

        let state = Self {
            store: Mutex::new(store),
            cabinet: RwLock::new(MedicationStore::from_saved(medications, current_day)),
            profile: RwLock::new(profile),
            profile_history: RwLock::new(profile_history),
            reminders: Mutex::new(ReminderQueue::new()),
            alerts: RwLock::new(Vec::new()),
            cabinet_generation: AtomicU64::new(0),
            alerts_generation: AtomicU64::new(0),
            adherence: Mutex::new(adherence),
            submission: Mutex::new(()),
        };
        state.roll_over(now)?;
        Ok(state)
    }

    // ── Lock helpers ────────────────────────────────────────

    fn read_cabinet(&self) -> Result<RwLockReadGuard<'_, MedicationStore>, CoreError> {
        self.cabinet.read().map_err(|_| CoreError::LockPoisoned)
    }

    fn write_cabinet(&self) -> Result<RwLockWriteGuard<'_, MedicationStore>, CoreError> {
        self.cabinet.write().map_err(|_| CoreError::LockPoisoned)
    }

    fn lock_reminders(&self) -> Result<MutexGuard<'_, ReminderQueue>, CoreError> {
        self.reminders.lock().map_err(|_| CoreError::LockPoisoned)
    }

    /// Run a write against the backing store.
    fn persist<F>(&self, write: F) -> Result<(), CoreError>
    where
        F: FnOnce(&dyn KeyValueStore) -> Result<(), StorageError>,
    {
        let store = self.store.lock().map_err(|_| CoreError::LockPoisoned)?;
        write(store.as_ref()).map_err(|e| {
            tracing::error!(error = %e, "Write-through to storage failed");
            CoreError::Storage(e)
        })
    }

    fn persist_cabinet(&self, cabinet: &MedicationStore) -> Result<(), CoreError> {
        self.persist(|s| {
            storage::save_medications(s, cabinet.list())?;
            if let Some(day) = cabinet.current_day() {
                storage::save_current_day(s, day)?;
            }
            Ok(())
        })
    }

    fn record(&self, entries: Vec<AdherenceEntry>) -> Result<(), CoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut log = self.adherence.lock().map_err(|_| CoreError::LockPoisoned)?;
        log.extend(entries);
        self.persist(|s| storage::save_adherence_log(s, &log))
    }

    /// Called with the cabinet write lock held. Fewer than two medications
    /// cannot interact, so the alerts are cleared right away; otherwise they
    /// stay visible but stale until the next check.
    fn cabinet_changed(&self, cabinet: &MedicationStore) -> Result<(), CoreError> {
        let generation = self.cabinet_generation.fetch_add(1, Ordering::SeqCst) + 1;
        if cabinet.len() < 2 {
            self.alerts.write().map_err(|_| CoreError::LockPoisoned)?.clear();
            self.alerts_generation.store(generation, Ordering::SeqCst);
        }
        Ok(())
    }

    // ── Cabinet reads ───────────────────────────────────────

    pub fn medications(&self) -> Result<Vec<Medication>, CoreError> {
        Ok(self.read_cabinet()?.list().to_vec())
    }

    pub fn medication(&self, id: &str) -> Result<Option<Medication>, CoreError> {
        Ok(self.read_cabinet()?.get(id).cloned())
    }

    /// Medications still due today.
    pub fn daily_schedule(&self) -> Result<Vec<Medication>, CoreError> {
        Ok(self
            .read_cabinet()?
            .daily_schedule()
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn low_stock(&self) -> Result<Vec<Medication>, CoreError> {
        Ok(self.read_cabinet()?.low_stock().into_iter().cloned().collect())
    }

    // ── Cabinet mutations ───────────────────────────────────

    pub fn upsert_medication(&self, med: Medication) -> Result<UpsertOutcome, CoreError> {
        let mut cabinet = self.write_cabinet()?;
        let id = med.id.clone();
        let outcome = cabinet.upsert(med)?;
        self.persist_cabinet(&cabinet)?;
        self.cabinet_changed(&cabinet)?;
        tracing::info!(medication_id = %id, ?outcome, "Medication saved");
        Ok(outcome)
    }

    /// Remove a medication and any reminder waiting for it. Unknown ids are a no-op.
    pub fn delete_medication(&self, id: &str) -> Result<bool, CoreError> {
        let mut cabinet = self.write_cabinet()?;
        if !cabinet.delete(id) {
            return Ok(false);
        }
        self.lock_reminders()?.discard(id);
        self.persist_cabinet(&cabinet)?;
        self.cabinet_changed(&cabinet)?;
        tracing::info!(medication_id = %id, "Medication deleted");
        Ok(true)
    }

    /// Record a dose taken outside the reminder flow.
    pub fn mark_taken(&self, id: &str, now: NaiveDateTime) -> Result<Option<Medication>, CoreError> {
        let mut cabinet = self.write_cabinet()?;
        let Some(updated) = cabinet.mark_taken(id).cloned() else {
            return Ok(None);
        };
        self.lock_reminders()?.discard(id);
        self.persist_cabinet(&cabinet)?;
        drop(cabinet);

        self.record(vec![AdherenceEntry::new(id, now, AdherenceStatus::Taken)])?;
        tracing::debug!(medication_id = %id, remaining = updated.remaining_pills, "Dose taken");
        Ok(Some(updated))
    }

    pub fn refill(&self, id: &str) -> Result<Option<Medication>, CoreError> {
        let mut cabinet = self.write_cabinet()?;
        let Some(updated) = cabinet.refill(id).cloned() else {
            return Ok(None);
        };
        self.persist_cabinet(&cabinet)?;
        Ok(Some(updated))
    }

    // ── Reminders ───────────────────────────────────────────

    pub fn active_reminder(&self) -> Result<Option<ActiveReminder>, CoreError> {
        Ok(self.lock_reminders()?.active().cloned())
    }

    pub fn queued_reminders(&self) -> Result<usize, CoreError> {
        Ok(self.lock_reminders()?.waiting_len())
    }

    /// Pending → Acknowledged: the dose is recorded.
    pub fn acknowledge_reminder(
        &self,
        now: NaiveDateTime,
    ) -> Result<Option<ReminderResolution>, CoreError> {
        let mut cabinet = self.write_cabinet()?;
        let Some(resolution) = self.lock_reminders()?.acknowledge() else {
            return Ok(None);
        };
        let medication_id = resolution.reminder.medication_id.clone();
        if cabinet.mark_taken(&medication_id).is_some() {
            self.persist_cabinet(&cabinet)?;
        }
        drop(cabinet);

        self.record(vec![AdherenceEntry::new(
            &medication_id,
            now,
            AdherenceStatus::Taken,
        )])?;
        tracing::info!(medication_id = %medication_id, "Reminder acknowledged");
        Ok(Some(resolution))
    }

    /// Pending → Dismissed: the medication stays due.
    pub fn dismiss_reminder(
        &self,
        now: NaiveDateTime,
    ) -> Result<Option<ReminderResolution>, CoreError> {
        let Some(resolution) = self.lock_reminders()?.dismiss() else {
            return Ok(None);
        };
        self.record(vec![AdherenceEntry::new(
            &resolution.reminder.medication_id,
            now,
            AdherenceStatus::Skipped,
        )])?;
        tracing::info!(medication_id = %resolution.reminder.medication_id, "Reminder dismissed");
        Ok(Some(resolution))
    }

    /// Advance the cabinet to `now`'s day. Returns the ids logged as missed
    /// for the day being closed.
    ///
    /// A dose dismissed on the closing day is already logged as skipped and
    /// is not logged again. Whole days spent with the app closed are logged
    /// as missed for every scheduled medication, up to
    /// `MISSED_DAYS_BACKFILL_LIMIT` days back.
    fn roll_over(&self, now: NaiveDateTime) -> Result<Vec<String>, CoreError> {
        let today = now.date();
        let mut cabinet = self.write_cabinet()?;
        let previous = cabinet.current_day();
        if previous == Some(today) {
            return Ok(Vec::new());
        }

        let scheduled: Vec<(String, NaiveDate)> = cabinet
            .list()
            .iter()
            .filter(|m| !m.reminder_times.is_empty())
            .map(|m| (m.id.clone(), m.start_date))
            .collect();
        let due_on_closed_day = cabinet.roll_over_day(today);
        if cabinet.current_day() == previous {
            return Ok(Vec::new());
        }
        self.persist_cabinet(&cabinet)?;
        let expired = self.lock_reminders()?.expire_before(today);
        drop(cabinet);

        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "Dropped reminders from a previous day");
        }
        let Some(closed_day) = previous.filter(|day| *day < today) else {
            return Ok(Vec::new());
        };

        let mut log = self.adherence.lock().map_err(|_| CoreError::LockPoisoned)?;
        let started_by = |id: &str, day: NaiveDate| {
            scheduled
                .iter()
                .any(|(scheduled_id, start)| scheduled_id == id && *start <= day)
        };
        let missed: Vec<String> = due_on_closed_day
            .into_iter()
            .filter(|id| started_by(id.as_str(), closed_day))
            .filter(|id| {
                !log.iter().any(|e| {
                    e.medication_id == *id
                        && e.status == AdherenceStatus::Skipped
                        && e.timestamp.date() == closed_day
                })
            })
            .collect();

        let mut entries: Vec<AdherenceEntry> = missed
            .iter()
            .map(|id| AdherenceEntry::new(id, end_of_day(closed_day), AdherenceStatus::Missed))
            .collect();

        let earliest = today - chrono::Duration::days(config::MISSED_DAYS_BACKFILL_LIMIT);
        let mut day = closed_day.succ_opt().map_or(today, |d| d.max(earliest));
        while day < today {
            entries.extend(
                scheduled
                    .iter()
                    .filter(|(_, start)| *start <= day)
                    .map(|(id, _)| AdherenceEntry::new(id, end_of_day(day), AdherenceStatus::Missed)),
            );
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        if !entries.is_empty() {
            log.extend(entries);
            self.persist(|s| storage::save_adherence_log(s, &log))?;
            tracing::info!(count = missed.len(), day = %today, "Day rolled over with missed doses");
        }
        Ok(missed)
    }

    /// One scheduler step: close out past days, then deliver every
    /// reminder that has come due.
    pub fn tick(&self, now: NaiveDateTime) -> Result<TickReport, CoreError> {
        let missed = self.roll_over(now)?;

        let mut cabinet = self.write_cabinet()?;
        let due = due_reminders(cabinet.list(), now);
        if due.is_empty() {
            return Ok(TickReport {
                missed,
                delivered: Vec::new(),
            });
        }

        let mut queue = self.lock_reminders()?;
        let mut delivered = Vec::new();
        for item in due {
            let Some(med) = cabinet.get(&item.medication_id) else {
                continue;
            };
            let reminder = ActiveReminder::for_medication(med, &item.scheduled_time, now);
            cabinet.mark_reminder_sent(&item.medication_id, now.date());
            match queue.trigger(reminder.clone()) {
                TriggerOutcome::Duplicate => {}
                outcome => {
                    tracing::info!(
                        medication_id = %reminder.medication_id,
                        time = %reminder.scheduled_time,
                        ?outcome,
                        "Reminder due"
                    );
                    delivered.push(reminder);
                }
            }
        }
        drop(queue);
        self.persist_cabinet(&cabinet)?;

        Ok(TickReport { missed, delivered })
    }

    // ── Adherence ───────────────────────────────────────────

    pub fn adherence_log(&self) -> Result<Vec<AdherenceEntry>, CoreError> {
        Ok(self
            .adherence
            .lock()
            .map_err(|_| CoreError::LockPoisoned)?
            .clone())
    }

    pub fn adherence_summary(&self, medication_id: Option<&str>) -> Result<AdherenceSummary, CoreError> {
        let log = self.adherence.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(AdherenceSummary::from_entries(
            log.iter()
                .filter(|e| medication_id.map_or(true, |id| e.medication_id == id)),
        ))
    }

    // ── Profile ─────────────────────────────────────────────

    pub fn profile(&self) -> Result<Option<UserProfile>, CoreError> {
        Ok(self
            .profile
            .read()
            .map_err(|_| CoreError::LockPoisoned)?
            .clone())
    }

    pub fn profile_history(&self) -> Result<Vec<UserProfile>, CoreError> {
        Ok(self
            .profile_history
            .read()
            .map_err(|_| CoreError::LockPoisoned)?
            .clone())
    }

    fn activate_profile(&self, profile: UserProfile) -> Result<(), CoreError> {
        let mut history = self
            .profile_history
            .write()
            .map_err(|_| CoreError::LockPoisoned)?;
        profile::remember_profile(&mut history, &profile);
        self.persist(|s| {
            storage::save_profile(s, &profile)?;
            storage::save_profile_history(s, &history)
        })?;
        *self.profile.write().map_err(|_| CoreError::LockPoisoned)? = Some(profile);
        Ok(())
    }

    pub fn complete_onboarding(
        &self,
        input: OnboardingInput,
        today: NaiveDate,
    ) -> Result<UserProfile, CoreError> {
        let profile = profile::complete_onboarding(input, today)?;
        self.activate_profile(profile.clone())?;
        tracing::info!(age = profile.age, "Onboarding complete");
        Ok(profile)
    }

    pub fn select_profile(&self, index: usize, today: NaiveDate) -> Result<UserProfile, CoreError> {
        let profile = {
            let history = self
                .profile_history
                .read()
                .map_err(|_| CoreError::LockPoisoned)?;
            profile::select_from_history(&history, index, today)?
        };
        self.activate_profile(profile.clone())?;
        Ok(profile)
    }

    /// Wipe every saved value and all in-memory state.
    pub fn reset(&self) -> Result<(), CoreError> {
        let mut cabinet = self.write_cabinet()?;
        let mut queue = self.lock_reminders()?;
        self.persist(|s| s.clear())?;

        cabinet.clear();
        queue.clear();
        *self.profile.write().map_err(|_| CoreError::LockPoisoned)? = None;
        self.profile_history
            .write()
            .map_err(|_| CoreError::LockPoisoned)?
            .clear();
        self.adherence
            .lock()
            .map_err(|_| CoreError::LockPoisoned)?
            .clear();
        self.cabinet_changed(&cabinet)?;

        tracing::info!("All saved data cleared");
        Ok(())
    }

    // ── Interaction alerts ──────────────────────────────────

    pub fn interaction_alerts(&self) -> Result<Vec<InteractionAlert>, CoreError> {
        Ok(self
            .alerts
            .read()
            .map_err(|_| CoreError::LockPoisoned)?
            .clone())
    }

    /// Re-run the interaction check for the current cabinet. The result
    /// replaces the previous alerts unless the cabinet changed while the
    /// check was running. Returns whether the alerts were replaced.
    pub fn refresh_interactions(&self, client: &dyn LlmClient) -> Result<bool, CoreError> {
        let generation = self.cabinet_generation.load(Ordering::SeqCst);
        let medications = self.medications()?;

        let alerts = intelligence::check_interactions(client, &medications);

        // Holding the cabinet keeps the generation fixed until the swap
        let _cabinet = self.read_cabinet()?;
        if self.cabinet_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Cabinet changed during interaction check, discarding result");
            return Ok(false);
        }
        *self.alerts.write().map_err(|_| CoreError::LockPoisoned)? = alerts;
        self.alerts_generation.store(generation, Ordering::SeqCst);
        Ok(true)
    }

    /// Whether the cabinet changed since the alerts were last computed.
    pub fn interactions_stale(&self) -> bool {
        self.alerts_generation.load(Ordering::SeqCst)
            != self.cabinet_generation.load(Ordering::SeqCst)
    }

    // ── AI submissions ──────────────────────────────────────

    /// Claim the single AI submission slot. A second submission while one
    /// is in flight is rejected.
    pub fn begin_submission(&self) -> Result<SubmissionGuard<'_>, CoreError> {
        match self.submission.try_lock() {
            Ok(guard) => Ok(SubmissionGuard { _guard: guard }),
            Err(std::sync::TryLockError::WouldBlock) => Err(CoreError::Busy),
            Err(std::sync::TryLockError::Poisoned(_)) => Err(CoreError::LockPoisoned),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.submission.try_lock().is_err()
    }

    /// Draft a new medication from a free-text description.
    pub fn suggest_draft(
        &self,
        client: &dyn LlmClient,
        description: &str,
        today: NaiveDate,
    ) -> Result<Medication, CoreError> {
        let _guard = self.begin_submission()?;
        let profile = self.profile()?.ok_or(CoreError::NoProfile)?;
        let suggestion = intelligence::suggest_medication_details(client, description, &profile);
        Ok(intelligence::draft_from_suggestion(&suggestion, today))
    }

    /// Read a medication box or prescription photo into drafts.
    pub fn analyze_image(
        &self,
        client: &dyn LlmClient,
        jpeg: &[u8],
        is_prescription: bool,
        today: NaiveDate,
    ) -> Result<(Vec<Medication>, PrescriptionAnalysis), CoreError> {
        let _guard = self.begin_submission()?;
        let analysis = intelligence::analyze_medication_image(client, jpeg, is_prescription);
        let guide = analysis
            .comprehensive_guide
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty());
        let drafts = analysis
            .medications
            .iter()
            .map(|s| {
                let mut draft = intelligence::draft_from_suggestion(s, today);
                if let Some(guide) = guide {
                    draft.notes = Some(match draft.notes.take() {
                        Some(note) => format!("{note}\n\n{guide}"),
                        None => guide.to_string(),
                    });
                }
                draft
            })
            .collect();
        Ok((drafts, analysis))
    }

    /// One assistant turn, with requested actions carried out.
    pub fn ask_assistant(
        &self,
        client: &dyn LlmClient,
        history: &[ChatMessage],
        message: &str,
        options: AssistantOptions,
        today: NaiveDate,
    ) -> Result<AssistantOutcome, CoreError> {
        let _guard = self.begin_submission()?;
        let profile = self.profile()?.ok_or(CoreError::NoProfile)?;
        let medications = self.medications()?;
        let context = AssistantContext {
            profile: &profile,
            medications: &medications,
        };

        let reply = intelligence::chat(client, history, message, &context, options);

        let mut drafts = Vec::new();
        let mut guide = None;
        for action in &reply.actions {
            match action {
                AssistantAction::SetReminder(request) => {
                    drafts.push(intelligence::prepare_reminder_draft(request, today));
                }
                AssistantAction::CreateGuide {
                    include_interactions,
                    format,
                } => {
                    guide = Some(intelligence::generate_medication_guide(
                        client,
                        &profile,
                        &medications,
                        *include_interactions,
                        *format,
                    ));
                }
            }
        }

        Ok(AssistantOutcome {
            reply,
            drafts,
            guide,
        })
    }
}

fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN) + chrono::Duration::seconds(86_399)
}

// ═══════════════════════════════════════════════════════════
// SubmissionGuard: RAII submission token
// ═══════════════════════════════════════════════════════════

/// Held while an AI request is in flight. Dropping it frees the slot.
pub struct SubmissionGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}
