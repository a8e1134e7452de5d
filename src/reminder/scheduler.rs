//! Background reminder scheduler: periodic due-time check.
//!
//! Spawns a thread that, every tick, rolls the cabinet over to the current
//! day and delivers reminders that have come due. Delivered reminders are
//! sent to the owner over a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::mpsc::UnboundedSender;

use super::ActiveReminder;
use crate::core_state::CoreState;

/// Sleep granularity for shutdown responsiveness.
const SLEEP_GRANULARITY: Duration = Duration::from_millis(500);

/// Events emitted by the scheduler thread.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    ReminderDue(ActiveReminder),
    DayClosed { missed: Vec<String> },
}

/// Source of the current local time.
pub type Clock = Box<dyn Fn() -> NaiveDateTime + Send>;

pub fn local_clock() -> Clock {
    Box::new(|| chrono::Local::now().naive_local())
}

/// Handle for the reminder scheduler thread.
///
/// Supports graceful shutdown via `shutdown()` or automatic cleanup on `Drop`.
pub struct SchedulerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Request graceful shutdown. A tick in progress completes first.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Start the scheduler on a separate thread, ticking every `interval`.
pub fn start_reminder_scheduler(
    state: Arc<CoreState>,
    interval: Duration,
    clock: Clock,
    events: UnboundedSender<SchedulerEvent>,
) -> SchedulerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    let handle = std::thread::spawn(move || {
        tracing::info!(interval_secs = interval.as_secs_f64(), "Reminder scheduler started");
        scheduler_loop(&state, interval, &clock, &events, &flag);
        tracing::info!("Reminder scheduler shutting down");
    });

    SchedulerHandle {
        shutdown,
        handle: Some(handle),
    }
}

fn scheduler_loop(
    state: &CoreState,
    interval: Duration,
    clock: &Clock,
    events: &UnboundedSender<SchedulerEvent>,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        if !run_tick(state, clock(), events) {
            return;
        }

        // Sleep in small increments for responsive shutdown
        let mut slept = Duration::ZERO;
        while slept < interval {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            let step = SLEEP_GRANULARITY.min(interval - slept);
            std::thread::sleep(step);
            slept += step;
        }
    }
}

/// Returns false once the receiving side is gone.
fn run_tick(state: &CoreState, now: NaiveDateTime, events: &UnboundedSender<SchedulerEvent>) -> bool {
    let report = match state.tick(now) {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(error = %e, "Reminder tick failed");
            return true;
        }
    };

    if !report.missed.is_empty()
        && events
            .send(SchedulerEvent::DayClosed {
                missed: report.missed,
            })
            .is_err()
    {
        return false;
    }
    for reminder in report.delivered {
        if events.send(SchedulerEvent::ReminderDue(reminder)).is_err() {
            tracing::debug!("Scheduler event receiver dropped");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Medication;
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn state_with_due_medication() -> Arc<CoreState> {
        let state = CoreState::load(Box::new(MemoryStore::new()), at(7, 0)).unwrap();
        let mut med = Medication::draft(at(0, 0).date());
        med.id = "a".into();
        med.name = "Aspirin".into();
        med.dosage = "81mg".into();
        med.reminder_times = vec!["08:00".into()];
        state.upsert_medication(med).unwrap();
        Arc::new(state)
    }

    #[test]
    fn delivers_due_reminder_once() {
        let state = state_with_due_medication();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = start_reminder_scheduler(
            state.clone(),
            Duration::from_millis(10),
            Box::new(|| at(8, 30)),
            tx,
        );

        let event = rx.blocking_recv().unwrap();
        assert!(matches!(event, SchedulerEvent::ReminderDue(ref r) if r.medication_id == "a"));

        std::thread::sleep(Duration::from_millis(50));
        handle.shutdown();
        drop(handle);
        assert!(rx.try_recv().is_err());
        assert_eq!(state.active_reminder().unwrap().unwrap().scheduled_time, "08:00");
    }

    #[test]
    fn stops_when_receiver_dropped() {
        let state = state_with_due_medication();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let handle = start_reminder_scheduler(
            state,
            Duration::from_millis(10),
            Box::new(|| at(8, 30)),
            tx,
        );
        std::thread::sleep(Duration::from_millis(100));
        assert!(!handle.is_running());
    }

    #[test]
    fn drop_joins_idle_thread() {
        let state = state_with_due_medication();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = start_reminder_scheduler(
            state,
            Duration::from_secs(30),
            Box::new(|| at(6, 0)),
            tx,
        );
        assert!(handle.is_running());
        drop(handle);
    }
}
