pub mod config;
pub mod core_state;
pub mod db;
pub mod intelligence; // Interaction checks, suggestions, assistant, speech
pub mod medications; // Cabinet store and views
pub mod models;
pub mod profile; // Onboarding and profile history
pub mod reminder; // Reminder slot and background scheduler
pub mod storage; // Key-value persistence

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

use crate::core_state::CoreState;
use crate::intelligence::{GeminiClient, LlmClient, PcmFileSink, SpeechPlayer};
use crate::reminder::scheduler::{self, SchedulerEvent};
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

fn open_store() -> Box<dyn KeyValueStore> {
    let path = config::database_path();
    match SqliteStore::open(&path) {
        Ok(store) => {
            tracing::info!(path = %path.display(), "Opened database");
            Box::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Database unavailable, changes will not be saved");
            Box::new(MemoryStore::new())
        }
    }
}

fn build_ai_client() -> Option<Arc<dyn LlmClient + Send + Sync>> {
    let config = config::AiConfig::from_env();
    if config.api_key.is_none() {
        tracing::info!("No AI API key configured, AI features disabled");
        return None;
    }
    match GeminiClient::new(&config) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "AI client unavailable");
            None
        }
    }
}

pub fn run() {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let now = chrono::Local::now().naive_local();
    let state = match CoreState::load(open_store(), now) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load saved state");
            return;
        }
    };
    let client = build_ai_client();

    if let Some(client) = client.clone() {
        let state = state.clone();
        std::thread::spawn(move || {
            if let Err(e) = state.refresh_interactions(client.as_ref()) {
                tracing::warn!(error = %e, "Startup interaction check failed");
            }
        });
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start async runtime");
            return;
        }
    };

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = scheduler::start_reminder_scheduler(
        state.clone(),
        config::reminder_tick(),
        scheduler::local_clock(),
        tx,
    );

    // The blocking HTTP client must be released outside the runtime
    runtime.block_on(event_loop(rx, client.clone()));

    handle.shutdown();
    drop(handle);
    drop(runtime);
    drop(client);
    tracing::info!("{} stopped", config::APP_NAME);
}

async fn event_loop(
    mut events: UnboundedReceiver<SchedulerEvent>,
    client: Option<Arc<dyn LlmClient + Send + Sync>>,
) {
    let player: Arc<dyn SpeechPlayer> =
        Arc::new(PcmFileSink::new(config::app_data_dir().join("reminder.pcm")));

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SchedulerEvent::ReminderDue(reminder)) => {
                    tracing::info!(
                        medication = %reminder.name,
                        time = %reminder.scheduled_time,
                        advice = reminder.display_advice(),
                        "{}",
                        reminder.text_notice()
                    );
                    if let Some(client) = client.clone() {
                        intelligence::speak_in_background(client, player.clone(), reminder.announcement());
                    }
                }
                Some(SchedulerEvent::DayClosed { missed }) => {
                    tracing::info!(missed = missed.len(), "Previous day closed");
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }
}
