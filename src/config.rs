use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Vitara";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Stock ratio below which a medication is flagged for refill.
pub const LOW_STOCK_THRESHOLD: f64 = 0.20;

/// How often the reminder scheduler compares the clock against reminder times.
pub const REMINDER_TICK_SECS: u64 = 30;

/// Most whole days logged as missed when the app was closed for a stretch.
pub const MISSED_DAYS_BACKFILL_LIMIT: i64 = 30;

/// Default request timeout for the generative-AI service.
pub const AI_TIMEOUT_SECS: u64 = 120;

/// Public endpoint of the generative-language API.
pub const DEFAULT_AI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,vitara_lib=debug"
}

/// Get the application data directory: ~/Vitara/ on all platforms.
///
/// Falls back to the current directory when no home directory can be resolved
/// (containers, service accounts).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the local key-value database.
pub fn database_path() -> PathBuf {
    app_data_dir().join("vitara.db")
}

/// Reminder scheduler tick, overridable through `VITARA_REMINDER_TICK_SECS`.
pub fn reminder_tick() -> Duration {
    let secs = std::env::var("VITARA_REMINDER_TICK_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|s| *s > 0)
        .unwrap_or(REMINDER_TICK_SECS);
    Duration::from_secs(secs)
}

/// Connection settings for the generative-AI service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl AiConfig {
    /// Read settings from the environment.
    ///
    /// `VITARA_API_KEY` wins over `GEMINI_API_KEY`; an empty value counts as unset.
    pub fn from_env() -> Self {
        let api_key = ["VITARA_API_KEY", "GEMINI_API_KEY"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.trim().is_empty());

        let base_url = std::env::var("VITARA_AI_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string());

        let timeout_secs = std::env::var("VITARA_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(AI_TIMEOUT_SECS);

        Self {
            base_url,
            api_key,
            timeout_secs,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: AI_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_lives_in_app_data_dir() {
        let db = database_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("vitara.db"));
    }

    #[test]
    fn app_data_dir_named_after_app() {
        assert!(app_data_dir().ends_with("Vitara"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn low_stock_threshold_is_twenty_percent() {
        assert!((LOW_STOCK_THRESHOLD - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn default_ai_config_has_no_key() {
        let cfg = AiConfig::default();
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.base_url, DEFAULT_AI_BASE_URL);
        assert_eq!(cfg.timeout_secs, AI_TIMEOUT_SECS);
    }
}
