//! Persistent key-value storage for the cabinet and the profile.
//!
//! Every value is a JSON string under a fixed key. Reads happen once at
//! startup; writes are write-through after every mutation; reset clears
//! everything. A value that fails to parse is treated as "no saved state".

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::db::{self, DatabaseError};
use crate::models::{AdherenceEntry, Medication, UserProfile};

pub const MEDICATIONS_KEY: &str = "vitara_meds";
pub const PROFILE_KEY: &str = "vitara_user_profile";
pub const PROFILE_HISTORY_KEY: &str = "vitara_profiles_history";
pub const ADHERENCE_LOG_KEY: &str = "vitara_adherence_log";
pub const CURRENT_DAY_KEY: &str = "vitara_current_day";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// String-valued key-value backend.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

// ═══════════════════════════════════════════
// SQLite backend
// ═══════════════════════════════════════════

/// Key-value store backed by the local SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Ok(Self {
            conn: db::open_database(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Ok(Self {
            conn: db::open_memory_database()?,
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(db::get_value(&self.conn, key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Ok(db::set_value(&self.conn, key, value)?)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        Ok(db::delete_value(&self.conn, key)?)
    }

    fn clear(&self) -> Result<(), StorageError> {
        Ok(db::clear_values(&self.conn)?)
    }
}

// ═══════════════════════════════════════════
// In-memory backend
// ═══════════════════════════════════════════

/// Volatile store, used by tests and when the database cannot be opened.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::LockPoisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::LockPoisoned)?;
        values.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::LockPoisoned)?;
        values.clear();
        Ok(())
    }
}

// ═══════════════════════════════════════════
// Typed accessors
// ═══════════════════════════════════════════

/// Read and decode a JSON value. Missing, unreadable or malformed values
/// all yield `None`.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "Storage read failed, treating as no saved state");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Stored value is malformed, treating as no saved state");
            None
        }
    }
}

pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

pub fn load_medications(store: &dyn KeyValueStore) -> Vec<Medication> {
    load_json(store, MEDICATIONS_KEY).unwrap_or_default()
}

pub fn save_medications(
    store: &dyn KeyValueStore,
    medications: &[Medication],
) -> Result<(), StorageError> {
    save_json(store, MEDICATIONS_KEY, medications)
}

pub fn load_profile(store: &dyn KeyValueStore) -> Option<UserProfile> {
    load_json(store, PROFILE_KEY)
}

pub fn save_profile(store: &dyn KeyValueStore, profile: &UserProfile) -> Result<(), StorageError> {
    save_json(store, PROFILE_KEY, profile)
}

pub fn load_profile_history(store: &dyn KeyValueStore) -> Vec<UserProfile> {
    load_json(store, PROFILE_HISTORY_KEY).unwrap_or_default()
}

pub fn save_profile_history(
    store: &dyn KeyValueStore,
    history: &[UserProfile],
) -> Result<(), StorageError> {
    save_json(store, PROFILE_HISTORY_KEY, history)
}

pub fn load_adherence_log(store: &dyn KeyValueStore) -> Vec<AdherenceEntry> {
    load_json(store, ADHERENCE_LOG_KEY).unwrap_or_default()
}

pub fn save_adherence_log(
    store: &dyn KeyValueStore,
    entries: &[AdherenceEntry],
) -> Result<(), StorageError> {
    save_json(store, ADHERENCE_LOG_KEY, entries)
}

pub fn load_current_day(store: &dyn KeyValueStore) -> Option<NaiveDate> {
    load_json(store, CURRENT_DAY_KEY)
}

pub fn save_current_day(store: &dyn KeyValueStore, day: NaiveDate) -> Result<(), StorageError> {
    save_json(store, CURRENT_DAY_KEY, &day)
}
