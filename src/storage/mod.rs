// Device-local fallback for read positions; no network, never fails its callers

mod file;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use file::FileStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// String-keyed durable store scoped to this device.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Last known position for a document on this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalProgress {
    pub last_page_read: u32,
    #[serde(default)]
    pub total_pages: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

const KEY_PREFIX: &str = "reader.progress.";

#[derive(Clone)]
pub struct ProgressStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ProgressStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn key(document_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, document_id)
    }

    pub fn read(&self, document_id: &str) -> Option<LocalProgress> {
        let raw = match self.kv.get(&Self::key(document_id)) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, %document_id, "local progress read failed");
                return None;
            }
        };
        match serde_json::from_str::<LocalProgress>(&raw) {
            Ok(record) if record.last_page_read >= 1 => Some(record),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, %document_id, "discarding unreadable local progress");
                None
            }
        }
    }

    /// Best effort: invalid pages are dropped and storage failures are only logged.
    pub fn write(&self, document_id: &str, last_page_read: u32, total_pages: Option<u32>) {
        if last_page_read == 0 {
            tracing::debug!(%document_id, "ignoring non-positive page for local progress");
            return;
        }
        let record = LocalProgress {
            last_page_read,
            total_pages: total_pages.filter(|t| *t >= 1),
            updated_at: Utc::now(),
        };
        let result = serde_json::to_string(&record)
            .map_err(StorageError::from)
            .and_then(|value| self.kv.set(&Self::key(document_id), &value));
        if let Err(e) = result {
            tracing::warn!(error = %e, %document_id, "local progress write failed");
        }
    }
}
