use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use reader_sync::Credentials;

#[derive(Debug)]
pub struct Config {
    pub progress_url: String,
    pub api_key: String,
    pub document_user: String,
    pub document_password: String,
    pub store_path: PathBuf,
    pub sync_debounce: Duration,
}

const DEFAULT_STORE_PATH: &str = "reader-progress.json";
const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 800;

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let progress_url = std::env::var("READER_PROGRESS_URL").unwrap_or_default();
        let api_key = std::env::var("READER_API_KEY").unwrap_or_default();
        let document_user = std::env::var("READER_USER").unwrap_or_default();
        let document_password = std::env::var("READER_PASSWORD").unwrap_or_default();
        let store_path = std::env::var("READER_STORE_PATH").unwrap_or(DEFAULT_STORE_PATH.into());
        let sync_debounce_ms = match std::env::var("READER_SYNC_DEBOUNCE_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid READER_SYNC_DEBOUNCE_MS: {}", raw))?,
            Err(_) => DEFAULT_SYNC_DEBOUNCE_MS,
        };
        Ok(Config {
            progress_url,
            api_key,
            document_user,
            document_password,
            store_path: PathBuf::from(store_path),
            sync_debounce: Duration::from_millis(sync_debounce_ms),
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.progress_url.is_empty() {
            return Err("READER_PROGRESS_URL is missing".into());
        }
        if self.document_user.is_empty() != self.document_password.is_empty() {
            return Err("READER_USER and READER_PASSWORD must be set together".into());
        }
        Ok(())
    }

    /// Credentials for the document source: basic auth if configured, else the API key.
    pub fn document_credentials(&self) -> Option<Credentials> {
        if !self.document_user.is_empty() {
            Some(Credentials::Basic {
                user: self.document_user.clone(),
                password: self.document_password.clone(),
            })
        } else if !self.api_key.is_empty() {
            Some(Credentials::Bearer(self.api_key.clone()))
        } else {
            None
        }
    }
}
