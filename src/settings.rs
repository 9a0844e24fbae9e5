//! Persistent user settings.
//!
//! Settings live in a JSON object file. Known keys are read through typed
//! accessors; unknown keys are kept as-is and written back on save. Changes
//! are persisted through a debounced save so bursts of edits cost one write.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use mercury_bus::Debouncer;
use mercury_logs::{DEFAULT_LOG_FILE_PATH, StartPosition, TrackerConfig};

pub const LOG_FILE_PATH: &str = "logFilePath";
pub const POLL_INTERVAL_MS: &str = "pollIntervalMs";
pub const READ_FROM_START: &str = "readFromStart";
pub const HISTORY_CAPACITY: &str = "historyCapacity";
pub const CHAT_SCANNER_WORDS: &str = "chatScannerWords";

/// Quiet period before a change is written to disk
pub const SAVE_DELAY: Duration = Duration::from_secs(4);

/// Default settings file: `~/.mercury/settings.json`
pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mercury")
        .join("settings.json")
}

fn default_values() -> Map<String, Value> {
    let config = TrackerConfig::default();
    let mut values = Map::new();
    values.insert(LOG_FILE_PATH.into(), Value::from(DEFAULT_LOG_FILE_PATH));
    values.insert(POLL_INTERVAL_MS.into(), Value::from(config.poll_interval_ms));
    values.insert(READ_FROM_START.into(), Value::from(false));
    values.insert(HISTORY_CAPACITY.into(), Value::from(config.history_capacity));
    values.insert(CHAT_SCANNER_WORDS.into(), Value::Array(Vec::new()));
    values
}

/// JSON-backed key-value settings with debounced persistence
///
/// Clones share the same values and the same pending save.
#[derive(Clone)]
pub struct SettingsStore {
    path: PathBuf,
    values: Arc<RwLock<Map<String, Value>>>,
    dirty: Arc<AtomicBool>,
    saver: Debouncer,
}

impl SettingsStore {
    /// Load settings from `path`
    ///
    /// A missing file yields defaults. An unreadable or malformed file is
    /// logged and also yields defaults; it is overwritten on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match read_values(&path) {
            Ok(Some(values)) => {
                tracing::debug!(path = %path.display(), keys = values.len(), "settings loaded");
                values
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "no settings file, using defaults");
                Map::new()
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %format!("{:#}", err), "settings unreadable, using defaults");
                Map::new()
            }
        };

        Self {
            path,
            values: Arc::new(RwLock::new(values)),
            dirty: Arc::new(AtomicBool::new(false)),
            saver: Debouncer::new(SAVE_DELAY),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw value of `key`, if set
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Set `key` and schedule a save. Must be called within a Tokio runtime.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.values.write().insert(key.to_string(), value.into());
        self.dirty.store(true, Ordering::SeqCst);
        self.schedule_save();
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.get(LOG_FILE_PATH)
            .and_then(|v| v.as_str().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE_PATH))
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.get(POLL_INTERVAL_MS)
            .and_then(|v| v.as_u64())
            .unwrap_or(TrackerConfig::default().poll_interval_ms)
    }

    pub fn read_from_start(&self) -> bool {
        self.get(READ_FROM_START)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn history_capacity(&self) -> usize {
        self.get(HISTORY_CAPACITY)
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(TrackerConfig::default().history_capacity)
    }

    pub fn chat_scanner_words(&self) -> Vec<String> {
        match self.get(CHAT_SCANNER_WORDS) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Tracker settings as currently stored
    pub fn tracker_config(&self) -> TrackerConfig {
        let start = if self.read_from_start() {
            StartPosition::Beginning
        } else {
            StartPosition::End
        };
        TrackerConfig::new(self.log_file_path())
            .with_poll_interval_ms(self.poll_interval_ms())
            .with_start_position(start)
            .with_history_capacity(self.history_capacity())
            .with_chat_scanner_words(self.chat_scanner_words())
    }

    /// Whether a change is waiting to be written
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Write pending changes now, cancelling the debounced save
    pub fn flush(&self) -> Result<()> {
        self.saver.cancel();
        if !self.is_dirty() {
            return Ok(());
        }
        self.save()
    }

    /// Write all settings, filling unset known keys with their defaults
    pub fn save(&self) -> Result<()> {
        let snapshot = self.snapshot();
        write_values(&self.path, &snapshot)?;
        self.dirty.store(false, Ordering::SeqCst);
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    fn snapshot(&self) -> Map<String, Value> {
        let mut merged = default_values();
        for (key, value) in self.values.read().iter() {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    fn schedule_save(&self) {
        let store = self.clone();
        self.saver.trigger(move || {
            if let Err(err) = store.save() {
                tracing::error!(path = %store.path.display(), error = %format!("{:#}", err), "failed to save settings");
            }
        });
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("path", &self.path)
            .field("keys", &self.values.read().len())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

fn read_values(path: &Path) -> Result<Option<Map<String, Value>>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let values: Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(values))
}

fn write_values(path: &Path, values: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(values).context("failed to serialize settings")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
