use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::TrackerError;

/// Default location of the game client log on Windows installs
pub const DEFAULT_LOG_FILE_PATH: &str =
    r"C:\Program Files (x86)\Grinding Gear Games\Path of Exile\logs\Client.txt";

/// Where reading starts when the log file already exists at startup
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// Skip existing content, surface only lines written after startup
    #[default]
    End,
    /// Read the whole file
    Beginning,
}

/// Tracker settings supplied by the surrounding application
#[derive(Clone, Debug, PartialEq)]
pub struct TrackerConfig {
    /// Client log file to tail
    pub log_file_path: PathBuf,

    /// Poll period in milliseconds (must be > 0)
    pub poll_interval_ms: u64,

    pub start_position: StartPosition,

    /// Upper bound of bytes consumed per poll
    pub max_read_bytes: usize,

    /// Number of events kept in the in-memory history
    pub history_capacity: usize,

    /// Words the chat scanner looks for in global and trade chat
    pub chat_scanner_words: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            log_file_path: PathBuf::from(DEFAULT_LOG_FILE_PATH),
            poll_interval_ms: 500,
            start_position: StartPosition::End,
            max_read_bytes: 1024 * 1024, // 1MB
            history_capacity: 100,
            chat_scanner_words: Vec::new(),
        }
    }
}

impl TrackerConfig {
    /// Create a config for `path` with default settings
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            log_file_path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_start_position(mut self, start: StartPosition) -> Self {
        self.start_position = start;
        self
    }

    pub fn with_max_read_bytes(mut self, bytes: usize) -> Self {
        self.max_read_bytes = bytes;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_chat_scanner_words(mut self, words: Vec<String>) -> Self {
        self.chat_scanner_words = words;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Scanner words with blanks removed
    pub fn scanner_words(&self) -> Vec<String> {
        self.chat_scanner_words
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Check that the tracker can start with these settings
    pub fn validate(&self) -> Result<(), TrackerError> {
        Self::validate_log_path(&self.log_file_path)?;

        if self.poll_interval_ms == 0 {
            return Err(TrackerError::config(
                "poll_interval_ms",
                "poll interval must be greater than 0",
            ));
        }
        if self.max_read_bytes == 0 {
            return Err(TrackerError::config(
                "max_read_bytes",
                "read limit must be greater than 0",
            ));
        }
        if self.history_capacity == 0 {
            return Err(TrackerError::config(
                "history_capacity",
                "history capacity must be greater than 0",
            ));
        }
        Ok(())
    }

    /// The file may not exist yet, but the path must be able to name a file
    fn validate_log_path(path: &Path) -> Result<(), TrackerError> {
        if path.as_os_str().is_empty() {
            return Err(TrackerError::config(
                "log_file_path",
                "log file path must not be empty",
            ));
        }
        if path.is_dir() {
            return Err(TrackerError::config(
                "log_file_path",
                format!("'{}' is a directory, expected a file", path.display()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.start_position, StartPosition::End);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_path() {
        let config = TrackerConfig::new("");
        assert!(matches!(
            config.validate(),
            Err(TrackerError::Config { ref field, .. }) if field == "log_file_path"
        ));
    }

    #[test]
    fn test_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig::new(dir.path());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("directory"));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = TrackerConfig::new("Client.txt").with_poll_interval_ms(0);
        assert!(matches!(
            config.validate(),
            Err(TrackerError::Config { ref field, .. }) if field == "poll_interval_ms"
        ));
    }

    #[test]
    fn test_missing_file_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig::new(dir.path().join("not-yet.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scanner_words_trimmed() {
        let config = TrackerConfig::default().with_chat_scanner_words(vec![
            " exalted ".to_string(),
            "".to_string(),
            "   ".to_string(),
            "mirror".to_string(),
        ]);
        assert_eq!(config.scanner_words(), vec!["exalted", "mirror"]);
    }
}
