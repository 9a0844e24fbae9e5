use mercury_bus::BusError;
use mercury_types::Topic;

/// Errors raised while tailing and classifying the client log
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Unusable configuration; the tracker does not start
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    /// Filter matched but the expected anchors were not found
    #[error("malformed {topic} line: {reason}")]
    MalformedMatch { topic: Topic, reason: String },

    /// Reading the log file failed (usually transient)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}

impl TrackerError {
    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(topic: Topic, reason: impl Into<String>) -> Self {
        Self::MalformedMatch {
            topic,
            reason: reason.into(),
        }
    }
}
