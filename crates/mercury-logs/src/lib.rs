//! Log processing for mercury
//!
//! This crate tails the game client log, classifies each line through a chain
//! of message interceptors and publishes the resulting events on the bus.

mod chain;
mod config;
mod error;
mod filter;
mod history;
pub mod interceptor;
mod poller;
mod tail;

pub use chain::{InterceptorChain, RouteOutcome};
pub use config::{StartPosition, TrackerConfig, DEFAULT_LOG_FILE_PATH};
pub use error::TrackerError;
pub use filter::MessageFilter;
pub use history::{EventHistory, HistoryRecord, TopicCounts};
pub use interceptor::MessageInterceptor;
pub use poller::{Poller, PollerHandle, PollerStats};
pub use tail::{FileIdentity, LogPosition, LogTailer};

// Re-export types used in our public API
pub use mercury_bus::EventBus;
pub use mercury_types::{Event, Payload, RawLine, Topic};
