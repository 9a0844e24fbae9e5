//! Event distribution for mercury
//!
//! This crate provides the topic-keyed publish/subscribe bus that carries
//! classified log events to the UI layer, and a small debounce helper for
//! deferred actions.

mod bus;
mod debounce;
mod error;

pub use bus::{EventBus, Subscription};
pub use debounce::Debouncer;
pub use error::BusError;

// Re-export types used in our public API
pub use mercury_types::{Event, Payload, Topic};
