//! Failed-event pipeline: watch-driven promotion of node failure reports
//! into a time-bounded history keyspace, plus the read side.

pub mod pipeline;
pub mod types;

pub use pipeline::{read_history, spawn_failed_events_pipeline};
pub use types::FailedEvent;
