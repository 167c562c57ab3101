//! Logging infrastructure: structured coordination event logging.
//!
//! Provides [`JsonlEventLogger`], a JSONL file writer that implements
//! the [`CoordinationObserver`](council_application::CoordinationObserver) port.

mod jsonl_event_logger;

pub use jsonl_event_logger::JsonlEventLogger;
