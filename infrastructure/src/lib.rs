//! Infrastructure layer for care-council
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod bus;
pub mod config;
pub mod fixtures;
pub mod gateway;
pub mod logging;

// Re-export commonly used types
pub use bus::InProcessEventBus;
pub use config::{ConfigLoader, FileConfig, FileGatewayConfig, FileLoggingConfig, FileOutputConfig};
pub use fixtures::CannedLlmGateway;
pub use gateway::OpenAiGateway;
pub use logging::JsonlEventLogger;
