//! Application-level configuration.
//!
//! - [`RuntimeConfig`] / [`RetryPolicy`]: agent envelope and analysis retries
//! - [`CoordinationConfig`]: strategy override, dispatch timeout, safety threshold
//! - [`CollaborationConfig`]: session monitoring and history
//! - [`CouncilConfig`]: container for all of the above

pub mod council_config;
pub mod engine_config;
pub mod runtime_config;

pub use council_config::CouncilConfig;
pub use engine_config::{CollaborationConfig, CoordinationConfig};
pub use runtime_config::{RetryPolicy, RuntimeConfig};
