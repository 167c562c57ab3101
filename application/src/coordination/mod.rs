//! Coordination: planning a round, running a strategy through the agent
//! envelopes, and assembling the response.

pub mod engine;
pub mod error;
pub mod strategies;

pub use engine::CoordinationEngine;
pub use error::CoordinationError;
pub use strategies::RoundOutcome;
