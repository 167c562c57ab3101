//! Agent runtime: the execution envelope and the registry of agents.

pub mod envelope;
pub mod error;
pub mod registry;

pub use envelope::AgentRuntime;
pub use error::{AgentError, RuntimeError};
pub use registry::AgentRegistry;
