//! Prompt domain
//!
//! Templates for the system context and analysis prompt of each agent kind.

pub mod agent;

pub use agent::{AgentPromptTemplate, ROLE_MARKER};
