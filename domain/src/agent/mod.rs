//! Agent domain module
//!
//! Identity, role, lifecycle status, performance accounting, and the
//! value types that flow in and out of one agent execution.

pub mod execution;
pub mod metrics;
pub mod value_objects;

pub use execution::{AgentMessage, AgentOutput, AgentResponse, ExecutionResult, MessageContext};
pub use metrics::{EWMA_ALPHA, PerformanceMetrics};
pub use value_objects::{AgentId, AgentStatus, AgentType};
