//! Collaboration workflow: handoffs between agents, joint interventions,
//! supervision and session monitoring.
//!
//! [`CollaborationWorkflow`] is split across files by concern:
//!
//! - `workflow.rs`: struct, builders, snapshots and introspection
//! - `handoff.rs`: protocol steps, quality gates, rollback
//! - `intervention.rs`: joint interventions over a step graph
//! - `supervision.rs`: supervision activation and the escalation handler
//! - `monitor.rs`: timeout detection and history upkeep

pub mod error;
mod handoff;
pub mod hooks;
mod intervention;
mod monitor;
mod supervision;
pub mod workflow;

pub use error::{CollaborationError, StepError};
pub use hooks::{HookRegistry, RestoreOwnership, StepHook};
pub use workflow::CollaborationWorkflow;
