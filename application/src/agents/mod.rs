//! Agent logic: what each agent kind does inside its envelope.

pub mod analysis;
pub mod logic;

pub use analysis::run_analysis;
pub use logic::AgentLogic;
