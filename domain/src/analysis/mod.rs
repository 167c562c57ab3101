//! Validation of structured output from the generation capability

pub mod parser;

pub use parser::{AgentAnalysis, DEFAULT_CONFIDENCE, analysis_from_json, parse_analysis};
