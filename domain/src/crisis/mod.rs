//! Crisis risk tiers and the deterministic fallback scorer

pub mod scorer;
pub mod tier;

pub use scorer::{CrisisAssessment, CrisisFallbackScorer};
pub use tier::RiskTier;
