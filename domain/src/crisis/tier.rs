//! Ranked risk tiers.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Risk tier, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    #[default]
    None,
    Low,
    Moderate,
    High,
    Crisis,
}

impl RiskTier {
    pub fn score(&self) -> u8 {
        match self {
            RiskTier::None => 0,
            RiskTier::Low => 2,
            RiskTier::Moderate => 4,
            RiskTier::High => 7,
            RiskTier::Crisis => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::None => "none",
            RiskTier::Low => "low",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
            RiskTier::Crisis => "crisis",
        }
    }

    /// High and crisis tiers require safety handling.
    pub fn requires_escalation(&self) -> bool {
        *self >= RiskTier::High
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = String;

    /// Accepts the tier names plus the synonyms generation output tends to
    /// use (`medium`, `critical`, `imminent`, `severe`, `minimal`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "minimal" => Ok(RiskTier::None),
            "low" => Ok(RiskTier::Low),
            "moderate" | "medium" => Ok(RiskTier::Moderate),
            "high" | "severe" => Ok(RiskTier::High),
            "crisis" | "critical" | "imminent" => Ok(RiskTier::Crisis),
            other => Err(format!("unknown risk tier: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(RiskTier::Crisis > RiskTier::High);
        assert!(RiskTier::High > RiskTier::Moderate);
        assert!(RiskTier::Moderate > RiskTier::Low);
        assert!(RiskTier::Low > RiskTier::None);
    }

    #[test]
    fn test_synonyms() {
        assert_eq!("Critical".parse::<RiskTier>().unwrap(), RiskTier::Crisis);
        assert_eq!("medium".parse::<RiskTier>().unwrap(), RiskTier::Moderate);
        assert!("purple".parse::<RiskTier>().is_err());
    }

    #[test]
    fn test_escalation_threshold() {
        assert!(RiskTier::High.requires_escalation());
        assert!(RiskTier::Crisis.requires_escalation());
        assert!(!RiskTier::Moderate.requires_escalation());
    }
}
