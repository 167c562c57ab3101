//! Escalation port
//!
//! The coordination engine hands escalations to this port; the
//! collaboration workflow implements it by activating supervision.

use async_trait::async_trait;
use council_domain::{RiskTier, SupervisionLevel, SupervisionRecord};

/// Request for human supervision of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationRequest {
    pub session_id: String,
    pub reason: String,
    pub risk_tier: RiskTier,
    pub level: SupervisionLevel,
}

impl EscalationRequest {
    pub fn new(
        session_id: impl Into<String>,
        reason: impl Into<String>,
        risk_tier: RiskTier,
        level: SupervisionLevel,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            reason: reason.into(),
            risk_tier,
            level,
        }
    }
}

#[async_trait]
pub trait EscalationHandler: Send + Sync {
    /// Activate supervision. `None` when no supervision could be arranged.
    async fn escalate(&self, request: &EscalationRequest) -> Option<SupervisionRecord>;
}
