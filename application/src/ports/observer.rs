//! Coordination observer port.
//!
//! Every component reports what it does through [`CoordinationObserver`].
//! Event names are stable and payloads serialize to JSON with a `type`
//! field carrying the name, so log files and bus subscribers can rely on
//! them.

use super::event_bus::EventBus;
use council_domain::{
    AgentType, CoordinationStrategy, GateFailureAction, InterventionStatus, RiskTier,
    SupervisionLevel,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Channel prefix used by [`BusObserver`].
pub const CHANNEL_PREFIX: &str = "council";

/// Something that happened in the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinationEvent {
    ProcessingStarted {
        agent_id: String,
        agent_type: AgentType,
        session_id: String,
    },
    ProcessingCompleted {
        agent_id: String,
        agent_type: AgentType,
        session_id: String,
        duration_ms: u64,
    },
    ProcessingError {
        agent_id: String,
        agent_type: AgentType,
        session_id: String,
        error: String,
        duration_ms: u64,
    },
    HealthCheckFailed {
        agent_id: String,
        agent_type: AgentType,
        reason: String,
    },
    AgentRecovered {
        agent_id: String,
        agent_type: AgentType,
    },
    AgentShutdown {
        agent_id: String,
        agent_type: AgentType,
        forced_sessions: usize,
    },
    CoordinationCompleted {
        session_id: String,
        strategy: Option<CoordinationStrategy>,
        successful_agents: usize,
        escalation_needed: bool,
        quality: Option<f64>,
        fallback: bool,
        duration_ms: u64,
    },
    EscalationTriggered {
        session_id: String,
        reason: String,
        risk_tier: RiskTier,
    },
    SessionStarted {
        collaboration_id: String,
        session_id: String,
        protocol: String,
        from: AgentType,
        to: AgentType,
    },
    StepCompleted {
        collaboration_id: String,
        step_id: String,
        attempts: u32,
    },
    StepFailed {
        collaboration_id: String,
        step_id: String,
        critical: bool,
        error: String,
    },
    QualityGateFailed {
        collaboration_id: String,
        gate: String,
        score: f64,
        action: GateFailureAction,
    },
    SessionCompleted {
        collaboration_id: String,
        duration_ms: u64,
    },
    SessionFailed {
        collaboration_id: String,
        reason: String,
    },
    SessionTimeout {
        collaboration_id: String,
        elapsed_ms: u64,
        max_duration_ms: u64,
    },
    SupervisionActivated {
        session_id: String,
        supervision_id: String,
        protocol: String,
        level: SupervisionLevel,
        supervisor: String,
    },
    ProcedureApplied {
        supervision_id: String,
        procedure: String,
        requires_human: bool,
    },
    InterventionCompleted {
        intervention_id: String,
        status: InterventionStatus,
        successful_steps: usize,
        total_steps: usize,
    },
}

impl CoordinationEvent {
    /// Stable event name.
    pub fn name(&self) -> &'static str {
        match self {
            CoordinationEvent::ProcessingStarted { .. } => "processing_started",
            CoordinationEvent::ProcessingCompleted { .. } => "processing_completed",
            CoordinationEvent::ProcessingError { .. } => "processing_error",
            CoordinationEvent::HealthCheckFailed { .. } => "health_check_failed",
            CoordinationEvent::AgentRecovered { .. } => "agent_recovered",
            CoordinationEvent::AgentShutdown { .. } => "agent_shutdown",
            CoordinationEvent::CoordinationCompleted { .. } => "coordination_completed",
            CoordinationEvent::EscalationTriggered { .. } => "escalation_triggered",
            CoordinationEvent::SessionStarted { .. } => "session_started",
            CoordinationEvent::StepCompleted { .. } => "step_completed",
            CoordinationEvent::StepFailed { .. } => "step_failed",
            CoordinationEvent::QualityGateFailed { .. } => "quality_gate_failed",
            CoordinationEvent::SessionCompleted { .. } => "session_completed",
            CoordinationEvent::SessionFailed { .. } => "session_failed",
            CoordinationEvent::SessionTimeout { .. } => "session_timeout",
            CoordinationEvent::SupervisionActivated { .. } => "supervision_activated",
            CoordinationEvent::ProcedureApplied { .. } => "procedure_applied",
            CoordinationEvent::InterventionCompleted { .. } => "intervention_completed",
        }
    }

    /// JSON payload, including the `type` field.
    pub fn payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "type": self.name() }))
    }

    /// Bus channel for this event.
    pub fn channel(&self) -> String {
        format!("{}.{}", CHANNEL_PREFIX, self.name())
    }
}

/// Receives engine events. Must not block.
pub trait CoordinationObserver: Send + Sync {
    fn on_event(&self, event: &CoordinationEvent);
}

/// No-op observer
pub struct NoObserver;

impl CoordinationObserver for NoObserver {
    fn on_event(&self, _event: &CoordinationEvent) {}
}

/// Forwards events to an [`EventBus`] on `council.<event_name>`.
pub struct BusObserver {
    bus: Arc<dyn EventBus>,
}

impl BusObserver {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }
}

impl CoordinationObserver for BusObserver {
    fn on_event(&self, event: &CoordinationEvent) {
        self.bus.publish(&event.channel(), event.payload());
    }
}

/// Fans events out to several observers in order.
#[derive(Default)]
pub struct CompositeObserver {
    delegates: Vec<Arc<dyn CoordinationObserver>>,
}

impl CompositeObserver {
    pub fn new(delegates: Vec<Arc<dyn CoordinationObserver>>) -> Self {
        Self { delegates }
    }

    pub fn push(&mut self, observer: Arc<dyn CoordinationObserver>) {
        self.delegates.push(observer);
    }

    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }
}

impl CoordinationObserver for CompositeObserver {
    fn on_event(&self, event: &CoordinationEvent) {
        for d in &self.delegates {
            d.on_event(event);
        }
    }
}

/// Observer that records every event, for tests and introspection.
#[derive(Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<CoordinationEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CoordinationEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl CoordinationObserver for RecordingObserver {
    fn on_event(&self, event: &CoordinationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::event_bus::{EventHandler, Subscription};
    use std::sync::Mutex;

    struct CapturingBus {
        published: Mutex<Vec<(String, Value)>>,
    }

    impl EventBus for CapturingBus {
        fn publish(&self, channel: &str, payload: Value) -> usize {
            self.published
                .lock()
                .unwrap()
                .push((channel.to_string(), payload));
            1
        }

        fn subscribe(&self, _pattern: &str, _handler: EventHandler) -> Subscription {
            Subscription::new(0, || {})
        }

        fn health_check(&self) -> bool {
            true
        }
    }

    fn started() -> CoordinationEvent {
        CoordinationEvent::ProcessingStarted {
            agent_id: "intake-1".to_string(),
            agent_type: AgentType::Intake,
            session_id: "s-1".to_string(),
        }
    }

    #[test]
    fn test_payload_carries_type_name() {
        let payload = started().payload();
        assert_eq!(payload["type"], "processing_started");
        assert_eq!(payload["agent_type"], "intake");
        assert_eq!(started().channel(), "council.processing_started");
    }

    #[test]
    fn test_bus_observer_publishes_on_named_channel() {
        let bus = Arc::new(CapturingBus {
            published: Mutex::new(Vec::new()),
        });
        let observer = BusObserver::new(bus.clone());
        observer.on_event(&CoordinationEvent::EscalationTriggered {
            session_id: "s".to_string(),
            reason: "crisis tier".to_string(),
            risk_tier: RiskTier::Crisis,
        });
        let published = bus.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "council.escalation_triggered");
        assert_eq!(published[0].1["risk_tier"], "crisis");
    }

    #[test]
    fn test_composite_delegates_in_order() {
        let a = Arc::new(RecordingObserver::new());
        let b = Arc::new(RecordingObserver::new());
        let composite = CompositeObserver::new(vec![a.clone(), b.clone()]);
        composite.on_event(&started());
        assert_eq!(a.names(), vec!["processing_started"]);
        assert_eq!(b.count("processing_started"), 1);
    }
}
