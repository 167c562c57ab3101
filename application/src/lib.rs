//! Application layer for care-council
//!
//! This crate contains the async use cases, port definitions, and
//! application configuration. It depends only on the domain layer.
//!
//! - [`runtime`]: the agent envelope (capacity, breaker, timeout, health)
//!   and the registry of agents
//! - [`agents`]: what each agent kind does with the generation gateway
//! - [`coordination`]: one message in, one coordinated response out
//! - [`collaboration`]: handoffs, joint interventions, supervision
//! - [`ports`]: gateway, event bus, observer and escalation interfaces

pub mod agents;
pub mod collaboration;
pub mod config;
pub mod coordination;
pub mod ports;
pub mod runtime;

// Re-export commonly used types
pub use collaboration::{CollaborationError, CollaborationWorkflow, StepHook};
pub use config::{
    CollaborationConfig, CoordinationConfig, CouncilConfig, RetryPolicy, RuntimeConfig,
};
pub use coordination::{CoordinationEngine, CoordinationError};
pub use ports::{
    escalation::{EscalationHandler, EscalationRequest},
    event_bus::{EventBus, EventHandler, NoEventBus, Subscription},
    llm_gateway::{GatewayError, LlmGateway},
    observer::{
        BusObserver, CompositeObserver, CoordinationEvent, CoordinationObserver, NoObserver,
        RecordingObserver,
    },
};
pub use runtime::{AgentError, AgentRegistry, AgentRuntime, RuntimeError};
