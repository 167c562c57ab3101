//! Collaboration workflow
//!
//! Moves a case between agents under a handoff protocol, runs joint
//! interventions and activates supervision. Every handoff call owns its
//! session; the workflow only keeps snapshots for monitoring and
//! introspection, refreshed after each step.

use super::hooks::{HookRegistry, StepHook};
use crate::config::CollaborationConfig;
use crate::ports::event_bus::EventBus;
use crate::ports::observer::CoordinationObserver;
use crate::runtime::AgentRegistry;
use council_domain::collaboration::keys;
use council_domain::{
    AgentType, CollaborationContext, CollaborationSession, MessageContext, ProtocolLibrary,
    SupervisionProtocol, SupervisionRecord, WorkflowType,
};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
pub(super) struct WorkflowState {
    pub(super) active: HashMap<String, CollaborationSession>,
    pub(super) history: VecDeque<CollaborationSession>,
    /// Sessions already reported as timed out
    pub(super) timed_out: HashSet<String>,
    pub(super) supervision: VecDeque<SupervisionRecord>,
}

pub struct CollaborationWorkflow {
    pub(super) registry: AgentRegistry,
    pub(super) protocols: ProtocolLibrary,
    pub(super) supervision_protocols: Vec<SupervisionProtocol>,
    pub(super) hooks: HookRegistry,
    pub(super) bus: Arc<dyn EventBus>,
    pub(super) observer: Arc<dyn CoordinationObserver>,
    pub(super) config: CollaborationConfig,
    pub(super) state: Mutex<WorkflowState>,
}

impl CollaborationWorkflow {
    pub fn new(
        registry: AgentRegistry,
        bus: Arc<dyn EventBus>,
        observer: Arc<dyn CoordinationObserver>,
        config: CollaborationConfig,
    ) -> Self {
        Self {
            registry,
            protocols: ProtocolLibrary::default(),
            supervision_protocols: SupervisionProtocol::defaults(),
            hooks: HookRegistry::default(),
            bus,
            observer,
            config,
            state: Mutex::new(WorkflowState::default()),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_protocols(mut self, protocols: ProtocolLibrary) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_supervision_protocols(mut self, protocols: Vec<SupervisionProtocol>) -> Self {
        self.supervision_protocols = protocols;
        self
    }

    /// Register a hook for `custom(name)` steps.
    pub fn with_hook(mut self, name: impl Into<String>, hook: Arc<dyn StepHook>) -> Self {
        self.hooks.register(name, hook);
        self
    }

    // ==================== Introspection ====================

    pub fn config(&self) -> &CollaborationConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn protocols(&self) -> &ProtocolLibrary {
        &self.protocols
    }

    /// A context using the configured default maximum duration.
    pub fn context(
        &self,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        primary_agent: AgentType,
        workflow_type: WorkflowType,
        trigger_reason: impl Into<String>,
    ) -> CollaborationContext {
        CollaborationContext::new(session_id, user_id, primary_agent, workflow_type, trigger_reason)
            .with_max_duration(self.config.default_max_duration)
    }

    /// Latest snapshot of a running or archived collaboration.
    pub fn session(&self, collaboration_id: &str) -> Option<CollaborationSession> {
        let state = self.lock();
        state.active.get(collaboration_id).cloned().or_else(|| {
            state
                .history
                .iter()
                .find(|s| s.id == collaboration_id)
                .cloned()
        })
    }

    pub fn active_sessions(&self) -> Vec<CollaborationSession> {
        let mut sessions: Vec<_> = self.lock().active.values().cloned().collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    /// Finished collaborations, oldest first.
    pub fn history(&self) -> Vec<CollaborationSession> {
        self.lock().history.iter().cloned().collect()
    }

    /// Supervision activated for a care session.
    pub fn supervision_records(&self, session_id: &str) -> Vec<SupervisionRecord> {
        self.lock()
            .supervision
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    // ==================== Snapshots ====================

    pub(super) fn track(&self, session: &CollaborationSession) {
        self.lock()
            .active
            .insert(session.id.clone(), session.clone());
    }

    /// Move a finished session from the active set into history.
    pub(super) fn archive(&self, session: &CollaborationSession) {
        let retention = self.config.history_retention;
        let mut state = self.lock();
        state.active.remove(&session.id);
        state.timed_out.remove(&session.id);
        state.history.push_back(session.clone());
        while state.history.len() > retention {
            state.history.pop_front();
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for CollaborationWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaborationWorkflow")
            .field("registry", &self.registry)
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .finish()
    }
}

/// Message context carrying shared case data to an agent.
pub(super) fn shared_context(shared: &Map<String, Value>, task: &str) -> MessageContext {
    let mut context = MessageContext::new().with_task(task);
    if let Some(cultural) = shared.get(keys::CULTURAL_CONTEXT).and_then(Value::as_str) {
        context = context.with_cultural_context(cultural);
    }
    context.shared = shared.clone();
    context
}
