//! Custom handoff step hooks.
//!
//! A protocol step with a `custom(name)` action runs the hook registered
//! under that name. Hooks act on the workflow's own copy of the session.

use async_trait::async_trait;
use council_domain::CollaborationSession;
use council_domain::collaboration::{RESTORE_OWNERSHIP_HOOK, keys};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait StepHook: Send + Sync {
    async fn run(&self, session: &mut CollaborationSession) -> Result<(), String>;
}

/// Hands the session back to the agent that started the handoff.
pub struct RestoreOwnership;

#[async_trait]
impl StepHook for RestoreOwnership {
    async fn run(&self, session: &mut CollaborationSession) -> Result<(), String> {
        session
            .shared
            .insert(keys::OWNER.to_string(), json!(session.source.as_str()));
        session
            .shared
            .insert(keys::OWNERSHIP_RESTORED.to_string(), json!(true));
        Ok(())
    }
}

/// Named hooks. `restore_ownership` is always present unless replaced.
#[derive(Clone)]
pub struct HookRegistry {
    hooks: HashMap<String, Arc<dyn StepHook>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        let mut hooks: HashMap<String, Arc<dyn StepHook>> = HashMap::new();
        hooks.insert(RESTORE_OWNERSHIP_HOOK.to_string(), Arc::new(RestoreOwnership));
        Self { hooks }
    }
}

impl HookRegistry {
    pub fn register(&mut self, name: impl Into<String>, hook: Arc<dyn StepHook>) {
        self.hooks.insert(name.into(), hook);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StepHook>> {
        self.hooks.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use council_domain::{AgentType, CollaborationContext, HandoffProtocol, WorkflowType};

    #[tokio::test]
    async fn test_restore_ownership_returns_session_to_source() {
        let context = CollaborationContext::new(
            "s-1",
            "u-1",
            AgentType::Intake,
            WorkflowType::Handoff,
            "routine",
        );
        let mut session = CollaborationSession::new(
            context,
            HandoffProtocol::standard(),
            AgentType::Coordination,
            Utc::now(),
        );
        session
            .shared
            .insert(keys::OWNER.to_string(), json!("coordination"));

        let hooks = HookRegistry::default();
        let hook = hooks.get(RESTORE_OWNERSHIP_HOOK).unwrap();
        hook.run(&mut session).await.unwrap();

        assert_eq!(session.owner(), Some("intake"));
        assert_eq!(session.shared[keys::OWNERSHIP_RESTORED], json!(true));
    }

    #[test]
    fn test_register_adds_hook() {
        struct Noop;
        #[async_trait]
        impl StepHook for Noop {
            async fn run(&self, _session: &mut CollaborationSession) -> Result<(), String> {
                Ok(())
            }
        }

        let mut hooks = HookRegistry::default();
        hooks.register("noop", Arc::new(Noop));
        assert_eq!(hooks.names(), vec!["noop", RESTORE_OWNERSHIP_HOOK]);
    }
}
