//! The set of agents a council fields, at most one per type.

use super::envelope::AgentRuntime;
use crate::agents::AgentLogic;
use crate::config::RuntimeConfig;
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::observer::CoordinationObserver;
use council_domain::{AgentType, CrisisFallbackScorer};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentType, Arc<AgentRuntime>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One agent of every type sharing the same gateway, observer and
    /// config.
    pub fn with_all_agents(
        gateway: Arc<dyn LlmGateway>,
        observer: Arc<dyn CoordinationObserver>,
        config: RuntimeConfig,
        scorer: CrisisFallbackScorer,
    ) -> Self {
        let mut registry = Self::new();
        for agent_type in AgentType::ALL {
            registry.register(Arc::new(AgentRuntime::new(
                AgentLogic::for_type(agent_type, scorer.clone()),
                Arc::clone(&gateway),
                Arc::clone(&observer),
                config.clone(),
            )));
        }
        registry
    }

    /// Add an agent, replacing any agent of the same type.
    pub fn register(&mut self, agent: Arc<AgentRuntime>) -> Option<Arc<AgentRuntime>> {
        self.agents.insert(agent.agent_type(), agent)
    }

    pub fn get(&self, agent_type: AgentType) -> Option<Arc<AgentRuntime>> {
        self.agents.get(&agent_type).cloned()
    }

    pub fn contains(&self, agent_type: AgentType) -> bool {
        self.agents.contains_key(&agent_type)
    }

    pub fn types(&self) -> Vec<AgentType> {
        self.agents.keys().copied().collect()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Arc<AgentRuntime>> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Health of every agent, checked concurrently.
    pub async fn health_check_all(&self) -> Vec<(AgentType, bool)> {
        let checks = self
            .agents
            .values()
            .map(|agent| async move { (agent.agent_type(), agent.health_check().await) });
        join_all(checks).await
    }

    pub fn spawn_health_monitors(
        &self,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        self.agents
            .values()
            .map(|agent| agent.spawn_health_monitor(interval, cancel.child_token()))
            .collect()
    }

    /// Shut every agent down concurrently. Returns the total number of
    /// calls that had to be force-cleared.
    pub async fn shutdown_all(&self, grace: Duration) -> usize {
        info!(agents = self.agents.len(), "Shutting down council");
        join_all(self.agents.values().map(|agent| agent.shutdown(grace)))
            .await
            .into_iter()
            .sum()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.agents.keys()).finish()
    }
}
