//! Strategy execution.
//!
//! One method per [`CoordinationStrategy`]; [`CoordinationEngine::execute_strategy`]
//! is the dispatch table. Dispatch never retries: a failed agent call is
//! recorded and, where the plan allows, replaced by its fallback agent.

use super::engine::CoordinationEngine;
use super::error::CoordinationError;
use council_domain::{
    AgentMessage, AgentOutput, AgentType, CoordinationStrategy, ExecutionResult, MessageContext,
    SessionPlan,
};
use futures::future::join_all;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What one strategy run produced.
#[derive(Debug, Clone, Default)]
pub struct RoundOutcome {
    /// Outputs of successful executions, in dispatch order
    pub outputs: Vec<AgentOutput>,
    /// Every execution record, failures included
    pub records: Vec<ExecutionResult>,
}

impl RoundOutcome {
    fn push(&mut self, record: ExecutionResult, output: Option<AgentOutput>) {
        self.records.push(record);
        if let Some(output) = output {
            self.outputs.push(output);
        }
    }
}

/// One dispatched call.
pub(super) struct Dispatch {
    pub record: ExecutionResult,
    pub output: Option<AgentOutput>,
}

impl CoordinationEngine {
    /// Run the plan's strategy.
    pub async fn execute_strategy(
        &self,
        plan: &SessionPlan,
        message: &AgentMessage,
        context: &MessageContext,
        clock: Instant,
    ) -> Result<RoundOutcome, CoordinationError> {
        let strategy = plan.strategy();
        info!(
            session = %message.session_id,
            strategy = %strategy,
            agents = plan.coordination.required_agents.len(),
            "Executing coordination strategy"
        );
        let outcome = match strategy {
            CoordinationStrategy::Sequential => self.run_sequential(plan, message, context, clock).await,
            CoordinationStrategy::Parallel => self.run_parallel(plan, message, context, clock).await,
            CoordinationStrategy::Hierarchical => {
                self.run_hierarchical(plan, message, context, clock).await
            }
            CoordinationStrategy::Consensus => self.run_consensus(plan, message, context, clock).await,
        }?;

        if outcome.outputs.is_empty() {
            return Err(CoordinationError::NoResults);
        }
        Ok(outcome)
    }

    /// Ascending step order; each output is threaded into the next step's
    /// context. A failed step is replaced by its fallback agent when the
    /// plan has one, otherwise the round fails.
    async fn run_sequential(
        &self,
        plan: &SessionPlan,
        message: &AgentMessage,
        context: &MessageContext,
        clock: Instant,
    ) -> Result<RoundOutcome, CoordinationError> {
        let mut outcome = RoundOutcome::default();

        for step in plan.coordination.ordered_steps() {
            let step_context = context
                .clone()
                .with_task(step.task.clone())
                .with_previous_responses(outcome.outputs.clone());
            let dispatch = self
                .dispatch(step.agent_type, &step.task, message, &step_context, clock)
                .await?;
            let error = dispatch.record.error.clone().unwrap_or_default();
            let succeeded = dispatch.output.is_some();
            outcome.push(dispatch.record, dispatch.output);
            if succeeded {
                continue;
            }

            let Some(fallback) = plan.coordination.fallback_for(step.agent_type) else {
                return Err(CoordinationError::StepFailed {
                    agent: step.agent_type,
                    error,
                });
            };
            warn!(
                failed = %step.agent_type,
                substitute = %fallback.substitute,
                reason = %fallback.reason,
                "Sequential step failed, using fallback agent"
            );
            let task = format!("Cover for the {} agent: {}", step.agent_type.display_name(), step.task);
            let fallback_context = step_context.with_task(task.clone());
            let substitute = self
                .dispatch(fallback.substitute, &task, message, &fallback_context, clock)
                .await?;
            if substitute.output.is_none() {
                return Err(CoordinationError::StepFailed {
                    agent: step.agent_type,
                    error: format!(
                        "{}; fallback {} also failed: {}",
                        error,
                        fallback.substitute,
                        substitute.record.error.clone().unwrap_or_default()
                    ),
                });
            }
            outcome.push(substitute.record, substitute.output);
        }
        Ok(outcome)
    }

    /// All required agents at once. Failures never cancel the others.
    async fn run_parallel(
        &self,
        plan: &SessionPlan,
        message: &AgentMessage,
        context: &MessageContext,
        clock: Instant,
    ) -> Result<RoundOutcome, CoordinationError> {
        self.dispatch_all(plan, &plan.coordination.required_agents, message, context, clock)
            .await
    }

    /// Crisis-safety first. If it escalates, nothing else runs; otherwise
    /// the rest follow in fixed precedence.
    async fn run_hierarchical(
        &self,
        plan: &SessionPlan,
        message: &AgentMessage,
        context: &MessageContext,
        clock: Instant,
    ) -> Result<RoundOutcome, CoordinationError> {
        let mut outcome = RoundOutcome::default();
        let required = &plan.coordination.required_agents;

        if required.contains(&AgentType::CrisisSafety) {
            let task = task_for(plan, AgentType::CrisisSafety);
            let priority_context = context.clone().with_task(task.clone());
            let dispatch = self
                .dispatch(AgentType::CrisisSafety, &task, message, &priority_context, clock)
                .await?;
            let escalated = dispatch.output.as_ref().is_some_and(|o| o.escalation_needed);
            outcome.push(dispatch.record, dispatch.output);
            if escalated {
                info!(session = %message.session_id, "Priority agent escalated, skipping the rest");
                return Ok(outcome);
            }
        }

        for agent_type in AgentType::PRECEDENCE {
            if !required.contains(&agent_type) {
                continue;
            }
            let task = task_for(plan, agent_type);
            let step_context = context
                .clone()
                .with_task(task.clone())
                .with_previous_responses(outcome.outputs.clone());
            let dispatch = self
                .dispatch(agent_type, &task, message, &step_context, clock)
                .await?;
            if dispatch.output.is_none() {
                debug!(agent = %agent_type, "Hierarchical step failed, continuing");
            }
            outcome.push(dispatch.record, dispatch.output);
        }
        Ok(outcome)
    }

    /// Round one in parallel, then round two with every round-one output as
    /// peer context. Only round-two outputs are returned.
    async fn run_consensus(
        &self,
        plan: &SessionPlan,
        message: &AgentMessage,
        context: &MessageContext,
        clock: Instant,
    ) -> Result<RoundOutcome, CoordinationError> {
        let agents = &plan.coordination.required_agents;
        let first = self.dispatch_all(plan, agents, message, context, clock).await?;
        if first.outputs.is_empty() {
            return Err(CoordinationError::NoResults);
        }
        debug!(
            session = %message.session_id,
            round_one = first.outputs.len(),
            "Consensus round one complete"
        );

        let revision_context = context.clone().with_peer_outputs(first.outputs);
        self.dispatch_all(plan, agents, message, &revision_context, clock)
            .await
    }

    async fn dispatch_all(
        &self,
        plan: &SessionPlan,
        agents: &[AgentType],
        message: &AgentMessage,
        context: &MessageContext,
        clock: Instant,
    ) -> Result<RoundOutcome, CoordinationError> {
        let calls = agents.iter().map(|agent_type| {
            let task = task_for(plan, *agent_type);
            let agent_context = context.clone().with_task(task.clone());
            async move {
                self.dispatch(*agent_type, &task, message, &agent_context, clock)
                    .await
            }
        });

        let mut outcome = RoundOutcome::default();
        for dispatch in join_all(calls).await {
            let dispatch = dispatch?;
            outcome.push(dispatch.record, dispatch.output);
        }
        Ok(outcome)
    }
}

fn task_for(plan: &SessionPlan, agent_type: AgentType) -> String {
    plan.coordination
        .step_for(agent_type)
        .map(|s| s.task.clone())
        .unwrap_or_else(|| format!("Contribute the {} perspective", agent_type.display_name()))
}
