//! Joint intervention execution for CollaborationWorkflow.

use super::error::CollaborationError;
use super::workflow::{CollaborationWorkflow, shared_context};
use crate::ports::observer::CoordinationEvent;
use chrono::Utc;
use council_domain::collaboration::{dependency_phases, topological_order};
use council_domain::{
    AgentMessage, AgentOutput, AgentType, CollaborationContext, ExecutionMode,
    InterventionStep, InterventionStepResult, InterventionType, JointIntervention,
};
use futures::future::join_all;
use std::time::Instant;
use tracing::{info, warn};

impl CollaborationWorkflow {
    /// Plan and run a joint intervention across `agents`.
    pub async fn start_joint_intervention(
        &self,
        agents: &[AgentType],
        intervention_type: InterventionType,
        context: &CollaborationContext,
    ) -> Result<JointIntervention, CollaborationError> {
        let intervention = JointIntervention::plan(agents, intervention_type, context, Utc::now())?;
        if let Some(missing) = intervention
            .participants
            .iter()
            .find(|a| !self.registry.contains(**a))
        {
            return Err(CollaborationError::AgentNotRegistered(*missing));
        }

        info!(
            intervention = %intervention.id,
            session = %context.session_id,
            kind = %intervention_type,
            mode = intervention.mode.as_str(),
            leader = %intervention.leader,
            participants = intervention.participants.len(),
            "Starting joint intervention"
        );
        self.execute_intervention(intervention, context).await
    }

    /// Run a planned intervention.
    ///
    /// The dependency graph is checked before any step runs. Step failures
    /// do not error: they end up in the results and the final status.
    pub async fn execute_intervention(
        &self,
        mut intervention: JointIntervention,
        context: &CollaborationContext,
    ) -> Result<JointIntervention, CollaborationError> {
        let order = topological_order(&intervention.steps)?;
        let phases = dependency_phases(&intervention.steps)?;

        intervention.start();
        let message = AgentMessage::new(
            context.session_id.clone(),
            context.user_id.clone(),
            context.trigger_reason.clone(),
        );

        let timeout = intervention.timeout();
        let finished = tokio::time::timeout(
            timeout,
            self.run_steps(&mut intervention, &order, &phases, &message, context),
        )
        .await
        .is_ok();

        if finished {
            intervention.finish(Utc::now());
        } else {
            warn!(intervention = %intervention.id, timeout_ms = intervention.timeout_ms, "Joint intervention timed out");
            intervention.fail(Utc::now());
        }

        let successful_steps = intervention.successful_results().count();
        info!(
            intervention = %intervention.id,
            status = ?intervention.status,
            successful_steps,
            total_steps = intervention.steps.len(),
            "Joint intervention finished"
        );
        self.observer.on_event(&CoordinationEvent::InterventionCompleted {
            intervention_id: intervention.id.clone(),
            status: intervention.status,
            successful_steps,
            total_steps: intervention.steps.len(),
        });
        Ok(intervention)
    }

    async fn run_steps(
        &self,
        intervention: &mut JointIntervention,
        order: &[usize],
        phases: &[Vec<usize>],
        message: &AgentMessage,
        context: &CollaborationContext,
    ) {
        match intervention.mode {
            ExecutionMode::Sequential => {
                for &index in order {
                    let step = intervention.steps[index].clone();
                    let previous = outputs_so_far(intervention);
                    let result = self.run_step_for(&step, message, context, previous).await;
                    let success = result.success;
                    intervention.record_result(result);
                    if !success {
                        warn!(intervention = %intervention.id, step = %step.id, "Step failed, stopping");
                        break;
                    }
                }
            }
            ExecutionMode::Parallel => {
                let steps = intervention.steps.clone();
                let results = join_all(
                    steps
                        .iter()
                        .map(|s| self.run_step_for(s, message, context, Vec::new())),
                )
                .await;
                for result in results {
                    intervention.record_result(result);
                }
            }
            ExecutionMode::Hybrid => {
                for (phase_index, phase) in phases.iter().enumerate() {
                    let previous = outputs_so_far(intervention);
                    let steps: Vec<InterventionStep> =
                        phase.iter().map(|&i| intervention.steps[i].clone()).collect();
                    let results = join_all(
                        steps
                            .iter()
                            .map(|s| self.run_step_for(s, message, context, previous.clone())),
                    )
                    .await;
                    let phase_ok = results.iter().all(|r| r.success);
                    for result in results {
                        intervention.record_result(result);
                    }
                    if !phase_ok {
                        warn!(intervention = %intervention.id, phase = phase_index, "Phase failed, stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn run_step_for(
        &self,
        step: &InterventionStep,
        message: &AgentMessage,
        context: &CollaborationContext,
        previous: Vec<AgentOutput>,
    ) -> InterventionStepResult {
        let started = Instant::now();
        let outcome = match self.registry.get(step.agent_type) {
            Some(agent) => {
                let agent_context =
                    shared_context(&context.shared, &step.description).with_previous_responses(previous);
                agent
                    .process_message(message, &agent_context)
                    .await
                    .map(|response| response.output)
                    .map_err(|e| e.to_string())
            }
            None => Err(format!("agent {} is not registered", step.agent_type)),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(output) => InterventionStepResult {
                step_id: step.id.clone(),
                agent_type: step.agent_type,
                success: true,
                output: Some(output),
                error: None,
                duration_ms,
            },
            Err(error) => InterventionStepResult {
                step_id: step.id.clone(),
                agent_type: step.agent_type,
                success: false,
                output: None,
                error: Some(error),
                duration_ms,
            },
        }
    }
}

fn outputs_so_far(intervention: &JointIntervention) -> Vec<AgentOutput> {
    intervention
        .successful_results()
        .filter_map(|r| r.output.clone())
        .collect()
}
