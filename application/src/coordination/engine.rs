//! Coordination engine
//!
//! Plans a round, runs the plan's strategy through the agent envelopes,
//! synthesizes and scores the outputs, and escalates when needed. A round
//! never surfaces an error to the caller: when the strategy fails or nobody
//! answers, a conservative fallback response is returned instead.

use super::error::CoordinationError;
use super::strategies::{Dispatch, RoundOutcome};
use crate::config::CoordinationConfig;
use crate::ports::escalation::{EscalationHandler, EscalationRequest};
use crate::ports::observer::{CoordinationEvent, CoordinationObserver};
use crate::runtime::AgentRegistry;
use chrono::Utc;
use council_domain::{
    AgentMessage, AgentType, CoordinatedResponse, ExecutionResult, MessageContext,
    QualityAssessor, RiskTier, SessionPlan, SessionPlanner, SupervisionLevel, synthesize,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, warn};

pub struct CoordinationEngine {
    registry: AgentRegistry,
    planner: SessionPlanner,
    assessor: QualityAssessor,
    observer: Arc<dyn CoordinationObserver>,
    escalation: Option<Arc<dyn EscalationHandler>>,
    config: CoordinationConfig,
    plans: Mutex<HashMap<String, SessionPlan>>,
}

impl CoordinationEngine {
    pub fn new(
        registry: AgentRegistry,
        observer: Arc<dyn CoordinationObserver>,
        config: CoordinationConfig,
    ) -> Self {
        let planner = SessionPlanner::default()
            .with_strategy_override(config.strategy_override.clone())
            .with_safety_threshold(config.safety_threshold);
        Self {
            registry,
            planner,
            assessor: QualityAssessor::new(config.safety_threshold),
            observer,
            escalation: None,
            config,
            plans: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the planner, e.g. to use a custom crisis scorer.
    pub fn with_planner(mut self, planner: SessionPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_escalation_handler(mut self, handler: Arc<dyn EscalationHandler>) -> Self {
        self.escalation = Some(handler);
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    /// Latest plan of a session, if it has had a round.
    pub fn session_plan(&self, session_id: &str) -> Option<SessionPlan> {
        self.lock_plans().get(session_id).cloned()
    }

    /// Plan the next round of the message's session.
    pub fn create_session_plan(
        &self,
        message: &AgentMessage,
        context: &MessageContext,
    ) -> Result<SessionPlan, CoordinationError> {
        let previous = self.session_plan(&message.session_id);
        Ok(self
            .planner
            .create_session_plan(message, context, previous.as_ref(), Utc::now())?)
    }

    /// Coordinate one message into one response.
    pub async fn coordinate(
        &self,
        message: &AgentMessage,
        context: &MessageContext,
    ) -> CoordinatedResponse {
        let clock = Instant::now();
        let pre_screen = self.planner.scorer().score(&message.content).tier;

        let mut plan = match self.create_session_plan(message, context) {
            Ok(plan) => plan,
            Err(e) => {
                error!(session = %message.session_id, error = %e, "Could not plan round");
                return self
                    .fallback(message, pre_screen, &e, None, clock)
                    .await;
            }
        };
        let context = context.clone().with_turn(plan.round);
        info!(
            session = %message.session_id,
            round = plan.round,
            strategy = %plan.strategy(),
            pre_screen = %pre_screen,
            "Coordinating message"
        );

        let result = self.execute_strategy(&plan, message, &context, clock).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(session = %message.session_id, error = %e, "Strategy failed");
                return self
                    .fallback(message, pre_screen, &e, Some(plan), clock)
                    .await;
            }
        };
        let RoundOutcome { outputs, records } = outcome;

        let synthesis = synthesize(&outputs, &plan);
        let quality = self.assessor.assess(&outputs, &synthesis, &plan);
        let risk_escalation = synthesis.escalation_needed;
        let quality_escalation = quality.escalation_needed;
        let overall = quality.overall;

        let response = CoordinatedResponse::from_synthesis(
            message.session_id.clone(),
            synthesis,
            quality,
            plan.strategy(),
            records,
            plan.round,
        )
        .with_processing_time(clock.elapsed().as_millis() as u64);

        plan.record_outcome(overall, response.escalation_needed, Utc::now());
        self.store_plan(plan);

        if response.escalation_needed {
            let tier = response.risk_tier.max(pre_screen);
            let (reason, level) =
                escalation_reason(tier, risk_escalation, quality_escalation, overall);
            self.escalate(&message.session_id, reason, tier, level).await;
        }

        self.completed(&response, clock);
        response
    }

    pub(super) async fn dispatch(
        &self,
        agent_type: AgentType,
        task: &str,
        message: &AgentMessage,
        context: &MessageContext,
        clock: Instant,
    ) -> Result<Dispatch, CoordinationError> {
        let agent = self
            .registry
            .get(agent_type)
            .ok_or(CoordinationError::AgentUnavailable(agent_type))?;

        let start_offset = clock.elapsed().as_millis() as u64;
        match tokio::time::timeout(
            self.config.dispatch_timeout,
            agent.execute(message, context, task, clock),
        )
        .await
        {
            Ok((record, output)) => Ok(Dispatch { record, output }),
            Err(_) => Ok(Dispatch {
                record: ExecutionResult::failure(
                    agent.id().clone(),
                    agent_type,
                    task,
                    format!("dispatch timed out after {:?}", self.config.dispatch_timeout),
                    start_offset,
                    clock.elapsed().as_millis() as u64,
                ),
                output: None,
            }),
        }
    }

    async fn fallback(
        &self,
        message: &AgentMessage,
        pre_screen: RiskTier,
        cause: &CoordinationError,
        plan: Option<SessionPlan>,
        clock: Instant,
    ) -> CoordinatedResponse {
        let mut response = CoordinatedResponse::fallback(
            message.session_id.clone(),
            pre_screen,
            cause.to_string(),
        )
        .with_processing_time(clock.elapsed().as_millis() as u64);

        if let Some(mut plan) = plan {
            response = response.with_strategy(plan.strategy()).with_round(plan.round);
            plan.record_outcome(0.0, response.escalation_needed, Utc::now());
            self.store_plan(plan);
        }

        if response.escalation_needed {
            self.escalate(
                &message.session_id,
                format!("crisis risk detected ({} tier) and coordination failed", pre_screen),
                pre_screen,
                SupervisionLevel::Emergency,
            )
            .await;
        }

        self.completed(&response, clock);
        response
    }

    async fn escalate(
        &self,
        session_id: &str,
        reason: String,
        risk_tier: RiskTier,
        level: SupervisionLevel,
    ) {
        warn!(session = %session_id, reason = %reason, tier = %risk_tier, "Escalation triggered");
        self.observer.on_event(&CoordinationEvent::EscalationTriggered {
            session_id: session_id.to_string(),
            reason: reason.clone(),
            risk_tier,
        });

        let Some(handler) = &self.escalation else {
            return;
        };
        let request = EscalationRequest::new(session_id, reason, risk_tier, level);
        match handler.escalate(&request).await {
            Some(record) => info!(
                session = %session_id,
                supervision = %record.id,
                protocol = %record.protocol,
                "Supervision activated"
            ),
            None => error!(session = %session_id, "Escalation could not be handed to supervision"),
        }
    }

    fn completed(&self, response: &CoordinatedResponse, clock: Instant) {
        self.observer.on_event(&CoordinationEvent::CoordinationCompleted {
            session_id: response.session_id.clone(),
            strategy: response.strategy,
            successful_agents: response.successful_agents(),
            escalation_needed: response.escalation_needed,
            quality: response.quality.as_ref().map(|q| q.overall),
            fallback: response.is_fallback,
            duration_ms: clock.elapsed().as_millis() as u64,
        });
    }

    fn store_plan(&self, plan: SessionPlan) {
        self.lock_plans().insert(plan.session_id.clone(), plan);
    }

    fn lock_plans(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionPlan>> {
        self.plans.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Reason and level handed to supervision.
fn escalation_reason(
    tier: RiskTier,
    risk_escalation: bool,
    quality_escalation: bool,
    overall: f64,
) -> (String, SupervisionLevel) {
    if tier.requires_escalation() {
        (
            format!("crisis risk detected ({} tier)", tier),
            SupervisionLevel::Emergency,
        )
    } else if risk_escalation {
        (
            "agent requested escalation".to_string(),
            SupervisionLevel::Direct,
        )
    } else if quality_escalation {
        (
            format!("response quality {:.2} below safety threshold", overall),
            SupervisionLevel::Review,
        )
    } else {
        ("uncertain case".to_string(), SupervisionLevel::Consultation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryPolicy, RuntimeConfig};
    use crate::ports::llm_gateway::{GatewayError, LlmGateway};
    use crate::ports::observer::RecordingObserver;
    use async_trait::async_trait;
    use council_domain::prompt::ROLE_MARKER;
    use council_domain::{
        CircuitBreakerConfig, CoordinationStrategy, CrisisFallbackScorer, SupervisionRecord,
    };
    use std::time::Duration;

    #[derive(Clone)]
    enum Reply {
        Json(String),
        Fail,
        Hang,
    }

    /// Replies keyed by the role line of the system prompt.
    struct RoleGateway {
        replies: HashMap<AgentType, Reply>,
        calls: Mutex<Vec<(AgentType, String)>>,
    }

    impl RoleGateway {
        fn new() -> Self {
            Self {
                replies: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn reply(mut self, agent_type: AgentType, reply: Reply) -> Self {
            self.replies.insert(agent_type, reply);
            self
        }

        fn called(&self) -> Vec<AgentType> {
            self.calls.lock().unwrap().iter().map(|(a, _)| *a).collect()
        }
    }

    fn role_of(system: &str) -> Option<AgentType> {
        let start = system.find(ROLE_MARKER)? + ROLE_MARKER.len();
        system[start..].lines().next()?.trim().parse().ok()
    }

    fn answer(agent_type: AgentType) -> String {
        format!(
            r#"```json
{{"response": "{} view", "confidence": 0.8, "reasoning": "grounded in what the user said",
  "key_insights": ["{} insight"], "recommendations": ["follow up next session"],
  "escalation_needed": false, "risk_level": "low"}}
```"#,
            agent_type.display_name(),
            agent_type.as_str()
        )
    }

    #[async_trait]
    impl LlmGateway for RoleGateway {
        async fn generate(&self, prompt: &str, system: &str) -> Result<String, GatewayError> {
            let agent_type = role_of(system)
                .ok_or_else(|| GatewayError::InvalidResponse("no role".to_string()))?;
            self.calls
                .lock()
                .unwrap()
                .push((agent_type, prompt.to_string()));
            match self.replies.get(&agent_type) {
                Some(Reply::Json(text)) => Ok(text.clone()),
                Some(Reply::Fail) => Err(GatewayError::RequestFailed("scripted failure".to_string())),
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(String::new())
                }
                None => Ok(answer(agent_type)),
            }
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct RecordingEscalation {
        requests: Mutex<Vec<EscalationRequest>>,
    }

    #[async_trait]
    impl EscalationHandler for RecordingEscalation {
        async fn escalate(&self, request: &EscalationRequest) -> Option<SupervisionRecord> {
            self.requests.lock().unwrap().push(request.clone());
            None
        }
    }

    fn engine(
        gateway: Arc<RoleGateway>,
        config: CoordinationConfig,
    ) -> (CoordinationEngine, Arc<RecordingObserver>, Arc<RecordingEscalation>) {
        let observer = Arc::new(RecordingObserver::new());
        let escalation = Arc::new(RecordingEscalation::default());
        let runtime = RuntimeConfig::default()
            .with_call_timeout(Duration::from_millis(200))
            .with_retry(RetryPolicy::none().with_attempt_timeout(Duration::from_secs(1)))
            .with_circuit_breaker(CircuitBreakerConfig::default().with_failure_threshold(100));
        let registry = AgentRegistry::with_all_agents(
            gateway,
            observer.clone(),
            runtime,
            CrisisFallbackScorer::default(),
        );
        let engine = CoordinationEngine::new(registry, observer.clone(), config)
            .with_escalation_handler(escalation.clone());
        (engine, observer, escalation)
    }

    fn forced(strategy: &str) -> CoordinationConfig {
        CoordinationConfig::default().with_strategy_override(strategy)
    }

    #[tokio::test]
    async fn test_parallel_tolerates_one_failing_agent() {
        let gateway = Arc::new(RoleGateway::new().reply(AgentType::ProgressTracking, Reply::Fail));
        let (engine, _, _) = engine(gateway.clone(), forced("parallel"));
        let message = AgentMessage::new("s-par", "u", "I feel a bit off today");
        let context = MessageContext::new();

        let plan = engine.create_session_plan(&message, &context).unwrap();
        assert_eq!(plan.strategy(), CoordinationStrategy::Parallel);
        assert_eq!(plan.coordination.required_agents.len(), 3);

        let outcome = engine
            .execute_strategy(&plan, &message, &context, Instant::now())
            .await
            .unwrap();
        assert_eq!(outcome.outputs.len(), 2);
        assert_eq!(outcome.records.len(), 3);
        assert!(
            outcome
                .outputs
                .iter()
                .all(|o| o.agent_type != AgentType::ProgressTracking)
        );
    }

    #[tokio::test]
    async fn test_hierarchical_stops_after_priority_escalation() {
        let crisis_reply = r#"{"response": "I'm worried about your safety right now.",
            "confidence": 0.95, "reasoning": "explicit intent", "key_insights": ["intent tonight"],
            "recommendations": ["contact crisis line"], "escalation_needed": true,
            "risk_level": "crisis"}"#;
        let gateway = Arc::new(
            RoleGateway::new().reply(AgentType::CrisisSafety, Reply::Json(crisis_reply.to_string())),
        );
        let (engine, observer, escalation) = engine(gateway.clone(), CoordinationConfig::default());
        let message = AgentMessage::new("s-crisis", "u", "I want to kill myself tonight");
        let context = MessageContext::new();

        let plan = engine.create_session_plan(&message, &context).unwrap();
        assert_eq!(plan.strategy(), CoordinationStrategy::Hierarchical);
        let outcome = engine
            .execute_strategy(&plan, &message, &context, Instant::now())
            .await
            .unwrap();
        assert_eq!(outcome.outputs.len(), 1);
        assert_eq!(gateway.called(), vec![AgentType::CrisisSafety]);

        let response = engine.coordinate(&message, &context).await;
        assert!(response.escalation_needed);
        assert!(!response.is_fallback);
        assert_eq!(response.risk_tier, RiskTier::Crisis);
        assert_eq!(gateway.called(), vec![AgentType::CrisisSafety; 2]);

        let requests = escalation.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].level, SupervisionLevel::Emergency);
        assert!(requests[0].reason.contains("crisis"));
        assert_eq!(observer.count("escalation_triggered"), 1);
        assert_eq!(observer.count("coordination_completed"), 1);
    }

    #[tokio::test]
    async fn test_sequential_substitutes_fallback_agent() {
        let gateway =
            Arc::new(RoleGateway::new().reply(AgentType::CulturalAdaptation, Reply::Fail));
        let (engine, _, _) = engine(gateway.clone(), CoordinationConfig::default());
        let message = AgentMessage::new("s-seq", "u", "Hi, work has been stressful lately");

        let response = engine.coordinate(&message, &MessageContext::new()).await;
        assert!(!response.is_fallback);
        assert_eq!(response.strategy, Some(CoordinationStrategy::Sequential));

        let called = gateway.called();
        let cultural = called
            .iter()
            .position(|a| *a == AgentType::CulturalAdaptation)
            .unwrap();
        assert_eq!(called[cultural + 1], AgentType::Coordination);
        assert!(
            response
                .agent_results
                .iter()
                .any(|r| r.agent_type == AgentType::CulturalAdaptation && !r.success)
        );
        assert!(
            response
                .agent_results
                .iter()
                .any(|r| r.agent_type == AgentType::Coordination && r.success)
        );
    }

    #[tokio::test]
    async fn test_sequential_step_without_fallback_yields_safe_response() {
        let gateway = Arc::new(RoleGateway::new().reply(AgentType::CrisisSafety, Reply::Hang));
        let (engine, observer, _) = engine(gateway, CoordinationConfig::default());
        let message = AgentMessage::new("s-fail", "u", "Hi, work has been stressful lately");

        let response = engine.coordinate(&message, &MessageContext::new()).await;
        assert!(response.is_fallback);
        assert!(!response.escalation_needed);
        assert_eq!(response.strategy, Some(CoordinationStrategy::Sequential));
        assert!(response.fallback_reason.unwrap().contains("crisis_safety"));
        assert_eq!(observer.count("coordination_completed"), 1);
        // The failed round still advances the session.
        assert_eq!(engine.session_plan("s-fail").unwrap().round, 1);
    }

    #[tokio::test]
    async fn test_consensus_runs_two_rounds() {
        let gateway = Arc::new(RoleGateway::new());
        let (engine, _, _) = engine(gateway.clone(), forced("consensus"));
        let message = AgentMessage::new(
            "s-con",
            "u",
            "My family expects me to handle this alone and I am struggling",
        );
        let context = MessageContext::new().with_cultural_context("Korean-American, first generation");

        let plan = engine.create_session_plan(&message, &context).unwrap();
        let agents = plan.coordination.required_agents.len();
        let outcome = engine
            .execute_strategy(&plan, &message, &context, Instant::now())
            .await
            .unwrap();
        assert_eq!(outcome.outputs.len(), agents);
        assert_eq!(gateway.called().len(), agents * 2);

        let calls = gateway.calls.lock().unwrap();
        let revised = calls
            .iter()
            .filter(|(_, prompt)| prompt.contains("First-round views"))
            .count();
        assert_eq!(revised, agents);
    }

    #[tokio::test]
    async fn test_unknown_strategy_returns_fallback() {
        let gateway = Arc::new(RoleGateway::new());
        let (engine, _, _) = engine(gateway.clone(), forced("round_robin"));
        let message = AgentMessage::new("s-unknown", "u", "hello");

        let response = engine.coordinate(&message, &MessageContext::new()).await;
        assert!(response.is_fallback);
        assert!(
            response
                .fallback_reason
                .unwrap()
                .contains("Unknown coordination strategy")
        );
        assert!(gateway.called().is_empty());
        assert!(engine.session_plan("s-unknown").is_none());
    }

    #[tokio::test]
    async fn test_crisis_fallback_escalates() {
        let gateway = Arc::new(RoleGateway::new());
        let (engine, _, escalation) = engine(gateway, forced("round_robin"));
        let message = AgentMessage::new("s-cf", "u", "I want to end my life");

        let response = engine.coordinate(&message, &MessageContext::new()).await;
        assert!(response.is_fallback);
        assert!(response.escalation_needed);
        assert_eq!(escalation.requests.lock().unwrap()[0].level, SupervisionLevel::Emergency);
    }

    #[tokio::test]
    async fn test_plan_history_advances_rounds() {
        let gateway = Arc::new(RoleGateway::new());
        let (engine, _, _) = engine(gateway, CoordinationConfig::default());
        let first = AgentMessage::new("s-hist", "u", "Hi there");
        let second = AgentMessage::new("s-hist", "u", "Thanks, that helped a little");

        let r1 = engine.coordinate(&first, &MessageContext::new()).await;
        assert_eq!(r1.round, 1);
        assert_eq!(r1.strategy, Some(CoordinationStrategy::Sequential));

        let r2 = engine.coordinate(&second, &MessageContext::new()).await;
        assert_eq!(r2.round, 2);
        assert_eq!(r2.strategy, Some(CoordinationStrategy::Parallel));

        let plan = engine.session_plan("s-hist").unwrap();
        assert_eq!(plan.round, 2);
        assert!(plan.last_quality_score.is_some());
    }
}
