//! Agent execution envelope.
//!
//! [`AgentRuntime`] wraps one [`AgentLogic`] with capacity limiting, a
//! circuit breaker, a per-call timeout, health checks and performance
//! accounting. All mutable state sits behind one `std::sync::Mutex` that is
//! never held across an await: admission (shutdown, breaker and capacity
//! checks plus session registration) happens in one critical section before
//! the first suspension point. Admission hands back a [`CallGuard`] that
//! undoes it when dropped, so a call abandoned by an outer timeout still frees
//! its slot and counts as a failure.

use super::error::RuntimeError;
use crate::agents::AgentLogic;
use crate::config::RuntimeConfig;
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::observer::{CoordinationEvent, CoordinationObserver};
use chrono::{DateTime, Utc};
use council_domain::{
    AgentId, AgentMessage, AgentOutput, AgentResponse, AgentStatus, AgentType, CircuitBreaker,
    CircuitBreakerState, ExecutionResult, MessageContext, PerformanceMetrics,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One admitted call.
struct ActiveCall {
    id: u64,
    session_id: String,
}

struct AgentState {
    status: AgentStatus,
    breaker: CircuitBreaker,
    metrics: PerformanceMetrics,
    /// One entry per in-flight call
    active: Vec<ActiveCall>,
    next_call: u64,
}

impl AgentState {
    /// Status after a call or a recovery.
    fn settle(&mut self) {
        if matches!(self.status, AgentStatus::Offline | AgentStatus::Failed) {
            return;
        }
        self.status = if self.active.is_empty() {
            AgentStatus::Idle
        } else {
            AgentStatus::Busy
        };
    }
}

/// One running agent.
pub struct AgentRuntime {
    id: AgentId,
    logic: AgentLogic,
    gateway: Arc<dyn LlmGateway>,
    observer: Arc<dyn CoordinationObserver>,
    config: RuntimeConfig,
    state: Mutex<AgentState>,
}

impl AgentRuntime {
    pub fn new(
        logic: AgentLogic,
        gateway: Arc<dyn LlmGateway>,
        observer: Arc<dyn CoordinationObserver>,
        config: RuntimeConfig,
    ) -> Self {
        let id = AgentId::generate(logic.agent_type());
        let state = AgentState {
            status: AgentStatus::Idle,
            breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
            metrics: PerformanceMetrics::new(),
            active: Vec::new(),
            next_call: 0,
        };
        Self {
            id,
            logic,
            gateway,
            observer,
            config,
            state: Mutex::new(state),
        }
    }

    // ==================== Introspection ====================

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn agent_type(&self) -> AgentType {
        self.logic.agent_type()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn status(&self) -> AgentStatus {
        self.lock().status
    }

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        self.lock().metrics.clone()
    }

    pub fn circuit_breaker_state(&self) -> CircuitBreakerState {
        self.lock().breaker.state()
    }

    /// Distinct session ids with a call in flight.
    pub fn active_sessions(&self) -> Vec<String> {
        let state = self.lock();
        let mut sessions: Vec<String> =
            state.active.iter().map(|c| c.session_id.clone()).collect();
        sessions.sort();
        sessions.dedup();
        sessions
    }

    /// Calls in flight. This is what admission counts against
    /// `max_concurrent_sessions`; one session may hold several.
    pub fn in_flight_calls(&self) -> usize {
        self.lock().active.len()
    }

    /// Whether a call made now would be admitted, without reserving
    /// anything. Used to validate a handoff target.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        let state = self.lock();
        state.status.is_available()
            && state.breaker.would_admit(now)
            && state.active.len() < self.config.max_concurrent_sessions
    }

    // ==================== Processing ====================

    /// Run the agent's logic for one message.
    pub async fn process_message(
        &self,
        message: &AgentMessage,
        context: &MessageContext,
    ) -> Result<AgentResponse, RuntimeError> {
        let agent_type = self.agent_type();
        let guard = self.admit(&message.session_id, Utc::now())?;

        self.observer.on_event(&CoordinationEvent::ProcessingStarted {
            agent_id: self.id.to_string(),
            agent_type,
            session_id: message.session_id.clone(),
        });
        debug!(agent = %self.id, session = %message.session_id, "Processing message");

        let outcome = tokio::time::timeout(
            self.config.call_timeout,
            self.logic.run(
                self.gateway.as_ref(),
                &self.config.retry,
                self.config.call_timeout,
                message,
                context,
            ),
        )
        .await;

        let result: Result<AgentOutput, RuntimeError> = match outcome {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(RuntimeError::Logic(e)),
            Err(_) => Err(RuntimeError::Timeout {
                agent: agent_type,
                after: self.config.call_timeout,
            }),
        };

        let elapsed = guard.finish(result.is_ok());

        let duration_ms = elapsed.as_millis() as u64;
        match result {
            Ok(output) => {
                self.observer.on_event(&CoordinationEvent::ProcessingCompleted {
                    agent_id: self.id.to_string(),
                    agent_type,
                    session_id: message.session_id.clone(),
                    duration_ms,
                });
                Ok(AgentResponse {
                    agent_id: self.id.clone(),
                    session_id: message.session_id.clone(),
                    output,
                    processing_time_ms: duration_ms,
                })
            }
            Err(e) => {
                warn!(agent = %self.id, session = %message.session_id, error = %e, "Processing failed");
                self.observer.on_event(&CoordinationEvent::ProcessingError {
                    agent_id: self.id.to_string(),
                    agent_type,
                    session_id: message.session_id.clone(),
                    error: e.to_string(),
                    duration_ms,
                });
                Err(e)
            }
        }
    }

    /// Run [`process_message`](Self::process_message) and record the outcome,
    /// failures included, with offsets relative to `clock`.
    pub async fn execute(
        &self,
        message: &AgentMessage,
        context: &MessageContext,
        assigned_task: &str,
        clock: Instant,
    ) -> (ExecutionResult, Option<AgentOutput>) {
        let start_offset = clock.elapsed().as_millis() as u64;
        let outcome = self.process_message(message, context).await;
        let end_offset = clock.elapsed().as_millis() as u64;

        match outcome {
            Ok(response) => (
                ExecutionResult::from_output(
                    response.agent_id,
                    assigned_task,
                    &response.output,
                    start_offset,
                    end_offset,
                ),
                Some(response.output),
            ),
            Err(e) => (
                ExecutionResult::failure(
                    self.id.clone(),
                    self.agent_type(),
                    assigned_task,
                    e.to_string(),
                    start_offset,
                    end_offset,
                ),
                None,
            ),
        }
    }

    fn admit(&self, session_id: &str, now: DateTime<Utc>) -> Result<CallGuard<'_>, RuntimeError> {
        let agent = self.agent_type();
        let mut state = self.lock();

        if state.status == AgentStatus::Offline {
            return Err(RuntimeError::Shutdown(agent));
        }
        if !state.breaker.can_execute(now) {
            let retry_after = state.breaker.retry_after(now).unwrap_or(Duration::ZERO);
            return Err(RuntimeError::CircuitBreakerOpen { agent, retry_after });
        }
        if state.active.len() >= self.config.max_concurrent_sessions {
            state.breaker.release_trial();
            return Err(RuntimeError::CapacityExceeded {
                agent,
                max: self.config.max_concurrent_sessions,
            });
        }

        let id = state.next_call;
        state.next_call += 1;
        state.active.push(ActiveCall {
            id,
            session_id: session_id.to_string(),
        });
        let active = state.active.len();
        state.metrics.observe_active_sessions(active);
        if state.status != AgentStatus::Failed {
            state.status = AgentStatus::Processing;
        }
        Ok(CallGuard {
            runtime: self,
            call_id: id,
            session_id: session_id.to_string(),
            started: Instant::now(),
            finished: false,
        })
    }

    /// Record the end of call `call_id` and free its slot. A call that
    /// shutdown already force-cleared is only accounted.
    fn complete(&self, call_id: u64, elapsed: Duration, success: bool, now: DateTime<Utc>) {
        let mut state = self.lock();
        if success {
            state.breaker.record_success(now);
        } else {
            state.breaker.record_failure(now);
        }
        state.metrics.record(elapsed, success, now);

        if let Some(pos) = state.active.iter().position(|c| c.id == call_id) {
            state.active.remove(pos);
        }
        let active = state.active.len();
        state.metrics.observe_active_sessions(active);
        state.settle();
    }

    // ==================== Health ====================

    /// Breaker closed or half-open, gateway reachable, self-test passing.
    pub async fn health_check(&self) -> bool {
        if self.status() == AgentStatus::Offline {
            return false;
        }

        let breaker_open = self.lock().breaker.current_state() == council_domain::CircuitState::Open;
        let gateway_ok = tokio::time::timeout(self.config.call_timeout, self.gateway.health_check())
            .await
            .unwrap_or(false);
        let self_test = self.logic.self_test();

        let reason = if breaker_open {
            Some("circuit breaker open".to_string())
        } else if !gateway_ok {
            Some("generation gateway unreachable".to_string())
        } else {
            self_test.err()
        };

        let event = {
            let mut state = self.lock();
            match (&reason, state.status) {
                (_, AgentStatus::Offline) => None,
                (Some(reason), _) => {
                    state.status = AgentStatus::Failed;
                    Some(CoordinationEvent::HealthCheckFailed {
                        agent_id: self.id.to_string(),
                        agent_type: self.agent_type(),
                        reason: reason.clone(),
                    })
                }
                (None, AgentStatus::Failed) => {
                    state.status = AgentStatus::Idle;
                    state.settle();
                    Some(CoordinationEvent::AgentRecovered {
                        agent_id: self.id.to_string(),
                        agent_type: self.agent_type(),
                    })
                }
                (None, _) => None,
            }
        };

        if let Some(event) = event {
            match &event {
                CoordinationEvent::HealthCheckFailed { reason, .. } => {
                    warn!(agent = %self.id, reason = %reason, "Health check failed");
                }
                _ => info!(agent = %self.id, "Agent recovered"),
            }
            self.observer.on_event(&event);
        }
        reason.is_none()
    }

    /// Run [`health_check`](Self::health_check) every `interval` until
    /// `cancel` fires.
    pub fn spawn_health_monitor(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let agent = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(agent = %agent.id, "Health monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        agent.health_check().await;
                    }
                }
            }
        })
    }

    // ==================== Shutdown ====================

    /// Stop accepting calls, wait up to `grace` for in-flight calls, then
    /// force-clear whatever is left. Returns the number of calls cleared.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        self.lock().status = AgentStatus::Offline;
        info!(agent = %self.id, grace_ms = grace.as_millis() as u64, "Shutting down agent");

        let deadline = Instant::now() + grace;
        loop {
            if self.lock().active.is_empty() {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let poll = self.config.shutdown_poll_interval.min(deadline - now);
            tokio::time::sleep(poll).await;
        }

        let forced = {
            let mut state = self.lock();
            let forced = state.active.len();
            state.active.clear();
            state.metrics.observe_active_sessions(0);
            forced
        };
        if forced > 0 {
            warn!(agent = %self.id, forced, "Forced shutdown with calls in flight");
        }
        self.observer.on_event(&CoordinationEvent::AgentShutdown {
            agent_id: self.id.to_string(),
            agent_type: self.agent_type(),
            forced_sessions: forced,
        });
        forced
    }

    fn lock(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Slot held by one admitted call.
///
/// [`finish`](Self::finish) records the outcome. Dropping the guard without
/// finishing means the caller abandoned the call, which is recorded as a
/// failure.
struct CallGuard<'a> {
    runtime: &'a AgentRuntime,
    call_id: u64,
    session_id: String,
    started: Instant,
    finished: bool,
}

impl CallGuard<'_> {
    fn finish(mut self, success: bool) -> Duration {
        self.finished = true;
        let elapsed = self.started.elapsed();
        self.runtime
            .complete(self.call_id, elapsed, success, Utc::now());
        elapsed
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let elapsed = self.started.elapsed();
        let runtime = self.runtime;
        runtime.complete(self.call_id, elapsed, false, Utc::now());
        warn!(agent = %runtime.id, session = %self.session_id, "Call abandoned before completion");
        runtime.observer.on_event(&CoordinationEvent::ProcessingError {
            agent_id: runtime.id.to_string(),
            agent_type: runtime.agent_type(),
            session_id: self.session_id.clone(),
            error: "call abandoned before completion".to_string(),
            duration_ms: elapsed.as_millis() as u64,
        });
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("id", &self.id)
            .field("agent_type", &self.agent_type())
            .finish()
    }
}
