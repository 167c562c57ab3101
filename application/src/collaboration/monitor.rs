//! Session monitoring for CollaborationWorkflow.

use super::workflow::CollaborationWorkflow;
use crate::ports::observer::CoordinationEvent;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl CollaborationWorkflow {
    /// One monitoring pass.
    ///
    /// Reports each active session that ran past its maximum duration once,
    /// and moves terminal snapshots into history. Returns the ids reported
    /// as timed out in this pass.
    pub fn monitor_tick(&self, now: DateTime<Utc>) -> Vec<String> {
        let retention = self.config.history_retention;
        let mut events = Vec::new();
        let mut timed_out = Vec::new();
        {
            let mut state = self.lock();

            let terminal: Vec<String> = state
                .active
                .values()
                .filter(|s| s.is_terminal())
                .map(|s| s.id.clone())
                .collect();
            for id in terminal {
                if let Some(session) = state.active.remove(&id) {
                    state.timed_out.remove(&id);
                    state.history.push_back(session);
                }
            }
            while state.history.len() > retention {
                state.history.pop_front();
            }

            let overdue: Vec<(String, Duration, Duration)> = state
                .active
                .values()
                .filter(|s| s.is_timed_out(now))
                .map(|s| (s.id.clone(), s.elapsed(now), s.context.max_duration()))
                .collect();
            for (id, elapsed, max_duration) in overdue {
                if state.timed_out.insert(id.clone()) {
                    events.push(CoordinationEvent::SessionTimeout {
                        collaboration_id: id.clone(),
                        elapsed_ms: elapsed.as_millis() as u64,
                        max_duration_ms: max_duration.as_millis() as u64,
                    });
                    timed_out.push(id);
                }
            }
        }

        for event in &events {
            warn!(event = event.name(), payload = %event.payload(), "Collaboration session timed out");
            self.observer.on_event(event);
        }
        timed_out
    }

    /// Run [`monitor_tick`](Self::monitor_tick) every `interval` until
    /// `cancel` fires.
    pub fn spawn_monitor(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let workflow = Arc::clone(self);
        tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "Collaboration monitor started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let timed_out = workflow.monitor_tick(Utc::now());
                        debug!(timed_out = timed_out.len(), "Monitor tick");
                    }
                }
            }
            info!("Collaboration monitor stopped");
        })
    }
}
