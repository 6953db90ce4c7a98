//! Keyed scheduler registry and job chains.
//!
//! One registry owns the runtime state for every `(platform, account)`
//! key. Each running key has exactly one chain task: sleep until the
//! computed fire time, invoke the publish action, derive the next fire
//! time from the one just used, and re-arm. Stopping cancels the pending
//! sleep but lets an in-flight publish run to completion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::policy::{SchedulingPolicy, next_fire_time};
use crate::types::{PublishOutcome, RunState, SchedulerKey, StartReport, StatusReport, StopReport};
use crate::SchedulerError;

/// Capability invoked when a chain fires. Implementations publish the
/// next due item for the key and mark it posted.
#[async_trait]
pub trait PublishAction: Send + Sync {
    async fn publish_next(&self, key: &SchedulerKey) -> Result<PublishOutcome, String>;
}

/// Runtime state for one key. Process-lifetime, never persisted.
#[derive(Default)]
struct KeyState {
    running: bool,
    started_at: Option<DateTime<Utc>>,
    next_fire: Option<DateTime<Utc>>,
    /// Bumped on every (re)start; stale chain tasks check it before
    /// touching shared state, so a superseded chain can never overwrite
    /// its replacement.
    epoch: u64,
    cancel_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

type SharedStates = Arc<RwLock<HashMap<SchedulerKey, KeyState>>>;

/// Process-wide scheduler registry.
///
/// Replaces the per-platform global `isSchedulerRunning` / `currentJob`
/// map pattern with a single keyed owner. Hard invariant: at most one
/// live timer per key, enforced by cancelling any existing chain before
/// arming a new one.
pub struct SchedulerRegistry {
    states: SharedStates,
    policy: SchedulingPolicy,
    action: Arc<dyn PublishAction>,
}

impl SchedulerRegistry {
    pub fn new(policy: SchedulingPolicy, action: Arc<dyn PublishAction>) -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            policy,
            action,
        }
    }

    /// Start the chain for a key. Idempotent: starting a running chain
    /// reports `already_running` and leaves its timer untouched.
    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn start(&self, key: &SchedulerKey) -> StartReport {
        let mut states = self.states.write().await;
        let state = states.entry(key.clone()).or_default();

        if state.running {
            return StartReport {
                status: RunState::Running,
                already_running: true,
            };
        }

        // Cancel-before-arm: a stale chain from a previous run may still
        // be draining; make sure it can never re-arm.
        if let Some(tx) = state.cancel_tx.take() {
            let _ = tx.send(true);
        }

        let now = Utc::now();
        let first_fire = {
            let mut rng = rand::rng();
            next_fire_time(now, &self.policy, &mut rng)
        };

        state.epoch += 1;
        state.running = true;
        state.started_at = Some(now);
        state.next_fire = Some(first_fire);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        state.cancel_tx = Some(cancel_tx);
        state.task = Some(tokio::spawn(run_chain(
            Arc::clone(&self.states),
            self.policy.clone(),
            Arc::clone(&self.action),
            key.clone(),
            state.epoch,
            cancel_rx,
            now,
            first_fire,
        )));

        info!(key = %key, fire = %first_fire, "scheduler started");
        StartReport {
            status: RunState::Running,
            already_running: false,
        }
    }

    /// Stop the chain for a key. Safe to call when never started. Cancels
    /// the pending timer; an in-flight publish is allowed to complete but
    /// no new chain link is armed afterwards.
    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn stop(&self, key: &SchedulerKey) -> StopReport {
        let mut states = self.states.write().await;
        let Some(state) = states.get_mut(key) else {
            return StopReport {
                status: RunState::Stopped,
                was_running: false,
            };
        };

        let was_running = state.running;
        state.running = false;
        state.started_at = None;
        state.next_fire = None;
        if let Some(tx) = state.cancel_tx.take() {
            let _ = tx.send(true);
        }

        if was_running {
            info!(key = %key, "scheduler stopped");
        }
        StopReport {
            status: RunState::Stopped,
            was_running,
        }
    }

    /// Point-in-time status for a key.
    pub async fn status(&self, key: &SchedulerKey) -> StatusReport {
        let states = self.states.read().await;
        let Some(state) = states.get(key).filter(|s| s.running) else {
            return StatusReport {
                status: RunState::Stopped,
                started_at: None,
                next_fire_time: None,
                uptime_minutes: None,
            };
        };

        let now = Utc::now();
        StatusReport {
            status: RunState::Running,
            started_at: state.started_at,
            next_fire_time: state.next_fire,
            uptime_minutes: state
                .started_at
                .map(|s| ((now - s).num_seconds() as f64 / 60.0).round() as i64),
        }
    }

    /// Invoke the publish action immediately, out of band. The armed
    /// timer's schedule is not disturbed.
    pub async fn manual_trigger(
        &self,
        key: &SchedulerKey,
    ) -> Result<PublishOutcome, SchedulerError> {
        self.action
            .publish_next(key)
            .await
            .map_err(SchedulerError::Publish)
    }

    /// True when the key has a chain task that has not yet exited.
    pub async fn has_live_timer(&self, key: &SchedulerKey) -> bool {
        let states = self.states.read().await;
        states
            .get(key)
            .and_then(|s| s.task.as_ref())
            .is_some_and(|t| !t.is_finished())
    }
}

/// The self-perpetuating chain for one key.
#[allow(clippy::too_many_arguments)]
async fn run_chain(
    states: SharedStates,
    policy: SchedulingPolicy,
    action: Arc<dyn PublishAction>,
    key: SchedulerKey,
    epoch: u64,
    mut cancel_rx: watch::Receiver<bool>,
    mut base: DateTime<Utc>,
    mut fire: DateTime<Utc>,
) {
    loop {
        // A single link never waits longer than its own interval; this
        // also keeps the chain honest if the wall clock and the stored
        // fire time disagree.
        let wait = (fire - Utc::now())
            .min(fire - base)
            .to_std()
            .unwrap_or(StdDuration::ZERO);

        tokio::select! {
            _ = cancel_rx.changed() => break,
            _ = sleep(wait) => {}
        }

        // Firing. Every outcome is absorbed here: a failed publish must
        // never take the chain down.
        match action.publish_next(&key).await {
            Ok(PublishOutcome::Published { item_id }) => {
                info!(key = %key, item_id = %item_id, "published scheduled item");
            }
            Ok(PublishOutcome::NothingDue) => {
                debug!(key = %key, "no item due at fire time");
            }
            Err(error) => {
                warn!(key = %key, error = %error, "publish failed; chain continues");
            }
        }

        if *cancel_rx.borrow() {
            break;
        }

        // Chain from the just-used base, not from the wall clock, so the
        // pacing policy holds across consecutive links.
        base = fire;
        fire = {
            let mut rng = rand::rng();
            next_fire_time(base, &policy, &mut rng)
        };

        let mut states = states.write().await;
        match states.get_mut(&key) {
            Some(state) if state.running && state.epoch == epoch => {
                state.next_fire = Some(fire);
            }
            // Stopped or superseded while we were firing.
            _ => break,
        }
        debug!(key = %key, fire = %fire, "chain re-armed");
    }

    debug!(key = %key, "chain released");
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_store::Platform;

    #[derive(Default)]
    struct NoopAction;

    #[async_trait]
    impl PublishAction for NoopAction {
        async fn publish_next(&self, _key: &SchedulerKey) -> Result<PublishOutcome, String> {
            Ok(PublishOutcome::NothingDue)
        }
    }

    fn registry() -> SchedulerRegistry {
        SchedulerRegistry::new(SchedulingPolicy::default(), Arc::new(NoopAction))
    }

    fn key() -> SchedulerKey {
        SchedulerKey::new(Platform::Instagram, "dreamchasers")
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let registry = registry();
        let key = key();

        let first = registry.start(&key).await;
        assert!(!first.already_running);

        let second = registry.start(&key).await;
        assert!(second.already_running);
        assert_eq!(second.status, RunState::Running);

        // The second start must not have armed a second chain.
        let states = registry.states.read().await;
        assert_eq!(states.get(&key).unwrap().epoch, 1);
    }

    #[tokio::test]
    async fn stop_when_never_started_is_safe() {
        let registry = registry();
        let report = registry.stop(&key()).await;
        assert!(!report.was_running);
        assert_eq!(report.status, RunState::Stopped);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let registry = registry();
        let key = key();
        registry.start(&key).await;

        let first = registry.stop(&key).await;
        assert!(first.was_running);
        let second = registry.stop(&key).await;
        assert!(!second.was_running);
    }

    #[tokio::test]
    async fn restart_supersedes_old_chain() {
        let registry = registry();
        let key = key();

        registry.start(&key).await;
        registry.stop(&key).await;
        registry.start(&key).await;

        let states = registry.states.read().await;
        let state = states.get(&key).unwrap();
        assert!(state.running);
        assert_eq!(state.epoch, 2);
    }

    #[tokio::test]
    async fn status_reflects_lifecycle() {
        let registry = registry();
        let key = key();

        let stopped = registry.status(&key).await;
        assert_eq!(stopped.status, RunState::Stopped);
        assert!(stopped.uptime_minutes.is_none());
        assert!(stopped.next_fire_time.is_none());

        registry.start(&key).await;
        let running = registry.status(&key).await;
        assert_eq!(running.status, RunState::Running);
        assert!(running.started_at.is_some());
        assert!(running.next_fire_time.is_some());
        assert_eq!(running.uptime_minutes, Some(0));

        registry.stop(&key).await;
        let stopped = registry.status(&key).await;
        assert_eq!(stopped.status, RunState::Stopped);
        assert!(stopped.next_fire_time.is_none());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let registry = registry();
        let insta = SchedulerKey::new(Platform::Instagram, "acme");
        let tw = SchedulerKey::new(Platform::Twitter, "acme");

        registry.start(&insta).await;
        assert_eq!(registry.status(&tw).await.status, RunState::Stopped);

        registry.stop(&insta).await;
        assert_eq!(registry.status(&insta).await.status, RunState::Stopped);
    }
}
