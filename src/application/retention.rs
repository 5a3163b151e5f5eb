//! Bounded-size maintenance for the todo collection.
//!
//! Every interval the job counts the valid todos and, once the count is above
//! the threshold, evicts the single todo with the lowest `order`. One eviction
//! per tick: a collection far over the limit shrinks over several ticks.
//!
//! The job shares the store with request handlers without any locking, so the
//! count it acts on may already be stale when the delete runs.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};
use std::time::Duration;

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use super::todo_repository::TodoRepository;
use crate::domain::todo::TodoId;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_THRESHOLD: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub interval: Duration,
    /// Largest collection size left untouched.
    pub threshold: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self { Self { interval: DEFAULT_INTERVAL, threshold: DEFAULT_THRESHOLD } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Evaluating,
}

const IDLE: u8 = 0;
const EVALUATING: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    BelowThreshold { count: u64 },
    Evicted { id: TodoId, count: u64 },
    Skipped { reason: String },
}

#[derive(Clone)]
pub struct RetentionJob {
    repo: TodoRepository,
    policy: RetentionPolicy,
    state: Arc<AtomicU8>,
}

impl RetentionJob {
    pub fn new(repo: TodoRepository, policy: RetentionPolicy) -> Self {
        Self { repo, policy, state: Arc::new(AtomicU8::new(IDLE)) }
    }

    pub fn policy(&self) -> RetentionPolicy { self.policy }

    pub fn state(&self) -> JobState {
        match self.state.load(Ordering::SeqCst) {
            EVALUATING => JobState::Evaluating,
            _ => JobState::Idle,
        }
    }

    /// Runs one evaluation. Store failures are logged and reported as
    /// [`TickOutcome::Skipped`]; they never propagate.
    pub async fn tick(&self) -> TickOutcome {
        let _evaluating = Evaluating::enter(&self.state);

        let count = match self.repo.count().await {
            Ok(count) => count,
            Err(e) => return skipped(format!("count failed: {e}")),
        };
        if count <= self.policy.threshold {
            tracing::debug!(count, threshold = self.policy.threshold, "retention: below threshold");
            return TickOutcome::BelowThreshold { count };
        }

        let oldest = match self.repo.oldest().await {
            Ok(Some(todo)) => todo,
            Ok(None) => return skipped("collection emptied before eviction".into()),
            Err(e) => return skipped(format!("lookup failed: {e}")),
        };
        match self.repo.delete(&oldest.id).await {
            Ok(()) => {
                tracing::info!(id = %oldest.id, order = oldest.order, count, "retention: evicted oldest todo");
                TickOutcome::Evicted { id: oldest.id, count }
            }
            Err(e) => skipped(format!("eviction of {} failed: {e}", oldest.id)),
        }
    }

    /// Starts the fixed-rate loop. The first tick fires one interval from now.
    ///
    /// Panics if the policy interval is zero.
    pub fn spawn(self) -> RetentionHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let period = self.policy.interval;
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval = ?period, threshold = self.policy.threshold, "retention job started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => { self.tick().await; }
                    // Fires on an explicit stop and when the handle is dropped.
                    _ = stop_rx.changed() => break,
                }
            }
            tracing::info!("retention job stopped");
        });
        RetentionHandle { stop: stop_tx, task }
    }
}

/// Owner of a running retention loop. Dropping it also ends the loop.
pub struct RetentionHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RetentionHandle {
    /// Signals the loop and waits for it to exit. A tick already in progress
    /// finishes first.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "retention task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool { self.task.is_finished() }
}

fn skipped(reason: String) -> TickOutcome {
    tracing::warn!(%reason, "retention: tick skipped");
    TickOutcome::Skipped { reason }
}

/// Marks the job as evaluating until dropped, so every exit path returns to idle.
struct Evaluating<'a>(&'a AtomicU8);

impl<'a> Evaluating<'a> {
    fn enter(state: &'a AtomicU8) -> Self {
        state.store(EVALUATING, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for Evaluating<'_> {
    fn drop(&mut self) { self.0.store(IDLE, Ordering::SeqCst); }
}
