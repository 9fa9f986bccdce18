//! Periodic sampling loop.
//!
//! The loop waits on a `Trigger` instead of a bare timer so tests can fire an
//! exact number of passes. Collaborator calls are async or run on blocking
//! threads, so the loop never occupies a request-handling task.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Interval, MissedTickBehavior};

use super::{Sampler, Updater};

/// Decides when the next pass runs.
#[async_trait]
pub trait Trigger: Send {
    /// Wait for the next pass. `false` ends the loop.
    async fn tick(&mut self) -> bool;
}

/// Fixed-period trigger. The first tick completes immediately so the
/// registry is populated right after start-up.
pub struct IntervalTrigger {
    interval: Interval,
}

impl IntervalTrigger {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period);
        // A slow pass pushes the schedule back instead of bursting to catch up.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Trigger for IntervalTrigger {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Sample once and write the result.
pub async fn run_pass(sampler: &Sampler, updater: &mut Updater) {
    let sample = sampler.sample().await;
    if let Err(e) = updater.apply(&sample) {
        tracing::warn!(error = %e, code = e.code().as_str(), "sampling pass not applied");
    }
}

/// Run passes until the trigger stops.
pub async fn run<T: Trigger>(sampler: Sampler, mut updater: Updater, mut trigger: T) {
    while trigger.tick().await {
        run_pass(&sampler, &mut updater).await;
    }
    tracing::debug!("sampling loop stopped");
}
