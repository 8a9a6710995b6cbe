//! Fixed-interval cycle scheduling
//!
//! Cycles never overlap: each one is awaited inside the loop and missed
//! ticks are skipped. Shutdown is observed between cycles and while
//! sleeping; the ledger is flushed before returning.

use crate::services::runner::CycleRunner;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

pub struct Scheduler {
    runner: CycleRunner,
    interval: Duration,
    run_on_start: bool,
}

impl Scheduler {
    pub fn new(runner: CycleRunner, interval: Duration, run_on_start: bool) -> Self {
        Self { runner, interval, run_on_start }
    }

    pub fn runner(&self) -> &CycleRunner {
        &self.runner
    }

    /// Run a single cycle and flush
    pub async fn run_once(&mut self) {
        self.runner.run_cycle().await;
        self.runner.flush_ledger().await;
    }

    /// Run cycles until the shutdown flag flips to true
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // First tick completes immediately
        if !self.run_on_start {
            ticker.tick().await;
        }

        info!(
            interval_secs = %self.interval.as_secs(),
            run_on_start = %self.run_on_start,
            "scheduler_started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.runner.run_cycle().await;
                    info!(next_in_secs = %self.interval.as_secs(), "cycle_sleeping");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.runner.flush_ledger().await;
        info!("scheduler_stopped");
    }
}
