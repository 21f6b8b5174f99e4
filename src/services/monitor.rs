use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::reconcile::{CycleReport, Reconciler};
use crate::config::MonitorConfig;

/// Clears the in-flight flag when a cycle ends, even by panic.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives reconciliation on a fixed interval. At most one cycle runs at a
/// time; ticks that arrive while a cycle is running are dropped.
#[derive(Clone)]
pub struct Monitor {
    reconciler: Arc<Reconciler>,
    in_flight: Arc<AtomicBool>,
    interval: Duration,
    startup_delay: Duration,
}

impl Monitor {
    #[must_use]
    pub fn new(reconciler: Arc<Reconciler>, config: &MonitorConfig) -> Self {
        Self {
            reconciler,
            in_flight: Arc::new(AtomicBool::new(false)),
            interval: Duration::from_secs(config.interval_seconds.max(1)),
            startup_delay: Duration::from_secs(config.startup_delay_seconds),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one cycle unless another is in flight, in which case `None`.
    pub async fn run_once(&self) -> Option<Result<CycleReport>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            metrics::counter!("fetcharr_reconcile_skipped_ticks_total").increment(1);
            debug!("Previous reconciliation cycle still running, skipping tick");
            return None;
        }
        let _guard = InFlight(Arc::clone(&self.in_flight));

        Some(self.reconciler.run_cycle().await)
    }

    pub fn start(&self) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(monitor.startup_delay).await;
            monitor.run_loop().await;
        })
    }

    async fn run_loop(&self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs(), "Download monitor started");

        loop {
            interval.tick().await;

            let monitor = self.clone();
            tokio::spawn(async move {
                if let Some(Err(e)) = monitor.run_once().await {
                    error!("Reconciliation cycle failed: {e:#}");
                }
            });
        }
    }
}
