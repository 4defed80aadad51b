use crate::crash_tracker::CrashTracker;
use crate::metrics::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tss_chain::CurrentLedger;
use tss_store::{BundleLoader, StoreError};
use tss_worker::{spawn_and_run_bundle, ProcessingLimiter, WorkerDeps, WorkerOutcome};

/// How many ledgers ahead of the current one a freshly loaded bundle is
/// locked for. Chosen so a ~5s ledger close time gives a worker roughly a
/// minute to build, sign, and submit before its lease expires.
const LEASE_WINDOW_LEDGERS: u32 = 12;

/// Owns the root cancellation token's consumer side: the polling loop that
/// turns free bundles into running workers.
pub struct Manager {
    bundle_loader: Arc<BundleLoader>,
    ledger: Arc<dyn CurrentLedger>,
    limiter: Arc<ProcessingLimiter>,
    worker_deps: Arc<WorkerDeps>,
    crash_tracker: Arc<dyn CrashTracker>,
    metrics: Arc<dyn Metrics>,
    polling_interval: Duration,
}

impl Manager {
    pub fn new(
        bundle_loader: Arc<BundleLoader>,
        ledger: Arc<dyn CurrentLedger>,
        limiter: Arc<ProcessingLimiter>,
        worker_deps: Arc<WorkerDeps>,
        crash_tracker: Arc<dyn CrashTracker>,
        metrics: Arc<dyn Metrics>,
        polling_interval: Duration,
    ) -> Self {
        Self {
            bundle_loader,
            ledger,
            limiter,
            worker_deps,
            crash_tracker,
            metrics,
            polling_interval,
        }
    }

    /// Runs until `cancellation` fires, then drains in-flight workers for
    /// up to `grace_period` before returning. Workers still running past
    /// the grace period are abandoned; their leases expire naturally by
    /// ledger bound.
    pub async fn run(&self, cancellation: CancellationToken, grace_period: Duration) {
        let mut ticker = tokio::time::interval(self.polling_interval);
        let mut in_flight: JoinSet<WorkerOutcome> = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!("manager stopping, draining in-flight workers");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_once(&mut in_flight, &cancellation).await;
                }
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    self.observe_completed(result);
                }
            }
        }

        let drain = async {
            while let Some(result) = in_flight.join_next().await {
                self.observe_completed(result);
            }
        };
        if tokio::time::timeout(grace_period, drain).await.is_err() {
            warn!(
                abandoned = in_flight.len(),
                "grace period elapsed, abandoning remaining workers"
            );
        }
    }

    fn observe_completed(&self, result: Result<WorkerOutcome, tokio::task::JoinError>) {
        match result {
            Ok(WorkerOutcome::Escalated) => warn!("a worker escalated after panicking"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "worker supervisor task itself panicked"),
        }
    }

    /// One polling tick: fetch the current ledger, ask the bundle loader
    /// for up to `limiter.limit_value()` bundles, and spawn one worker per
    /// bundle without blocking the next tick.
    async fn poll_once(&self, in_flight: &mut JoinSet<WorkerOutcome>, cancellation: &CancellationToken) {
        let current_ledger = match self.ledger.current_ledger().await {
            Ok(ledger) => ledger,
            Err(err) => {
                self.crash_tracker.report("fetching current ledger", &err).await;
                return;
            }
        };

        let limit = self.limiter.limit_value();
        self.metrics.record_processing_limit(limit);
        let next_ledger_lock = current_ledger + LEASE_WINDOW_LEDGERS;

        match self
            .bundle_loader
            .load_and_lock_tuples(current_ledger, next_ledger_lock, limit as i64)
            .await
        {
            Ok(bundles) => {
                self.metrics.record_bundle_batch(bundles.len(), limit as i64);
                for bundle in bundles {
                    let deps = self.worker_deps.clone();
                    let token = cancellation.clone();
                    in_flight.spawn(async move { spawn_and_run_bundle(bundle, deps, token).await });
                }
            }
            Err(err) => {
                if !matches!(err, StoreError::InsufficientChannelAccounts) {
                    self.crash_tracker.report("bundle loader", &err).await;
                }
            }
        }
    }
}
