/// Narrow metrics capability the synchronizer reports its own tick
/// through, kept separate from any other crate's operational metrics so
/// this crate has no dependency on how the binary wires its metrics
/// backend.
pub trait SyncMetrics: Send + Sync {
    fn record_synchronizer_tick(&self, tenant: &str, synced: usize);
}

/// Logs instead of emitting to a metrics backend — the default, and the
/// only implementation this crate ships.
pub struct LoggingSyncMetrics;

impl SyncMetrics for LoggingSyncMetrics {
    fn record_synchronizer_tick(&self, tenant: &str, synced: usize) {
        tracing::debug!(tenant, synced, "synchronizer tick");
    }
}
