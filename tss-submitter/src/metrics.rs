use tss_sync::SyncMetrics;

/// Narrow capability for the manager's own operational metrics — a
/// StatsD/Prometheus-style collaborator. Out of scope beyond this
/// interface.
pub trait Metrics: Send + Sync {
    fn record_processing_limit(&self, limit: u32);
    fn record_bundle_batch(&self, loaded: usize, requested: i64);
}

/// Logs instead of emitting to a metrics backend — the default, and the
/// only implementation this crate ships.
pub struct LoggingMetrics;

impl Metrics for LoggingMetrics {
    fn record_processing_limit(&self, limit: u32) {
        tracing::debug!(limit, "processing limit");
    }

    fn record_bundle_batch(&self, loaded: usize, requested: i64) {
        tracing::debug!(loaded, requested, "bundle batch loaded");
    }
}

impl SyncMetrics for LoggingMetrics {
    fn record_synchronizer_tick(&self, tenant: &str, synced: usize) {
        tracing::debug!(tenant, synced, "synchronizer tick");
    }
}

/// Drops every measurement silently — `--tss-metrics-type none`.
pub struct NullMetrics;

impl Metrics for NullMetrics {
    fn record_processing_limit(&self, _limit: u32) {}
    fn record_bundle_batch(&self, _loaded: usize, _requested: i64) {}
}

impl SyncMetrics for NullMetrics {
    fn record_synchronizer_tick(&self, _tenant: &str, _synced: usize) {}
}

pub fn from_config_type(kind: crate::config::MetricsType) -> Box<dyn Metrics> {
    match kind {
        crate::config::MetricsType::Log => Box::new(LoggingMetrics),
        crate::config::MetricsType::None => Box::new(NullMetrics),
    }
}

/// Same selection as `from_config_type`, through the synchronizer's own
/// metrics trait — `tss-sync` can't depend on this crate, so the two
/// factories erase the same concrete types to different trait objects.
pub fn sync_metrics_from_config_type(kind: crate::config::MetricsType) -> Box<dyn SyncMetrics> {
    match kind {
        crate::config::MetricsType::Log => Box::new(LoggingMetrics),
        crate::config::MetricsType::None => Box::new(NullMetrics),
    }
}
