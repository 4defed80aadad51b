use async_trait::async_trait;

/// Narrow capability for reporting faults that should page someone — a
/// Sentry/Bugsnag-style collaborator. The manager only knows how to call
/// `report`; wiring an actual crash-reporting SDK is out of scope.
#[async_trait]
pub trait CrashTracker: Send + Sync {
    async fn report(&self, context: &str, error: &(dyn std::error::Error + Send + Sync));
}

/// Logs instead of reporting — the default, and the only implementation
/// this crate ships.
pub struct LoggingCrashTracker;

#[async_trait]
impl CrashTracker for LoggingCrashTracker {
    async fn report(&self, context: &str, error: &(dyn std::error::Error + Send + Sync)) {
        tracing::error!(context, error = %error, "crash-worthy error");
    }
}

/// Drops every report silently — `--crash-tracker-type none`.
pub struct NullCrashTracker;

#[async_trait]
impl CrashTracker for NullCrashTracker {
    async fn report(&self, _context: &str, _error: &(dyn std::error::Error + Send + Sync)) {}
}

pub fn from_config_type(kind: crate::config::CrashTrackerType) -> Box<dyn CrashTracker> {
    match kind {
        crate::config::CrashTrackerType::Log => Box::new(LoggingCrashTracker),
        crate::config::CrashTrackerType::None => Box::new(NullCrashTracker),
    }
}
