//! Metrics recording hooks (§4.9)
//!
//! The engine never ships its own metrics exporter; it records samples
//! through the [`MetricsRecorder`] trait so the embedding binary can wire
//! counters into whatever backend it likes (a `/metrics` endpoint, logs,
//! or nothing at all).

use std::sync::Arc;
use std::time::Duration;

/// A single pool gauge sample (§4.1, §4.9)
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub open: usize,
    pub idle: usize,
    pub in_use: usize,
}

/// Sink for engine-emitted metrics
///
/// Implementations must be cheap to call on the hot path; callers gate
/// invocations behind [`crate::config::MetricsConfig::sample_rate`].
pub trait MetricsRecorder: Send + Sync {
    /// A tool operation completed (§4.7)
    fn record_operation(&self, operation: &str, duration: Duration, success: bool) {
        let _ = (operation, duration, success);
    }

    /// A search query completed (§4.5)
    fn record_search(&self, mode: &str, duration: Duration, result_count: usize) {
        let _ = (mode, duration, result_count);
    }

    /// Periodic pool gauge sample (§4.1)
    fn record_pool_stats(&self, project: &str, stats: PoolStats) {
        let _ = (project, stats);
    }

    /// A capability was downgraded at runtime (§4.3)
    fn record_capability_downgrade(&self, capability: &str, reason: &str) {
        let _ = (capability, reason);
    }
}

/// Recorder that discards every sample; the default when no backend is wired
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {}

/// Recorder that forwards every sample to `tracing` at debug level
///
/// Useful when the binary has no metrics exporter but still wants the
/// numbers in its structured logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl MetricsRecorder for TracingRecorder {
    fn record_operation(&self, operation: &str, duration: Duration, success: bool) {
        tracing::debug!(operation, ?duration, success, "tool operation");
    }

    fn record_search(&self, mode: &str, duration: Duration, result_count: usize) {
        tracing::debug!(mode, ?duration, result_count, "search completed");
    }

    fn record_pool_stats(&self, project: &str, stats: PoolStats) {
        tracing::debug!(
            project,
            open = stats.open,
            idle = stats.idle,
            in_use = stats.in_use,
            "pool stats"
        );
    }

    fn record_capability_downgrade(&self, capability: &str, reason: &str) {
        tracing::warn!(capability, reason, "capability downgraded");
    }
}

pub type SharedRecorder = Arc<dyn MetricsRecorder>;

/// Build the default recorder used when the caller supplies none
pub fn default_recorder() -> SharedRecorder {
    Arc::new(TracingRecorder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_recorder_is_inert() {
        let rec = NoopRecorder;
        rec.record_operation("create_entities", Duration::from_millis(5), true);
        rec.record_pool_stats(
            "default",
            PoolStats {
                open: 1,
                idle: 1,
                in_use: 0,
            },
        );
    }

    #[test]
    fn test_default_recorder_is_shared() {
        let rec = default_recorder();
        rec.record_search("hybrid", Duration::from_millis(10), 3);
    }
}
