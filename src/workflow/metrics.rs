//! Metrics for session execution
//!
//! Recorded through the `metrics` facade; the crate installs no exporter, so
//! these are no-ops unless the embedding application installs a recorder.
//!
//! # Metrics
//!
//! - `notetion_sessions_total`: Counter of started sessions, by model
//! - `notetion_sessions_active`: Gauge of sessions currently running
//! - `notetion_sessions_completed_total`: Counter of finished sessions, by model and status
//! - `notetion_session_duration_seconds`: Histogram of session duration
//! - `notetion_tokens_total`: Counter of tokens, by model and direction
//!
//! # Examples
//!
//! ```
//! use notetion::workflow::metrics::SessionMetrics;
//!
//! let metrics = SessionMetrics::new("gpt-4");
//! metrics.record_completion("succeeded", 1200, 300);
//! ```

use metrics::{counter, decrement_gauge, histogram, increment_counter, increment_gauge};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Metrics collection for a single session
///
/// Uses an atomic flag so metrics can be recorded through shared references
/// from async code and are recorded at most once.
#[derive(Debug)]
pub struct SessionMetrics {
    model: String,
    start: Instant,
    recorded: AtomicBool,
}

impl SessionMetrics {
    /// Starts tracking a session for `model`
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        increment_counter!("notetion_sessions_total", "model" => model.clone());
        increment_gauge!("notetion_sessions_active", 1.0);

        Self {
            model,
            start: Instant::now(),
            recorded: AtomicBool::new(false),
        }
    }

    /// Records the end of the session
    ///
    /// `status` is `succeeded`, `failed`, `invalid`, or `cancelled`. Later
    /// calls are ignored.
    pub fn record_completion(&self, status: &str, input_tokens: u64, output_tokens: u64) {
        if self.recorded.swap(true, Ordering::SeqCst) {
            return;
        }

        histogram!(
            "notetion_session_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "model" => self.model.clone(),
            "status" => status.to_string()
        );

        counter!(
            "notetion_tokens_total",
            input_tokens,
            "model" => self.model.clone(),
            "direction" => "input"
        );

        counter!(
            "notetion_tokens_total",
            output_tokens,
            "model" => self.model.clone(),
            "direction" => "output"
        );

        increment_counter!(
            "notetion_sessions_completed_total",
            "model" => self.model.clone(),
            "status" => status.to_string()
        );

        decrement_gauge!("notetion_sessions_active", 1.0);
    }

    /// Whether the completion has been recorded
    pub fn is_recorded(&self) -> bool {
        self.recorded.load(Ordering::SeqCst)
    }

    /// Model label of this session
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns elapsed time since the session started
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for SessionMetrics {
    /// Keeps the active gauge accurate when a session future is dropped
    /// before it recorded a completion
    fn drop(&mut self) {
        if !self.recorded.load(Ordering::SeqCst) {
            decrement_gauge!("notetion_sessions_active", 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_metrics_creation() {
        let metrics = SessionMetrics::new("gpt-4");
        assert_eq!(metrics.model(), "gpt-4");
        assert!(!metrics.is_recorded());
        assert!(metrics.elapsed().as_millis() < 1000);
    }

    #[test]
    fn test_metrics_double_record_prevention() {
        let metrics = SessionMetrics::new("gpt-4");
        metrics.record_completion("succeeded", 10, 5);
        metrics.record_completion("failed", 0, 0);
        assert!(metrics.is_recorded());
    }

    #[test]
    fn test_metrics_dropped_session_was_never_recorded() {
        let abandoned = SessionMetrics::new("gpt-3.5-turbo");
        assert!(!abandoned.is_recorded());
        drop(abandoned);

        let finished = SessionMetrics::new("gpt-3.5-turbo");
        finished.record_completion("cancelled", 0, 0);
        assert!(finished.is_recorded());
        finished.record_completion("succeeded", 1, 1);
        assert!(finished.is_recorded());
        drop(finished);
    }
}
