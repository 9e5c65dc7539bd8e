//! Process-wide repair counters.
//!
//! The pipeline reports into [`METRICS`] at three points: every validation
//! pass, every adopted fix cycle, and the end of every run. Call
//! [`Metrics::flush`] to log a snapshot as one `info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::pipeline::AttemptRecord;

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lock-free counters.
pub struct Metrics {
    runs: AtomicU64,
    runs_converged: AtomicU64,
    validations_run: AtomicU64,
    attempts: AtomicU64,
    fixes_applied: AtomicU64,
    /// Critical and High errors removed by adopted fix cycles.
    errors_resolved: AtomicU64,
    /// Cycles that left more Critical and High errors than they found.
    regressions: AtomicU64,
    escalations_adopted: AtomicU64,
    escalations_rejected: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub runs: u64,
    pub runs_converged: u64,
    pub validations_run: u64,
    pub attempts: u64,
    pub fixes_applied: u64,
    pub errors_resolved: u64,
    pub regressions: u64,
    pub escalations_adopted: u64,
    pub escalations_rejected: u64,
}

impl MetricsSnapshot {
    /// Share of finished runs that ended with no Critical errors.
    pub fn convergence_rate(&self) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        self.runs_converged as f64 / self.runs as f64
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs: AtomicU64::new(0),
            runs_converged: AtomicU64::new(0),
            validations_run: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            fixes_applied: AtomicU64::new(0),
            errors_resolved: AtomicU64::new(0),
            regressions: AtomicU64::new(0),
            escalations_adopted: AtomicU64::new(0),
            escalations_rejected: AtomicU64::new(0),
        }
    }

    pub fn inc_validations(&self) {
        self.validations_run.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n` applied fix descriptions from one router stage.
    pub fn add_fixes(&self, n: u64) {
        self.fixes_applied.fetch_add(n, Ordering::Relaxed);
    }

    /// Record one adopted fix cycle and its error delta.
    pub fn record_attempt(&self, record: &AttemptRecord) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if record.errors_after <= record.errors_before {
            let resolved = (record.errors_before - record.errors_after) as u64;
            self.errors_resolved.fetch_add(resolved, Ordering::Relaxed);
        } else {
            self.regressions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                attempt = record.attempt,
                errors_before = record.errors_before,
                errors_after = record.errors_after,
                "fix cycle increased error count"
            );
        }
    }

    pub fn record_escalation(&self, adopted: bool) {
        let counter = if adopted {
            &self.escalations_adopted
        } else {
            &self.escalations_rejected
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run(&self, converged: bool) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        if converged {
            self.runs_converged.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            runs_converged: self.runs_converged.load(Ordering::Relaxed),
            validations_run: self.validations_run.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            fixes_applied: self.fixes_applied.load(Ordering::Relaxed),
            errors_resolved: self.errors_resolved.load(Ordering::Relaxed),
            regressions: self.regressions.load(Ordering::Relaxed),
            escalations_adopted: self.escalations_adopted.load(Ordering::Relaxed),
            escalations_rejected: self.escalations_rejected.load(Ordering::Relaxed),
        }
    }

    /// Log the current snapshot as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            runs = s.runs,
            convergence_rate = s.convergence_rate(),
            validations_run = s.validations_run,
            attempts = s.attempts,
            fixes_applied = s.fixes_applied,
            errors_resolved = s.errors_resolved,
            regressions = s.regressions,
            escalations_adopted = s.escalations_adopted,
            escalations_rejected = s.escalations_rejected,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(attempt: u32, errors_before: usize, errors_after: usize) -> AttemptRecord {
        AttemptRecord {
            attempt,
            files_before: 3,
            files_after: 3,
            errors_before,
            errors_after,
        }
    }

    #[test]
    fn attempts_accumulate_error_deltas() {
        let m = Metrics::new();
        m.record_attempt(&record(1, 5, 2));
        m.record_attempt(&record(2, 2, 2));
        m.record_attempt(&record(3, 2, 4));

        let s = m.snapshot();
        assert_eq!(s.attempts, 3);
        assert_eq!(s.errors_resolved, 3);
        assert_eq!(s.regressions, 1);
    }

    #[test]
    fn convergence_rate_counts_finished_runs() {
        let m = Metrics::new();
        assert_eq!(m.snapshot().convergence_rate(), 0.0);
        m.record_run(true);
        m.record_run(true);
        m.record_run(false);
        m.record_run(true);
        assert_eq!(m.snapshot().convergence_rate(), 0.75);
    }

    #[test]
    fn escalations_split_by_outcome() {
        let m = Metrics::new();
        m.record_escalation(true);
        m.record_escalation(false);
        m.record_escalation(false);
        let s = m.snapshot();
        assert_eq!((s.escalations_adopted, s.escalations_rejected), (1, 2));
    }
}
