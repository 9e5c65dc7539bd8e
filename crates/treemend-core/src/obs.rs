//! Structured observability hooks for the repair pipeline.
//!
//! - Run-scoped tracing spans via [`PipelineSpan`]
//! - Emission functions for lifecycle events: start, layer completion,
//!   applied fixes, escalation failure, finish
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).

use std::future::Future;

use tracing::instrument::Instrumented;
use tracing::{info, warn, Instrument};

/// Run-scoped span. A run is async, so the span is attached to its future
/// rather than held entered across awaits.
///
/// ```ignore
/// let span = PipelineSpan::new("8f1c...");
/// span.wrap(async { /* every event is tagged with run_id */ }).await;
/// ```
pub struct PipelineSpan {
    span: tracing::Span,
}

impl PipelineSpan {
    pub fn new(run_id: &str) -> Self {
        Self {
            span: tracing::info_span!("treemend.run", run_id = %run_id),
        }
    }

    pub fn wrap<F: Future>(&self, future: F) -> Instrumented<F> {
        future.instrument(self.span.clone())
    }
}

/// Emit event: pipeline started.
pub fn emit_pipeline_started(run_id: &str, language: &str, files: usize, max_attempts: u32) {
    info!(
        event = "pipeline.started",
        run_id = %run_id,
        language = %language,
        files = files,
        max_attempts = max_attempts,
    );
}

/// Emit event: pipeline finished with its verdict.
pub fn emit_pipeline_finished(run_id: &str, duration_ms: u64, attempts: u32, is_valid: bool) {
    info!(
        event = "pipeline.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        attempts = attempts,
        is_valid = is_valid,
    );
}

pub fn emit_layer_completed(layer: &str, errors: usize, warnings: usize) {
    info!(event = "layer.completed", layer = %layer, errors = errors, warnings = warnings);
}

pub fn emit_fix_applied(attempt: u32, fixes: usize, files_before: usize, files_after: usize) {
    info!(
        event = "fix.applied",
        attempt = attempt,
        fixes = fixes,
        files_before = files_before,
        files_after = files_after,
    );
}

/// Emit event: escalation failed or was discarded (warning level).
pub fn emit_escalation_failed(reason: &dyn std::fmt::Display) {
    warn!(event = "escalation.failed", reason = %reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pipeline_span_wraps_future() {
        let span = PipelineSpan::new("test-run-id");
        let out = span
            .wrap(async {
                emit_layer_completed("syntax", 0, 0);
                7
            })
            .await;
        assert_eq!(out, 7);
    }
}
