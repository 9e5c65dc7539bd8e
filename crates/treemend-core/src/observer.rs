//! Progress callbacks for the convergence loop.
//!
//! The orchestrator reports every state transition, attempt, layer result,
//! applied fix and escalation outcome to a [`PipelineObserver`]. Nothing in
//! the core writes to stdout; [`TracingObserver`] forwards to `tracing`.

use serde::Serialize;

use crate::domain::LayerName;
use crate::obs;
use crate::pipeline::PipelineState;

/// How an escalation attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EscalationOutcome {
    /// Output had fewer Critical errors and replaced the current files.
    Adopted { critical_before: usize, critical_after: usize },
    /// Output validated but was not better.
    Rejected { critical_before: usize, critical_after: usize },
    /// Timed out, failed, or returned a malformed file set.
    Failed { reason: String },
}

/// One observable step of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    StateChanged { from: PipelineState, to: PipelineState },
    AttemptStarted { attempt: u32 },
    LayerCompleted { layer: LayerName, errors: usize, warnings: usize },
    FixApplied { attempt: u32, fixes: Vec<String>, files_before: usize, files_after: usize },
    Escalation(EscalationOutcome),
}

pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}

/// Forwards events to the structured `obs` emitters.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StateChanged { from, to } => {
                tracing::debug!(from = from.as_str(), to = to.as_str(), "state changed");
            }
            PipelineEvent::AttemptStarted { attempt } => {
                tracing::debug!(attempt, "attempt started");
            }
            PipelineEvent::LayerCompleted { layer, errors, warnings } => {
                obs::emit_layer_completed(layer.as_str(), *errors, *warnings);
            }
            PipelineEvent::FixApplied { attempt, fixes, files_before, files_after } => {
                obs::emit_fix_applied(*attempt, fixes.len(), *files_before, *files_after);
            }
            PipelineEvent::Escalation(EscalationOutcome::Failed { reason }) => {
                obs::emit_escalation_failed(reason);
            }
            PipelineEvent::Escalation(outcome) => {
                tracing::info!(event = "escalation.finished", ?outcome);
            }
        }
    }
}
