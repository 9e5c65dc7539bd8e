//! Pipeline configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which syntax checker backs the syntax layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckerKind {
    /// Tree-sitter grammars, falling back to the heuristic scanner for
    /// files no grammar covers.
    #[default]
    TreeSitter,
    /// Line-scanner only (bracket balance, Python indentation).
    Heuristic,
}

/// Bounded convergence policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of fix cycles.
    pub max_attempts: u32,

    /// When false the pipeline only validates.
    pub auto_fix: bool,

    pub checker: CheckerKind,

    /// Time box for the generative repair collaborator.
    pub escalation_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            auto_fix: true,
            checker: CheckerKind::TreeSitter,
            escalation_timeout_secs: 60,
        }
    }
}

impl PipelineConfig {
    pub fn escalation_timeout(&self) -> Duration {
        Duration::from_secs(self.escalation_timeout_secs)
    }
}
