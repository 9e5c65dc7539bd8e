//! Domain-level error taxonomy for treemend.
//!
//! These errors describe failures of the machinery itself (a manifest that
//! cannot be rewritten, a lookup table that does not parse). Defects found in
//! the generated tree are never errors; they are [`ValidationError`] records.
//!
//! [`ValidationError`]: crate::domain::validation::ValidationError

/// Treemend domain errors.
#[derive(Debug, thiserror::Error)]
pub enum TreemendError {
    #[error("unsupported target language: {0}")]
    UnsupportedLanguage(String),

    #[error("manifest {path} could not be parsed: {reason}")]
    Manifest { path: String, reason: String },

    #[error("config file {path} could not be parsed: {reason}")]
    Config { path: String, reason: String },

    #[error("invalid repair registry: {0}")]
    Registry(String),

    #[error("syntax checker failed on {path}: {reason}")]
    Checker { path: String, reason: String },

    #[error("escalation failed: {0}")]
    Escalation(String),

    #[error("escalation timed out after {0}s")]
    EscalationTimeout(u64),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TreemendError {
    pub fn manifest(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Manifest {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Config {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for treemend operations.
pub type Result<T> = std::result::Result<T, TreemendError>;
