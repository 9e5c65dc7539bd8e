//! Treemend Core Library
//!
//! Layered validation and rule-based repair of machine-generated source
//! trees: a validator, a fix router and a bounded convergence loop that
//! ties them together.

pub mod config;
pub mod domain;
pub mod fix;
pub mod language;
pub mod manifest;
pub mod metrics;
pub mod obs;
pub mod observer;
pub mod patterns;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod syntax;
pub mod telemetry;
pub mod validate;

pub use config::{CheckerKind, PipelineConfig};

pub use domain::{
    compute_confidence, ErrorCategory, FixResult, FixStrategy, GeneratedFile, LayerName,
    LayerResult, Result, Severity, TreemendError, ValidationError, ValidationResult,
};

pub use fix::{Fixer, FixRouter};
pub use language::{Ecosystem, SourceKind, TargetLanguage};
pub use observer::{EscalationOutcome, NoopObserver, PipelineEvent, PipelineObserver, TracingObserver};
pub use pipeline::{
    AttemptRecord, GenerativeRepair, Orchestrator, PipelineState, RepairRequest,
};
pub use registry::RepairRegistry;
pub use report::{read_report_artifact, write_report_artifact, PipelineReport};
pub use syntax::{SyntaxChecker, TreeSitterChecker};
pub use validate::{ValidationLayer, Validator};

pub use metrics::{MetricsSnapshot, METRICS};
pub use obs::PipelineSpan;
pub use telemetry::init_tracing;

/// Treemend version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
