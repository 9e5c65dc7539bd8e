//! Domain models for treemend.
//!
//! Canonical definitions shared by every stage of the pipeline:
//! - `GeneratedFile`: one file of the generated tree
//! - `ValidationError` / `ValidationResult`: the error model
//! - `FixResult`: what a repair unit hands back

pub mod error;
pub mod file;
pub mod fix;
pub mod validation;

pub use error::{Result, TreemendError};
pub use file::GeneratedFile;
pub use fix::FixResult;
pub use validation::{
    compute_confidence, ErrorCategory, FixStrategy, LayerName, LayerResult, Severity,
    ValidationError, ValidationResult,
};
