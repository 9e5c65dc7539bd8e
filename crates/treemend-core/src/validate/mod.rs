//! Layered static validator.
//!
//! Four independent layers inspect the same immutable snapshot. Each runs on
//! the blocking pool; results are merged in fixed layer order once every
//! layer has finished, so no layer ever observes another's output.

pub mod dependency;
pub mod pattern;
pub mod structure;
pub mod syntax;

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::CheckerKind;
use crate::domain::{ErrorCategory, GeneratedFile, LayerName, ValidationError, ValidationResult};
use crate::language::TargetLanguage;
use crate::metrics::METRICS;
use crate::registry::RepairRegistry;

pub use dependency::DependencyLayer;
pub use pattern::PatternLayer;
pub use structure::StructureLayer;
pub use syntax::SyntaxLayer;

/// One inspection layer: a pure function from snapshot to findings.
pub trait ValidationLayer: Send + Sync {
    fn name(&self) -> LayerName;

    /// Inspect the snapshot. Internal failures become findings, never panics
    /// or errors.
    fn inspect(&self, files: &[GeneratedFile], language: TargetLanguage) -> Vec<ValidationError>;
}

/// Runs every layer and merges their findings.
#[derive(Clone)]
pub struct Validator {
    layers: Vec<Arc<dyn ValidationLayer>>,
}

impl Validator {
    /// The standard four layers in merge order.
    pub fn new(registry: Arc<RepairRegistry>, checker: CheckerKind) -> Self {
        Self::with_layers(vec![
            Arc::new(SyntaxLayer::from_kind(checker)),
            Arc::new(DependencyLayer::new(Arc::clone(&registry))),
            Arc::new(PatternLayer),
            Arc::new(StructureLayer::new(registry)),
        ])
    }

    /// Custom layer set; findings are merged in the given order.
    pub fn with_layers(layers: Vec<Arc<dyn ValidationLayer>>) -> Self {
        Self { layers }
    }

    pub fn layer_names(&self) -> Vec<LayerName> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }

    /// Validate `files` against `language`.
    pub async fn validate(
        &self,
        files: &[GeneratedFile],
        language: TargetLanguage,
    ) -> ValidationResult {
        let snapshot: Arc<[GeneratedFile]> = Arc::from(files.to_vec());

        let handles = self.layers.iter().map(|layer| {
            let layer = Arc::clone(layer);
            let snapshot = Arc::clone(&snapshot);
            tokio::task::spawn_blocking(move || layer.inspect(&snapshot, language))
        });
        let outcomes = join_all(handles).await;

        let merged = self
            .layers
            .iter()
            .zip(outcomes)
            .map(|(layer, outcome)| {
                let name = layer.name();
                let findings = match outcome {
                    Ok(findings) => findings,
                    Err(join_err) => {
                        warn!(layer = name.as_str(), error = %join_err, "validation layer failed");
                        vec![layer_failure(name, &join_err)]
                    }
                };
                debug!(layer = name.as_str(), findings = findings.len(), "layer finished");
                (name, findings)
            })
            .collect();

        METRICS.inc_validations();
        ValidationResult::from_layers(merged)
    }
}

fn layer_failure(layer: LayerName, error: &dyn std::fmt::Display) -> ValidationError {
    ValidationError::new(
        ErrorCategory::LayerFailure,
        format!("<{} layer>", layer.as_str()),
        format!("{} layer aborted: {error}", layer.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingLayer;

    impl ValidationLayer for PanickingLayer {
        fn name(&self) -> LayerName {
            LayerName::Pattern
        }

        fn inspect(&self, _files: &[GeneratedFile], _language: TargetLanguage) -> Vec<ValidationError> {
            panic!("regex table exploded");
        }
    }

    struct FixedLayer(LayerName, ErrorCategory);

    impl ValidationLayer for FixedLayer {
        fn name(&self) -> LayerName {
            self.0
        }

        fn inspect(&self, files: &[GeneratedFile], _language: TargetLanguage) -> Vec<ValidationError> {
            files
                .iter()
                .map(|f| ValidationError::new(self.1, f.path.clone(), "fixed finding"))
                .collect()
        }
    }

    #[tokio::test]
    async fn test_panicking_layer_becomes_layer_failure() {
        let validator = Validator::with_layers(vec![
            Arc::new(FixedLayer(LayerName::Syntax, ErrorCategory::PrintStatement)),
            Arc::new(PanickingLayer),
        ]);
        let files = vec![GeneratedFile::new("a.ts", "x")];
        let result = validator.validate(&files, TargetLanguage::TypeScript).await;

        assert!(!result.passed);
        assert_eq!(result.count_category(ErrorCategory::LayerFailure), 1);
        assert_eq!(result.count_category(ErrorCategory::PrintStatement), 1);
        assert_eq!(result.layer_results[1].layer, LayerName::Pattern);
    }

    #[tokio::test]
    async fn test_findings_merge_in_layer_order() {
        let validator = Validator::with_layers(vec![
            Arc::new(FixedLayer(LayerName::Structure, ErrorCategory::EmptyFile)),
            Arc::new(FixedLayer(LayerName::Dependency, ErrorCategory::MissingDependency)),
        ]);
        let files = vec![GeneratedFile::new("a.ts", ""), GeneratedFile::new("b.ts", "")];
        let result = validator.validate(&files, TargetLanguage::TypeScript).await;

        let categories: Vec<ErrorCategory> = result.errors.iter().map(|e| e.category).collect();
        assert_eq!(
            categories,
            vec![
                ErrorCategory::EmptyFile,
                ErrorCategory::EmptyFile,
                ErrorCategory::MissingDependency,
                ErrorCategory::MissingDependency,
            ]
        );
    }

    #[test]
    fn test_standard_layer_order() {
        let validator = Validator::new(Arc::new(RepairRegistry::builtin()), CheckerKind::Heuristic);
        assert_eq!(
            validator.layer_names(),
            vec![
                LayerName::Syntax,
                LayerName::Dependency,
                LayerName::Pattern,
                LayerName::Structure,
            ]
        );
    }
}
