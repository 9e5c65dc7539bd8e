//! Fix strategy router.
//!
//! Fixable findings are grouped by strategy and handed to one rule-based
//! [`Fixer`] per strategy, in [`FixStrategy::PRIORITY`] order. Each fixer
//! receives the previous fixer's output and returns the full file list.

pub mod cleaner;
pub mod config;
pub mod dependency;
pub mod module_system;
pub mod syntax;

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{
    ErrorCategory, FixResult, FixStrategy, GeneratedFile, Result, ValidationError,
};
use crate::language::TargetLanguage;
use crate::metrics::METRICS;
use crate::registry::RepairRegistry;
use crate::syntax::SyntaxChecker;

pub use cleaner::Cleaner;
pub use config::ConfigFixer;
pub use dependency::DependencyFixer;
pub use module_system::ModuleSystemFixer;
pub use syntax::SyntaxFixer;

/// A rule-based repair unit bound to one strategy.
pub trait Fixer: Send + Sync {
    fn strategy(&self) -> FixStrategy;

    /// Repair `files` for the given findings, all of which carry this
    /// fixer's strategy. Returns the full file list.
    fn apply(
        &self,
        files: &[GeneratedFile],
        errors: &[&ValidationError],
        language: TargetLanguage,
    ) -> Result<FixResult>;
}

/// Paths named by findings of the given categories.
pub(crate) fn paths_with<'a>(
    errors: &[&'a ValidationError],
    categories: &[ErrorCategory],
) -> BTreeSet<&'a str> {
    errors
        .iter()
        .filter(|e| categories.contains(&e.category))
        .map(|e| e.file.as_str())
        .collect()
}

/// Dispatches findings to fixers.
pub struct FixRouter {
    fixers: Vec<Box<dyn Fixer>>,
}

impl FixRouter {
    /// The standard fixer set.
    pub fn new(registry: Arc<RepairRegistry>, checker: Option<Arc<dyn SyntaxChecker>>) -> Self {
        Self::with_fixers(vec![
            Box::new(DependencyFixer::new(Arc::clone(&registry))),
            Box::new(ModuleSystemFixer),
            Box::new(ConfigFixer),
            Box::new(SyntaxFixer::new(checker)),
            Box::new(Cleaner),
        ])
    }

    pub fn with_fixers(fixers: Vec<Box<dyn Fixer>>) -> Self {
        Self { fixers }
    }

    /// Run every strategy that has fixable findings.
    ///
    /// A fixer error aborts the whole pass; callers treat that as no
    /// progress.
    pub fn fix(
        &self,
        files: &[GeneratedFile],
        errors: &[ValidationError],
        language: TargetLanguage,
    ) -> Result<FixResult> {
        let fixable: Vec<&ValidationError> = errors.iter().filter(|e| e.is_fixable()).collect();
        let mut current = files.to_vec();
        let mut applied = Vec::new();

        for strategy in FixStrategy::PRIORITY {
            let group: Vec<&ValidationError> = fixable
                .iter()
                .copied()
                .filter(|e| e.fix_strategy == Some(strategy))
                .collect();
            if group.is_empty() {
                continue;
            }
            let Some(fixer) = self.fixers.iter().find(|f| f.strategy() == strategy) else {
                debug!(strategy = strategy.as_str(), "no fixer registered");
                continue;
            };

            let result = fixer.apply(&current, &group, language)?;
            if result.fixed {
                info!(
                    strategy = strategy.as_str(),
                    fixes = result.applied_fixes.len(),
                    "fixer applied changes"
                );
                METRICS.add_fixes(result.applied_fixes.len() as u64);
                current = result.files;
                applied.extend(result.applied_fixes);
            }
        }

        Ok(FixResult::new(current, applied))
    }
}
