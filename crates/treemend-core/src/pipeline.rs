//! Convergence orchestrator.
//!
//! A three-state machine (Validating, Fixing, Done) that alternates full
//! validation with one router pass until the tree has no Critical errors,
//! the attempt budget is spent, or a fix pass makes no progress. The
//! validation result in the report always describes the returned files.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::domain::{
    GeneratedFile, Result, Severity, TreemendError, ValidationError, ValidationResult,
};
use crate::fix::FixRouter;
use crate::language::TargetLanguage;
use crate::metrics::METRICS;
use crate::obs;
use crate::observer::{EscalationOutcome, NoopObserver, PipelineEvent, PipelineObserver};
use crate::registry::RepairRegistry;
use crate::report::PipelineReport;
use crate::validate::{syntax::checker_for, Validator};

/// Caller input for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairRequest {
    pub files: Vec<GeneratedFile>,
    pub language: TargetLanguage,
    pub auto_fix: bool,
    pub max_attempts: u32,
}

impl RepairRequest {
    /// Request with the default policy (auto-fix on, two attempts).
    pub fn new(files: Vec<GeneratedFile>, language: TargetLanguage) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            files,
            language,
            auto_fix: defaults.auto_fix,
            max_attempts: defaults.max_attempts,
        }
    }

    pub fn with_auto_fix(mut self, auto_fix: bool) -> Self {
        self.auto_fix = auto_fix;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Validating,
    Fixing,
    Done,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Validating => "validating",
            PipelineState::Fixing => "fixing",
            PipelineState::Done => "done",
        }
    }
}

/// One adopted fix cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub files_before: usize,
    pub files_after: usize,
    /// Critical and High errors before and after the cycle.
    pub errors_before: usize,
    pub errors_after: usize,
}

/// External generative repair collaborator.
#[async_trait]
pub trait GenerativeRepair: Send + Sync {
    /// Return a replacement file set for `files` given the Critical errors
    /// the rule-based fixers could not resolve.
    async fn repair(
        &self,
        files: &[GeneratedFile],
        unresolved: &[ValidationError],
    ) -> Result<Vec<GeneratedFile>>;
}

pub struct Orchestrator {
    validator: Validator,
    router: FixRouter,
    observer: Arc<dyn PipelineObserver>,
    escalation: Option<Arc<dyn GenerativeRepair>>,
    escalation_timeout: Duration,
}

/// Mutable loop state, owned by one `run` call.
struct RunState {
    state: PipelineState,
    files: Vec<GeneratedFile>,
    validation: ValidationResult,
    attempts: u32,
    applied: Vec<String>,
    attempt_log: Vec<AttemptRecord>,
}

impl Orchestrator {
    /// Standard validator and fixer set for `config`.
    pub fn new(config: &PipelineConfig, registry: Arc<RepairRegistry>) -> Self {
        let checker = checker_for(config.checker);
        Self::from_parts(
            Validator::new(Arc::clone(&registry), config.checker),
            FixRouter::new(registry, checker),
            config.escalation_timeout(),
        )
    }

    pub fn from_parts(validator: Validator, router: FixRouter, escalation_timeout: Duration) -> Self {
        Self {
            validator,
            router,
            observer: Arc::new(NoopObserver),
            escalation: None,
            escalation_timeout,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_escalation(mut self, escalation: Arc<dyn GenerativeRepair>) -> Self {
        self.escalation = Some(escalation);
        self
    }

    fn transition(&self, run: &mut RunState, to: PipelineState) {
        let from = run.state;
        run.state = to;
        debug!(from = from.as_str(), to = to.as_str(), "pipeline transition");
        self.observer.on_event(&PipelineEvent::StateChanged { from, to });
    }

    async fn validate(&self, files: &[GeneratedFile], language: TargetLanguage) -> ValidationResult {
        let result = self.validator.validate(files, language).await;
        for layer in &result.layer_results {
            self.observer.on_event(&PipelineEvent::LayerCompleted {
                layer: layer.layer,
                errors: layer.errors,
                warnings: layer.warnings,
            });
        }
        result
    }

    /// Run the convergence loop. Never fails: in-taxonomy defects and fixer
    /// failures end up in the report.
    pub async fn run(&self, request: RepairRequest) -> PipelineReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = obs::PipelineSpan::new(&run_id);
        span.wrap(self.run_inner(run_id, request)).await
    }

    async fn run_inner(&self, run_id: String, request: RepairRequest) -> PipelineReport {
        let started = Instant::now();
        obs::emit_pipeline_started(
            &run_id,
            request.language.as_str(),
            request.files.len(),
            request.max_attempts,
        );

        let language = request.language;
        let validation = self.validate(&request.files, language).await;
        let mut run = RunState {
            state: PipelineState::Validating,
            files: request.files,
            validation,
            attempts: 0,
            applied: Vec::new(),
            attempt_log: Vec::new(),
        };

        loop {
            if run.validation.passed || !request.auto_fix {
                break;
            }
            if run.attempts >= request.max_attempts {
                info!(attempts = run.attempts, "attempt budget exhausted");
                break;
            }

            self.transition(&mut run, PipelineState::Fixing);
            let attempt = run.attempts + 1;
            self.observer.on_event(&PipelineEvent::AttemptStarted { attempt });

            let findings: Vec<ValidationError> = run.validation.findings().cloned().collect();
            let fixed = match self.router.fix(&run.files, &findings, language) {
                Ok(result) if result.fixed && result.files != run.files => result,
                Ok(_) => {
                    info!(attempt, "no fixer made progress");
                    break;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "fix pass failed; treating as no progress");
                    break;
                }
            };

            let files_before = run.files.len();
            let errors_before = run.validation.errors.len();
            self.observer.on_event(&PipelineEvent::FixApplied {
                attempt,
                fixes: fixed.applied_fixes.clone(),
                files_before,
                files_after: fixed.files.len(),
            });
            run.files = fixed.files;
            run.applied.extend(fixed.applied_fixes);
            run.attempts = attempt;

            self.transition(&mut run, PipelineState::Validating);
            run.validation = self.validate(&run.files, language).await;
            let record = AttemptRecord {
                attempt,
                files_before,
                files_after: run.files.len(),
                errors_before,
                errors_after: run.validation.errors.len(),
            };
            METRICS.record_attempt(&record);
            run.attempt_log.push(record);
        }

        let escalated = if request.auto_fix && !run.validation.passed {
            self.escalate(&mut run, language).await
        } else {
            false
        };

        self.transition(&mut run, PipelineState::Done);
        let duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_pipeline_finished(&run_id, duration_ms, run.attempts, run.validation.passed);
        METRICS.record_run(run.validation.passed);
        METRICS.flush();

        PipelineReport {
            run_id,
            language,
            is_valid: run.validation.passed,
            fixed_count: run.applied.len(),
            applied_fixes: run.applied,
            files: run.files,
            errors: run.validation.errors,
            warnings: run.validation.warnings,
            confidence: run.validation.confidence,
            duration_ms,
            attempts: run.attempts,
            attempt_log: run.attempt_log,
            layer_results: run.validation.layer_results,
            escalated,
            evaluated_at: Utc::now(),
        }
    }

    /// Hand the unresolved Critical errors to the generative collaborator,
    /// once. Returns true when its output was adopted.
    async fn escalate(&self, run: &mut RunState, language: TargetLanguage) -> bool {
        let Some(escalation) = &self.escalation else {
            return false;
        };
        let unresolved: Vec<ValidationError> = run
            .validation
            .errors
            .iter()
            .filter(|e| e.severity == Severity::Critical)
            .cloned()
            .collect();
        info!(unresolved = unresolved.len(), "escalating to generative repair");

        let outcome = tokio::time::timeout(
            self.escalation_timeout,
            escalation.repair(&run.files, &unresolved),
        )
        .await;
        let candidate = match outcome {
            Ok(Ok(files)) => check_escalation_output(files),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(TreemendError::EscalationTimeout(self.escalation_timeout.as_secs())),
        };
        let candidate = match candidate {
            Ok(files) => files,
            Err(err) => {
                self.observer.on_event(&PipelineEvent::Escalation(EscalationOutcome::Failed {
                    reason: err.to_string(),
                }));
                METRICS.record_escalation(false);
                return false;
            }
        };

        let validation = self.validate(&candidate, language).await;
        let critical_before = run.validation.critical_count();
        let critical_after = validation.critical_count();
        let adopted = critical_after < critical_before;
        METRICS.record_escalation(adopted);
        if adopted {
            self.observer.on_event(&PipelineEvent::Escalation(EscalationOutcome::Adopted {
                critical_before,
                critical_after,
            }));
            run.files = candidate;
            run.validation = validation;
            true
        } else {
            self.observer.on_event(&PipelineEvent::Escalation(EscalationOutcome::Rejected {
                critical_before,
                critical_after,
            }));
            false
        }
    }
}

/// Reject empty sets and sets with repeated paths.
fn check_escalation_output(files: Vec<GeneratedFile>) -> Result<Vec<GeneratedFile>> {
    if files.is_empty() {
        return Err(TreemendError::Escalation("returned no files".to_string()));
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = files.iter().find(|f| !seen.insert(f.path.as_str())) {
        return Err(TreemendError::Escalation(format!(
            "returned duplicate path {}",
            dup.path
        )));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerKind;

    fn orchestrator() -> Orchestrator {
        let config = PipelineConfig {
            checker: CheckerKind::Heuristic,
            ..PipelineConfig::default()
        };
        Orchestrator::new(&config, Arc::new(RepairRegistry::builtin()))
    }

    fn clean_project() -> Vec<GeneratedFile> {
        vec![
            GeneratedFile::new(
                "package.json",
                "{\n  \"name\": \"app\",\n  \"type\": \"module\",\n  \"dependencies\": {}\n}\n",
            ),
            GeneratedFile::new("src/index.js", "export const answer = 42;\n"),
        ]
    }

    #[tokio::test]
    async fn test_clean_project_passes_without_attempts() {
        let report = orchestrator()
            .run(RepairRequest::new(clean_project(), TargetLanguage::JavaScript))
            .await;
        assert!(report.is_valid);
        assert_eq!(report.attempts, 0);
        assert!(report.applied_fixes.is_empty());
        assert_eq!(report.files, clean_project());
        assert_eq!(report.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_auto_fix_disabled_only_validates() {
        let files = vec![GeneratedFile::new("src/index.js", "export const a = 1;\n")];
        let report = orchestrator()
            .run(RepairRequest::new(files.clone(), TargetLanguage::JavaScript).with_auto_fix(false))
            .await;
        assert!(!report.is_valid);
        assert_eq!(report.attempts, 0);
        assert_eq!(report.files, files);
    }

    #[test]
    fn test_escalation_output_checks() {
        assert!(check_escalation_output(Vec::new()).is_err());
        let dup = vec![GeneratedFile::new("a.ts", "1"), GeneratedFile::new("a.ts", "2")];
        assert!(check_escalation_output(dup).is_err());
        assert!(check_escalation_output(vec![GeneratedFile::new("a.ts", "1")]).is_ok());
    }
}
