//! Pipeline report: the caller-facing output of a run.
//!
//! Reports are plain data. [`PipelineReport::render_markdown`] formats one
//! for humans, and [`write_report_artifact`] persists it to
//! `<dir>/<run_id>/report.json` with a companion `report.digest`
//! (SHA-256 of the compact JSON) for integrity checks.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{GeneratedFile, LayerResult, Result, TreemendError, ValidationError};
use crate::language::TargetLanguage;
use crate::pipeline::AttemptRecord;

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub language: TargetLanguage,

    /// True iff the returned files have no Critical errors.
    pub is_valid: bool,

    /// The files actually returned; every list below describes them.
    pub files: Vec<GeneratedFile>,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    pub confidence: f32,

    pub fixed_count: usize,
    pub applied_fixes: Vec<String>,
    pub duration_ms: u64,

    /// Fix cycles that were adopted.
    pub attempts: u32,
    pub attempt_log: Vec<AttemptRecord>,
    pub layer_results: Vec<LayerResult>,

    /// True when a generative repair result was adopted.
    pub escalated: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl PipelineReport {
    pub fn critical_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.severity == crate::domain::Severity::Critical)
            .count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render the report as a Markdown document.
    pub fn render_markdown(&self) -> String {
        let verdict = if self.is_valid { "PASSED" } else { "FAILED" };
        let mut md = format!("# Treemend Report: {verdict}\n\n");

        md.push_str(&format!("- **Run**: `{}`\n", self.run_id));
        md.push_str(&format!("- **Language**: {}\n", self.language));
        md.push_str(&format!("- **Files**: {}\n", self.files.len()));
        md.push_str(&format!("- **Confidence**: {:.2}\n", self.confidence));
        md.push_str(&format!(
            "- **Attempts**: {} ({} fix(es) applied)\n",
            self.attempts, self.fixed_count
        ));
        if self.escalated {
            md.push_str("- **Escalated**: generative repair result adopted\n");
        }
        md.push_str(&format!("- **Duration**: {} ms\n", self.duration_ms));

        md.push_str("\n## Layers\n\n| Layer | Errors | Warnings |\n|---|---|---|\n");
        for layer in &self.layer_results {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                layer.layer.as_str(),
                layer.errors,
                layer.warnings
            ));
        }

        render_findings(&mut md, "Errors", &self.errors);
        render_findings(&mut md, "Warnings", &self.warnings);

        md.push_str("\n## Applied Fixes\n\n");
        if self.applied_fixes.is_empty() {
            md.push_str("_None._\n");
        }
        for fix in &self.applied_fixes {
            md.push_str(&format!("- {fix}\n"));
        }
        md
    }
}

fn render_findings(md: &mut String, title: &str, findings: &[ValidationError]) {
    md.push_str(&format!("\n## {title} ({})\n\n", findings.len()));
    if findings.is_empty() {
        md.push_str("_None._\n");
        return;
    }
    for finding in findings {
        let location = match finding.line {
            Some(line) => format!("{}:{line}", finding.file),
            None => finding.file.clone(),
        };
        md.push_str(&format!(
            "- **{:?}** `{}` {location}: {}",
            finding.severity, finding.category, finding.message
        ));
        if let Some(hint) = &finding.suggested_fix {
            md.push_str(&format!(" (fix: {hint})"));
        }
        md.push('\n');
    }
}

fn report_digest(report: &PipelineReport) -> Result<String> {
    let bytes = serde_json::to_vec(report)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Write a report to `<dir>/<run_id>/report.json` plus `report.digest`.
///
/// Returns the path to `report.json`.
pub fn write_report_artifact(report: &PipelineReport, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(&report.run_id);
    std::fs::create_dir_all(&run_dir)?;

    let report_path = run_dir.join("report.json");
    let digest = report_digest(report)?;
    std::fs::write(&report_path, serde_json::to_vec_pretty(report)?)?;
    std::fs::write(run_dir.join("report.digest"), digest.as_bytes())?;

    Ok(report_path)
}

/// Read and integrity-verify `<dir>/<run_id>/report.json`.
///
/// Fails with [`TreemendError::DigestMismatch`] when the report no longer
/// matches its stored digest.
pub fn read_report_artifact(run_id: &str, dir: &Path) -> Result<PipelineReport> {
    let run_dir = dir.join(run_id);
    let report: PipelineReport = serde_json::from_slice(&std::fs::read(run_dir.join("report.json"))?)?;
    let expected = std::fs::read_to_string(run_dir.join("report.digest"))?
        .trim()
        .to_string();

    let actual = report_digest(&report)?;
    if actual != expected {
        return Err(TreemendError::DigestMismatch { expected, actual });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorCategory, LayerName};
    use tempfile::tempdir;

    fn sample() -> PipelineReport {
        PipelineReport {
            run_id: "run-abc".to_string(),
            language: TargetLanguage::TypeScript,
            is_valid: false,
            files: vec![GeneratedFile::new("src/index.ts", "export {};\n")],
            errors: vec![ValidationError::new(ErrorCategory::Syntax, "src/index.ts", "unexpected `}`")
                .with_line(3)],
            warnings: vec![ValidationError::new(ErrorCategory::PrintStatement, "src/index.ts", "debug")
                .with_suggestion("remove it")],
            confidence: 0.68,
            fixed_count: 1,
            applied_fixes: vec!["created package.json".to_string()],
            duration_ms: 12,
            attempts: 1,
            attempt_log: vec![AttemptRecord {
                attempt: 1,
                files_before: 1,
                files_after: 2,
                errors_before: 2,
                errors_after: 1,
            }],
            layer_results: vec![LayerResult {
                layer: LayerName::Syntax,
                errors: 1,
                warnings: 0,
            }],
            escalated: false,
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn test_markdown_lists_findings() {
        let md = sample().render_markdown();
        assert!(md.starts_with("# Treemend Report: FAILED"));
        assert!(md.contains("`syntax` src/index.ts:3"));
        assert!(md.contains("(fix: remove it)"));
        assert!(md.contains("| syntax | 1 | 0 |"));
        assert!(md.contains("- created package.json"));
    }

    #[test]
    fn test_write_and_read_report_artifact() {
        let dir = tempdir().expect("tempdir");
        let report = sample();
        let path = write_report_artifact(&report, dir.path()).expect("write");
        assert!(path.ends_with("run-abc/report.json"));

        let loaded = read_report_artifact("run-abc", dir.path()).expect("read");
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_tampered_report_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let report = sample();
        write_report_artifact(&report, dir.path()).expect("write");

        let mut tampered = report.clone();
        tampered.is_valid = true;
        let path = dir.path().join("run-abc").join("report.json");
        std::fs::write(&path, serde_json::to_vec_pretty(&tampered).unwrap()).unwrap();

        match read_report_artifact("run-abc", dir.path()) {
            Err(TreemendError::DigestMismatch { .. }) => {}
            other => panic!("expected DigestMismatch, got {other:?}"),
        }
    }
}
