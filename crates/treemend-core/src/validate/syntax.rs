//! Syntax layer: checker diagnostics plus the line-scanner checks.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::CheckerKind;
use crate::domain::file::line_of_offset;
use crate::domain::{ErrorCategory, GeneratedFile, LayerName, ValidationError};
use crate::language::{SourceKind, TargetLanguage};
use crate::syntax::{
    attribute_defects, bracket_defects, indentation_defects, scan, DiagnosticKind, Scan,
    SyntaxChecker, TreeSitterChecker,
};

use super::ValidationLayer;

pub struct SyntaxLayer {
    checker: Option<Arc<dyn SyntaxChecker>>,
}

impl SyntaxLayer {
    /// `None` runs the heuristic scanner for every file.
    pub fn new(checker: Option<Arc<dyn SyntaxChecker>>) -> Self {
        Self { checker }
    }

    pub fn from_kind(kind: CheckerKind) -> Self {
        Self::new(checker_for(kind))
    }

    fn inspect_file(&self, file: &GeneratedFile, kind: SourceKind) -> Vec<ValidationError> {
        let content = &file.content;
        let scanned = scan(content, kind);
        let mut findings = Vec::new();
        // Lines whose checker diagnostics are already explained.
        let mut explained = BTreeSet::new();

        for defect in &scanned.unterminated {
            explained.extend([defect.line, defect.line + 1]);
            findings.push(
                ValidationError::new(
                    ErrorCategory::UnterminatedString,
                    &file.path,
                    format!("string opened with {} is not closed on this line", defect.quote),
                )
                .with_line(defect.line)
                .with_target(defect.quote.to_string())
                .with_suggestion("close the string or join the wrapped line"),
            );
        }

        if kind.has_markup() {
            for defect in attribute_defects(content, &scanned) {
                explained.extend([defect.line, defect.line + 1]);
                findings.push(
                    ValidationError::new(ErrorCategory::MalformedAttribute, &file.path, defect.describe())
                        .with_line(defect.line),
                );
            }
        }

        match self.checker.as_ref().filter(|c| c.supports(kind)) {
            Some(checker) => match checker.check(&file.path, kind, content) {
                Ok(diagnostics) => {
                    for diagnostic in diagnostics {
                        let line = line_of_offset(content, diagnostic.byte_offset);
                        if explained.contains(&line) {
                            continue;
                        }
                        let finding = match diagnostic.kind {
                            DiagnosticKind::MissingToken(token) => ValidationError::new(
                                ErrorCategory::MissingToken,
                                &file.path,
                                diagnostic.message,
                            )
                            .with_target(token),
                            DiagnosticKind::MissingNode(_) | DiagnosticKind::Unexpected => {
                                ValidationError::new(ErrorCategory::Syntax, &file.path, diagnostic.message)
                            }
                        };
                        findings.push(finding.with_line(line));
                    }
                }
                Err(err) => findings.push(ValidationError::new(
                    ErrorCategory::ParseFailure,
                    &file.path,
                    err.to_string(),
                )),
            },
            None => findings.extend(heuristic_findings(file, kind, &scanned)),
        }

        findings
    }
}

/// The checker backing a given configuration.
pub fn checker_for(kind: CheckerKind) -> Option<Arc<dyn SyntaxChecker>> {
    match kind {
        CheckerKind::TreeSitter => Some(Arc::new(TreeSitterChecker::new())),
        CheckerKind::Heuristic => None,
    }
}

fn heuristic_findings(file: &GeneratedFile, kind: SourceKind, scanned: &Scan) -> Vec<ValidationError> {
    let mut findings: Vec<ValidationError> = bracket_defects(scanned)
        .into_iter()
        .map(|defect| {
            ValidationError::new(ErrorCategory::UnbalancedBrackets, &file.path, defect.message)
                .with_line(defect.line)
        })
        .collect();

    if kind == SourceKind::Python {
        findings.extend(indentation_defects(&file.content, scanned).into_iter().map(|line| {
            ValidationError::new(
                ErrorCategory::Indentation,
                &file.path,
                "indentation is not a multiple of four spaces",
            )
            .with_line(line)
        }));
    }
    findings
}

impl ValidationLayer for SyntaxLayer {
    fn name(&self) -> LayerName {
        LayerName::Syntax
    }

    fn inspect(&self, files: &[GeneratedFile], language: TargetLanguage) -> Vec<ValidationError> {
        files
            .iter()
            .filter(|file| language.owns(file))
            .filter_map(|file| SourceKind::from_path(&file.path).map(|kind| (file, kind)))
            .flat_map(|(file, kind)| self.inspect_file(file, kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;

    fn tree_sitter() -> SyntaxLayer {
        SyntaxLayer::from_kind(CheckerKind::TreeSitter)
    }

    fn heuristic() -> SyntaxLayer {
        SyntaxLayer::from_kind(CheckerKind::Heuristic)
    }

    #[test]
    fn test_clean_files_pass() {
        let files = vec![
            GeneratedFile::new("src/index.ts", "export const add = (a: number, b: number) => a + b;\n"),
            GeneratedFile::new("README.md", "# not source {"),
        ];
        assert!(tree_sitter().inspect(&files, TargetLanguage::TypeScript).is_empty());
        assert!(heuristic().inspect(&files, TargetLanguage::TypeScript).is_empty());
    }

    #[test]
    fn test_checker_diagnostics_are_critical_with_line() {
        let files = vec![GeneratedFile::new(
            "app.py",
            "import os\n\ndef f(x):\n    return x +\n",
        )];
        let findings = tree_sitter().inspect(&files, TargetLanguage::Python);
        assert!(!findings.is_empty());
        assert!(findings.iter().all(|f| f.severity == Severity::Critical));
        assert!(findings.iter().all(|f| f.line.is_some_and(|l| l >= 3)));
    }

    #[test]
    fn test_unterminated_string_suppresses_follow_on_noise() {
        let files = vec![GeneratedFile::new(
            "src/msg.ts",
            "export const msg = \"hello\nworld\";\n",
        )];
        let findings = tree_sitter().inspect(&files, TargetLanguage::TypeScript);
        assert_eq!(findings[0].category, ErrorCategory::UnterminatedString);
        assert_eq!(findings[0].line, Some(1));
        assert!(findings
            .iter()
            .all(|f| f.category != ErrorCategory::Syntax || f.line.is_some_and(|l| l > 2)));
    }

    #[test]
    fn test_malformed_attributes_in_markup_files() {
        let files = vec![GeneratedFile::new(
            "src/App.jsx",
            "export default function App() {\n  return <div class=\"app\">hi</div>;\n}\n",
        )];
        let findings = heuristic().inspect(&files, TargetLanguage::JavaScript);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, ErrorCategory::MalformedAttribute);
        assert_eq!(findings[0].line, Some(2));
    }

    #[test]
    fn test_heuristic_brackets_and_indentation() {
        let files = vec![
            GeneratedFile::new("a.js", "function f() {\n  return [1, 2;\n}\n"),
            GeneratedFile::new("b.py", "def f():\n   return 1\n"),
        ];
        let js = heuristic().inspect(&files, TargetLanguage::JavaScript);
        assert_eq!(js.len(), 1);
        assert_eq!(js[0].category, ErrorCategory::UnbalancedBrackets);
        assert_eq!(js[0].severity, Severity::High);

        let py = heuristic().inspect(&files, TargetLanguage::Python);
        assert_eq!(py.len(), 1);
        assert_eq!(py[0].category, ErrorCategory::Indentation);
        assert_eq!(py[0].severity, Severity::Medium);
    }

    #[test]
    fn test_missing_token_carries_target() {
        let files = vec![GeneratedFile::new("src/main.rs", "fn main() {\n    let x = 1;\n")];
        let findings = tree_sitter().inspect(&files, TargetLanguage::Rust);
        assert!(findings
            .iter()
            .any(|f| f.category == ErrorCategory::MissingToken && f.target.as_deref() == Some("}")));
    }
}
