//! Syntax fixer: unterminated strings, JSX attributes and missing tokens.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{ErrorCategory, FixResult, FixStrategy, GeneratedFile, Result, ValidationError};
use crate::language::{SourceKind, TargetLanguage};
use crate::syntax::markup::repair_attributes;
use crate::syntax::{scan, StringDefect, SyntaxChecker};

use super::{paths_with, Fixer};

/// Upper bound on string repairs per file.
const MAX_STRING_REPAIRS: usize = 32;

/// Characters that usually close the expression around a string literal.
const TRAILING_CLOSERS: &[char] = &[';', ',', ')', ']', '}'];

fn first_defect(content: &str, kind: SourceKind) -> Option<StringDefect> {
    scan(content, kind).unterminated.first().copied()
}

/// Join line `idx` with the next one through an escaped newline.
fn merge_with_next(lines: &[&str], idx: usize) -> Option<String> {
    let next = lines.get(idx + 1)?;
    let mut out: Vec<String> = lines[..idx].iter().map(|l| l.to_string()).collect();
    out.push(format!("{}\\n{}", lines[idx], next));
    out.extend(lines[idx + 2..].iter().map(|l| l.to_string()));
    Some(out.join("\n"))
}

/// Close the quote at the end of line `idx`, before any trailing `;`, `,`
/// or closing brackets.
fn close_quote(lines: &[&str], idx: usize, quote: char) -> String {
    let line = lines[idx].trim_end();
    let body = line.trim_end_matches(TRAILING_CLOSERS);
    let closed = format!("{body}{quote}{}", &line[body.len()..]);
    let mut out: Vec<&str> = lines.to_vec();
    out[idx] = &closed;
    out.join("\n")
}

/// Repair unterminated single-line strings one at a time, rescanning after
/// each edit. Returns the number of repairs.
fn repair_strings(content: &mut String, kind: SourceKind) -> usize {
    let mut repairs = 0;
    while repairs < MAX_STRING_REPAIRS {
        let Some(defect) = first_defect(content, kind) else {
            break;
        };
        let before = scan(content, kind).unterminated.len();
        let lines: Vec<&str> = content.split('\n').collect();
        let idx = defect.line as usize - 1;

        let merged = merge_with_next(&lines, idx).filter(|candidate| {
            let after = scan(candidate, kind).unterminated;
            after.len() < before && !after.iter().any(|d| d.line == defect.line)
        });
        let candidate = match merged {
            Some(candidate) => candidate,
            None => close_quote(&lines, idx, defect.quote),
        };

        if scan(&candidate, kind).unterminated.len() >= before {
            debug!(line = defect.line, "string repair made no progress");
            break;
        }
        *content = candidate;
        repairs += 1;
    }
    repairs
}

fn repair_markup(content: &str, kind: SourceKind) -> Option<String> {
    let scanned = scan(content, kind);
    let mut changed = false;
    let lines: Vec<String> = content
        .split('\n')
        .zip(scanned.masked.iter())
        .map(|(raw, masked)| {
            let repaired = repair_attributes(raw, masked);
            changed |= repaired != raw;
            repaired
        })
        .collect();
    changed.then(|| lines.join("\n"))
}

pub struct SyntaxFixer {
    checker: Option<Arc<dyn SyntaxChecker>>,
}

impl SyntaxFixer {
    pub fn new(checker: Option<Arc<dyn SyntaxChecker>>) -> Self {
        Self { checker }
    }

    fn fix_file(
        &self,
        file: &GeneratedFile,
        categories: &[ErrorCategory],
        applied: &mut Vec<String>,
    ) -> Result<Option<GeneratedFile>> {
        let Some(kind) = SourceKind::from_path(&file.path) else {
            return Ok(None);
        };
        let mut content = file.content.clone();

        if categories.contains(&ErrorCategory::UnterminatedString) {
            let repairs = repair_strings(&mut content, kind);
            if repairs > 0 {
                applied.push(format!("closed {repairs} unterminated string(s) in {}", file.path));
            }
        }

        if kind.has_markup() && categories.contains(&ErrorCategory::MalformedAttribute) {
            if let Some(repaired) = repair_markup(&content, kind) {
                content = repaired;
                applied.push(format!("rewrote JSX attributes in {}", file.path));
            }
        }

        if categories.contains(&ErrorCategory::MissingToken) {
            if let Some(checker) = self.checker.as_ref().filter(|c| c.supports(kind)) {
                if let Some(reprinted) = checker.reprint(&file.path, kind, &content)? {
                    content = reprinted;
                    applied.push(format!("inserted missing tokens in {}", file.path));
                }
            }
        }

        Ok((content != file.content).then(|| file.with_content(content)))
    }
}

impl Fixer for SyntaxFixer {
    fn strategy(&self) -> FixStrategy {
        FixStrategy::Syntax
    }

    fn apply(
        &self,
        files: &[GeneratedFile],
        errors: &[&ValidationError],
        _language: TargetLanguage,
    ) -> Result<FixResult> {
        let targets = paths_with(
            errors,
            &[
                ErrorCategory::UnterminatedString,
                ErrorCategory::MalformedAttribute,
                ErrorCategory::MissingToken,
            ],
        );
        let mut next = files.to_vec();
        let mut applied = Vec::new();

        for file in next.iter_mut().filter(|f| targets.contains(f.path.as_str())) {
            let categories: Vec<ErrorCategory> = errors
                .iter()
                .filter(|e| e.file == file.path)
                .map(|e| e.category)
                .collect();
            if let Some(fixed) = self.fix_file(file, &categories, &mut applied)? {
                *file = fixed;
            }
        }

        Ok(FixResult::new(next, applied))
    }
}
