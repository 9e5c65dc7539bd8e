//! Generic cleaner: the last fix stage. Strips placeholder and TODO lines,
//! debug prints, duplicate, empty and placeholder files.

use std::collections::BTreeSet;

use crate::domain::{ErrorCategory, FixResult, FixStrategy, GeneratedFile, Result, ValidationError};
use crate::language::{SourceKind, TargetLanguage};
use crate::patterns::{rules_of, LineView};
use crate::syntax::{scan, Scan};

use super::{paths_with, Fixer};

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Where the first fixable marker of `category` sits on line `idx`, if any.
fn marker_offset(
    raw: &str,
    scanned: &Scan,
    idx: usize,
    kind: SourceKind,
    category: ErrorCategory,
) -> Option<usize> {
    let masked = scanned.masked.get(idx).map_or(raw, String::as_str);
    let comment_start = scanned.comment_starts.get(idx).copied().flatten();
    rules_of(kind, category)
        .filter(|rule| rule.fixable)
        .filter_map(|rule| match rule.view {
            LineView::Code => rule.regex.find(masked).map(|m| m.start()),
            LineView::Raw => rule
                .regex
                .find_iter(raw)
                .map(|m| m.start())
                .find(|&at| !in_string(raw, masked, comment_start, at)),
        })
        .min()
}

/// True when byte `at` of `raw` falls inside a string literal. Masked
/// bytes before the line comment are string text; a line with no code
/// at all is treated as comment.
fn in_string(raw: &str, masked: &str, comment_start: Option<usize>, at: usize) -> bool {
    if comment_start.is_some_and(|c| at >= c) || masked.trim().is_empty() {
        return false;
    }
    let column = raw[..at].chars().count();
    masked.chars().nth(column).is_some_and(|c| c == ' ')
        && raw[at..].chars().next().is_some_and(|c| c != ' ')
}

/// A debug print that is the whole statement on its line.
fn is_lone_print(masked: &str, kind: SourceKind) -> bool {
    let start = rules_of(kind, ErrorCategory::PrintStatement)
        .filter_map(|rule| rule.regex.find(masked).map(|m| m.start()))
        .min();
    let Some(start) = start else {
        return false;
    };
    if start != indent_of(masked) {
        return false;
    }
    let statement = masked[start..].trim_end();
    let depth: i32 = statement
        .chars()
        .map(|c| match c {
            '(' | '[' | '{' => 1,
            ')' | ']' | '}' => -1,
            _ => 0,
        })
        .sum();
    depth == 0 && (statement.ends_with(';') || statement.ends_with(')'))
}

/// Python blocks must keep a body: a removed line that was the only
/// statement under a `:` header becomes `pass`.
fn keep_python_blocks(original: &[&str], kept: &mut [Option<String>]) {
    for idx in 0..kept.len() {
        if kept[idx].is_some() || original[idx].trim().is_empty() {
            continue;
        }
        let header = (0..idx)
            .rev()
            .find(|&p| kept[p].as_deref().is_some_and(|l| !l.trim().is_empty()));
        let Some(header) = header else {
            continue;
        };
        let header_line = kept[header].as_deref().unwrap_or_default();
        let header_indent = indent_of(header_line);
        let line_indent = indent_of(original[idx]);
        if !header_line.trim_end().ends_with(':') || line_indent <= header_indent {
            continue;
        }
        let has_body = kept[idx + 1..]
            .iter()
            .flatten()
            .find(|l| !l.trim().is_empty())
            .is_some_and(|l| indent_of(l) > header_indent);
        if !has_body {
            kept[idx] = Some(format!("{}pass", &original[idx][..line_indent]));
        }
    }
}

/// Strip marker and print lines from one file. `None` when nothing changed.
fn clean_lines(
    file: &GeneratedFile,
    kind: SourceKind,
    categories: &[ErrorCategory],
) -> Option<String> {
    let scanned = scan(&file.content, kind);
    let original: Vec<&str> = file.content.split('\n').collect();
    let mut kept: Vec<Option<String>> = Vec::with_capacity(original.len());
    let mut changed = false;

    for (idx, raw) in original.iter().enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let marker = [ErrorCategory::PlaceholderCode, ErrorCategory::TodoMarker]
            .into_iter()
            .filter(|c| categories.contains(c))
            .filter_map(|c| marker_offset(line, &scanned, idx, kind, c))
            .min();

        if let Some(at) = marker {
            let inline_comment = scanned
                .comment_starts
                .get(idx)
                .copied()
                .flatten()
                .filter(|&c| c <= at && !line[..c].trim().is_empty());
            changed = true;
            match inline_comment {
                Some(c) => kept.push(Some(line[..c].trim_end().to_string())),
                None => kept.push(None),
            }
            continue;
        }

        if categories.contains(&ErrorCategory::PrintStatement) {
            let masked = scanned.masked.get(idx).map_or(line, String::as_str);
            if is_lone_print(masked, kind) {
                changed = true;
                kept.push(None);
                continue;
            }
        }

        kept.push(Some(raw.to_string()));
    }

    if !changed {
        return None;
    }
    if kind == SourceKind::Python {
        keep_python_blocks(&original, &mut kept);
    }
    Some(kept.into_iter().flatten().collect::<Vec<_>>().join("\n"))
}

pub struct Cleaner;

impl Fixer for Cleaner {
    fn strategy(&self) -> FixStrategy {
        FixStrategy::Cleanup
    }

    fn apply(
        &self,
        files: &[GeneratedFile],
        errors: &[&ValidationError],
        _language: TargetLanguage,
    ) -> Result<FixResult> {
        let mut applied = Vec::new();

        let duplicated = paths_with(errors, &[ErrorCategory::DuplicateFile]);
        let mut seen = BTreeSet::new();
        let mut next: Vec<GeneratedFile> = Vec::with_capacity(files.len());
        for file in files {
            if duplicated.contains(file.path.as_str()) && !seen.insert(file.path.as_str()) {
                applied.push(format!("removed duplicate {}", file.path));
                continue;
            }
            next.push(file.clone());
        }

        let empty = paths_with(errors, &[ErrorCategory::EmptyFile]);
        let placeholders = paths_with(errors, &[ErrorCategory::PlaceholderFile]);
        next.retain(|file| {
            let path = file.path.as_str();
            if empty.contains(path) && file.content.trim().is_empty() {
                applied.push(format!("removed empty file {path}"));
                return false;
            }
            if placeholders.contains(path) {
                applied.push(format!("removed placeholder file {path}"));
                return false;
            }
            true
        });

        let line_categories = [
            ErrorCategory::PlaceholderCode,
            ErrorCategory::TodoMarker,
            ErrorCategory::PrintStatement,
        ];
        for file in next.iter_mut() {
            let categories: Vec<ErrorCategory> = line_categories
                .into_iter()
                .filter(|c| errors.iter().any(|e| e.file == file.path && e.category == *c))
                .collect();
            if categories.is_empty() {
                continue;
            }
            let Some(kind) = SourceKind::from_path(&file.path) else {
                continue;
            };
            if let Some(content) = clean_lines(file, kind, &categories) {
                applied.push(format!("stripped markers and debug output from {}", file.path));
                *file = file.with_content(content);
            }
        }

        Ok(FixResult::new(next, applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(files: Vec<GeneratedFile>, errors: Vec<ValidationError>) -> FixResult {
        let refs: Vec<&ValidationError> = errors.iter().collect();
        Cleaner
            .apply(&files, &refs, TargetLanguage::TypeScript)
            .expect("clean")
    }

    fn err(category: ErrorCategory, path: &str) -> ValidationError {
        ValidationError::new(category, path, "m")
    }

    #[test]
    fn test_first_duplicate_wins() {
        let result = clean(
            vec![
                GeneratedFile::new("index.ts", "first"),
                GeneratedFile::new("index.ts", "second"),
                GeneratedFile::new("other.ts", "x"),
            ],
            vec![err(ErrorCategory::DuplicateFile, "index.ts")],
        );
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.files[0].content, "first");
    }

    #[test]
    fn test_placeholder_and_todo_lines() {
        let src = "export function f() {\n  // ...existing code...\n  return 1; // TODO: implement caching\n}\n";
        let result = clean(
            vec![GeneratedFile::new("src/f.ts", src)],
            vec![
                err(ErrorCategory::PlaceholderCode, "src/f.ts"),
                err(ErrorCategory::TodoMarker, "src/f.ts"),
            ],
        );
        assert_eq!(result.files[0].content, "export function f() {\n  return 1;\n}\n");
    }

    #[test]
    fn test_placeholder_text_in_string_is_kept() {
        let src = "export const hint = \"...existing code...\";\n// ...existing code...\nexport const b = 2;\n";
        let result = clean(
            vec![GeneratedFile::new("src/hint.ts", src)],
            vec![ValidationError::new(ErrorCategory::PlaceholderCode, "src/hint.ts", "m")],
        );
        assert!(result.fixed);
        assert_eq!(
            result.files[0].content,
            "export const hint = \"...existing code...\";\nexport const b = 2;\n"
        );
    }

    #[test]
    fn test_prints_removed_and_python_blocks_kept() {
        let py = "def handler(event):\n    print(event)\n\nx = 1\nprint('done')\n";
        let result = clean(
            vec![GeneratedFile::new("app.py", py)],
            vec![err(ErrorCategory::PrintStatement, "app.py")],
        );
        assert_eq!(result.files[0].content, "def handler(event):\n    pass\n\nx = 1\n");
    }

    #[test]
    fn test_print_inside_expression_is_kept() {
        let js = "fetch(url).then((r) => console.log(r));\n";
        let result = clean(
            vec![GeneratedFile::new("src/a.js", js)],
            vec![err(ErrorCategory::PrintStatement, "src/a.js")],
        );
        assert!(!result.fixed);
        assert_eq!(result.files[0].content, js);
    }

    #[test]
    fn test_empty_and_placeholder_files_removed() {
        let result = clean(
            vec![
                GeneratedFile::new("src/empty.ts", "\n"),
                GeneratedFile::new("placeholder.txt", "x"),
                GeneratedFile::new("src/keep.ts", "export {};\n"),
            ],
            vec![
                err(ErrorCategory::EmptyFile, "src/empty.ts"),
                err(ErrorCategory::PlaceholderFile, "placeholder.txt"),
            ],
        );
        let paths: Vec<_> = result.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/keep.ts"]);
        assert_eq!(result.applied_fixes.len(), 2);
    }
}
