//! Syntax-checker capability used by the syntax layer and the syntax fixer.

use tree_sitter::{Node, Parser, Tree};

use crate::domain::{Result, TreemendError};
use crate::language::SourceKind;

/// Diagnostics kept per file.
const MAX_DIAGNOSTICS_PER_FILE: usize = 25;

/// Upper bound on tokens inserted by one re-print pass.
const MAX_REPRINT_INSERTIONS: usize = 16;

/// What the checker found at a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Text the grammar could not place.
    Unexpected,
    /// A literal token the parser had to assume (e.g. `;` or `}`).
    MissingToken(String),
    /// A named construct the parser had to assume (e.g. an identifier).
    MissingNode(String),
}

/// One `(message, byte offset)` diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxDiagnostic {
    pub message: String,
    pub byte_offset: usize,
    pub kind: DiagnosticKind,
}

/// A language-aware "check only" front end.
pub trait SyntaxChecker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a grammar is available for `kind`.
    fn supports(&self, kind: SourceKind) -> bool;

    /// Parse `source` and return every diagnostic.
    fn check(&self, path: &str, kind: SourceKind, source: &str) -> Result<Vec<SyntaxDiagnostic>>;

    /// Re-print `source` with formatting-level defects (missing literal
    /// tokens) repaired. `Ok(None)` when nothing could be repaired.
    fn reprint(&self, _path: &str, _kind: SourceKind, _source: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Tree-sitter backed checker for TypeScript, TSX, JavaScript/JSX, Python
/// and Rust.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeSitterChecker;

impl TreeSitterChecker {
    pub fn new() -> Self {
        Self
    }

    fn language(kind: SourceKind) -> tree_sitter::Language {
        match kind {
            SourceKind::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceKind::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            SourceKind::JavaScript | SourceKind::Jsx => tree_sitter_javascript::LANGUAGE.into(),
            SourceKind::Python => tree_sitter_python::LANGUAGE.into(),
            SourceKind::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }

    fn parse(&self, path: &str, kind: SourceKind, source: &str) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&Self::language(kind))
            .map_err(|e| TreemendError::Checker {
                path: path.to_string(),
                reason: format!("failed to set language: {e}"),
            })?;
        parser.parse(source, None).ok_or_else(|| TreemendError::Checker {
            path: path.to_string(),
            reason: "parser produced no tree".to_string(),
        })
    }
}

impl SyntaxChecker for TreeSitterChecker {
    fn name(&self) -> &'static str {
        "tree-sitter"
    }

    fn supports(&self, _kind: SourceKind) -> bool {
        true
    }

    fn check(&self, path: &str, kind: SourceKind, source: &str) -> Result<Vec<SyntaxDiagnostic>> {
        let tree = self.parse(path, kind, source)?;
        let mut diagnostics = Vec::new();
        collect_diagnostics(tree.root_node(), source, &mut diagnostics);
        diagnostics.truncate(MAX_DIAGNOSTICS_PER_FILE);
        Ok(diagnostics)
    }

    fn reprint(&self, path: &str, kind: SourceKind, source: &str) -> Result<Option<String>> {
        let mut text = source.to_string();
        let mut changed = false;

        for _ in 0..MAX_REPRINT_INSERTIONS {
            let tree = self.parse(path, kind, &text)?;
            let before = count_missing_tokens(tree.root_node());
            let Some((offset, token)) = first_missing_token(tree.root_node()) else {
                break;
            };

            let mut candidate = text.clone();
            candidate.insert_str(offset, &token);
            let after = count_missing_tokens(self.parse(path, kind, &candidate)?.root_node());
            if after >= before {
                break;
            }
            text = candidate;
            changed = true;
        }

        Ok(changed.then_some(text))
    }
}

fn collect_diagnostics(node: Node<'_>, source: &str, out: &mut Vec<SyntaxDiagnostic>) {
    if out.len() >= MAX_DIAGNOSTICS_PER_FILE {
        return;
    }
    if node.is_missing() {
        let kind = node.kind().to_string();
        let (message, diag_kind) = if node.is_named() {
            (format!("missing {kind}"), DiagnosticKind::MissingNode(kind))
        } else {
            (format!("missing `{kind}`"), DiagnosticKind::MissingToken(kind))
        };
        out.push(SyntaxDiagnostic {
            message,
            byte_offset: node.start_byte(),
            kind: diag_kind,
        });
        return;
    }
    if node.is_error() {
        out.push(SyntaxDiagnostic {
            message: format!("unexpected `{}`", snippet(node, source)),
            byte_offset: node.start_byte(),
            kind: DiagnosticKind::Unexpected,
        });
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_diagnostics(child, source, out);
    }
}

fn snippet(node: Node<'_>, source: &str) -> String {
    let text = node.utf8_text(source.as_bytes()).unwrap_or("");
    let first_line = text.lines().next().unwrap_or("").trim();
    let mut snippet: String = first_line.chars().take(40).collect();
    if first_line.chars().count() > 40 {
        snippet.push_str("...");
    }
    snippet
}

fn count_missing_tokens(node: Node<'_>) -> usize {
    if node.is_missing() {
        return usize::from(!node.is_named());
    }
    if !node.has_error() {
        return 0;
    }
    let mut cursor = node.walk();
    let total = node
        .children(&mut cursor)
        .map(count_missing_tokens)
        .sum();
    total
}

fn first_missing_token(node: Node<'_>) -> Option<(usize, String)> {
    if node.is_missing() && !node.is_named() {
        return Some((node.start_byte(), node.kind().to_string()));
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_missing_token)
}
