//! String- and comment-aware line scanner.
//!
//! Produces a "masked" copy of a source file in which string literal and
//! comment bytes are blanked out, and records every line that ends while a
//! single-line string literal is still open. The bracket and indentation
//! heuristics, the unterminated-string check and the string fixer all share
//! this one tokenizer.

use crate::language::SourceKind;

/// A line that ends inside a single-line string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringDefect {
    /// 1-indexed line number.
    pub line: u32,
    pub quote: char,
}

/// Masked lines plus string defects.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// Source lines with string and comment content replaced by spaces.
    pub masked: Vec<String>,
    pub unterminated: Vec<StringDefect>,
    /// Byte offset of the trailing line comment on each line, if any.
    pub comment_starts: Vec<Option<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Str(char),
    Template,
    Triple(char),
    BlockComment,
}

const PY_STRING_PREFIXES: &[&str] = &["f", "r", "b", "u", "rb", "br", "fr", "rf"];
const RUST_STRING_PREFIXES: &[&str] = &["r", "b", "br", "c"];

/// Scan `source` as `kind`.
pub fn scan(source: &str, kind: SourceKind) -> Scan {
    let mut out = Scan::default();
    let mut mode = Mode::Code;

    for (idx, line) in source.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let chars: Vec<char> = line.chars().collect();
        let mut masked = String::with_capacity(line.len());
        let mut comment_start = None;
        let mut i = 0usize;

        while i < chars.len() {
            let c = chars[i];
            match mode {
                Mode::BlockComment => {
                    if c == '*' && chars.get(i + 1) == Some(&'/') {
                        mode = Mode::Code;
                        masked.push_str("  ");
                        i += 2;
                        continue;
                    }
                    masked.push(' ');
                }
                Mode::Template => {
                    if c == '\\' {
                        masked.push_str(if i + 1 < chars.len() { "  " } else { " " });
                        i += 2;
                        continue;
                    }
                    if c == '`' {
                        mode = Mode::Code;
                    }
                    masked.push(' ');
                }
                Mode::Triple(q) => {
                    if c == '\\' {
                        masked.push_str(if i + 1 < chars.len() { "  " } else { " " });
                        i += 2;
                        continue;
                    }
                    if c == q && chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q) {
                        mode = Mode::Code;
                        masked.push_str("   ");
                        i += 3;
                        continue;
                    }
                    masked.push(' ');
                }
                Mode::Str(q) => {
                    if c == '\\' {
                        masked.push_str(if i + 1 < chars.len() { "  " } else { " " });
                        i += 2;
                        continue;
                    }
                    if c == q {
                        mode = Mode::Code;
                    }
                    masked.push(' ');
                }
                Mode::Code => {
                    if starts_line_comment(&chars, i, kind) {
                        comment_start = line.char_indices().nth(i).map(|(b, _)| b);
                        masked.extend(std::iter::repeat(' ').take(chars.len() - i));
                        break;
                    }
                    if kind != SourceKind::Python && c == '/' && chars.get(i + 1) == Some(&'*') {
                        mode = Mode::BlockComment;
                        masked.push_str("  ");
                        i += 2;
                        continue;
                    }
                    if kind.is_web() && c == '`' {
                        mode = Mode::Template;
                        masked.push(' ');
                        i += 1;
                        continue;
                    }
                    if kind == SourceKind::Python
                        && (c == '"' || c == '\'')
                        && chars.get(i + 1) == Some(&c)
                        && chars.get(i + 2) == Some(&c)
                    {
                        mode = Mode::Triple(c);
                        masked.push_str("   ");
                        i += 3;
                        continue;
                    }
                    if kind == SourceKind::Rust && c == '\'' {
                        if let Some(len) = rust_char_literal_len(&chars, i) {
                            masked.extend(std::iter::repeat(' ').take(len));
                            i += len;
                            continue;
                        }
                        masked.push(c);
                        i += 1;
                        continue;
                    }
                    if (c == '"' || c == '\'') && opens_string(&chars, i, kind) {
                        mode = Mode::Str(c);
                        masked.push(' ');
                        i += 1;
                        continue;
                    }
                    masked.push(c);
                }
            }
            i += 1;
        }

        if let Mode::Str(q) = mode {
            let continued = line.ends_with('\\');
            // Rust string literals may span lines.
            if kind != SourceKind::Rust && !continued {
                out.unterminated.push(StringDefect {
                    line: idx as u32 + 1,
                    quote: q,
                });
                mode = Mode::Code;
            }
        }

        out.masked.push(masked);
        out.comment_starts.push(comment_start);
    }

    out
}

fn starts_line_comment(chars: &[char], i: usize, kind: SourceKind) -> bool {
    match kind {
        SourceKind::Python => chars[i] == '#',
        _ => chars[i] == '/' && chars.get(i + 1) == Some(&'/'),
    }
}

/// Whether the quote at `i` starts a literal rather than sitting inside
/// prose (`Don't` in JSX text) or after an identifier.
fn opens_string(chars: &[char], i: usize, kind: SourceKind) -> bool {
    if i == 0 {
        return true;
    }
    let prev = chars[i - 1];
    if !(prev.is_alphanumeric() || prev == '_') {
        return true;
    }
    let prefixes = match kind {
        SourceKind::Python => PY_STRING_PREFIXES,
        SourceKind::Rust => RUST_STRING_PREFIXES,
        _ => return false,
    };
    let start = chars[..i]
        .iter()
        .rposition(|c| !(c.is_alphanumeric() || *c == '_'))
        .map_or(0, |p| p + 1);
    let word = chars[start..i].iter().collect::<String>().to_ascii_lowercase();
    prefixes.contains(&word.as_str())
}

/// Length of a Rust char literal starting at `i` (`'a'`, `'\n'`, `'\u{1F600}'`).
fn rust_char_literal_len(chars: &[char], i: usize) -> Option<usize> {
    match chars.get(i + 1) {
        Some('\\') => {
            let close = chars[i + 2..].iter().take(10).position(|c| *c == '\'')?;
            Some(close + 3)
        }
        Some(_) if chars.get(i + 2) == Some(&'\'') => Some(3),
        _ => None,
    }
}

/// A bracket that has no partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketDefect {
    pub line: u32,
    pub message: String,
}

/// Check bracket balance over masked lines.
pub fn bracket_defects(scan: &Scan) -> Vec<BracketDefect> {
    let mut stack: Vec<(char, u32)> = Vec::new();
    let mut defects = Vec::new();

    for (idx, line) in scan.masked.iter().enumerate() {
        let line_no = idx as u32 + 1;
        for c in line.chars() {
            match c {
                '(' | '[' | '{' => stack.push((c, line_no)),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        Some((open, open_line)) => {
                            defects.push(BracketDefect {
                                line: line_no,
                                message: format!(
                                    "`{c}` closes `{open}` opened on line {open_line}"
                                ),
                            });
                            return defects;
                        }
                        None => {
                            defects.push(BracketDefect {
                                line: line_no,
                                message: format!("unmatched closing `{c}`"),
                            });
                            return defects;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    if let Some((open, line)) = stack.first() {
        defects.push(BracketDefect {
            line: *line,
            message: format!("`{open}` is never closed ({} unclosed in total)", stack.len()),
        });
    }
    defects
}

/// Python lines whose indentation is not a multiple of four spaces.
///
/// Lines inside open brackets or after a `\` continuation are skipped.
pub fn indentation_defects(source: &str, scan: &Scan) -> Vec<u32> {
    let mut depth: i64 = 0;
    let mut continued = false;
    let mut lines = Vec::new();

    for (idx, (raw, masked)) in source.split('\n').zip(scan.masked.iter()).enumerate() {
        let at_statement_start = depth <= 0 && !continued;
        if at_statement_start && !masked.trim().is_empty() {
            let indent = raw.len() - raw.trim_start_matches(' ').len();
            if indent % 4 != 0 {
                lines.push(idx as u32 + 1);
            }
        }
        for c in masked.chars() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ => {}
            }
        }
        continued = raw.trim_end().ends_with('\\');
    }
    lines
}
