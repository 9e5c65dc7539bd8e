//! Attribute checks for JSX/TSX markup.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::scan::Scan;

static HTML_ONLY_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\s)(class|for)=(["'{])"#).expect("valid regex"));

static UNQUOTED_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\s)([A-Za-z_:][\w:.-]*)=([A-Za-z0-9_#.%-]+)").expect("valid regex")
});

/// An unquoted value must end at whitespace, `/`, `>` or end of line.
fn value_ends(line: &str, end: usize) -> bool {
    line[end..]
        .chars()
        .next()
        .map_or(true, |c| c.is_whitespace() || c == '/' || c == '>')
}

/// What is wrong with an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeIssue {
    /// HTML attribute name that JSX spells differently.
    HtmlName { found: String, expected: String },
    /// Attribute value without quotes or braces.
    Unquoted { name: String, value: String },
}

/// A malformed attribute on a given line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDefect {
    pub line: u32,
    pub issue: AttributeIssue,
}

impl AttributeDefect {
    pub fn describe(&self) -> String {
        match &self.issue {
            AttributeIssue::HtmlName { found, expected } => {
                format!("JSX uses `{expected}=` instead of `{found}=`")
            }
            AttributeIssue::Unquoted { name, value } => {
                format!("attribute `{name}={value}` needs quotes")
            }
        }
    }
}

fn jsx_name(html: &str) -> &'static str {
    match html {
        "for" => "htmlFor",
        _ => "className",
    }
}

/// True when the byte offset `at` of `raw` is code (not string/comment) and
/// follows an opening `<` on the same line.
fn in_tag(raw: &str, masked: &str, at: usize) -> bool {
    if !raw[..at].contains('<') {
        return false;
    }
    let char_idx = raw[..at].chars().count();
    masked.chars().nth(char_idx).is_some_and(|c| c != ' ')
}

/// Find malformed attributes in a markup file.
pub fn attribute_defects(source: &str, scan: &Scan) -> Vec<AttributeDefect> {
    let mut defects = Vec::new();
    for (idx, (raw, masked)) in source.split('\n').zip(scan.masked.iter()).enumerate() {
        let line = idx as u32 + 1;
        for caps in HTML_ONLY_ATTR.captures_iter(raw) {
            let name = &caps[2];
            if let Some(m) = caps.get(2) {
                if in_tag(raw, masked, m.start()) {
                    defects.push(AttributeDefect {
                        line,
                        issue: AttributeIssue::HtmlName {
                            found: name.to_string(),
                            expected: jsx_name(name).to_string(),
                        },
                    });
                }
            }
        }
        for caps in UNQUOTED_ATTR.captures_iter(raw) {
            if let (Some(m), Some(whole)) = (caps.get(2), caps.get(0)) {
                if in_tag(raw, masked, m.start()) && value_ends(raw, whole.end()) {
                    defects.push(AttributeDefect {
                        line,
                        issue: AttributeIssue::Unquoted {
                            name: caps[2].to_string(),
                            value: caps[3].to_string(),
                        },
                    });
                }
            }
        }
    }
    defects
}

/// Rewrite every malformed attribute on one line.
pub fn repair_attributes(raw: &str, masked: &str) -> String {
    let renamed = HTML_ONLY_ATTR.replace_all(raw, |caps: &Captures<'_>| match caps.get(2) {
        Some(m) if in_tag(raw, masked, m.start()) => {
            format!("{}{}={}", &caps[1], jsx_name(&caps[2]), &caps[3])
        }
        _ => caps[0].to_string(),
    });
    // Renaming shifts offsets, so the second pass only re-checks the `<`
    // prefix instead of the string mask.
    let renamed = renamed.into_owned();
    UNQUOTED_ATTR
        .replace_all(&renamed, |caps: &Captures<'_>| match (caps.get(2), caps.get(0)) {
            (Some(m), Some(whole))
                if renamed[..m.start()].contains('<') && value_ends(&renamed, whole.end()) =>
            {
                format!("{}{}=\"{}\"", &caps[1], &caps[2], &caps[3])
            }
            _ => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::SourceKind;
    use crate::syntax::scan::scan;

    #[test]
    fn test_detects_html_attribute_names() {
        let src = "const A = () => <label class=\"x\" for=\"y\">hi</label>;";
        let defects = attribute_defects(src, &scan(src, SourceKind::Jsx));
        assert_eq!(defects.len(), 2);
        assert!(defects[0].describe().contains("className"));
        assert!(defects[1].describe().contains("htmlFor"));
    }

    #[test]
    fn test_detects_unquoted_values() {
        let src = "return <input type=text id=name-field />;";
        let defects = attribute_defects(src, &scan(src, SourceKind::Tsx));
        assert_eq!(defects.len(), 2);
        assert!(matches!(
            &defects[0].issue,
            AttributeIssue::Unquoted { name, value } if name == "type" && value == "text"
        ));
    }

    #[test]
    fn test_ignores_code_and_strings() {
        let src = "const s = \"<a class=x>\";\nlet a = b;\nconst ok = <div className=\"a\" />;";
        assert!(attribute_defects(src, &scan(src, SourceKind::Jsx)).is_empty());
    }

    #[test]
    fn test_repair_line() {
        let raw = "  <label class=\"x\" for={id} width=100>";
        let s = scan(raw, SourceKind::Jsx);
        assert_eq!(
            repair_attributes(raw, &s.masked[0]),
            "  <label className=\"x\" htmlFor={id} width=\"100\">"
        );
    }
}
