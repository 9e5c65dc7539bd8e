//! Anti-pattern tables shared by the pattern layer and the fixers that
//! undo what it reports.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ErrorCategory, GeneratedFile};
use crate::language::SourceKind;

/// Which view of a line a rule runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineView {
    /// The line as written, comments and strings included.
    Raw,
    /// The masked line, with strings and comments blanked.
    Code,
}

/// One anti-pattern: a regex plus the error it becomes.
#[derive(Debug)]
pub struct PatternRule {
    pub category: ErrorCategory,
    pub regex: Regex,
    pub view: LineView,
    pub message: &'static str,
    pub hint: &'static str,
    pub fixable: bool,
}

impl PatternRule {
    fn new(
        category: ErrorCategory,
        pattern: &str,
        view: LineView,
        message: &'static str,
        hint: &'static str,
    ) -> Self {
        Self {
            category,
            regex: Regex::new(pattern).expect("valid regex"),
            view,
            message,
            hint,
            fixable: category.strategy().is_some(),
        }
    }

    fn report_only(mut self) -> Self {
        self.fixable = false;
        self
    }
}

static COMMON_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        PatternRule::new(
            ErrorCategory::PlaceholderCode,
            r"(?i)\.\.\.\s*(?:existing|rest of(?: the)?|previous|remaining|other|unchanged)\s+(?:code|implementation|content|methods|functions|logic)",
            LineView::Raw,
            "unresolved \"existing code\" placeholder",
            "replace the placeholder with the real code or delete it",
        ),
        PatternRule::new(
            ErrorCategory::PlaceholderCode,
            r"(?i)\b(?:insert|add|put)\s+(?:your\s+)?(?:code|implementation|logic)\s+here\b",
            LineView::Raw,
            "placeholder asking for code to be inserted",
            "write the missing code",
        ),
        PatternRule::new(
            ErrorCategory::TodoMarker,
            r"(?i)\b(?:TODO|FIXME)\b[:\s-]*(?:implement|add|complete|finish|write|fill)\b",
            LineView::Raw,
            "unimplemented TODO marker",
            "implement the missing piece and remove the marker",
        ),
    ]
});

static TS_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        PatternRule::new(
            ErrorCategory::LooseTyping,
            r":\s*any\b",
            LineView::Code,
            "`any` annotation disables type checking",
            "use a concrete type or `unknown`",
        ),
        PatternRule::new(
            ErrorCategory::LooseTyping,
            r"\bas\s+any\b",
            LineView::Code,
            "`as any` cast disables type checking",
            "narrow the value instead of casting",
        ),
    ]
});

static WEB_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![PatternRule::new(
        ErrorCategory::PrintStatement,
        r"\bconsole\.(?:log|debug)\s*\(",
        LineView::Code,
        "debug logging left in source",
        "remove the console call or use a logger",
    )]
});

static PYTHON_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![PatternRule::new(
        ErrorCategory::PrintStatement,
        r"^\s*print\s*\(",
        LineView::Code,
        "debug print left in source",
        "remove the print or use the logging module",
    )]
});

static RUST_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        PatternRule::new(
            ErrorCategory::PrintStatement,
            r"\b(?:println|eprintln|dbg)!\s*\(",
            LineView::Code,
            "debug print left in source",
            "remove the print or use `tracing`",
        ),
        PatternRule::new(
            ErrorCategory::TodoMarker,
            r"\b(?:todo|unimplemented)!\s*\(",
            LineView::Code,
            "unimplemented macro left in source",
            "implement the function body",
        )
        .report_only(),
    ]
});

/// Every rule that applies to `kind`, language-agnostic rules first.
pub fn rules_for(kind: SourceKind) -> impl Iterator<Item = &'static PatternRule> {
    let specific: &'static [PatternRule] = match kind {
        SourceKind::TypeScript | SourceKind::Tsx => &TS_RULES,
        SourceKind::Python => &PYTHON_RULES,
        SourceKind::Rust => &RUST_RULES,
        SourceKind::JavaScript | SourceKind::Jsx => &[],
    };
    let web: &'static [PatternRule] = if kind.is_web() { &WEB_RULES } else { &[] };
    COMMON_RULES.iter().chain(specific.iter()).chain(web.iter())
}

/// Rules of one category for `kind`.
pub fn rules_of(
    kind: SourceKind,
    category: ErrorCategory,
) -> impl Iterator<Item = &'static PatternRule> {
    rules_for(kind).filter(move |rule| rule.category == category)
}

static CJS_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:module\.exports\b|exports\.\w+\s*=)|\brequire\s*\(\s*['\x22]")
        .expect("valid regex")
});

static ESM_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:import\s+(?:[\w*{}\s,$]+\s+from\s+)?['\x22]|import\s+type\s|export\s+(?:default\b|const\b|let\b|var\b|function\b|async\b|class\b|type\b|interface\b|enum\b|\{|\*))")
        .expect("valid regex")
});

/// Module conventions a JS/TS file uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleMarkers {
    pub commonjs: bool,
    pub esm: bool,
}

impl ModuleMarkers {
    pub fn of(content: &str) -> Self {
        Self {
            commonjs: CJS_MARKER.is_match(content),
            esm: ESM_MARKER.is_match(content),
        }
    }

    pub fn is_mixed(self) -> bool {
        self.commonjs && self.esm
    }
}

/// A hard-coded port and the rewrite that reads it from the environment.
#[derive(Debug)]
pub struct PortRule {
    pub regex: Regex,
    pub view: LineView,
    pub replacement: &'static str,
}

impl PortRule {
    fn new(pattern: &str, view: LineView, replacement: &'static str) -> Self {
        Self {
            regex: Regex::new(pattern).expect("valid regex"),
            view,
            replacement,
        }
    }
}

static JS_PORT_RULES: Lazy<Vec<PortRule>> = Lazy::new(|| {
    vec![
        PortRule::new(
            r"(\.listen\(\s*)(\d{2,5})\b",
            LineView::Code,
            "${1}process.env.PORT || ${2}",
        ),
        PortRule::new(
            r"(\b(?:const|let|var)\s+PORT\s*=\s*)(\d{2,5})\b",
            LineView::Code,
            "${1}process.env.PORT || ${2}",
        ),
    ]
});

static PY_PORT_RULES: Lazy<Vec<PortRule>> = Lazy::new(|| {
    vec![PortRule::new(
        r"(?i)(\bport\s*=\s*)(\d{2,5})\b",
        LineView::Code,
        "${1}int(os.environ.get(\"PORT\", ${2}))",
    )]
});

static RUST_PORT_RULES: Lazy<Vec<PortRule>> = Lazy::new(|| {
    vec![PortRule::new(
        r#"((?:\.|::)bind\(\s*)"([\w.\[\]:]*):(\d{2,5})""#,
        LineView::Raw,
        "${1}format!(\"${2}:{}\", std::env::var(\"PORT\").unwrap_or_else(|_| \"${3}\".to_string()))",
    )]
});

/// Port rules for `kind`.
pub fn port_rules(kind: SourceKind) -> &'static [PortRule] {
    match kind {
        SourceKind::Python => &PY_PORT_RULES,
        SourceKind::Rust => &RUST_PORT_RULES,
        _ => &JS_PORT_RULES,
    }
}

const SERVER_ENTRY_STEMS: &[&str] = &["server", "index", "app", "main"];

/// Files whose hard-coded ports matter: `server`, `index`, `app`, `main`.
pub fn is_server_entry(file: &GeneratedFile) -> bool {
    let stem = file.stem().to_ascii_lowercase();
    SERVER_ENTRY_STEMS.contains(&stem.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(kind: SourceKind, line: &str) -> Vec<ErrorCategory> {
        rules_for(kind)
            .filter(|rule| rule.regex.is_match(line))
            .map(|rule| rule.category)
            .collect()
    }

    #[test]
    fn test_placeholder_and_todo_rules() {
        assert_eq!(
            categories(SourceKind::TypeScript, "// ...existing code..."),
            vec![ErrorCategory::PlaceholderCode]
        );
        assert_eq!(
            categories(SourceKind::Python, "# ... rest of the implementation"),
            vec![ErrorCategory::PlaceholderCode]
        );
        assert_eq!(
            categories(SourceKind::Python, "# TODO: implement retry"),
            vec![ErrorCategory::TodoMarker]
        );
        assert!(categories(SourceKind::Python, "# TODO maybe later").is_empty());
    }

    #[test]
    fn test_language_specific_rules() {
        assert_eq!(
            categories(SourceKind::TypeScript, "let x: any = 1;"),
            vec![ErrorCategory::LooseTyping]
        );
        assert!(categories(SourceKind::JavaScript, "let x: any = 1;").is_empty());
        assert_eq!(
            categories(SourceKind::Jsx, "console.log(x);"),
            vec![ErrorCategory::PrintStatement]
        );
        assert_eq!(
            categories(SourceKind::Python, "    print(x)"),
            vec![ErrorCategory::PrintStatement]
        );
        assert!(categories(SourceKind::Python, "pprint(x)").is_empty());
        assert_eq!(
            categories(SourceKind::Rust, "    dbg!(x);"),
            vec![ErrorCategory::PrintStatement]
        );
    }

    #[test]
    fn test_rust_todo_macro_is_report_only() {
        let rule = rules_of(SourceKind::Rust, ErrorCategory::TodoMarker)
            .find(|rule| rule.regex.is_match("todo!()"))
            .expect("rule");
        assert!(!rule.fixable);
    }

    #[test]
    fn test_module_markers() {
        let mixed = ModuleMarkers::of("import fs from 'fs';\nmodule.exports = { a };\n");
        assert!(mixed.is_mixed());
        let cjs = ModuleMarkers::of("const fs = require('fs');\nexports.a = 1;\n");
        assert!(cjs.commonjs && !cjs.esm);
        let esm = ModuleMarkers::of("export default function App() {}\n");
        assert!(esm.esm && !esm.commonjs);
    }

    #[test]
    fn test_port_rewrites() {
        let rule = &port_rules(SourceKind::JavaScript)[0];
        assert_eq!(
            rule.regex.replace_all("app.listen(3000, () => {});", rule.replacement),
            "app.listen(process.env.PORT || 3000, () => {});"
        );
        let rule = &port_rules(SourceKind::Python)[0];
        assert_eq!(
            rule.regex.replace_all("app.run(host=h, port=5000)", rule.replacement),
            "app.run(host=h, port=int(os.environ.get(\"PORT\", 5000)))"
        );
        let rule = &port_rules(SourceKind::Rust)[0];
        let rewritten = rule
            .regex
            .replace_all("TcpListener::bind(\"0.0.0.0:8080\")", rule.replacement)
            .into_owned();
        assert!(rewritten.contains("std::env::var(\"PORT\")"));
        assert!(!rule.regex.is_match(&rewritten));
    }

    #[test]
    fn test_server_entry_stems() {
        assert!(is_server_entry(&GeneratedFile::new("src/server.ts", "")));
        assert!(is_server_entry(&GeneratedFile::new("main.py", "")));
        assert!(!is_server_entry(&GeneratedFile::new("src/routes.ts", "")));
    }
}
