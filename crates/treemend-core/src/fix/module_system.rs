//! Module-system converter: one convention per file, and config files whose
//! extension matches how they are loaded.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ErrorCategory, FixResult, FixStrategy, GeneratedFile, Result, ValidationError};
use crate::language::{SourceKind, TargetLanguage};
use crate::syntax::scan;
use crate::validate::structure::package_is_esm;

use super::{paths_with, Fixer};

const SPECIFIER: &str = r#"(['"][^'"]+['"])"#;

fn line_regex(pattern: &str) -> Regex {
    Regex::new(&pattern.replace("{SOURCE}", SPECIFIER)).expect("valid regex")
}

static REQUIRE_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    line_regex(r"^(\s*)(?:const|let|var)\s+([\w$]+)\s*=\s*require\(\s*{SOURCE}\s*\)\s*;?\s*$")
});
static REQUIRE_DESTRUCTURE: Lazy<Regex> = Lazy::new(|| {
    line_regex(r"^(\s*)(?:const|let|var)\s+\{([^}]*)\}\s*=\s*require\(\s*{SOURCE}\s*\)\s*;?\s*$")
});
static REQUIRE_BARE: Lazy<Regex> =
    Lazy::new(|| line_regex(r"^(\s*)require\(\s*{SOURCE}\s*\)\s*;?\s*$"));
static MODULE_EXPORTS: Lazy<Regex> =
    Lazy::new(|| line_regex(r"^(\s*)module\.exports\s*=\s*(.*?)(;?)\s*$"));
static NAMED_EXPORT: Lazy<Regex> =
    Lazy::new(|| line_regex(r"^(\s*)(?:module\.)?exports\.([\w$]+)\s*=\s*(.*?)(;?)\s*$"));

static IMPORT_DEFAULT: Lazy<Regex> =
    Lazy::new(|| line_regex(r"^(\s*)import\s+([\w$]+)\s+from\s+{SOURCE}\s*;?\s*$"));
static IMPORT_NAMED: Lazy<Regex> =
    Lazy::new(|| line_regex(r"^(\s*)import\s+\{([^}]*)\}\s+from\s+{SOURCE}\s*;?\s*$"));
static IMPORT_NAMESPACE: Lazy<Regex> =
    Lazy::new(|| line_regex(r"^(\s*)import\s+\*\s+as\s+([\w$]+)\s+from\s+{SOURCE}\s*;?\s*$"));
static IMPORT_BARE: Lazy<Regex> = Lazy::new(|| line_regex(r"^(\s*)import\s+{SOURCE}\s*;?\s*$"));
static EXPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| line_regex(r"^(\s*)export\s+default\s+(.*)$"));
static EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    line_regex(r"^(\s*)export\s+((?:async\s+)?function\*?\s+([\w$]+)|class\s+([\w$]+)|(?:const|let|var)\s+([\w$]+))")
});
static EXPORT_LIST: Lazy<Regex> =
    Lazy::new(|| line_regex(r"^(\s*)export\s+\{([^}]*)\}\s*;?\s*$"));

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w$]+$").expect("valid regex"));

/// Module convention a file should follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleConvention {
    Esm,
    CommonJs,
}

/// TypeScript, JSX and `.mjs` are always ES modules; `.cjs` is always
/// CommonJS; plain `.js` follows package.json `"type"`.
pub fn convention_for(file: &GeneratedFile, esm_package: bool) -> ModuleConvention {
    match file.extension().as_deref() {
        Some("mjs" | "ts" | "tsx" | "mts" | "jsx") => ModuleConvention::Esm,
        Some("cjs" | "cts") => ModuleConvention::CommonJs,
        _ if esm_package => ModuleConvention::Esm,
        _ => ModuleConvention::CommonJs,
    }
}

fn split_bindings(inner: &str) -> Vec<&str> {
    inner
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect()
}

/// `a: b` destructuring -> `a as b` import bindings.
fn destructure_to_import(inner: &str) -> String {
    split_bindings(inner)
        .into_iter()
        .map(|b| match b.split_once(':') {
            Some((from, to)) => format!("{} as {}", from.trim(), to.trim()),
            None => b.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `a as b` import bindings -> `a: b` destructuring.
fn import_to_destructure(inner: &str) -> String {
    split_bindings(inner)
        .into_iter()
        .map(|b| match b.split_once(" as ") {
            Some((from, to)) => format!("{}: {}", from.trim(), to.trim()),
            None => b.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `a as b` export bindings -> `b: a` object entries.
fn export_list_to_object(inner: &str) -> String {
    split_bindings(inner)
        .into_iter()
        .map(|b| match b.split_once(" as ") {
            Some((local, exported)) => format!("{}: {}", exported.trim(), local.trim()),
            None => b.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_esm_line(line: &str) -> Option<String> {
    if let Some(c) = REQUIRE_DEFAULT.captures(line) {
        return Some(format!("{}import {} from {};", &c[1], &c[2], &c[3]));
    }
    if let Some(c) = REQUIRE_DESTRUCTURE.captures(line) {
        return Some(format!(
            "{}import {{ {} }} from {};",
            &c[1],
            destructure_to_import(&c[2]),
            &c[3]
        ));
    }
    if let Some(c) = REQUIRE_BARE.captures(line) {
        return Some(format!("{}import {};", &c[1], &c[2]));
    }
    if let Some(c) = NAMED_EXPORT.captures(line) {
        let (indent, name, value, semi) = (&c[1], &c[2], &c[3], &c[4]);
        if value == name {
            return Some(format!("{indent}export {{ {name} }};"));
        }
        return Some(format!("{indent}export const {name} = {value}{semi}"));
    }
    if let Some(c) = MODULE_EXPORTS.captures(line) {
        let (indent, value, semi) = (&c[1], c[2].trim(), &c[3]);
        if let Some(inner) = value.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
            let names = split_bindings(inner);
            if !names.is_empty() && names.iter().all(|n| IDENT.is_match(n)) {
                return Some(format!("{indent}export {{ {} }};", names.join(", ")));
            }
        }
        return Some(format!("{indent}export default {value}{semi}"));
    }
    None
}

fn to_commonjs_line(line: &str, exported: &mut Vec<String>) -> Option<String> {
    if let Some(c) = IMPORT_DEFAULT.captures(line) {
        return Some(format!("{}const {} = require({});", &c[1], &c[2], &c[3]));
    }
    if let Some(c) = IMPORT_NAMED.captures(line) {
        return Some(format!(
            "{}const {{ {} }} = require({});",
            &c[1],
            import_to_destructure(&c[2]),
            &c[3]
        ));
    }
    if let Some(c) = IMPORT_NAMESPACE.captures(line) {
        return Some(format!("{}const {} = require({});", &c[1], &c[2], &c[3]));
    }
    if let Some(c) = IMPORT_BARE.captures(line) {
        return Some(format!("{}require({});", &c[1], &c[2]));
    }
    if let Some(c) = EXPORT_DEFAULT.captures(line) {
        return Some(format!("{}module.exports = {}", &c[1], &c[2]));
    }
    if let Some(c) = EXPORT_LIST.captures(line) {
        return Some(format!(
            "{}Object.assign(module.exports, {{ {} }});",
            &c[1],
            export_list_to_object(&c[2])
        ));
    }
    if let Some(c) = EXPORT_DECL.captures(line) {
        let name = c.get(3).or_else(|| c.get(4)).or_else(|| c.get(5))?;
        exported.push(name.as_str().to_string());
        let whole = c.get(0)?;
        return Some(format!("{}{}{}", &c[1], &c[2], &line[whole.end()..]));
    }
    None
}

/// Lines that hold a top-level statement: bracket depth 0 at the line
/// start, and the first token is code rather than string or comment text.
/// `import`/`export` are only legal there, so nothing else is rewritten.
fn top_level_lines(content: &str) -> Vec<bool> {
    let scanned = scan(content, SourceKind::JavaScript);
    let mut depth = 0i32;
    content
        .split('\n')
        .zip(&scanned.masked)
        .map(|(raw, masked)| {
            let starts_in_code = !raw.trim().is_empty()
                && masked.trim_start().chars().next() == raw.trim_start().chars().next();
            let top = depth == 0 && starts_in_code;
            depth += masked
                .chars()
                .map(|c| match c {
                    '(' | '[' | '{' => 1,
                    ')' | ']' | '}' => -1,
                    _ => 0,
                })
                .sum::<i32>();
            top
        })
        .collect()
}

/// Rewrite `content` into `convention`. `None` when nothing matched.
///
/// Only top-level lines are touched; a `require` inside a function body
/// stays as written.
pub fn convert(content: &str, convention: ModuleConvention) -> Option<String> {
    let top_level = top_level_lines(content);
    let mut changed = false;
    let mut exported = Vec::new();
    let mut lines: Vec<String> = content
        .split('\n')
        .enumerate()
        .map(|(idx, line)| {
            if !top_level.get(idx).copied().unwrap_or(false) {
                return line.to_string();
            }
            let rewritten = match convention {
                ModuleConvention::Esm => to_esm_line(line),
                ModuleConvention::CommonJs => to_commonjs_line(line, &mut exported),
            };
            match rewritten {
                Some(new) => {
                    changed = true;
                    new
                }
                None => line.to_string(),
            }
        })
        .collect();

    if !exported.is_empty() {
        let trailing_newline = lines.last().is_some_and(|l| l.is_empty());
        if trailing_newline {
            lines.pop();
        }
        lines.extend(exported.iter().map(|name| format!("module.exports.{name} = {name};")));
        if trailing_newline {
            lines.push(String::new());
        }
    }

    changed.then(|| lines.join("\n"))
}

/// `vite.config.js` + `.cjs` -> `vite.config.cjs`.
fn renamed_path(path: &str, extension: &str) -> Option<String> {
    path.strip_suffix(".js").map(|stem| format!("{stem}{extension}"))
}

pub struct ModuleSystemFixer;

impl Fixer for ModuleSystemFixer {
    fn strategy(&self) -> FixStrategy {
        FixStrategy::ModuleSystem
    }

    fn apply(
        &self,
        files: &[GeneratedFile],
        errors: &[&ValidationError],
        _language: TargetLanguage,
    ) -> Result<FixResult> {
        let esm_package = package_is_esm(files);
        let mixed = paths_with(errors, &[ErrorCategory::ModuleSystem]);
        let mut next = files.to_vec();
        let mut applied = Vec::new();

        for file in next.iter_mut().filter(|f| mixed.contains(f.path.as_str())) {
            let convention = convention_for(file, esm_package);
            if let Some(content) = convert(&file.content, convention) {
                if content != file.content {
                    applied.push(format!(
                        "converted {} to {}",
                        file.path,
                        match convention {
                            ModuleConvention::Esm => "ES modules",
                            ModuleConvention::CommonJs => "CommonJS",
                        }
                    ));
                    *file = file.with_content(content);
                }
            }
        }

        for error in errors
            .iter()
            .filter(|e| e.category == ErrorCategory::ConfigModuleMismatch)
        {
            let Some(extension) = error.target.as_deref() else {
                continue;
            };
            let Some(new_path) = renamed_path(&error.file, extension) else {
                continue;
            };
            if next.iter().any(|f| f.path == new_path) {
                continue;
            }
            if let Some(file) = next.iter_mut().find(|f| f.path == error.file) {
                *file = file.renamed(new_path.clone());
                applied.push(format!("renamed {} to {new_path}", error.file));
            }
        }

        Ok(FixResult::new(next, applied))
    }
}
