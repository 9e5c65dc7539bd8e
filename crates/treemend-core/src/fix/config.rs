//! Configuration fixer: companion files, tsconfig options and hard-coded
//! ports.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::file::{find_by_name, has_file_named};
use crate::domain::{
    ErrorCategory, FixResult, FixStrategy, GeneratedFile, Result, TreemendError, ValidationError,
};
use crate::language::{SourceKind, TargetLanguage};
use crate::manifest::parse_jsonc;
use crate::patterns::{port_rules, LineView};
use crate::syntax::scan;
use crate::validate::structure::{package_is_esm, DEPRECATED_TS_OPTIONS};

use super::dependency::new_manifest;
use super::{paths_with, Fixer};

static IMPORTS_OS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^import\s+(?:[\w.]+\s*,\s*)*os\s*(?:,|$)").expect("valid regex"));

const TAILWIND_CONTENT: &str = r#"  content: ["./index.html", "./src/**/*.{js,jsx,ts,tsx}"],
  theme: {
    extend: {},
  },
  plugins: [],
"#;

fn tsconfig_defaults(jsx: bool) -> String {
    let mut options = Map::new();
    options.insert("target".into(), Value::from("ES2020"));
    options.insert("lib".into(), Value::from(vec!["ES2020", "DOM", "DOM.Iterable"]));
    options.insert("module".into(), Value::from("ESNext"));
    options.insert("moduleResolution".into(), Value::from("bundler"));
    options.insert("strict".into(), Value::Bool(true));
    options.insert("esModuleInterop".into(), Value::Bool(true));
    options.insert("skipLibCheck".into(), Value::Bool(true));
    options.insert("resolveJsonModule".into(), Value::Bool(true));
    options.insert("isolatedModules".into(), Value::Bool(true));
    options.insert("noEmit".into(), Value::Bool(true));
    if jsx {
        options.insert("jsx".into(), Value::from("react-jsx"));
    }
    let mut root = Map::new();
    root.insert("compilerOptions".into(), Value::Object(options));
    render_json(&Value::Object(root))
}

fn render_json(value: &Value) -> String {
    let mut out = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    out.push('\n');
    out
}

fn tailwind_config(esm: bool) -> String {
    let head = "/** @type {import('tailwindcss').Config} */\n";
    if esm {
        format!("{head}export default {{\n{TAILWIND_CONTENT}}};\n")
    } else {
        format!("{head}module.exports = {{\n{TAILWIND_CONTENT}}};\n")
    }
}

fn has_tsx(files: &[GeneratedFile]) -> bool {
    files.iter().any(|f| f.extension().as_deref() == Some("tsx"))
}

/// Create each missing companion named by a `missing_config` target.
fn create_companions(
    files: &mut Vec<GeneratedFile>,
    errors: &[&ValidationError],
    applied: &mut Vec<String>,
) {
    let mut wanted: Vec<&str> = errors
        .iter()
        .filter(|e| e.category == ErrorCategory::MissingConfig)
        .filter_map(|e| e.target.as_deref())
        .collect();
    // package.json decides the module convention of the others.
    wanted.sort_by_key(|name| *name != "package.json");

    for name in wanted {
        if has_file_named(files, name) {
            continue;
        }
        let created = match name {
            "package.json" => new_manifest(TargetLanguage::JavaScript, files),
            "tsconfig.json" => GeneratedFile::new(name, tsconfig_defaults(has_tsx(files))),
            "tailwind.config.js" => {
                GeneratedFile::new(name, tailwind_config(package_is_esm(files)))
            }
            _ => continue,
        };
        applied.push(format!("created {}", created.path));
        files.push(created);
    }
}

/// Apply jsx / moduleResolution / deprecated-option edits to tsconfig.json.
fn update_tsconfig(
    files: &mut [GeneratedFile],
    errors: &[&ValidationError],
    applied: &mut Vec<String>,
) -> Result<()> {
    let categories = [
        ErrorCategory::MissingJsxFlag,
        ErrorCategory::ModuleResolution,
        ErrorCategory::DeprecatedConfig,
    ];
    if !errors.iter().any(|e| categories.contains(&e.category)) {
        return Ok(());
    }
    let Some(path) = find_by_name(files, "tsconfig.json").map(|f| f.path.clone()) else {
        return Ok(());
    };
    let Some(file) = files.iter_mut().find(|f| f.path == path) else {
        return Ok(());
    };

    let mut root = parse_jsonc(&file.path, &file.content)?;
    let Some(object) = root.as_object_mut() else {
        return Err(TreemendError::config(&file.path, "top level is not an object"));
    };
    let options = object
        .entry("compilerOptions")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(options) = options.as_object_mut() else {
        return Err(TreemendError::config(&file.path, "compilerOptions is not an object"));
    };

    let mut changes = Vec::new();
    for error in errors {
        match error.category {
            ErrorCategory::MissingJsxFlag if !options.contains_key("jsx") => {
                options.insert("jsx".into(), Value::from("react-jsx"));
                changes.push("set compilerOptions.jsx to react-jsx".to_string());
            }
            ErrorCategory::ModuleResolution => {
                let current = options.get("moduleResolution").and_then(Value::as_str);
                if current.is_some_and(|r| !r.eq_ignore_ascii_case("bundler")) {
                    options.insert("moduleResolution".into(), Value::from("bundler"));
                    changes.push("set compilerOptions.moduleResolution to bundler".to_string());
                    let commonjs = options
                        .get("module")
                        .and_then(Value::as_str)
                        .map_or(true, |m| m.eq_ignore_ascii_case("commonjs"));
                    if commonjs {
                        options.insert("module".into(), Value::from("ESNext"));
                        changes.push("set compilerOptions.module to ESNext".to_string());
                    }
                }
            }
            ErrorCategory::DeprecatedConfig => {
                let key = error.target.as_deref().unwrap_or_default();
                if DEPRECATED_TS_OPTIONS.contains(&key) && options.remove(key).is_some() {
                    changes.push(format!("removed deprecated compilerOptions.{key}"));
                }
            }
            _ => {}
        }
    }

    if !changes.is_empty() {
        *file = file.with_content(render_json(&root));
        applied.extend(changes.into_iter().map(|c| format!("{c} in {path}")));
    }
    Ok(())
}

/// Index at which `import os` can go: after a shebang, encoding line or
/// `from __future__` imports.
fn python_import_slot(lines: &[&str]) -> usize {
    if let Some(last_future) = lines
        .iter()
        .rposition(|l| l.trim_start().starts_with("from __future__"))
    {
        return last_future + 1;
    }
    lines
        .iter()
        .take_while(|l| l.starts_with("#!") || l.starts_with("# -*-") || l.starts_with("# coding"))
        .count()
}

fn ensure_import_os(content: &str) -> String {
    if IMPORTS_OS.is_match(content) {
        return content.to_string();
    }
    let mut lines: Vec<&str> = content.split('\n').collect();
    let slot = python_import_slot(&lines);
    lines.insert(slot, "import os");
    lines.join("\n")
}

/// Rewrite every hard-coded port in one file. `None` when nothing changed.
fn rewrite_ports(file: &GeneratedFile) -> Option<String> {
    let kind = SourceKind::from_path(&file.path)?;
    let scanned = scan(&file.content, kind);
    let mut changed = false;

    let lines: Vec<String> = file
        .content
        .split('\n')
        .enumerate()
        .map(|(idx, raw)| {
            let masked = scanned.masked.get(idx).map_or(raw, String::as_str);
            let mut line = raw.to_string();
            for rule in port_rules(kind) {
                let view = match rule.view {
                    LineView::Raw => line.as_str(),
                    LineView::Code => masked,
                };
                if rule.regex.is_match(view) {
                    let replaced = rule.regex.replace_all(&line, rule.replacement).into_owned();
                    if replaced != line {
                        line = replaced;
                        changed = true;
                    }
                }
            }
            line
        })
        .collect();

    if !changed {
        return None;
    }
    let content = lines.join("\n");
    Some(match kind {
        SourceKind::Python => ensure_import_os(&content),
        _ => content,
    })
}

pub struct ConfigFixer;

impl Fixer for ConfigFixer {
    fn strategy(&self) -> FixStrategy {
        FixStrategy::Configuration
    }

    fn apply(
        &self,
        files: &[GeneratedFile],
        errors: &[&ValidationError],
        _language: TargetLanguage,
    ) -> Result<FixResult> {
        let mut next = files.to_vec();
        let mut applied = Vec::new();

        create_companions(&mut next, errors, &mut applied);
        update_tsconfig(&mut next, errors, &mut applied)?;

        let with_ports = paths_with(errors, &[ErrorCategory::PortConfig]);
        for file in next.iter_mut().filter(|f| with_ports.contains(f.path.as_str())) {
            if let Some(content) = rewrite_ports(file) {
                applied.push(format!("read port from the environment in {}", file.path));
                *file = file.with_content(content);
            }
        }

        Ok(FixResult::new(next, applied))
    }
}
