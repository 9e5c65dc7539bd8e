//! Manifest and config readers, import extraction and version validity
//! checks.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{GeneratedFile, Result, TreemendError};
use crate::language::{Ecosystem, SourceKind};
use crate::registry::normalize_package_name;

/// package.json sections that declare dependencies.
pub const NPM_SECTIONS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

const CARGO_SECTIONS: &[&str] = &["dependencies", "dev-dependencies", "build-dependencies"];

/// A dependency declaration and the version text it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared {
    pub name: String,
    pub version: Option<String>,
    /// 1-indexed line of the declaration, when the format has lines.
    pub line: Option<u32>,
}

/// Parsed manifest contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Normalized name -> declaration.
    pub declared: BTreeMap<String, Declared>,
}

impl Manifest {
    pub fn declares(&self, ecosystem: Ecosystem, name: &str) -> bool {
        self.declared
            .contains_key(&normalize_package_name(ecosystem, name))
    }
}

/// Parse a manifest for the given ecosystem.
pub fn parse_manifest(ecosystem: Ecosystem, file: &GeneratedFile) -> Result<Manifest> {
    match ecosystem {
        Ecosystem::Npm => parse_package_json(file),
        Ecosystem::Pypi => Ok(parse_requirements(&file.content)),
        Ecosystem::Crates => parse_cargo_toml(file),
    }
}

fn parse_package_json(file: &GeneratedFile) -> Result<Manifest> {
    let value: serde_json::Value = serde_json::from_str(&file.content)
        .map_err(|e| TreemendError::manifest(&file.path, e))?;
    let object = value
        .as_object()
        .ok_or_else(|| TreemendError::manifest(&file.path, "top level is not an object"))?;

    let mut manifest = Manifest::default();
    for section in NPM_SECTIONS {
        let Some(deps) = object.get(*section) else {
            continue;
        };
        let deps = deps.as_object().ok_or_else(|| {
            TreemendError::manifest(&file.path, format!("`{section}` is not an object"))
        })?;
        for (name, version) in deps {
            manifest.declared.insert(
                name.clone(),
                Declared {
                    name: name.clone(),
                    version: Some(version.as_str().unwrap_or_default().to_string()),
                    line: None,
                },
            );
        }
    }
    Ok(manifest)
}

static REQUIREMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)\s*(\[[^\]]*\])?\s*(.*)$").expect("valid regex")
});

fn parse_requirements(content: &str) -> Manifest {
    let mut manifest = Manifest::default();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() || line.starts_with('-') || line.contains("://") {
            continue;
        }
        let Some(caps) = REQUIREMENT.captures(line) else {
            continue;
        };
        let name = caps[1].to_string();
        let spec = caps
            .get(3)
            .map(|m| m.as_str().split(';').next().unwrap_or("").trim().to_string())
            .filter(|s| !s.is_empty());
        manifest.declared.insert(
            normalize_package_name(Ecosystem::Pypi, &name),
            Declared {
                name,
                version: spec,
                line: Some(idx as u32 + 1),
            },
        );
    }
    manifest
}

fn parse_cargo_toml(file: &GeneratedFile) -> Result<Manifest> {
    let table: toml::Table = file
        .content
        .parse()
        .map_err(|e: toml::de::Error| TreemendError::manifest(&file.path, e.message()))?;

    let mut manifest = Manifest::default();
    for section in CARGO_SECTIONS {
        let Some(deps) = table.get(*section).and_then(|v| v.as_table()) else {
            continue;
        };
        for (key, spec) in deps {
            // Renamed deps (`package = ...`) are imported under their key.
            let version = match spec {
                toml::Value::String(v) => Some(v.clone()),
                toml::Value::Table(t) => t.get("version").and_then(|v| v.as_str()).map(str::to_string),
                _ => None,
            };
            manifest.declared.insert(
                normalize_package_name(Ecosystem::Crates, key),
                Declared {
                    name: key.clone(),
                    version,
                    line: None,
                },
            );
        }
    }
    Ok(manifest)
}

static JS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)(?:^\s*import\s+(?:[\w*{}\s,$]+\s+from\s+)?|^\s*export\s+[\w*{}\s,$]+\s+from\s+|\brequire\s*\(\s*|\bimport\s*\(\s*)['"]([^'"]+)['"]"#,
    )
    .expect("valid regex")
});

static PY_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+(?:\s+as\s+\w+)?(?:\s*,\s*[\w.]+(?:\s+as\s+\w+)?)*)").expect("valid regex"));

static PY_FROM_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*from\s+([\w.]+)\s+import\b").expect("valid regex"));

static RUST_USE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+(?:::)?([A-Za-z_]\w*)|^\s*extern\s+crate\s+([A-Za-z_]\w*)")
        .expect("valid regex")
});

static RUST_MOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+([A-Za-z_]\w*)").expect("valid regex")
});

/// An external module name pulled in by an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub module: String,
    pub line: u32,
}

/// External (non-relative) imports of one source file.
pub fn extract_imports(file: &GeneratedFile) -> Vec<ImportRef> {
    let Some(kind) = SourceKind::from_path(&file.path) else {
        return Vec::new();
    };
    let content = &file.content;
    let line_of = |offset: usize| crate::domain::file::line_of_offset(content, offset);
    let mut imports = Vec::new();

    match kind {
        SourceKind::Python => {
            for caps in PY_IMPORT.captures_iter(content) {
                let offset = caps.get(0).map_or(0, |m| m.start());
                for part in caps[1].split(',') {
                    let module = part.split_whitespace().next().unwrap_or("");
                    let top = module.split('.').next().unwrap_or("");
                    if !top.is_empty() {
                        imports.push(ImportRef {
                            module: top.to_string(),
                            line: line_of(offset),
                        });
                    }
                }
            }
            for caps in PY_FROM_IMPORT.captures_iter(content) {
                let module = &caps[1];
                if module.starts_with('.') {
                    continue;
                }
                let top = module.split('.').next().unwrap_or("");
                imports.push(ImportRef {
                    module: top.to_string(),
                    line: line_of(caps.get(0).map_or(0, |m| m.start())),
                });
            }
        }
        SourceKind::Rust => {
            for caps in RUST_USE.captures_iter(content) {
                let Some(m) = caps.get(1).or_else(|| caps.get(2)) else {
                    continue;
                };
                imports.push(ImportRef {
                    module: m.as_str().to_string(),
                    line: line_of(m.start()),
                });
            }
        }
        _ => {
            for caps in JS_IMPORT.captures_iter(content) {
                let Some(m) = caps.get(1) else {
                    continue;
                };
                if let Some(package) = npm_package_name(m.as_str()) {
                    imports.push(ImportRef {
                        module: package,
                        line: line_of(m.start()),
                    });
                }
            }
        }
    }
    imports
}

/// Package name for an npm import specifier, or `None` for local paths.
///
/// `node:` specifiers keep their prefix so callers can treat them as builtin.
pub fn npm_package_name(specifier: &str) -> Option<String> {
    if specifier.is_empty()
        || specifier.starts_with('.')
        || specifier.starts_with('/')
        || specifier.starts_with("@/")
        || specifier.starts_with("~/")
        || specifier.starts_with('#')
        || specifier.starts_with("http:")
        || specifier.starts_with("https:")
    {
        return None;
    }
    if specifier.starts_with("node:") {
        return Some(specifier.to_string());
    }
    let mut parts = specifier.split('/');
    let first = parts.next()?;
    if first.starts_with('@') {
        let second = parts.next()?;
        return Some(format!("{first}/{second}"));
    }
    Some(first.to_string())
}

/// Module names defined inside the tree itself (Python modules/packages,
/// Rust `mod` items and source files).
pub fn local_modules(files: &[GeneratedFile], kind: SourceKind) -> BTreeSet<String> {
    let mut local = BTreeSet::new();
    for file in files {
        match kind {
            SourceKind::Python => {
                if file.extension().as_deref() == Some("py") {
                    local.insert(file.stem().to_string());
                    for dir in file.path.split('/').rev().skip(1) {
                        local.insert(dir.to_string());
                    }
                }
            }
            SourceKind::Rust => {
                if file.extension().as_deref() == Some("rs") {
                    local.insert(file.stem().to_string());
                    for caps in RUST_MOD.captures_iter(&file.content) {
                        local.insert(caps[1].to_string());
                    }
                }
            }
            _ => {}
        }
    }
    local
}

/// Parse a JSON-with-comments document (tsconfig style): `//` and `/* */`
/// comments and trailing commas are accepted.
pub fn parse_jsonc(path: &str, source: &str) -> Result<serde_json::Value> {
    serde_json::from_str(&strip_jsonc(source)).map_err(|e| TreemendError::config(path, e))
}

fn strip_jsonc(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0usize;
    let mut in_string = false;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                }
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match (c, chars.get(i + 1)) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
                continue;
            }
            (',', _) => {
                let rest = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(rest, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

static SEMVER_CORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^v?(\d+|[xX*])(\.(\d+|[xX*])){0,2}(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?$")
        .expect("valid regex")
});

static NPM_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("valid regex"));

static PEP440_SPEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(===|==|>=|<=|~=|!=|>|<)\s*[0-9][0-9A-Za-z.*+!-]*$").expect("valid regex")
});

/// Whether a declared version passes the ecosystem's validity check.
pub fn is_valid_version(ecosystem: Ecosystem, version: &str) -> bool {
    let version = version.trim();
    match ecosystem {
        Ecosystem::Npm => is_valid_npm_range(version),
        Ecosystem::Pypi => version
            .split(',')
            .all(|clause| PEP440_SPEC.is_match(clause.trim())),
        Ecosystem::Crates => {
            !version.is_empty()
                && version.split(',').all(|clause| {
                    let clause = clause
                        .trim()
                        .trim_start_matches(['^', '~', '=', '>', '<'].as_slice())
                        .trim();
                    clause == "*" || SEMVER_CORE.is_match(clause)
                })
        }
    }
}

fn is_valid_npm_range(version: &str) -> bool {
    if version.is_empty() {
        return false;
    }
    if version == "*" {
        return true;
    }
    const PROTOCOLS: &[&str] = &[
        "workspace:", "file:", "link:", "npm:", "git+", "git:", "github:", "http:", "https:",
        "portal:",
    ];
    if PROTOCOLS.iter().any(|p| version.starts_with(p)) {
        return true;
    }
    // `user/repo` GitHub shorthand.
    if version.contains('/') && !version.contains(' ') {
        return true;
    }
    if NPM_TAG.is_match(version) {
        return true;
    }
    version.split("||").all(|range| {
        let range = range.trim();
        if range.contains(" - ") {
            return range
                .split(" - ")
                .all(|bound| SEMVER_CORE.is_match(bound.trim()));
        }
        !range.is_empty()
            && range.split_whitespace().all(|comparator| {
                let bare = comparator.trim_start_matches(['^', '~', '=', '>', '<'].as_slice());
                bare == "*" || SEMVER_CORE.is_match(bare)
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> GeneratedFile {
        GeneratedFile::new(path, content)
    }

    #[test]
    fn test_parse_package_json_sections() {
        let manifest = parse_manifest(
            Ecosystem::Npm,
            &file(
                "package.json",
                r#"{"dependencies": {"react": "^18.0.0"}, "devDependencies": {"vite": "^5.0.0"}}"#,
            ),
        )
        .expect("parse");
        assert!(manifest.declares(Ecosystem::Npm, "react"));
        assert!(manifest.declares(Ecosystem::Npm, "vite"));
        assert!(!manifest.declares(Ecosystem::Npm, "axios"));
    }

    #[test]
    fn test_malformed_package_json_is_an_error() {
        let err = parse_manifest(Ecosystem::Npm, &file("package.json", "{ not json")).unwrap_err();
        assert!(matches!(err, TreemendError::Manifest { .. }));
    }

    #[test]
    fn test_parse_requirements() {
        let manifest = parse_requirements(
            "# deps\nFlask==3.0.0\nrequests>=2.0 ; python_version > '3.8'\n-r other.txt\nuvicorn[standard]\n",
        );
        assert!(manifest.declares(Ecosystem::Pypi, "flask"));
        assert!(manifest.declares(Ecosystem::Pypi, "requests"));
        assert!(manifest.declares(Ecosystem::Pypi, "uvicorn"));
        assert_eq!(manifest.declared["requests"].version.as_deref(), Some(">=2.0"));
        assert_eq!(manifest.declared["flask"].line, Some(2));
    }

    #[test]
    fn test_parse_cargo_toml() {
        let manifest = parse_manifest(
            Ecosystem::Crates,
            &file(
                "Cargo.toml",
                "[package]\nname = \"x\"\n\n[dependencies]\nserde-json = \"1\"\ntokio = { version = \"1\", features = [\"full\"] }\n",
            ),
        )
        .expect("parse");
        assert!(manifest.declares(Ecosystem::Crates, "serde_json"));
        assert_eq!(manifest.declared["tokio"].version.as_deref(), Some("1"));
    }

    #[test]
    fn test_extract_js_imports() {
        let src = "import React from 'react';\nimport { x } from \"./local\";\nimport '@scope/pkg/style.css';\nconst fs = require('node:fs');\nconst axios = require(\"axios\");\nexport { y } from 'lodash/fp';\nconst m = await import('zod');\n";
        let modules: Vec<String> = extract_imports(&file("a.ts", src))
            .into_iter()
            .map(|i| i.module)
            .collect();
        assert_eq!(
            modules,
            vec!["react", "@scope/pkg", "node:fs", "axios", "lodash", "zod"]
        );
    }

    #[test]
    fn test_extract_python_imports() {
        let src = "import os, sys as system\nfrom flask import Flask\nfrom . import sibling\nimport yaml.loader\n";
        let imports = extract_imports(&file("app.py", src));
        let modules: Vec<&str> = imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["os", "sys", "yaml", "flask"]);
        assert_eq!(imports[3].line, 2);
    }

    #[test]
    fn test_extract_rust_imports() {
        let src = "use std::io;\npub use serde::Serialize;\nextern crate rand;\nuse crate::x;\n";
        let modules: Vec<String> = extract_imports(&file("src/main.rs", src))
            .into_iter()
            .map(|i| i.module)
            .collect();
        assert_eq!(modules, vec!["std", "serde", "rand", "crate"]);
    }

    #[test]
    fn test_local_modules() {
        let files = vec![
            file("app/utils/helpers.py", ""),
            file("src/main.rs", "mod config;\npub mod routes;\n"),
        ];
        let py = local_modules(&files, SourceKind::Python);
        assert!(py.contains("helpers"));
        assert!(py.contains("utils"));
        assert!(py.contains("app"));
        let rs = local_modules(&files, SourceKind::Rust);
        assert!(rs.contains("config"));
        assert!(rs.contains("routes"));
    }

    #[test]
    fn test_parse_jsonc_tolerates_comments_and_trailing_commas() {
        let src = "{\n  // compiler\n  \"compilerOptions\": {\n    \"paths\": {\"@/*\": [\"./src/*\"]}, /* note */\n    \"strict\": true,\n  },\n}\n";
        let value = parse_jsonc("tsconfig.json", src).expect("parse");
        assert_eq!(value["compilerOptions"]["strict"], serde_json::json!(true));
        assert_eq!(value["compilerOptions"]["paths"]["@/*"][0], "./src/*");

        let err = parse_jsonc("tsconfig.json", "{ \"a\": }").unwrap_err();
        assert!(matches!(err, TreemendError::Config { .. }));
    }

    #[test]
    fn test_version_validity() {
        assert!(is_valid_version(Ecosystem::Npm, "^1.2.3"));
        assert!(is_valid_version(Ecosystem::Npm, ">=1.0.0 <2.0.0"));
        assert!(is_valid_version(Ecosystem::Npm, "1.x || 2.x"));
        assert!(is_valid_version(Ecosystem::Npm, "latest"));
        assert!(is_valid_version(Ecosystem::Npm, "workspace:*"));
        assert!(!is_valid_version(Ecosystem::Npm, ""));
        assert!(!is_valid_version(Ecosystem::Npm, "^latest.1"));
        assert!(!is_valid_version(Ecosystem::Npm, "1.2.3.4"));

        assert!(is_valid_version(Ecosystem::Pypi, "==2.32.3"));
        assert!(is_valid_version(Ecosystem::Pypi, ">=1.0,<2"));
        assert!(!is_valid_version(Ecosystem::Pypi, "==latest"));

        assert!(is_valid_version(Ecosystem::Crates, "1"));
        assert!(is_valid_version(Ecosystem::Crates, ">=0.4, <0.6"));
        assert!(!is_valid_version(Ecosystem::Crates, "newest"));
    }
}
