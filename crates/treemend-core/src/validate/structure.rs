//! Structure layer: duplicates, empty and placeholder files, missing or
//! outdated companion configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::file::{find_by_name, has_file_named};
use crate::domain::{ErrorCategory, GeneratedFile, LayerName, ValidationError};
use crate::language::TargetLanguage;
use crate::manifest::parse_jsonc;
use crate::patterns::ModuleMarkers;
use crate::registry::RepairRegistry;

use super::ValidationLayer;

/// Files that are legitimately empty.
const EMPTY_ALLOWED: &[&str] = &["__init__.py", ".gitkeep", "py.typed", ".nojekyll"];

/// `moduleResolution` values that predate package `exports` support.
pub const LEGACY_MODULE_RESOLUTION: &[&str] = &["node", "node10", "classic"];

/// Compiler options removed or deprecated in current TypeScript releases.
pub const DEPRECATED_TS_OPTIONS: &[&str] = &[
    "importsNotUsedAsValues",
    "preserveValueImports",
    "suppressImplicitAnyIndexErrors",
    "keyofStringsOnly",
    "noStrictGenericChecks",
    "out",
    "charset",
    "suppressExcessPropertyErrors",
    "noImplicitUseStrict",
];

pub struct StructureLayer {
    registry: Arc<RepairRegistry>,
}

impl StructureLayer {
    pub fn new(registry: Arc<RepairRegistry>) -> Self {
        Self { registry }
    }

    fn file_findings(&self, files: &[GeneratedFile]) -> Vec<ValidationError> {
        let mut findings = Vec::new();
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();

        for file in files {
            let count = seen.entry(file.path.as_str()).or_insert(0);
            *count += 1;
            if *count > 1 {
                findings.push(
                    ValidationError::new(
                        ErrorCategory::DuplicateFile,
                        &file.path,
                        format!("duplicate entry for {} (occurrence {count})", file.path),
                    )
                    .with_suggestion("keep the first occurrence"),
                );
                continue;
            }

            if file.content.trim().is_empty() && !EMPTY_ALLOWED.contains(&file.file_name()) {
                findings.push(ValidationError::new(
                    ErrorCategory::EmptyFile,
                    &file.path,
                    "file has no content",
                ));
            }

            if self.registry.is_placeholder_file(file.file_name()) {
                findings.push(ValidationError::new(
                    ErrorCategory::PlaceholderFile,
                    &file.path,
                    format!("{} looks like a placeholder file", file.file_name()),
                ));
            }
        }
        findings
    }
}

fn missing_config(name: &str, message: String) -> ValidationError {
    ValidationError::new(ErrorCategory::MissingConfig, name, message)
        .with_target(name)
        .with_suggestion(format!("create {name}"))
}

fn has_extension(files: &[GeneratedFile], exts: &[&str]) -> bool {
    files
        .iter()
        .any(|f| f.extension().is_some_and(|ext| exts.contains(&ext.as_str())))
}

/// True when any file is named `tailwind.config.*`.
pub fn has_tailwind_config(files: &[GeneratedFile]) -> bool {
    files
        .iter()
        .any(|f| f.file_name().starts_with("tailwind.config."))
}

fn uses_tailwind_directives(files: &[GeneratedFile]) -> bool {
    files.iter().any(|f| {
        matches!(f.extension().as_deref(), Some("css" | "scss" | "pcss"))
            && f.content.lines().any(|l| l.trim_start().starts_with("@tailwind"))
    })
}

fn companion_findings(files: &[GeneratedFile], language: TargetLanguage) -> Vec<ValidationError> {
    let mut findings = Vec::new();

    if has_extension(files, &["ts", "tsx"]) && !has_file_named(files, "tsconfig.json") {
        findings.push(missing_config(
            "tsconfig.json",
            "TypeScript sources without a tsconfig.json".to_string(),
        ));
    }

    if uses_tailwind_directives(files) && !has_tailwind_config(files) {
        findings.push(missing_config(
            "tailwind.config.js",
            "stylesheets use @tailwind directives but no tailwind config exists".to_string(),
        ));
    }

    // Web targets get this from the dependency layer.
    if !language.is_web_stack()
        && has_extension(files, &["js", "jsx", "ts", "tsx", "mjs", "cjs"])
        && !has_file_named(files, "package.json")
    {
        findings.push(missing_config(
            "package.json",
            "JavaScript/TypeScript sources without a package.json".to_string(),
        ));
    }

    findings
}

fn tsconfig_findings(files: &[GeneratedFile]) -> Vec<ValidationError> {
    let Some(tsconfig) = find_by_name(files, "tsconfig.json") else {
        return Vec::new();
    };
    let value = match parse_jsonc(&tsconfig.path, &tsconfig.content) {
        Ok(value) => value,
        Err(err) => {
            return vec![ValidationError::new(
                ErrorCategory::InvalidConfig,
                &tsconfig.path,
                err.to_string(),
            )]
        }
    };
    let options = value.get("compilerOptions").and_then(Value::as_object);
    let option = |key: &str| options.and_then(|o| o.get(key));
    let mut findings = Vec::new();

    if has_extension(files, &["tsx"]) && option("jsx").is_none() {
        findings.push(
            ValidationError::new(
                ErrorCategory::MissingJsxFlag,
                &tsconfig.path,
                "project has .tsx files but compilerOptions.jsx is not set",
            )
            .with_target("jsx"),
        );
    }

    if let Some(resolution) = option("moduleResolution").and_then(Value::as_str) {
        if LEGACY_MODULE_RESOLUTION.contains(&resolution.to_ascii_lowercase().as_str()) {
            findings.push(
                ValidationError::new(
                    ErrorCategory::ModuleResolution,
                    &tsconfig.path,
                    format!("moduleResolution `{resolution}` cannot resolve package exports"),
                )
                .with_target("moduleResolution")
                .with_suggestion("use \"bundler\""),
            );
        }
    }

    for key in DEPRECATED_TS_OPTIONS {
        if option(key).is_some() {
            findings.push(
                ValidationError::new(
                    ErrorCategory::DeprecatedConfig,
                    &tsconfig.path,
                    format!("compiler option `{key}` is deprecated"),
                )
                .with_target(*key),
            );
        }
    }
    findings
}

/// Whether package.json declares `"type": "module"`.
pub fn package_is_esm(files: &[GeneratedFile]) -> bool {
    find_by_name(files, "package.json")
        .and_then(|f| serde_json::from_str::<Value>(&f.content).ok())
        .and_then(|v| v.get("type").and_then(Value::as_str).map(|t| t == "module"))
        .unwrap_or(false)
}

fn config_module_findings(files: &[GeneratedFile]) -> Vec<ValidationError> {
    let esm_package = package_is_esm(files);
    files
        .iter()
        .filter(|f| f.file_name().ends_with(".config.js"))
        .filter_map(|f| {
            let markers = ModuleMarkers::of(&f.content);
            let target = match (esm_package, markers.commonjs, markers.esm) {
                (true, true, false) => ".cjs",
                (false, false, true) => ".mjs",
                _ => return None,
            };
            let convention = if esm_package { "ES modules" } else { "CommonJS" };
            Some(
                ValidationError::new(
                    ErrorCategory::ConfigModuleMismatch,
                    &f.path,
                    format!("{} is loaded as {convention} but uses the other syntax", f.file_name()),
                )
                .with_target(target)
                .with_suggestion(format!("rename to {target}")),
            )
        })
        .collect()
}

impl ValidationLayer for StructureLayer {
    fn name(&self) -> LayerName {
        LayerName::Structure
    }

    fn inspect(&self, files: &[GeneratedFile], language: TargetLanguage) -> Vec<ValidationError> {
        let mut findings = self.file_findings(files);
        findings.extend(companion_findings(files, language));
        findings.extend(tsconfig_findings(files));
        findings.extend(config_module_findings(files));
        findings
    }
}
