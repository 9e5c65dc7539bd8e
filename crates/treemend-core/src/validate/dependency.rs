//! Dependency layer: imports that the manifest does not declare.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::file::find_by_name;
use crate::domain::{ErrorCategory, GeneratedFile, LayerName, ValidationError};
use crate::language::{SourceKind, TargetLanguage};
use crate::manifest::{extract_imports, is_valid_version, local_modules, parse_manifest};
use crate::registry::RepairRegistry;

use super::ValidationLayer;

pub struct DependencyLayer {
    registry: Arc<RepairRegistry>,
}

impl DependencyLayer {
    pub fn new(registry: Arc<RepairRegistry>) -> Self {
        Self { registry }
    }
}

impl ValidationLayer for DependencyLayer {
    fn name(&self) -> LayerName {
        LayerName::Dependency
    }

    fn inspect(&self, files: &[GeneratedFile], language: TargetLanguage) -> Vec<ValidationError> {
        let ecosystem = language.ecosystem();
        let manifest_name = language.manifest_name();

        let Some(manifest_file) = find_by_name(files, manifest_name) else {
            return vec![ValidationError::new(
                ErrorCategory::MissingManifest,
                manifest_name,
                format!("no {manifest_name} in the generated tree"),
            )
            .with_target(manifest_name)
            .with_suggestion(format!("create {manifest_name}"))];
        };

        let manifest = match parse_manifest(ecosystem, manifest_file) {
            Ok(manifest) => manifest,
            Err(err) => {
                return vec![ValidationError::new(
                    ErrorCategory::InvalidManifest,
                    &manifest_file.path,
                    err.to_string(),
                )]
            }
        };

        let local = match language {
            TargetLanguage::Python => local_modules(files, SourceKind::Python),
            TargetLanguage::Rust => local_modules(files, SourceKind::Rust),
            TargetLanguage::TypeScript | TargetLanguage::JavaScript => BTreeSet::new(),
        };

        let mut findings = Vec::new();
        let mut reported = BTreeSet::new();
        for file in files.iter().filter(|f| language.owns(f)) {
            for import in extract_imports(file) {
                let module = import.module.as_str();
                if module.starts_with("node:")
                    || self.registry.is_builtin(ecosystem, module)
                    || local.contains(module)
                {
                    continue;
                }
                let package = self.registry.package_for_import(ecosystem, module);
                if manifest.declares(ecosystem, &package) || manifest.declares(ecosystem, module) {
                    continue;
                }
                if !reported.insert(package.clone()) {
                    continue;
                }
                findings.push(
                    ValidationError::new(
                        ErrorCategory::MissingDependency,
                        &file.path,
                        format!("`{module}` is imported but `{package}` is not declared in {manifest_name}"),
                    )
                    .with_line(import.line)
                    .with_target(package.clone())
                    .with_suggestion(format!("add {package} to {manifest_name}")),
                );
            }
        }

        for declared in manifest.declared.values() {
            let Some(version) = declared.version.as_deref() else {
                continue;
            };
            if is_valid_version(ecosystem, version) {
                continue;
            }
            let mut finding = ValidationError::new(
                ErrorCategory::InvalidVersion,
                &manifest_file.path,
                format!("`{}` declares invalid version `{version}`", declared.name),
            )
            .with_target(declared.name.clone())
            .with_suggestion(format!(
                "use {}",
                self.registry.version_for(ecosystem, &declared.name)
            ));
            if let Some(line) = declared.line {
                finding = finding.with_line(line);
            }
            findings.push(finding);
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;

    fn layer() -> DependencyLayer {
        DependencyLayer::new(Arc::new(RepairRegistry::builtin()))
    }

    fn file(path: &str, content: &str) -> GeneratedFile {
        GeneratedFile::new(path, content)
    }

    #[test]
    fn test_missing_manifest_returns_early() {
        let files = vec![file("src/index.ts", "import axios from 'axios';\n")];
        let findings = layer().inspect(&files, TargetLanguage::TypeScript);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, ErrorCategory::MissingManifest);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].target.as_deref(), Some("package.json"));
    }

    #[test]
    fn test_missing_dependency_reported_once() {
        let files = vec![
            file("package.json", r#"{"dependencies": {}}"#),
            file("src/a.ts", "import axios from 'axios';\nimport fs from 'fs';\nimport { x } from './x';\n"),
            file("src/b.ts", "import axios from 'axios';\nimport path from 'node:path';\n"),
        ];
        let findings = layer().inspect(&files, TargetLanguage::TypeScript);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, ErrorCategory::MissingDependency);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].file, "src/a.ts");
        assert_eq!(findings[0].line, Some(1));
        assert_eq!(findings[0].target.as_deref(), Some("axios"));
    }

    #[test]
    fn test_python_aliases_and_local_modules() {
        let files = vec![
            file("requirements.txt", "flask==3.0.3\n"),
            file("app.py", "import os\nimport yaml\nfrom flask import Flask\nfrom utils import helper\n"),
            file("utils.py", "def helper():\n    return 1\n"),
        ];
        let findings = layer().inspect(&files, TargetLanguage::Python);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].target.as_deref(), Some("pyyaml"));
    }

    #[test]
    fn test_rust_crates_and_local_mods() {
        let files = vec![
            file("Cargo.toml", "[package]\nname = \"x\"\n\n[dependencies]\nserde = \"1\"\n"),
            file("src/main.rs", "mod routes;\nuse serde::Serialize;\nuse routes::index;\nuse anyhow::Result;\n"),
        ];
        let findings = layer().inspect(&files, TargetLanguage::Rust);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].target.as_deref(), Some("anyhow"));
    }

    #[test]
    fn test_invalid_manifest_and_versions() {
        let broken = vec![file("package.json", "{ nope")];
        let findings = layer().inspect(&broken, TargetLanguage::JavaScript);
        assert_eq!(findings[0].category, ErrorCategory::InvalidManifest);
        assert_eq!(findings[0].severity, Severity::Critical);

        let bad_version = vec![file("package.json", r#"{"dependencies": {"react": "^latest.1"}}"#)];
        let findings = layer().inspect(&bad_version, TargetLanguage::JavaScript);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, ErrorCategory::InvalidVersion);
        assert_eq!(findings[0].target.as_deref(), Some("react"));
    }
}
