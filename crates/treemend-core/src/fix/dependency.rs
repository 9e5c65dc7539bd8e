//! Dependency fixer: creates manifests, declares missing packages and
//! replaces invalid versions.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::file::find_by_name;
use crate::domain::{
    ErrorCategory, FixResult, FixStrategy, GeneratedFile, Result, TreemendError, ValidationError,
};
use crate::language::{Ecosystem, SourceKind, TargetLanguage};
use crate::manifest::{parse_manifest, NPM_SECTIONS};
use crate::patterns::ModuleMarkers;
use crate::registry::{normalize_package_name, RepairRegistry};

use super::Fixer;

const DEFAULT_PACKAGE_NAME: &str = "generated-app";

/// `name[extras]`, version clause, `; marker`, `# comment`.
static REQUIREMENT_PARTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*[A-Za-z0-9][A-Za-z0-9._-]*\s*(?:\[[^\]]*\])?)\s*([^;#]*?)(\s*(?:;[^#]*)?)(\s*#.*)?$")
        .expect("valid regex")
});

pub struct DependencyFixer {
    registry: Arc<RepairRegistry>,
}

impl DependencyFixer {
    pub fn new(registry: Arc<RepairRegistry>) -> Self {
        Self { registry }
    }

    fn update_package_json(
        &self,
        file: &GeneratedFile,
        missing: &[&str],
        invalid: &[&str],
        applied: &mut Vec<String>,
    ) -> Result<String> {
        let mut value: Value = serde_json::from_str(&file.content)
            .map_err(|e| TreemendError::manifest(&file.path, e))?;
        let root = value
            .as_object_mut()
            .ok_or_else(|| TreemendError::manifest(&file.path, "top level is not an object"))?;

        for name in missing {
            let section = if self.registry.is_dev_dependency(Ecosystem::Npm, name) {
                "devDependencies"
            } else {
                "dependencies"
            };
            let version = self.registry.version_for(Ecosystem::Npm, name).to_string();
            let deps = root
                .entry(section)
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .ok_or_else(|| {
                    TreemendError::manifest(&file.path, format!("`{section}` is not an object"))
                })?;
            if deps.contains_key(*name) {
                continue;
            }
            deps.insert(name.to_string(), Value::String(version.clone()));
            applied.push(format!("added {name}@{version} to {section} in {}", file.path));
        }

        for name in invalid {
            let version = self.registry.version_for(Ecosystem::Npm, name).to_string();
            for section in NPM_SECTIONS {
                let entry = root
                    .get_mut(*section)
                    .and_then(Value::as_object_mut)
                    .and_then(|deps| deps.get_mut(*name));
                if let Some(entry) = entry {
                    *entry = Value::String(version.clone());
                    applied.push(format!("set {name} to {version} in {}", file.path));
                    break;
                }
            }
        }

        let mut rendered = serde_json::to_string_pretty(&value)?;
        rendered.push('\n');
        Ok(rendered)
    }

    /// Version clause for `name`: `==x`, a ready-made range, or nothing.
    fn requirement_spec(&self, name: &str) -> String {
        let version = self.registry.version_for(Ecosystem::Pypi, name);
        if version.is_empty() || version.starts_with(['=', '>', '<', '~', '!'].as_slice()) {
            version.to_string()
        } else {
            format!("=={version}")
        }
    }

    fn requirement_line(&self, name: &str) -> String {
        format!("{name}{}", self.requirement_spec(name))
    }

    /// Swap the version clause of an existing requirement line, keeping
    /// extras, environment markers and trailing comments.
    fn repin_requirement(&self, line: &str, name: &str) -> String {
        match REQUIREMENT_PARTS.captures(line) {
            Some(c) => format!(
                "{}{}{}{}",
                &c[1],
                self.requirement_spec(name),
                &c[3],
                c.get(4).map_or("", |m| m.as_str())
            ),
            None => self.requirement_line(name),
        }
    }

    fn update_requirements(
        &self,
        file: &GeneratedFile,
        missing: &[&str],
        invalid: &[&str],
        applied: &mut Vec<String>,
    ) -> Result<String> {
        let manifest = parse_manifest(Ecosystem::Pypi, file)?;
        let mut lines: Vec<String> = file.content.lines().map(str::to_string).collect();

        for name in invalid {
            let key = normalize_package_name(Ecosystem::Pypi, name);
            let Some(line) = manifest.declared.get(&key).and_then(|d| d.line) else {
                continue;
            };
            if let Some(slot) = lines.get_mut(line as usize - 1) {
                *slot = self.repin_requirement(slot, name);
                applied.push(format!("pinned {} in {}", slot.trim(), file.path));
            }
        }

        for name in missing {
            if manifest.declares(Ecosystem::Pypi, name) {
                continue;
            }
            let line = self.requirement_line(name);
            applied.push(format!("added {line} to {}", file.path));
            lines.push(line);
        }

        let mut rendered = lines.join("\n");
        rendered.push('\n');
        Ok(rendered)
    }

    fn update_cargo_toml(
        &self,
        file: &GeneratedFile,
        missing: &[&str],
        invalid: &[&str],
        applied: &mut Vec<String>,
    ) -> Result<String> {
        let manifest = parse_manifest(Ecosystem::Crates, file)?;
        let mut lines: Vec<String> = file.content.lines().map(str::to_string).collect();

        for name in invalid {
            let version = self.registry.version_for(Ecosystem::Crates, name);
            let plain = Regex::new(&format!(r#"^(\s*{}\s*=\s*)"[^"]*""#, regex::escape(name)))
                .map_err(|e| TreemendError::manifest(&file.path, e))?;
            let table = Regex::new(&format!(
                r#"^(\s*{}\s*=\s*\{{.*\bversion\s*=\s*)"[^"]*""#,
                regex::escape(name)
            ))
            .map_err(|e| TreemendError::manifest(&file.path, e))?;
            let replacement = format!("${{1}}\"{version}\"");
            if let Some(line) = lines
                .iter_mut()
                .find(|l| plain.is_match(l.as_str()) || table.is_match(l.as_str()))
            {
                let rewritten = if plain.is_match(line.as_str()) {
                    plain.replace(line.as_str(), replacement.as_str()).into_owned()
                } else {
                    table.replace(line.as_str(), replacement.as_str()).into_owned()
                };
                *line = rewritten;
                applied.push(format!("set {name} to \"{version}\" in {}", file.path));
            }
        }

        let additions: Vec<String> = missing
            .iter()
            .filter(|name| !manifest.declares(Ecosystem::Crates, name))
            .map(|name| {
                let version = self.registry.version_for(Ecosystem::Crates, name);
                applied.push(format!("added {name} = \"{version}\" to {}", file.path));
                format!("{name} = \"{version}\"")
            })
            .collect();

        if !additions.is_empty() {
            match lines.iter().position(|l| l.trim() == "[dependencies]") {
                Some(header) => {
                    let section_end = lines[header + 1..]
                        .iter()
                        .position(|l| l.trim_start().starts_with('['))
                        .map_or(lines.len(), |offset| header + 1 + offset);
                    let mut insert_at = section_end;
                    while insert_at > header + 1 && lines[insert_at - 1].trim().is_empty() {
                        insert_at -= 1;
                    }
                    lines.splice(insert_at..insert_at, additions);
                }
                None => {
                    if lines.last().is_some_and(|l| !l.trim().is_empty()) {
                        lines.push(String::new());
                    }
                    lines.push("[dependencies]".to_string());
                    lines.extend(additions);
                }
            }
        }

        let mut rendered = lines.join("\n");
        rendered.push('\n');
        Ok(rendered)
    }
}

/// A fresh manifest with empty dependency tables.
pub fn new_manifest(language: TargetLanguage, files: &[GeneratedFile]) -> GeneratedFile {
    let content = match language.ecosystem() {
        Ecosystem::Npm => {
            let mut root = Map::new();
            root.insert("name".into(), Value::from(DEFAULT_PACKAGE_NAME));
            root.insert("version".into(), Value::from("0.1.0"));
            root.insert("private".into(), Value::Bool(true));
            if sources_are_esm(files) {
                root.insert("type".into(), Value::from("module"));
            }
            root.insert("dependencies".into(), Value::Object(Map::new()));
            root.insert("devDependencies".into(), Value::Object(Map::new()));
            let mut rendered =
                serde_json::to_string_pretty(&Value::Object(root)).unwrap_or_else(|_| "{}".into());
            rendered.push('\n');
            rendered
        }
        Ecosystem::Pypi => "# Python dependencies\n".to_string(),
        Ecosystem::Crates => format!(
            "[package]\nname = \"{DEFAULT_PACKAGE_NAME}\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n[dependencies]\n"
        ),
    };
    GeneratedFile::new(language.manifest_name(), content)
}

/// True when the JS sources use ES modules and none is CommonJS-only.
fn sources_are_esm(files: &[GeneratedFile]) -> bool {
    let markers: Vec<ModuleMarkers> = files
        .iter()
        .filter(|f| SourceKind::from_path(&f.path).is_some_and(SourceKind::is_web))
        .map(|f| ModuleMarkers::of(&f.content))
        .collect();
    markers.iter().any(|m| m.esm) && !markers.iter().any(|m| m.commonjs && !m.esm)
}

fn targets<'a>(errors: &[&'a ValidationError], category: ErrorCategory) -> Vec<&'a str> {
    let mut names: Vec<&str> = Vec::new();
    for error in errors.iter().filter(|e| e.category == category) {
        if let Some(target) = error.target.as_deref() {
            if !names.contains(&target) {
                names.push(target);
            }
        }
    }
    names
}

impl Fixer for DependencyFixer {
    fn strategy(&self) -> FixStrategy {
        FixStrategy::Dependency
    }

    fn apply(
        &self,
        files: &[GeneratedFile],
        errors: &[&ValidationError],
        language: TargetLanguage,
    ) -> Result<FixResult> {
        let manifest_name = language.manifest_name();
        let mut next = files.to_vec();
        let mut applied = Vec::new();

        let wants_manifest = errors.iter().any(|e| e.category == ErrorCategory::MissingManifest);
        if wants_manifest && find_by_name(files, manifest_name).is_none() {
            next.push(new_manifest(language, files));
            applied.push(format!("created {manifest_name}"));
        }

        let missing = targets(errors, ErrorCategory::MissingDependency);
        let invalid = targets(errors, ErrorCategory::InvalidVersion);
        if !missing.is_empty() || !invalid.is_empty() {
            let Some(idx) = next
                .iter()
                .enumerate()
                .filter(|(_, f)| f.file_name() == manifest_name)
                .min_by_key(|(_, f)| f.path.len())
                .map(|(idx, _)| idx)
            else {
                return Ok(FixResult::new(next, applied));
            };
            let file = &next[idx];
            let before = applied.len();
            let content = match language.ecosystem() {
                Ecosystem::Npm => self.update_package_json(file, &missing, &invalid, &mut applied)?,
                Ecosystem::Pypi => self.update_requirements(file, &missing, &invalid, &mut applied)?,
                Ecosystem::Crates => self.update_cargo_toml(file, &missing, &invalid, &mut applied)?,
            };
            // Re-rendering alone is not a fix.
            if applied.len() > before {
                next[idx] = file.with_content(content);
            }
        }

        Ok(FixResult::new(next, applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixer() -> DependencyFixer {
        DependencyFixer::new(Arc::new(RepairRegistry::builtin()))
    }

    fn missing(file: &str, name: &str) -> ValidationError {
        ValidationError::new(ErrorCategory::MissingDependency, file, "m").with_target(name)
    }

    #[test]
    fn test_creates_package_json_with_empty_maps() {
        let files = vec![GeneratedFile::new("src/index.ts", "export const a = 1;\n")];
        let err = ValidationError::new(ErrorCategory::MissingManifest, "package.json", "m");
        let result = fixer().apply(&files, &[&err], TargetLanguage::TypeScript).expect("fix");

        assert!(result.fixed);
        assert_eq!(result.files.len(), 2);
        let manifest: Value = serde_json::from_str(&result.files[1].content).expect("json");
        assert_eq!(manifest["dependencies"], serde_json::json!({}));
        assert_eq!(manifest["devDependencies"], serde_json::json!({}));
        assert_eq!(manifest["type"], "module");
    }

    #[test]
    fn test_adds_runtime_and_dev_dependencies() {
        let files = vec![GeneratedFile::new(
            "package.json",
            "{\n  \"name\": \"x\",\n  \"dependencies\": {}\n}\n",
        )];
        let a = missing("src/a.ts", "axios");
        let b = missing("src/a.ts", "@types/node");
        let c = missing("src/a.ts", "left-pad");
        let result = fixer()
            .apply(&files, &[&a, &b, &c], TargetLanguage::TypeScript)
            .expect("fix");

        let manifest: Value = serde_json::from_str(&result.files[0].content).expect("json");
        assert_eq!(manifest["dependencies"]["axios"], "^1.7.7");
        assert_eq!(manifest["dependencies"]["left-pad"], "latest");
        assert_eq!(manifest["devDependencies"]["@types/node"], "^22.7.7");
        assert_eq!(result.applied_fixes.len(), 3);
        // Key order survives.
        assert!(result.files[0].content.find("\"name\"") < result.files[0].content.find("\"dependencies\""));
    }

    #[test]
    fn test_requirements_append_and_pin() {
        let files = vec![GeneratedFile::new(
            "requirements.txt",
            "# deps\nflask==latest\n",
        )];
        let add = missing("app.py", "requests");
        let bad = ValidationError::new(ErrorCategory::InvalidVersion, "requirements.txt", "m")
            .with_target("flask");
        let result = fixer()
            .apply(&files, &[&add, &bad], TargetLanguage::Python)
            .expect("fix");
        assert_eq!(
            result.files[0].content,
            "# deps\nflask==3.0.3\nrequests==2.32.3\n"
        );
    }

    #[test]
    fn test_repin_keeps_extras_and_markers() {
        let files = vec![GeneratedFile::new(
            "requirements.txt",
            "requests[socks]>=latest ; python_version >= \"3.8\"  # http client\nflask==3.0.3\n",
        )];
        let bad = ValidationError::new(ErrorCategory::InvalidVersion, "requirements.txt", "m")
            .with_target("requests");
        let result = fixer().apply(&files, &[&bad], TargetLanguage::Python).expect("fix");
        assert_eq!(
            result.files[0].content,
            "requests[socks]==2.32.3 ; python_version >= \"3.8\"  # http client\nflask==3.0.3\n"
        );
    }

    #[test]
    fn test_cargo_toml_insertion_keeps_sections() {
        let files = vec![GeneratedFile::new(
            "Cargo.toml",
            "[package]\nname = \"x\"\n\n[dependencies]\nserde = \"newest\"\n\n[dev-dependencies]\n",
        )];
        let add = missing("src/main.rs", "anyhow");
        let bad = ValidationError::new(ErrorCategory::InvalidVersion, "Cargo.toml", "m")
            .with_target("serde");
        let result = fixer()
            .apply(&files, &[&add, &bad], TargetLanguage::Rust)
            .expect("fix");
        assert_eq!(
            result.files[0].content,
            "[package]\nname = \"x\"\n\n[dependencies]\nserde = \"1\"\nanyhow = \"1\"\n\n[dev-dependencies]\n"
        );
    }

    #[test]
    fn test_nothing_to_do_is_not_fixed() {
        let files = vec![GeneratedFile::new("package.json", r#"{"dependencies": {"axios": "^1.0.0"}}"#)];
        let a = missing("src/a.ts", "axios");
        let result = fixer().apply(&files, &[&a], TargetLanguage::TypeScript).expect("fix");
        assert!(!result.fixed);
        assert_eq!(result.files, files);
    }
}
