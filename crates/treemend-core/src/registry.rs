//! Swappable lookup tables consulted by the dependency layer and fixers.
//!
//! Builtin allowlists, curated version pins, import-name aliases and
//! dev-dependency heuristics all live in a TOML document rather than in code.
//! A default table is embedded; operators can replace it wholesale.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Result, TreemendError};
use crate::language::Ecosystem;

const DEFAULT_REGISTRY: &str = include_str!("../data/registry.toml");

/// Tables for one package ecosystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcosystemTable {
    /// Version used when a package has no curated pin.
    pub fallback_version: String,

    /// Standard-library module names that never need declaring.
    pub builtins: BTreeSet<String>,

    /// Name prefixes that mark a development-only dependency.
    pub dev_prefixes: Vec<String>,

    /// Build tools that belong in the dev section.
    pub build_tools: BTreeSet<String>,

    /// Curated name -> version pins.
    pub versions: BTreeMap<String, String>,

    /// Import name -> distribution name (e.g. `yaml` -> `pyyaml`).
    pub aliases: BTreeMap<String, String>,
}

/// File-level tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTable {
    pub placeholder_names: BTreeSet<String>,
}

/// The full lookup registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairRegistry {
    pub files: FileTable,
    pub npm: EcosystemTable,
    pub pypi: EcosystemTable,
    pub crates: EcosystemTable,
}

impl RepairRegistry {
    /// The embedded default registry.
    pub fn builtin() -> Self {
        // The embedded document is covered by `test_builtin_registry_parses`.
        Self::from_toml_str(DEFAULT_REGISTRY).unwrap_or_default()
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| TreemendError::Registry(e.to_string()))
    }

    /// Load a replacement registry from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn table(&self, ecosystem: Ecosystem) -> &EcosystemTable {
        match ecosystem {
            Ecosystem::Npm => &self.npm,
            Ecosystem::Pypi => &self.pypi,
            Ecosystem::Crates => &self.crates,
        }
    }

    pub fn is_builtin(&self, ecosystem: Ecosystem, module: &str) -> bool {
        self.table(ecosystem).builtins.contains(module)
    }

    /// Distribution name for an imported module name.
    pub fn package_for_import(&self, ecosystem: Ecosystem, import: &str) -> String {
        let table = self.table(ecosystem);
        match table.aliases.get(import) {
            Some(package) => package.clone(),
            None => normalize_package_name(ecosystem, import),
        }
    }

    /// Curated version, or `None` when the fallback applies.
    pub fn pinned_version(&self, ecosystem: Ecosystem, package: &str) -> Option<&str> {
        let table = self.table(ecosystem);
        table
            .versions
            .get(package)
            .or_else(|| {
                let normalized = normalize_package_name(ecosystem, package);
                table.versions.get(&normalized)
            })
            .map(String::as_str)
    }

    /// Version to write for `package`: the pin, else the fallback.
    pub fn version_for(&self, ecosystem: Ecosystem, package: &str) -> &str {
        self.pinned_version(ecosystem, package)
            .unwrap_or(self.table(ecosystem).fallback_version.as_str())
    }

    pub fn is_dev_dependency(&self, ecosystem: Ecosystem, package: &str) -> bool {
        let table = self.table(ecosystem);
        table.build_tools.contains(package)
            || table.dev_prefixes.iter().any(|p| package.starts_with(p.as_str()))
    }

    pub fn is_placeholder_file(&self, file_name: &str) -> bool {
        self.files
            .placeholder_names
            .contains(&file_name.to_ascii_lowercase())
    }
}

/// Normalize a package name the way the ecosystem compares them.
pub fn normalize_package_name(ecosystem: Ecosystem, name: &str) -> String {
    match ecosystem {
        Ecosystem::Npm => name.to_string(),
        Ecosystem::Pypi => name.to_ascii_lowercase().replace(&['_', '.'][..], "-"),
        Ecosystem::Crates => name.replace('-', "_"),
    }
}
