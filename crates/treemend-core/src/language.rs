use serde::{Deserialize, Serialize};

use crate::domain::{GeneratedFile, Result, TreemendError};

/// Target language of a generated project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetLanguage {
    TypeScript,
    JavaScript,
    Python,
    Rust,
}

/// Package ecosystem a manifest belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ecosystem {
    Npm,
    Pypi,
    Crates,
}

impl Ecosystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Pypi => "pypi",
            Ecosystem::Crates => "crates",
        }
    }
}

impl TargetLanguage {
    /// Parse a caller-supplied language name.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ts" | "tsx" | "typescript" => Ok(TargetLanguage::TypeScript),
            "js" | "jsx" | "javascript" | "node" | "nodejs" => Ok(TargetLanguage::JavaScript),
            "py" | "python" | "python3" => Ok(TargetLanguage::Python),
            "rs" | "rust" => Ok(TargetLanguage::Rust),
            other => Err(TreemendError::UnsupportedLanguage(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetLanguage::TypeScript => "typescript",
            TargetLanguage::JavaScript => "javascript",
            TargetLanguage::Python => "python",
            TargetLanguage::Rust => "rust",
        }
    }

    /// Extensions the syntax layer checks for this target.
    pub fn source_extensions(self) -> &'static [&'static str] {
        match self {
            TargetLanguage::TypeScript => &["ts", "tsx", "js", "jsx", "mjs", "cjs"],
            TargetLanguage::JavaScript => &["js", "jsx", "mjs", "cjs"],
            TargetLanguage::Python => &["py"],
            TargetLanguage::Rust => &["rs"],
        }
    }

    pub fn manifest_name(self) -> &'static str {
        match self {
            TargetLanguage::TypeScript | TargetLanguage::JavaScript => "package.json",
            TargetLanguage::Python => "requirements.txt",
            TargetLanguage::Rust => "Cargo.toml",
        }
    }

    pub fn ecosystem(self) -> Ecosystem {
        match self {
            TargetLanguage::TypeScript | TargetLanguage::JavaScript => Ecosystem::Npm,
            TargetLanguage::Python => Ecosystem::Pypi,
            TargetLanguage::Rust => Ecosystem::Crates,
        }
    }

    pub fn is_web_stack(self) -> bool {
        matches!(self, TargetLanguage::TypeScript | TargetLanguage::JavaScript)
    }

    /// Whether `file` is a source file of this target.
    pub fn owns(self, file: &GeneratedFile) -> bool {
        file.extension()
            .is_some_and(|ext| self.source_extensions().contains(&ext.as_str()))
    }
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete grammar to use for one file, detected from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
    Python,
    Rust,
}

impl SourceKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ts" | "mts" | "cts" => Some(SourceKind::TypeScript),
            "tsx" => Some(SourceKind::Tsx),
            "js" | "mjs" | "cjs" => Some(SourceKind::JavaScript),
            "jsx" => Some(SourceKind::Jsx),
            "py" | "pyw" => Some(SourceKind::Python),
            "rs" => Some(SourceKind::Rust),
            _ => None,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        GeneratedFile::new(path, "")
            .extension()
            .and_then(|ext| Self::from_extension(&ext))
    }

    /// JSX-capable markup lives in these files.
    pub fn has_markup(self) -> bool {
        matches!(self, SourceKind::Tsx | SourceKind::Jsx)
    }

    pub fn is_web(self) -> bool {
        !matches!(self, SourceKind::Python | SourceKind::Rust)
    }

    /// Line comment prefix.
    pub fn line_comment(self) -> &'static str {
        match self {
            SourceKind::Python => "#",
            _ => "//",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(TargetLanguage::parse("TS").unwrap(), TargetLanguage::TypeScript);
        assert_eq!(TargetLanguage::parse("node").unwrap(), TargetLanguage::JavaScript);
        assert_eq!(TargetLanguage::parse(" python ").unwrap(), TargetLanguage::Python);
        assert_eq!(TargetLanguage::parse("rust").unwrap(), TargetLanguage::Rust);
        assert!(matches!(
            TargetLanguage::parse("cobol"),
            Err(TreemendError::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn test_manifest_and_ecosystem() {
        assert_eq!(TargetLanguage::TypeScript.manifest_name(), "package.json");
        assert_eq!(TargetLanguage::Python.manifest_name(), "requirements.txt");
        assert_eq!(TargetLanguage::Rust.ecosystem(), Ecosystem::Crates);
        assert!(TargetLanguage::JavaScript.is_web_stack());
        assert!(!TargetLanguage::Python.is_web_stack());
    }

    #[test]
    fn test_owns_by_extension() {
        let ts = TargetLanguage::TypeScript;
        assert!(ts.owns(&GeneratedFile::new("src/App.tsx", "")));
        assert!(ts.owns(&GeneratedFile::new("vite.config.js", "")));
        assert!(!ts.owns(&GeneratedFile::new("README.md", "")));
        assert!(!TargetLanguage::JavaScript.owns(&GeneratedFile::new("a.ts", "")));
    }

    #[test]
    fn test_source_kind_detection() {
        assert_eq!(SourceKind::from_path("a/b.tsx"), Some(SourceKind::Tsx));
        assert_eq!(SourceKind::from_path("main.py"), Some(SourceKind::Python));
        assert_eq!(SourceKind::from_path("Makefile"), None);
        assert!(SourceKind::Jsx.has_markup());
        assert!(!SourceKind::TypeScript.has_markup());
    }
}
