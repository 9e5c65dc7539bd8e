//! Generated file records.

use serde::{Deserialize, Serialize};

/// One file produced by the upstream generator.
///
/// Identity is `path`. Content is only ever replaced wholesale: fixers build
/// a new value with [`GeneratedFile::with_content`] instead of editing in
/// place, so every intermediate snapshot stays reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Copy of this file with replaced content.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            path: self.path.clone(),
            content: content.into(),
        }
    }

    /// Copy of this file under a new path.
    pub fn renamed(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: self.content.clone(),
        }
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }

    /// Lowercased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let idx = name.rfind('.')?;
        if idx == 0 {
            return None;
        }
        Some(name[idx + 1..].to_ascii_lowercase())
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }
}

/// Final component of a `/`-separated path.
pub fn file_name(path: &str) -> &str {
    path.rsplit(&['/', '\\'][..]).next().unwrap_or(path)
}

/// Find the shortest-path file whose name equals `name`.
pub fn find_by_name<'a>(files: &'a [GeneratedFile], name: &str) -> Option<&'a GeneratedFile> {
    files
        .iter()
        .filter(|f| f.file_name() == name)
        .min_by_key(|f| f.path.len())
}

/// Whether any file in the set has the given name.
pub fn has_file_named(files: &[GeneratedFile], name: &str) -> bool {
    files.iter().any(|f| f.file_name() == name)
}

/// 1-indexed line containing byte `offset`, counted by `\n`.
pub fn line_of_offset(content: &str, offset: usize) -> u32 {
    let end = offset.min(content.len());
    let prefix = content.as_bytes()[..end]
        .iter()
        .filter(|b| **b == b'\n')
        .count();
    (prefix + 1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_and_extension() {
        let f = GeneratedFile::new("src/components/App.TSX", "");
        assert_eq!(f.file_name(), "App.TSX");
        assert_eq!(f.extension().as_deref(), Some("tsx"));
        assert_eq!(f.stem(), "App");

        let dot = GeneratedFile::new(".gitignore", "");
        assert_eq!(dot.extension(), None);
        assert_eq!(dot.stem(), ".gitignore");
    }

    #[test]
    fn test_with_content_keeps_path() {
        let f = GeneratedFile::new("a.ts", "old");
        let g = f.with_content("new");
        assert_eq!(g.path, "a.ts");
        assert_eq!(g.content, "new");
        assert_eq!(f.content, "old");
    }

    #[test]
    fn test_find_by_name_prefers_shortest_path() {
        let files = vec![
            GeneratedFile::new("packages/web/package.json", "{}"),
            GeneratedFile::new("package.json", "{}"),
        ];
        let found = find_by_name(&files, "package.json").expect("manifest");
        assert_eq!(found.path, "package.json");
    }

    #[test]
    fn test_line_of_offset() {
        let content = "a\nbb\nccc";
        assert_eq!(line_of_offset(content, 0), 1);
        assert_eq!(line_of_offset(content, 2), 2);
        assert_eq!(line_of_offset(content, 5), 3);
        assert_eq!(line_of_offset(content, 999), 3);
    }
}
