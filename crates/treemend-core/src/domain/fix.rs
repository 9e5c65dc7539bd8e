//! Fix results returned by every repair unit.

use serde::{Deserialize, Serialize};

use super::file::GeneratedFile;

/// Outcome of one fixer (or of the whole router).
///
/// `files` is always the full file list, unchanged files included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixResult {
    /// True iff `applied_fixes` is non-empty.
    pub fixed: bool,
    pub files: Vec<GeneratedFile>,
    pub applied_fixes: Vec<String>,
}

impl FixResult {
    /// Nothing applied; hand the input back untouched.
    pub fn unchanged(files: &[GeneratedFile]) -> Self {
        Self {
            fixed: false,
            files: files.to_vec(),
            applied_fixes: Vec::new(),
        }
    }

    pub fn new(files: Vec<GeneratedFile>, applied_fixes: Vec<String>) -> Self {
        Self {
            fixed: !applied_fixes.is_empty(),
            files,
            applied_fixes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_tracks_applied_fixes() {
        let files = vec![GeneratedFile::new("a.ts", "x")];
        assert!(!FixResult::unchanged(&files).fixed);
        assert!(!FixResult::new(files.clone(), Vec::new()).fixed);
        assert!(FixResult::new(files, vec!["did a thing".to_string()]).fixed);
    }
}
