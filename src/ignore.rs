use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Gitignore-style filter applied when walking source trees
pub struct IgnoreFilter {
    inner: Gitignore,
}

impl IgnoreFilter {
    pub fn new(root: &Path, extra_excludes: Option<&[String]>) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        // 1. Load from .gitignore and .ignore
        builder.add(root.join(".gitignore"));
        builder.add(root.join(".ignore"));

        // 2. Add defaults (global)
        let defaults = [
            // Tooling and output directories
            ".git/", ".hg/", ".svn/", "target/", "node_modules/", ".palimpsest/",
            ".vscode/", ".idea/",

            // Our own artifacts and scratch files
            "*.ir.json", "*.tmp", "*.bak", "*.swp", "*.log",
            "*-journal", "*.wal", "*.shm",

            // Platform noise
            ".DS_Store", "Thumbs.db", "desktop.ini",
        ];

        for pattern in defaults {
            // Static patterns; a rejected line only loses that one pattern
            builder.add_line(None, pattern).ok();
        }

        // 3. Add user config excludes
        if let Some(excludes) = extra_excludes {
            for pattern in excludes {
                if let Err(e) = builder.add_line(None, pattern) {
                    tracing::warn!("Ignoring invalid exclude pattern '{}': {}", pattern, e);
                }
            }
        }

        Self {
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    /// Whether `path` (relative to the root) or any of its parents is excluded
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        if path.has_root() {
            return self.inner.matched(path, is_dir).is_ignore();
        }
        self.inner.matched_path_or_any_parents(path, is_dir).is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let filter = IgnoreFilter::new(dir.path(), None);
        assert!(filter.is_ignored(Path::new(".git"), true));
        assert!(filter.is_ignored(Path::new(".git/HEAD"), false));
        assert!(filter.is_ignored(Path::new("out/kjv.ir.json"), false));
        assert!(!filter.is_ignored(Path::new("modules/kjv.bblx"), false));
        assert!(!filter.is_ignored(Path::new("kjv.osis.xml"), false));
    }

    #[test]
    fn test_extra_excludes_and_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "drafts/\n").unwrap();
        let extra = vec!["*.vpl".to_string()];
        let filter = IgnoreFilter::new(dir.path(), Some(&extra));
        assert!(filter.is_ignored(Path::new("gen.vpl"), false));
        assert!(filter.is_ignored(Path::new("drafts/gen.osis"), false));
        assert!(!filter.is_ignored(Path::new("gen.osis"), false));
    }
}
