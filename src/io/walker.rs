use crate::core::errors::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

pub struct SourceWalker {
    root: PathBuf,
    ignore_patterns: Vec<String>,
}

impl SourceWalker {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ignore_patterns: vec![],
        }
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Collect the Python files under the root, honoring gitignore,
    /// sorted by path for deterministic downstream processing.
    pub fn walk(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| {
                crate::core::errors::Error::Configuration(format!("walk failed: {e}"))
            })?;
            let path = entry.path();

            if path.is_file() && self.should_process(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    fn should_process(&self, path: &Path) -> bool {
        let is_python = path
            .extension()
            .map(|ext| ext == "py")
            .unwrap_or(false);
        if !is_python {
            return false;
        }

        let path_str = path.to_string_lossy();
        for pattern in &self.ignore_patterns {
            if glob::Pattern::new(pattern)
                .map(|p| p.matches(&path_str))
                .unwrap_or(false)
            {
                return false;
            }
        }
        true
    }
}

pub fn find_source_files(root: &Path, ignore_patterns: &[String]) -> Result<Vec<PathBuf>> {
    SourceWalker::new(root.to_path_buf())
        .with_ignore_patterns(ignore_patterns.to_vec())
        .walk()
}
