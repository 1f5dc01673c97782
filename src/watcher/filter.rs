//! Path filtering for tracked files and directories.
//!
//! Pure predicates: whether a path is trackable depends only on the
//! configured rule sets and the path itself.

use std::collections::HashSet;
use std::path::{Component, Path};

/// Configured rule sets for path filtering.
#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    ignored_files: HashSet<String>,
    ignored_extensions: HashSet<String>,
    ignored_directories: HashSet<String>,
    included_file_prefixes: Vec<String>,
    included_directories: HashSet<String>,
}

impl FilterRules {
    /// Build rule sets from raw configuration lists.
    ///
    /// Extensions are normalized (leading dot stripped, lowercased);
    /// prefixes are lowercased for case-insensitive matching.
    #[must_use]
    pub fn new(
        ignored_files: Vec<String>,
        ignored_extensions: Vec<String>,
        ignored_directories: Vec<String>,
        included_file_prefixes: Vec<String>,
        included_directories: Vec<String>,
    ) -> Self {
        Self {
            ignored_files: ignored_files.into_iter().collect(),
            ignored_extensions: ignored_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            ignored_directories: ignored_directories.into_iter().collect(),
            included_file_prefixes: included_file_prefixes
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
            included_directories: included_directories.into_iter().collect(),
        }
    }
}

/// Decides whether file and directory paths should be tracked.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    rules: FilterRules,
}

impl PathFilter {
    /// Create a filter over the given rule sets.
    #[must_use]
    pub fn new(rules: FilterRules) -> Self {
        Self { rules }
    }

    /// Check whether a file path should be tracked.
    ///
    /// A file is rejected if its base name or extension is ignored, if a
    /// non-empty included-prefix set matches none of its name (case
    /// insensitively), or if a non-empty included-directories set matches no
    /// segment of its parent path.
    #[must_use]
    pub fn is_file_trackable(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        if self.rules.ignored_files.contains(name) {
            return false;
        }

        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if self.rules.ignored_extensions.contains(&ext.to_lowercase()) {
                return false;
            }
        }

        if !self.rules.included_file_prefixes.is_empty() {
            let lower_name = name.to_lowercase();
            if !self
                .rules
                .included_file_prefixes
                .iter()
                .any(|prefix| lower_name.starts_with(prefix))
            {
                return false;
            }
        }

        if !self.rules.included_directories.is_empty() {
            let Some(parent) = path.parent() else {
                return false;
            };
            if !segments(parent).any(|seg| self.rules.included_directories.contains(seg)) {
                return false;
            }
        }

        true
    }

    /// Check whether a directory path should be tracked.
    ///
    /// Rejected when any path segment equals an ignored-directory name.
    #[must_use]
    pub fn is_directory_trackable(&self, path: &Path) -> bool {
        !segments(path).any(|seg| self.rules.ignored_directories.contains(seg))
    }
}

fn segments(path: &Path) -> impl Iterator<Item = &str> {
    path.components().filter_map(|c| match c {
        Component::Normal(name) => name.to_str(),
        _ => None,
    })
}
