//! `.mmmignore` handling
//!
//! Patterns are globs matched against paths relative to the mod list's
//! directory, one per line. `**` spans any number of directories while `*`
//! stays inside one path segment. Files ending in `.disabled` are always
//! ignored.

use crate::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

pub const IGNORE_FILE_NAME: &str = ".mmmignore";

/// Applied before any user pattern
pub const DISABLED_PATTERN: &str = "**/*.disabled";

#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    root: PathBuf,
    patterns: Vec<String>,
    set: GlobSet,
}

impl IgnoreMatcher {
    /// Read `<root>/.mmmignore`; a missing file only yields the built-in pattern
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(IGNORE_FILE_NAME);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::io(&path, e)),
        };

        let lines = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string);

        Ok(Self::from_patterns(root, lines))
    }

    pub fn from_patterns<I>(root: &Path, patterns: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut all = vec![DISABLED_PATTERN.to_string()];
        all.extend(patterns);

        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(all.len());
        for pattern in all {
            match GlobBuilder::new(&pattern).literal_separator(true).build() {
                Ok(glob) => {
                    builder.add(glob);
                    kept.push(pattern);
                }
                Err(e) => warn!(pattern = %pattern, error = %e, "skipping invalid ignore pattern"),
            }
        }

        let set = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "could not compile ignore patterns");
            GlobSet::empty()
        });

        Self {
            root: absolute(root).unwrap_or_else(|| root.to_path_buf()),
            patterns: kept,
            set,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True when `path` matches a pattern; paths outside the root never do
    pub fn is_ignored(&self, path: &Path) -> bool {
        match self.relative(path) {
            Some(relative) => self.set.is_match(relative.as_str()),
            None => false,
        }
    }

    /// Slash-separated path relative to the root, without `./`
    ///
    /// Relative paths are taken against the working directory, the same way
    /// the root itself is.
    fn relative(&self, path: &Path) -> Option<String> {
        let path = absolute(path)?;
        let rest = path.strip_prefix(&self.root).ok()?;
        let mut segments = Vec::new();
        for component in rest.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(segments.join("/"))
    }
}

/// Lexically absolute path; an empty path is the working directory
fn absolute(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        return std::env::current_dir().ok();
    }
    std::path::absolute(path).ok()
}
