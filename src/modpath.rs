//! Safe destinations inside the mods folder
//!
//! Every mod jar is written through [`resolve_writable`], which follows
//! symlinks the way the OS would on write and refuses any destination whose
//! physical location is outside the mods folder. File names coming from the
//! lock file or a remote catalog are checked with [`validate_file_name`]
//! before they are joined to the folder at all.

use crate::error::FileNameReason;
use crate::{Error, Result};
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Symlink hops followed before a destination is considered unresolvable
const MAX_LINK_HOPS: usize = 40;

/// Resolve `destination` to the physical path a write would land on
///
/// Fails with [`Error::OutsideRoot`] when that path is not inside the
/// physical location of `root`.
pub fn resolve_writable(root: &Path, destination: &Path) -> Result<PathBuf> {
    if !cfg!(any(unix, windows)) {
        return Ok(destination.to_path_buf());
    }

    let resolved_root = dunce::canonicalize(root).map_err(|e| Error::io(root, e))?;

    let mut candidate = destination.to_path_buf();
    for _ in 0..MAX_LINK_HOPS {
        match fs::symlink_metadata(&candidate) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = fs::read_link(&candidate).map_err(|e| Error::io(&candidate, e))?;
                candidate = if target.is_absolute() {
                    target
                } else {
                    parent_dir(&candidate).join(target)
                };
            }
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::NotFound => break,
            Err(e) => return Err(Error::io(&candidate, e)),
        }
    }

    let resolved = resolve_parent(&candidate)?;
    if resolved.strip_prefix(&resolved_root).is_ok() {
        Ok(resolved)
    } else {
        Err(Error::OutsideRoot {
            path: destination.to_path_buf(),
            resolved,
            root: resolved_root,
        })
    }
}

/// Canonicalize the parent directory and re-attach the base name
fn resolve_parent(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::Other(format!("Not a file path: {}", path.display())))?;
    let parent = parent_dir(path);
    let resolved_parent = dunce::canonicalize(&parent).map_err(|e| Error::io(&parent, e))?;
    Ok(resolved_parent.join(name))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn has_drive_letter(value: &str) -> bool {
    static DRIVE_LETTER: OnceLock<Option<Regex>> = OnceLock::new();
    DRIVE_LETTER
        .get_or_init(|| Regex::new(r"^[A-Za-z]:").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

/// Check a mod file name and return it trimmed
///
/// A valid name is a bare `.jar` file name: no separators, no drive letter,
/// no UNC prefix.
pub fn validate_file_name(value: &str) -> Result<String> {
    let trimmed = value.trim();
    let reject = |reason| {
        Err(Error::InvalidFileName {
            value: value.to_string(),
            reason,
        })
    };

    if trimmed.is_empty() {
        return reject(FileNameReason::Empty);
    }
    if trimmed.starts_with("\\\\") || trimmed.starts_with("//") {
        return reject(FileNameReason::UncPath);
    }
    if has_drive_letter(trimmed) {
        return reject(FileNameReason::DriveLetter);
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return reject(FileNameReason::PathSeparator);
    }
    if !trimmed.to_ascii_lowercase().ends_with(".jar") {
        return reject(FileNameReason::Extension);
    }

    Ok(trimmed.to_string())
}
