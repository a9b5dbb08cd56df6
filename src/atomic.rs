//! Crash-safe file replacement
//!
//! [`write_atomic`] stages the payload in a sibling temp file and renames it
//! over the target, so the target always holds either the old bytes or the
//! new ones. When the filesystem refuses to rename over an existing file the
//! old file is moved to a sibling backup first and put back if the swap
//! fails. [`replace_file`] exposes the backup swap for callers that staged
//! the new file themselves, such as downloaded mod jars.

use crate::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How many sibling names are tried before giving up
pub const MAX_SIBLING_ATTEMPTS: usize = 100;

const TEMP_SUFFIX: &str = "tmp";
const BACKUP_SUFFIX: &str = "bak";

/// The filesystem calls the writer depends on
pub(crate) trait FileOps {
    fn write_new(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> io::Result<bool>;
}

pub(crate) struct StdFs;

impl FileOps for StdFs {
    fn write_new(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        match fs::symlink_metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Replace `target` with `bytes` without ever leaving it missing or truncated
pub fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_with(&StdFs, target, bytes)
}

/// Move an already written `staged` file over `target`
///
/// An existing target is renamed to a backup, the staged file takes its
/// place and the backup is deleted. If the second rename fails the backup is
/// restored. A backup that cannot be deleted afterwards is only logged.
pub fn replace_file(staged: &Path, target: &Path) -> Result<()> {
    replace_file_with(&StdFs, staged, target)
}

/// First unused `target.<suffix>`, `target.<suffix>.1`, ... name
pub fn sibling_path(target: &Path, suffix: &str) -> Result<PathBuf> {
    sibling_path_with(&StdFs, target, suffix)
}

pub(crate) fn sibling_path_with(ops: &dyn FileOps, target: &Path, suffix: &str) -> Result<PathBuf> {
    let base = target.as_os_str().to_owned();
    for attempt in 0..MAX_SIBLING_ATTEMPTS {
        let mut candidate = base.clone();
        if attempt == 0 {
            candidate.push(format!(".{}", suffix));
        } else {
            candidate.push(format!(".{}.{}", suffix, attempt));
        }
        let candidate = PathBuf::from(candidate);
        if !ops.exists(&candidate).map_err(|e| Error::io(&candidate, e))? {
            return Ok(candidate);
        }
    }
    Err(Error::SiblingPathExhausted {
        path: target.to_path_buf(),
    })
}

pub(crate) fn write_atomic_with(ops: &dyn FileOps, target: &Path, bytes: &[u8]) -> Result<()> {
    let temp = sibling_path_with(ops, target, TEMP_SUFFIX)?;

    if let Err(e) = ops.write_new(&temp, bytes) {
        return Err(cleanup_temp(ops, &temp, Error::io(&temp, e)));
    }

    let target_exists = match ops.exists(target) {
        Ok(exists) => exists,
        Err(e) => return Err(cleanup_temp(ops, &temp, Error::io(target, e))),
    };

    match ops.rename(&temp, target) {
        Ok(()) => Ok(()),
        Err(e) if !target_exists => Err(cleanup_temp(ops, &temp, Error::io(target, e))),
        Err(e) => {
            debug!(path = %target.display(), error = %e, "direct rename failed, swapping through a backup");
            replace_existing(ops, &temp, target)
        }
    }
}

pub(crate) fn replace_file_with(ops: &dyn FileOps, staged: &Path, target: &Path) -> Result<()> {
    let target_exists = match ops.exists(target) {
        Ok(exists) => exists,
        Err(e) => return Err(cleanup_temp(ops, staged, Error::io(target, e))),
    };

    if !target_exists {
        return ops
            .rename(staged, target)
            .map_err(|e| cleanup_temp(ops, staged, Error::io(target, e)));
    }

    replace_existing(ops, staged, target)
}

fn replace_existing(ops: &dyn FileOps, staged: &Path, target: &Path) -> Result<()> {
    let backup = match sibling_path_with(ops, target, BACKUP_SUFFIX) {
        Ok(backup) => backup,
        Err(e) => return Err(cleanup_temp(ops, staged, e)),
    };

    if let Err(e) = ops.rename(target, &backup) {
        return Err(cleanup_temp(ops, staged, Error::io(target, e)));
    }

    if let Err(e) = ops.rename(staged, target) {
        let mut rollback = Vec::new();
        if let Err(restore) = ops.rename(&backup, target) {
            rollback.push(Error::io(&backup, restore));
        }
        if let Err(remove) = ops.remove_file(staged) {
            if remove.kind() != ErrorKind::NotFound {
                rollback.push(Error::io(staged, remove));
            }
        }
        return Err(Error::join(Error::io(target, e), rollback));
    }

    if let Err(e) = ops.remove_file(&backup) {
        debug!(path = %backup.display(), error = %e, "could not remove backup");
    }

    Ok(())
}

fn cleanup_temp(ops: &dyn FileOps, temp: &Path, err: Error) -> Error {
    match ops.remove_file(temp) {
        Ok(()) => err,
        Err(e) if e.kind() == ErrorKind::NotFound => err,
        Err(e) => Error::join(err, vec![Error::io(temp, e)]),
    }
}
