//! Putting verified mod jars on disk
//!
//! Downloads are staged next to their destination, checked against the
//! expected SHA-1 and only then swapped into place, so a failed or tampered
//! download never replaces a working file.
//!
//! # Examples
//!
//! ```no_run
//! use mmm::{ensure_locked_file, Config, LockFile, Metadata, ModsConfig, SyncContext};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let meta = Metadata::new("modlist.json");
//! let config = ModsConfig::load(&meta)?;
//! let lock = LockFile::ensure(&meta)?;
//! let ctx = SyncContext::from_config(&Config::load()?)?;
//!
//! for entry in &lock.entries {
//!     let outcome = ensure_locked_file(&meta.mods_folder_path(&config), entry, &ctx).await?;
//!     println!("{}: {:?}", entry.file_name, outcome);
//! }
//! # Ok(())
//! # }
//! ```

use crate::atomic::{replace_file, sibling_path};
use crate::fingerprint::{hashes_match, sha1_file};
use crate::lockfile::LockEntry;
use crate::modpath::{resolve_writable, validate_file_name};
use crate::registry::{Downloader, SyncContext};
use crate::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Why a locked file had to be downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadReason {
    Missing,
    HashMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    AlreadyPresent,
    Downloaded(DownloadReason),
}

impl EnsureOutcome {
    pub fn downloaded(&self) -> bool {
        matches!(self, EnsureOutcome::Downloaded(_))
    }
}

/// Make sure the file a lock entry describes is present with the right hash
///
/// A missing file, or one whose content drifted, is downloaded again from the
/// locked URL.
pub async fn ensure_locked_file(
    mods_dir: &Path,
    entry: &LockEntry,
    ctx: &SyncContext,
) -> Result<EnsureOutcome> {
    let file_name = validate_file_name(&entry.file_name)?;
    if entry.download_url.trim().is_empty() {
        return Err(Error::MissingDownloadUrl { file_name });
    }
    let expected = entry.hash.trim();
    if expected.is_empty() {
        return Err(Error::MissingHash { file_name });
    }

    fs::create_dir_all(mods_dir).map_err(|e| Error::io(mods_dir, e))?;
    let destination = resolve_writable(mods_dir, &mods_dir.join(&file_name))?;

    let reason = if destination.exists() {
        let actual = sha1_file(&destination)?;
        if hashes_match(expected, &actual) {
            return Ok(EnsureOutcome::AlreadyPresent);
        }
        debug!(file = %file_name, expected, actual = %actual, "local file drifted");
        DownloadReason::HashMismatch
    } else {
        DownloadReason::Missing
    };

    download_and_verify(
        &entry.download_url,
        &destination,
        expected,
        ctx.downloader.as_ref(),
        &ctx.cancel,
    )
    .await?;

    Ok(EnsureOutcome::Downloaded(reason))
}

/// Download `url`, check its SHA-1 and move it over `destination`
///
/// On any failure the staged file is removed and `destination` keeps its
/// previous content.
pub async fn download_and_verify(
    url: &str,
    destination: &Path,
    expected_hash: &str,
    downloader: &dyn Downloader,
    cancel: &CancellationToken,
) -> Result<()> {
    let file_name = display_name(destination);
    if expected_hash.trim().is_empty() {
        return Err(Error::MissingHash { file_name });
    }

    let staged = sibling_path(destination, "tmp")?;

    if let Err(e) = downloader.download(url, &staged, cancel).await {
        return Err(discard_staged(&staged, e));
    }

    let actual = match sha1_file(&staged) {
        Ok(actual) => actual,
        Err(e) => return Err(discard_staged(&staged, e)),
    };

    if !hashes_match(expected_hash, &actual) {
        let mismatch = Error::HashMismatch {
            file_name,
            expected: expected_hash.trim().to_string(),
            actual,
        };
        return Err(discard_staged(&staged, mismatch));
    }

    replace_file(&staged, destination)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Remove a staged download, keeping `error` as the primary failure
fn discard_staged(staged: &Path, error: Error) -> Error {
    match fs::remove_file(staged) {
        Ok(()) => error,
        Err(e) if e.kind() == ErrorKind::NotFound => error,
        Err(e) => Error::join(error, vec![Error::io(staged, e)]),
    }
}
