//! Install reconciliation
//!
//! An install run makes the mods folder match the mod list and lock file:
//!
//! 1. Preflight: jars the lock does not know about are identified remotely.
//!    A file that belongs to a declared mod but cannot be reconciled (no lock
//!    entry yet, or a hash that disagrees with the lock) stops the run before
//!    anything is touched.
//! 2. Fetch: every declared mod without a lock entry is resolved against its
//!    catalog, all of them concurrently.
//! 3. Ensure: mods are processed one at a time in declaration order. Locked
//!    files are checked and re-downloaded when missing or drifted, new mods
//!    are downloaded, verified and appended to the lock.
//! 4. Persist: the lock and then the mod list are written atomically.
//!
//! Expected remote errors and integrity errors fail only the mod they belong
//! to. Anything else stops the run after the work done so far is persisted.

use crate::fanout::fan_out;
use crate::fingerprint::hashes_match;
use crate::identify::{identify_files, unmanaged_candidates, IdentityHit, ScannedFile};
use crate::ignore::IgnoreMatcher;
use crate::installer::{download_and_verify, ensure_locked_file, EnsureOutcome};
use crate::lockfile::{LockEntry, LockFile};
use crate::manifest::{Metadata, ModEntry, ModsConfig, Platform};
use crate::modpath::{resolve_writable, validate_file_name};
use crate::registry::{FetchOptions, RemoteMod, SyncContext};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// How a reconciliation run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NothingToDo,
    Completed,
    PartialFailure,
}

/// A declared mod that could not be installed or updated
#[derive(Debug)]
pub struct ModFailure {
    pub platform: Platform,
    pub project_id: String,
    pub name: String,
    pub error: Error,
}

/// A jar identified remotely that no declared mod claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmanagedFile {
    pub file_name: String,
    pub hits: Vec<IdentityHit>,
}

/// A jar that belongs to a declared mod but disagrees with the lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    LockMissing { file_name: String, mod_name: String },
    HashMismatch { file_name: String, mod_name: String },
}

impl Unresolved {
    pub fn file_name(&self) -> &str {
        match self {
            Unresolved::LockMissing { file_name, .. } | Unresolved::HashMismatch { file_name, .. } => {
                file_name
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Preflight {
    pub unresolved: Vec<Unresolved>,
    pub unmanaged: Vec<UnmanagedFile>,
}

#[derive(Debug, Default)]
pub struct InstallReport {
    /// Mods installed for the first time
    pub installed: Vec<String>,
    /// Locked files downloaded again because they were missing or drifted
    pub restored: Vec<String>,
    pub already_present: Vec<String>,
    pub failures: Vec<ModFailure>,
    pub unmanaged: Vec<UnmanagedFile>,
}

impl InstallReport {
    /// Downloads performed
    pub fn changes(&self) -> usize {
        self.installed.len() + self.restored.len()
    }

    pub fn outcome(&self) -> Outcome {
        if !self.failures.is_empty() {
            Outcome::PartialFailure
        } else if self.changes() == 0 {
            Outcome::NothingToDo
        } else {
            Outcome::Completed
        }
    }
}

/// Constraints a declared mod puts on the file a catalog picks
pub fn fetch_options(config: &ModsConfig, entry: &ModEntry) -> FetchOptions {
    FetchOptions {
        allowed_release_types: entry.effective_release_types(&config.default_allowed_release_types),
        game_version: config.game_version.clone(),
        loader: config.loader,
        allow_fallback: entry.allows_fallback(),
        fixed_version: entry.pinned_version().map(str::to_string),
    }
}

/// Sort identified files into unmanaged and unresolved ones
///
/// The first hit belonging to a declared mod decides which mod a file is
/// checked against. Files without any hit are left alone.
pub fn classify(scanned: &[ScannedFile], config: &ModsConfig, lock: &LockFile) -> Preflight {
    let mut preflight = Preflight::default();

    for file in scanned {
        if file.hits.is_empty() {
            debug!(file = %file.file_name, "no remote match");
            continue;
        }

        let declared = file
            .hits
            .iter()
            .find_map(|hit| config.find_mod(hit.platform, &hit.project_id));

        let Some(index) = declared else {
            preflight.unmanaged.push(UnmanagedFile {
                file_name: file.file_name.clone(),
                hits: file.hits.clone(),
            });
            continue;
        };

        let declared = &config.mods[index];
        match lock.get(declared.platform, &declared.id) {
            None => preflight.unresolved.push(Unresolved::LockMissing {
                file_name: file.file_name.clone(),
                mod_name: declared.name.clone(),
            }),
            Some(entry) if !hashes_match(&entry.hash, &file.sha1) => {
                preflight.unresolved.push(Unresolved::HashMismatch {
                    file_name: file.file_name.clone(),
                    mod_name: declared.name.clone(),
                })
            }
            Some(_) => {}
        }
    }

    preflight
}

/// Identify unknown jars in the mods folder and classify them
pub async fn preflight(
    meta: &Metadata,
    config: &ModsConfig,
    lock: &LockFile,
    ctx: &SyncContext,
) -> Result<Preflight> {
    let ignore = IgnoreMatcher::load(&meta.dir())?;
    let candidates = unmanaged_candidates(&meta.mods_folder_path(config), &ignore, lock)?;
    if candidates.is_empty() {
        return Ok(Preflight::default());
    }

    debug!(count = candidates.len(), "identifying unknown files");
    let scanned = identify_files(&candidates, ctx).await?;
    Ok(classify(&scanned, config, lock))
}

/// Run an install against the mod list at `meta`
pub async fn run_install(meta: &Metadata, ctx: &SyncContext) -> Result<InstallReport> {
    let mut config = ModsConfig::load(meta)?;
    let mut lock = LockFile::ensure(meta)?;

    let preflight = preflight(meta, &config, &lock, ctx).await?;
    for file in &preflight.unmanaged {
        let name = file.hits.first().map(|h| h.project_name.as_str()).unwrap_or("");
        info!(file = %file.file_name, project = %name, "found unmanaged mod");
    }
    if !preflight.unresolved.is_empty() {
        for item in &preflight.unresolved {
            match item {
                Unresolved::LockMissing { file_name, mod_name } => {
                    warn!(file = %file_name, name = %mod_name, "file belongs to a mod without a lock entry")
                }
                Unresolved::HashMismatch { file_name, mod_name } => {
                    warn!(file = %file_name, name = %mod_name, "file does not match the locked hash")
                }
            }
        }
        return Err(Error::UnresolvedFiles {
            files: preflight.unresolved.iter().map(|u| u.file_name().to_string()).collect(),
        });
    }

    let mods_dir = meta.mods_folder_path(&config);
    fs::create_dir_all(&mods_dir).map_err(|e| Error::io(&mods_dir, e))?;

    let mut report = InstallReport {
        unmanaged: preflight.unmanaged,
        ..InstallReport::default()
    };

    let result = reconcile(&mods_dir, &mut config, &mut lock, &mut report, ctx).await;
    let persisted = persist(meta, &config, &lock);

    match (result, persisted) {
        (Ok(()), Ok(())) => Ok(report),
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(e)) => Err(e),
        (Err(e), Err(persist_err)) => Err(Error::join(e, vec![persist_err])),
    }
}

/// Lock first, then the mod list
pub(crate) fn persist(meta: &Metadata, config: &ModsConfig, lock: &LockFile) -> Result<()> {
    lock.save(meta)?;
    config.save(meta)
}

async fn reconcile(
    mods_dir: &Path,
    config: &mut ModsConfig,
    lock: &mut LockFile,
    report: &mut InstallReport,
    ctx: &SyncContext,
) -> Result<()> {
    let mut fetched = fetch_unlocked(config, lock, ctx).await;

    for index in 0..config.mods.len() {
        let declared = config.mods[index].clone();

        if let Some(entry) = lock.get(declared.platform, &declared.id) {
            match ensure_locked_file(mods_dir, entry, ctx).await {
                Ok(EnsureOutcome::AlreadyPresent) => {
                    debug!(name = %declared.name, "already present");
                    report.already_present.push(declared.name.clone());
                }
                Ok(EnsureOutcome::Downloaded(reason)) => {
                    info!(name = %declared.name, reason = ?reason, "restored locked file");
                    report.restored.push(declared.name.clone());
                }
                Err(e) => record_failure(&mut report.failures, &declared, e)?,
            }
            continue;
        }

        let remote = fetched.remove(&index).unwrap_or_else(|| {
            Err(Error::Other(format!("Lookup for {} did not finish", declared.name)))
        });

        let installed = match remote {
            Ok(remote) => install_new(mods_dir, &declared, remote, ctx).await,
            Err(e) => Err(e),
        };

        match installed {
            Ok(entry) => {
                info!(name = %entry.name, file = %entry.file_name, "installed");
                config.mods[index].name = entry.name.clone();
                report.installed.push(entry.name.clone());
                lock.upsert(entry);
            }
            Err(e) => record_failure(&mut report.failures, &declared, e)?,
        }
    }

    Ok(())
}

/// Resolve every declared mod without a lock entry, concurrently
async fn fetch_unlocked(
    config: &ModsConfig,
    lock: &LockFile,
    ctx: &SyncContext,
) -> HashMap<usize, Result<RemoteMod>> {
    let pending: Vec<(usize, Platform, String, FetchOptions)> = config
        .mods
        .iter()
        .enumerate()
        .filter(|(_, m)| lock.find(m.platform, &m.id).is_none())
        .map(|(i, m)| (i, m.platform, m.id.clone(), fetch_options(config, m)))
        .collect();

    let indices: Vec<usize> = pending.iter().map(|(i, ..)| *i).collect();
    let catalog = ctx.catalog.clone();
    let cancel = ctx.cancel.clone();

    let results = fan_out(pending, move |(_, platform, id, options)| {
        let catalog = catalog.clone();
        let cancel = cancel.clone();
        async move { catalog.fetch_mod(platform, &id, &options, &cancel).await }
    })
    .await;

    indices
        .into_iter()
        .zip(results)
        .filter_map(|(index, result)| result.map(|r| (index, r)))
        .collect()
}

async fn install_new(
    mods_dir: &Path,
    declared: &ModEntry,
    remote: RemoteMod,
    ctx: &SyncContext,
) -> Result<LockEntry> {
    let file_name = validate_file_name(&remote.file_name)?;
    if remote.hash.trim().is_empty() {
        return Err(Error::MissingHash { file_name });
    }
    if remote.download_url.trim().is_empty() {
        return Err(Error::MissingDownloadUrl { file_name });
    }

    let destination = resolve_writable(mods_dir, &mods_dir.join(&file_name))?;
    download_and_verify(
        &remote.download_url,
        &destination,
        &remote.hash,
        ctx.downloader.as_ref(),
        &ctx.cancel,
    )
    .await?;

    Ok(LockEntry {
        platform: declared.platform,
        id: declared.id.clone(),
        name: remote.name,
        file_name,
        released_on: remote.release_date,
        hash: remote.hash.trim().to_string(),
        download_url: remote.download_url,
    })
}

/// Keep per-mod errors in `failures`; hand back anything else
pub(crate) fn record_failure(failures: &mut Vec<ModFailure>, declared: &ModEntry, error: Error) -> Result<()> {
    if !error.is_per_item() {
        return Err(error);
    }
    warn!(name = %declared.name, platform = %declared.platform, project_id = %declared.id, error = %error, "mod failed");
    failures.push(ModFailure {
        platform: declared.platform,
        project_id: declared.id.clone(),
        name: declared.name.clone(),
        error,
    });
    Ok(())
}
