//! Content identity matching for files the lock does not know about
//!
//! Each file is hashed twice: SHA-1 for Modrinth and the CurseForge
//! fingerprint. All fingerprints go to CurseForge in one deduplicated batch,
//! while every SHA-1 is looked up on Modrinth separately. Hits for a file are
//! ordered Modrinth first, then by project id.

use crate::fanout::fan_out;
use crate::fingerprint::{fingerprint_file, sha1_file};
use crate::ignore::IgnoreMatcher;
use crate::lockfile::LockFile;
use crate::manifest::Platform;
use crate::registry::{ModCatalog, SyncContext};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

/// A remote project a file is known to belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityHit {
    pub platform: Platform,
    pub project_id: String,
    pub project_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub sha1: String,
    pub fingerprint: u32,
    pub hits: Vec<IdentityHit>,
}

/// `.jar` files directly inside `mods_dir` that are neither ignored nor locked
///
/// A mods folder that does not exist yet has no candidates.
pub fn unmanaged_candidates(
    mods_dir: &Path,
    ignore: &IgnoreMatcher,
    lock: &LockFile,
) -> Result<Vec<PathBuf>> {
    if !mods_dir.exists() {
        return Ok(Vec::new());
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(mods_dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(mods_dir, e))?;
        if entry.file_type().is_dir() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !file_name.to_lowercase().ends_with(".jar") {
            continue;
        }
        if ignore.is_ignored(entry.path()) || lock.has_file(&file_name) {
            continue;
        }
        candidates.push(entry.path().to_path_buf());
    }

    Ok(candidates)
}

fn walk_error(root: &Path, e: walkdir::Error) -> Error {
    let path = e.path().unwrap_or(root).to_path_buf();
    match e.into_io_error() {
        Some(io) => Error::io(path, io),
        None => Error::io(path, std::io::Error::new(ErrorKind::Other, "filesystem loop")),
    }
}

/// Hash every file and ask both catalogs who owns it
pub async fn identify_files(paths: &[PathBuf], ctx: &SyncContext) -> Result<Vec<ScannedFile>> {
    let mut scanned = Vec::with_capacity(paths.len());
    for path in paths {
        scanned.push(ScannedFile {
            path: path.clone(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            sha1: sha1_file(path)?,
            fingerprint: fingerprint_file(path)?,
            hits: Vec::new(),
        });
    }

    if scanned.is_empty() {
        return Ok(scanned);
    }

    let mut names = NameCache::default();

    let fingerprints: Vec<u32> = scanned
        .iter()
        .map(|f| f.fingerprint)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let matches = ctx
        .catalog
        .match_by_fingerprint(Platform::Curseforge, &fingerprints, &ctx.cancel)
        .await?;

    for found in matches {
        let name = names
            .get(ctx.catalog.as_ref(), Platform::Curseforge, &found.project_id, &ctx.cancel)
            .await?;
        for file in scanned.iter_mut().filter(|f| f.fingerprint == found.fingerprint) {
            file.hits.push(IdentityHit {
                platform: Platform::Curseforge,
                project_id: found.project_id.clone(),
                project_name: name.clone(),
            });
        }
    }

    let hashes: Vec<String> = scanned.iter().map(|f| f.sha1.clone()).collect();
    let catalog = ctx.catalog.clone();
    let cancel = ctx.cancel.clone();
    let lookups = fan_out(hashes, move |hash| {
        let catalog = catalog.clone();
        let cancel = cancel.clone();
        async move {
            match catalog.match_by_hash(Platform::Modrinth, &hash, &cancel).await {
                Ok(found) => Ok(Some(found.project_id)),
                Err(Error::VersionNotFound { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        }
    })
    .await;

    for (file, lookup) in scanned.iter_mut().zip(lookups) {
        let lookup = lookup.ok_or_else(|| {
            Error::Other(format!("Hash lookup for {} did not finish", file.file_name))
        })?;
        let Some(project_id) = lookup? else {
            continue;
        };
        let name = names
            .get(ctx.catalog.as_ref(), Platform::Modrinth, &project_id, &ctx.cancel)
            .await?;
        file.hits.push(IdentityHit {
            platform: Platform::Modrinth,
            project_id,
            project_name: name,
        });
    }

    for file in &mut scanned {
        sort_hits(&mut file.hits);
        debug!(file = %file.file_name, hits = file.hits.len(), "identified");
    }

    Ok(scanned)
}

/// Modrinth before CurseForge, then by project id, without duplicates
pub fn sort_hits(hits: &mut Vec<IdentityHit>) {
    hits.sort_by(|a, b| {
        (a.platform != Platform::Modrinth, &a.project_id)
            .cmp(&(b.platform != Platform::Modrinth, &b.project_id))
    });
    hits.dedup_by(|a, b| a.platform == b.platform && a.project_id == b.project_id);
}

/// One name lookup per distinct project
#[derive(Default)]
struct NameCache {
    names: HashMap<(Platform, String), String>,
}

impl NameCache {
    async fn get(
        &mut self,
        catalog: &dyn ModCatalog,
        platform: Platform,
        project_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let key = (platform, project_id.to_string());
        if let Some(name) = self.names.get(&key) {
            return Ok(name.clone());
        }
        let name = catalog.project_name(platform, project_id, cancel).await?;
        self.names.insert(key, name.clone());
        Ok(name)
    }
}
