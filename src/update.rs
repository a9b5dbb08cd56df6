//! Update reconciliation
//!
//! An update starts with a full install so every locked file is known to be
//! on disk. Each unpinned mod is then checked against its catalog
//! concurrently; checks only read. The swaps they call for are applied one
//! mod at a time, and the lock is rewritten after every successful swap.

use crate::fanout::fan_out;
use crate::fingerprint::hashes_match;
use crate::install::{fetch_options, persist, record_failure, run_install, InstallReport, ModFailure, Outcome};
use crate::installer::download_and_verify;
use crate::lockfile::{LockEntry, LockFile};
use crate::manifest::{Metadata, ModEntry, ModsConfig};
use crate::modpath::{resolve_writable, validate_file_name};
use crate::registry::{FetchOptions, ModCatalog, RemoteMod, SyncContext};
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a check decided for one declared mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    Pinned { name: String },
    UpToDate { name: String },
    Update(PlannedUpdate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    pub lock_index: usize,
    pub old_file: String,
    pub new_file: String,
    pub remote: RemoteMod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedMod {
    pub name: String,
    pub old_file: String,
    pub new_file: String,
}

#[derive(Debug, Default)]
pub struct UpdateReport {
    pub install: InstallReport,
    pub updated: Vec<UpdatedMod>,
    pub pinned: Vec<String>,
    pub up_to_date: Vec<String>,
    pub failures: Vec<ModFailure>,
}

impl UpdateReport {
    pub fn outcome(&self) -> Outcome {
        if !self.failures.is_empty() {
            Outcome::PartialFailure
        } else if self.updated.is_empty() && self.install.changes() == 0 {
            Outcome::NothingToDo
        } else {
            Outcome::Completed
        }
    }
}

/// Run an update against the mod list at `meta`
pub async fn run_update(meta: &Metadata, ctx: &SyncContext) -> Result<UpdateReport> {
    let install = run_install(meta, ctx).await?;
    if !install.unmanaged.is_empty() {
        return Err(Error::UnmanagedFiles {
            files: install.unmanaged.iter().map(|u| u.file_name.clone()).collect(),
        });
    }
    if !install.failures.is_empty() {
        return Err(Error::InstallIncomplete {
            failed: install.failures.len(),
        });
    }

    let mut config = ModsConfig::load(meta)?;
    let mut lock = LockFile::ensure(meta)?;
    let mods_dir = meta.mods_folder_path(&config);

    let mut report = UpdateReport {
        install,
        ..UpdateReport::default()
    };

    let result = apply_checks(meta, &mods_dir, &mut config, &mut lock, &mut report, ctx).await;
    let persisted = persist(meta, &config, &lock);

    if result.is_ok() && report.updated.is_empty() && report.failures.is_empty() {
        info!("no updates");
    }

    match (result, persisted) {
        (Ok(()), Ok(())) => Ok(report),
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(e)) => Err(e),
        (Err(e), Err(persist_err)) => Err(Error::join(e, vec![persist_err])),
    }
}

async fn apply_checks(
    meta: &Metadata,
    mods_dir: &Path,
    config: &mut ModsConfig,
    lock: &mut LockFile,
    report: &mut UpdateReport,
    ctx: &SyncContext,
) -> Result<()> {
    let checks = check_all(mods_dir, config, lock, ctx).await;

    for (index, check) in checks.into_iter().enumerate() {
        let declared = config.mods[index].clone();
        let check = check.unwrap_or_else(|| {
            Err(Error::Other(format!("Update check for {} did not finish", declared.name)))
        });

        match check {
            Ok(UpdateCheck::Pinned { name }) => {
                debug!(name = %declared.name, "pinned");
                config.mods[index].name = name;
                report.pinned.push(declared.name.clone());
            }
            Ok(UpdateCheck::UpToDate { name }) => {
                debug!(name = %declared.name, "up to date");
                config.mods[index].name = name;
                report.up_to_date.push(declared.name.clone());
            }
            Ok(UpdateCheck::Update(plan)) => {
                info!(name = %declared.name, from = %plan.old_file, to = %plan.new_file, "has update");
                match apply_update(mods_dir, &declared, &plan, ctx).await {
                    Ok(entry) => {
                        config.mods[index].name = entry.name.clone();
                        report.updated.push(UpdatedMod {
                            name: entry.name.clone(),
                            old_file: plan.old_file.clone(),
                            new_file: plan.new_file.clone(),
                        });
                        lock.entries[plan.lock_index] = entry;
                        lock.save(meta)?;
                    }
                    Err(e) => record_failure(&mut report.failures, &declared, e)?,
                }
            }
            Err(e) => record_failure(&mut report.failures, &declared, e)?,
        }
    }

    Ok(())
}

async fn check_all(
    mods_dir: &Path,
    config: &ModsConfig,
    lock: &LockFile,
    ctx: &SyncContext,
) -> Vec<Option<Result<UpdateCheck>>> {
    let items: Vec<(ModEntry, FetchOptions)> = config
        .mods
        .iter()
        .map(|m| {
            let mut options = fetch_options(config, m);
            options.fixed_version = None;
            (m.clone(), options)
        })
        .collect();

    let catalog = ctx.catalog.clone();
    let cancel = ctx.cancel.clone();
    let lock = Arc::new(lock.clone());
    let mods_dir = mods_dir.to_path_buf();

    fan_out(items, move |(declared, options)| {
        let catalog = catalog.clone();
        let cancel = cancel.clone();
        let lock = lock.clone();
        let mods_dir = mods_dir.clone();
        async move {
            check_mod(&mods_dir, &declared, &options, &lock, catalog.as_ref(), &cancel).await
        }
    })
    .await
}

/// Decide whether one declared mod needs an update
///
/// Pinned mods never reach the catalog. A newer release whose hash equals
/// the locked one is not an update.
pub async fn check_mod(
    mods_dir: &Path,
    declared: &ModEntry,
    options: &FetchOptions,
    lock: &LockFile,
    catalog: &dyn ModCatalog,
    cancel: &CancellationToken,
) -> Result<UpdateCheck> {
    let lock_index = lock
        .find(declared.platform, &declared.id)
        .ok_or_else(|| Error::MissingLockEntry {
            platform: declared.platform,
            project_id: declared.id.clone(),
        })?;
    let installed = &lock.entries[lock_index];

    if declared.is_pinned() {
        return Ok(UpdateCheck::Pinned {
            name: installed.name.clone(),
        });
    }

    debug!(name = %declared.name, platform = %declared.platform, "checking for updates");
    let remote = catalog
        .fetch_mod(declared.platform, &declared.id, options, cancel)
        .await?;

    let new_file = validate_file_name(&remote.file_name)?;
    let old_file = validate_file_name(&installed.file_name)?;

    let old_path = mods_dir.join(&old_file);
    if !old_path.exists() {
        return Err(Error::LockedFileMissing { path: old_path });
    }

    let installed_on = parse_timestamp(&installed.released_on)?;
    let released_on = parse_timestamp(&remote.release_date)?;

    let up_to_date = UpdateCheck::UpToDate {
        name: remote.name.clone(),
    };
    if released_on <= installed_on {
        return Ok(up_to_date);
    }

    if installed.hash.trim().is_empty() {
        return Err(Error::MissingHash { file_name: old_file });
    }
    if remote.hash.trim().is_empty() {
        return Err(Error::MissingHash { file_name: new_file });
    }
    if hashes_match(&installed.hash, &remote.hash) {
        return Ok(up_to_date);
    }

    Ok(UpdateCheck::Update(PlannedUpdate {
        lock_index,
        old_file,
        remote: RemoteMod {
            file_name: new_file.clone(),
            ..remote
        },
        new_file,
    }))
}

fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|source| Error::InvalidTimestamp {
        value: value.to_string(),
        source,
    })
}

/// Download the planned file and retire the old one
///
/// When the old file cannot be removed the new one is removed as well, so
/// the mods folder never carries two versions of a mod.
async fn apply_update(
    mods_dir: &Path,
    declared: &ModEntry,
    plan: &PlannedUpdate,
    ctx: &SyncContext,
) -> Result<LockEntry> {
    let remote = &plan.remote;
    if remote.download_url.trim().is_empty() {
        return Err(Error::MissingDownloadUrl {
            file_name: plan.new_file.clone(),
        });
    }

    let new_path = resolve_writable(mods_dir, &mods_dir.join(&plan.new_file))?;
    download_and_verify(
        &remote.download_url,
        &new_path,
        &remote.hash,
        ctx.downloader.as_ref(),
        &ctx.cancel,
    )
    .await?;

    if plan.new_file != plan.old_file {
        if let Err(e) = remove_old(mods_dir, &plan.old_file) {
            warn!(file = %plan.old_file, error = %e, "could not remove previous version");
            let mut rollback = Vec::new();
            if let Err(remove_err) = fs::remove_file(&new_path) {
                rollback.push(Error::io(&new_path, remove_err));
            }
            return Err(Error::join(e, rollback));
        }
    }

    Ok(LockEntry {
        platform: declared.platform,
        id: declared.id.clone(),
        name: remote.name.clone(),
        file_name: plan.new_file.clone(),
        released_on: remote.release_date.clone(),
        hash: remote.hash.trim().to_string(),
        download_url: remote.download_url.clone(),
    })
}

fn remove_old(mods_dir: &Path, old_file: &str) -> Result<()> {
    let old_path = resolve_writable(mods_dir, &mods_dir.join(old_file))?;
    match fs::remove_file(&old_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(&old_path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::sha1_file;
    use crate::manifest::{Loader, Platform, ReleaseType};
    use crate::registry::Downloader;
    use crate::testing::{remote, sha1_hex, FakeCatalog, FakeDownloader, Fakes};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const OLD: &str = "2024-01-10T12:00:00Z";
    const NEW: &str = "2024-03-01T08:30:00Z";

    fn sodium(version: Option<&str>) -> ModEntry {
        ModEntry {
            platform: Platform::Modrinth,
            id: "AANobbMI".to_string(),
            allowed_release_types: None,
            name: "Sodium".to_string(),
            allow_version_fallback: None,
            version: version.map(str::to_string),
        }
    }

    /// A mod list with Sodium installed from `sodium-1.jar`
    async fn installed(temp: &TempDir, entry: ModEntry) -> (Metadata, Fakes) {
        let config = ModsConfig {
            loader: Loader::Fabric,
            game_version: "1.20.1".to_string(),
            default_allowed_release_types: vec![ReleaseType::Release],
            mods_folder: "mods".to_string(),
            mods: vec![entry],
        };
        let meta = Metadata::new(temp.path().join("modlist.json"));
        config.save(&meta).unwrap();

        let fakes = Fakes::new();
        fakes.publish(
            Platform::Modrinth,
            "AANobbMI",
            remote("Sodium", "sodium-1.jar", b"v1", OLD),
            b"v1",
        );
        run_install(&meta, &fakes.context()).await.unwrap();
        (meta, fakes)
    }

    fn options() -> FetchOptions {
        FetchOptions {
            allowed_release_types: vec![ReleaseType::Release],
            game_version: "1.20.1".to_string(),
            loader: Loader::Fabric,
            allow_fallback: false,
            fixed_version: None,
        }
    }

    #[tokio::test]
    async fn test_newer_release_replaces_old_file() {
        let temp = TempDir::new().unwrap();
        let (meta, fakes) = installed(&temp, sodium(None)).await;
        fakes.publish(
            Platform::Modrinth,
            "AANobbMI",
            remote("Sodium Renewed", "sodium-2.jar", b"v2", NEW),
            b"v2",
        );

        let report = run_update(&meta, &fakes.context()).await.unwrap();

        assert_eq!(report.outcome(), Outcome::Completed);
        assert_eq!(
            report.updated,
            vec![UpdatedMod {
                name: "Sodium Renewed".to_string(),
                old_file: "sodium-1.jar".to_string(),
                new_file: "sodium-2.jar".to_string(),
            }]
        );

        let mods = temp.path().join("mods");
        assert!(!mods.join("sodium-1.jar").exists());
        assert_eq!(sha1_file(&mods.join("sodium-2.jar")).unwrap(), sha1_hex(b"v2"));

        let lock = LockFile::load(&meta).unwrap().unwrap();
        assert_eq!(lock.entries[0].file_name, "sodium-2.jar");
        assert_eq!(lock.entries[0].released_on, NEW);
        assert_eq!(lock.entries[0].hash, sha1_hex(b"v2"));
        assert_eq!(ModsConfig::load(&meta).unwrap().mods[0].name, "Sodium Renewed");
    }

    #[tokio::test]
    async fn test_same_file_name_is_overwritten_in_place() {
        let temp = TempDir::new().unwrap();
        let (meta, fakes) = installed(&temp, sodium(None)).await;
        fakes.publish(
            Platform::Modrinth,
            "AANobbMI",
            remote("Sodium", "sodium-1.jar", b"v1 hotfix", NEW),
            b"v1 hotfix",
        );

        let report = run_update(&meta, &fakes.context()).await.unwrap();

        assert_eq!(report.updated.len(), 1);
        let path = temp.path().join("mods/sodium-1.jar");
        assert_eq!(sha1_file(&path).unwrap(), sha1_hex(b"v1 hotfix"));
    }

    #[tokio::test]
    async fn test_older_release_is_not_an_update() {
        let temp = TempDir::new().unwrap();
        let (meta, fakes) = installed(&temp, sodium(None)).await;
        fakes.publish(
            Platform::Modrinth,
            "AANobbMI",
            remote("Sodium", "sodium-0.jar", b"v0", "2023-06-01T00:00:00Z"),
            b"v0",
        );
        let downloads = fakes.downloader.call_count();

        let report = run_update(&meta, &fakes.context()).await.unwrap();

        assert_eq!(report.outcome(), Outcome::NothingToDo);
        assert_eq!(report.up_to_date, vec!["Sodium"]);
        assert_eq!(fakes.downloader.call_count(), downloads);
        assert!(temp.path().join("mods/sodium-1.jar").exists());
    }

    #[tokio::test]
    async fn test_newer_release_with_same_hash_is_not_an_update() {
        let temp = TempDir::new().unwrap();
        let (meta, fakes) = installed(&temp, sodium(None)).await;
        let mut republished = remote("Sodium", "sodium-1-renamed.jar", b"v1", NEW);
        republished.hash = republished.hash.to_uppercase();
        fakes.publish(Platform::Modrinth, "AANobbMI", republished, b"v1");
        let lock_before = fs::read(meta.lock_path()).unwrap();

        let report = run_update(&meta, &fakes.context()).await.unwrap();

        assert!(report.updated.is_empty());
        assert_eq!(fs::read(meta.lock_path()).unwrap(), lock_before);
        assert!(!temp.path().join("mods/sodium-1-renamed.jar").exists());
    }

    #[tokio::test]
    async fn test_pinned_mod_is_never_fetched() {
        let temp = TempDir::new().unwrap();
        let (meta, fakes) = installed(&temp, sodium(Some("mc1.20.1-0.5.0"))).await;
        let fetches = fakes.catalog.fetch_count();
        fakes.publish(
            Platform::Modrinth,
            "AANobbMI",
            remote("Sodium", "sodium-2.jar", b"v2", NEW),
            b"v2",
        );

        let report = run_update(&meta, &fakes.context()).await.unwrap();

        assert_eq!(report.pinned, vec!["Sodium"]);
        assert_eq!(fakes.catalog.fetch_count(), fetches);
        assert!(temp.path().join("mods/sodium-1.jar").exists());
    }

    #[tokio::test]
    async fn test_unmanaged_files_stop_the_update() {
        let temp = TempDir::new().unwrap();
        let (meta, fakes) = installed(&temp, sodium(None)).await;
        let stray = temp.path().join("mods/iris.jar");
        fs::write(&stray, b"iris").unwrap();
        fakes.catalog.set_hash(&sha1_file(&stray).unwrap(), "YL57xq9U");

        let err = run_update(&meta, &fakes.context()).await.unwrap_err();

        match err {
            Error::UnmanagedFiles { files } => assert_eq!(files, vec!["iris.jar"]),
            other => panic!("expected unmanaged files, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_install_stops_the_update() {
        let temp = TempDir::new().unwrap();
        let (meta, fakes) = installed(&temp, sodium(None)).await;
        let mut config = ModsConfig::load(&meta).unwrap();
        config.mods.push(ModEntry {
            platform: Platform::Curseforge,
            id: "404".to_string(),
            allowed_release_types: None,
            name: "Gone".to_string(),
            allow_version_fallback: None,
            version: None,
        });
        config.save(&meta).unwrap();

        let err = run_update(&meta, &fakes.context()).await.unwrap_err();

        assert!(matches!(err, Error::InstallIncomplete { failed: 1 }));
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn test_check_requires_a_lock_entry() {
        let temp = TempDir::new().unwrap();
        let catalog = FakeCatalog::default();

        let err = check_mod(
            temp.path(),
            &sodium(Some("pinned")),
            &options(),
            &LockFile::new(),
            &catalog,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::MissingLockEntry { .. }));
        assert_eq!(catalog.fetch_count(), 0);
    }

    fn locked(released_on: &str) -> LockFile {
        LockFile {
            entries: vec![LockEntry {
                platform: Platform::Modrinth,
                id: "AANobbMI".to_string(),
                name: "Sodium".to_string(),
                file_name: "sodium-1.jar".to_string(),
                released_on: released_on.to_string(),
                hash: sha1_hex(b"v1"),
                download_url: "https://cdn.example/sodium-1.jar".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_check_requires_the_locked_file() {
        let temp = TempDir::new().unwrap();
        let catalog = FakeCatalog::default();
        catalog.set_remote(
            Platform::Modrinth,
            "AANobbMI",
            remote("Sodium", "sodium-2.jar", b"v2", NEW),
        );

        let err = check_mod(
            temp.path(),
            &sodium(None),
            &options(),
            &locked(OLD),
            &catalog,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            Error::LockedFileMissing { path } => assert_eq!(path, temp.path().join("sodium-1.jar")),
            other => panic!("expected missing locked file, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_rejects_bad_timestamps() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("sodium-1.jar"), b"v1").unwrap();
        let catalog = FakeCatalog::default();
        catalog.set_remote(
            Platform::Modrinth,
            "AANobbMI",
            remote("Sodium", "sodium-2.jar", b"v2", NEW),
        );

        let err = check_mod(
            temp.path(),
            &sodium(None),
            &options(),
            &locked("last tuesday"),
            &catalog,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::InvalidTimestamp { .. }));
        assert!(err.is_per_item());
    }

    #[tokio::test]
    async fn test_check_plans_newer_release() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("sodium-1.jar"), b"v1").unwrap();
        let catalog = FakeCatalog::default();
        catalog.set_remote(
            Platform::Modrinth,
            "AANobbMI",
            remote("Sodium", "sodium-2.jar", b"v2", NEW),
        );

        let check = check_mod(
            temp.path(),
            &sodium(None),
            &options(),
            &locked(OLD),
            &catalog,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        match check {
            UpdateCheck::Update(plan) => {
                assert_eq!(plan.lock_index, 0);
                assert_eq!(plan.old_file, "sodium-1.jar");
                assert_eq!(plan.new_file, "sodium-2.jar");
            }
            other => panic!("expected an update, got {:?}", other),
        }
    }

    fn mod_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_tampered_download_keeps_installed_version() {
        let temp = TempDir::new().unwrap();
        let (meta, fakes) = installed(&temp, sodium(None)).await;
        fakes.publish(
            Platform::Modrinth,
            "AANobbMI",
            remote("Sodium", "sodium-2.jar", b"v2", NEW),
            b"not v2",
        );
        let lock_before = fs::read(meta.lock_path()).unwrap();

        let report = run_update(&meta, &fakes.context()).await.unwrap();

        assert_eq!(report.outcome(), Outcome::PartialFailure);
        assert!(report.updated.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.is_integrity());
        assert_eq!(fs::read(meta.lock_path()).unwrap(), lock_before);

        let mods = temp.path().join("mods");
        assert_eq!(mod_files(&mods), vec!["sodium-1.jar"]);
        assert_eq!(sha1_file(&mods.join("sodium-1.jar")).unwrap(), sha1_hex(b"v1"));
    }

    #[tokio::test]
    async fn test_new_file_removed_when_old_file_cannot_be() {
        let temp = TempDir::new().unwrap();
        let mods = temp.path().join("mods");
        // A directory under the old name cannot be removed with remove_file
        fs::create_dir_all(mods.join("sodium-1.jar")).unwrap();

        let fakes = Fakes::new();
        let new_release = remote("Sodium", "sodium-2.jar", b"v2", NEW);
        fakes.downloader.serve(&new_release.download_url, b"v2");
        let plan = PlannedUpdate {
            lock_index: 0,
            old_file: "sodium-1.jar".to_string(),
            new_file: "sodium-2.jar".to_string(),
            remote: new_release,
        };

        let err = apply_update(&mods, &sodium(None), &plan, &fakes.context())
            .await
            .unwrap_err();

        assert!(!err.is_per_item());
        assert_eq!(fakes.downloader.call_count(), 1);
        assert!(!mods.join("sodium-2.jar").exists());
        assert!(mods.join("sodium-1.jar").is_dir());
    }

    /// Records the lock file contents at the start of every download
    struct LockWatcher {
        inner: FakeDownloader,
        lock_path: PathBuf,
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Downloader for LockWatcher {
        async fn download(&self, url: &str, destination: &Path, cancel: &CancellationToken) -> Result<()> {
            let lock = fs::read_to_string(&self.lock_path).unwrap_or_default();
            self.seen.lock().unwrap().push((url.to_string(), lock));
            self.inner.download(url, destination, cancel).await
        }
    }

    #[tokio::test]
    async fn test_lock_written_after_each_swap() {
        let temp = TempDir::new().unwrap();
        let lithium = ModEntry {
            id: "gvQqBUqZ".to_string(),
            name: "Lithium".to_string(),
            ..sodium(None)
        };
        let (meta, fakes) = installed(&temp, sodium(None)).await;
        let mut config = ModsConfig::load(&meta).unwrap();
        config.mods.push(lithium);
        config.save(&meta).unwrap();
        fakes.publish(
            Platform::Modrinth,
            "gvQqBUqZ",
            remote("Lithium", "lithium-1.jar", b"l1", OLD),
            b"l1",
        );
        run_install(&meta, &fakes.context()).await.unwrap();

        let sodium_v2 = remote("Sodium", "sodium-2.jar", b"v2", NEW);
        let lithium_v2 = remote("Lithium", "lithium-2.jar", b"l2", NEW);
        let watcher = LockWatcher {
            inner: FakeDownloader::default(),
            lock_path: meta.lock_path(),
            seen: Mutex::new(Vec::new()),
        };
        watcher.inner.serve(&sodium_v2.download_url, b"v2");
        watcher.inner.serve(&lithium_v2.download_url, b"l2");
        fakes.catalog.set_remote(Platform::Modrinth, "AANobbMI", sodium_v2);
        fakes.catalog.set_remote(Platform::Modrinth, "gvQqBUqZ", lithium_v2.clone());

        let watcher = Arc::new(watcher);
        let ctx = SyncContext::new(fakes.catalog.clone(), watcher.clone());
        let report = run_update(&meta, &ctx).await.unwrap();

        assert_eq!(report.updated.len(), 2);
        let seen = watcher.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].1.contains("sodium-1.jar"));
        assert_eq!(seen[1].0, lithium_v2.download_url);
        // Sodium's swap is on disk before Lithium starts downloading
        assert!(seen[1].1.contains("sodium-2.jar"));
        assert!(seen[1].1.contains("lithium-1.jar"));
    }
}
