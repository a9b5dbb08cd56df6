//! Remote catalog abstractions
//!
//! The reconcilers never talk to Modrinth or CurseForge directly. They go
//! through [`ModCatalog`] for metadata and identity lookups and through
//! [`Downloader`] for file bodies, which keeps them testable with in-memory
//! fakes. [`PlatformCatalog`] is the real implementation and dispatches each
//! call to the client for the requested platform.
//!
//! # Examples
//!
//! ```no_run
//! use mmm::{Config, FetchOptions, Loader, ModCatalog, Platform, PlatformCatalog, ReleaseType};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = PlatformCatalog::from_config(&Config::load()?)?;
//! let options = FetchOptions {
//!     allowed_release_types: vec![ReleaseType::Release],
//!     game_version: "1.20.1".to_string(),
//!     loader: Loader::Fabric,
//!     allow_fallback: true,
//!     fixed_version: None,
//! };
//!
//! let remote = catalog
//!     .fetch_mod(Platform::Modrinth, "AANobbMI", &options, &CancellationToken::new())
//!     .await?;
//! println!("{} -> {}", remote.name, remote.file_name);
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::curseforge::CurseforgeClient;
use crate::http::{HttpClient, HttpDownloader};
use crate::manifest::{Loader, Platform, ReleaseType};
use crate::modrinth::ModrinthClient;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The file a catalog picked for a mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMod {
    /// Project display name
    pub name: String,
    pub file_name: String,
    /// SHA-1 of the file
    pub hash: String,
    pub download_url: String,
    /// RFC 3339 release timestamp
    pub release_date: String,
}

/// Constraints for picking a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub allowed_release_types: Vec<ReleaseType>,
    pub game_version: String,
    pub loader: Loader,
    /// Walk down patch versions when nothing matches `game_version`
    pub allow_fallback: bool,
    /// Exact version to pick instead of the newest one
    pub fixed_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintMatch {
    pub project_id: String,
    pub fingerprint: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashMatch {
    pub project_id: String,
}

/// Metadata and identity lookups against the remote catalogs
#[async_trait]
pub trait ModCatalog: Send + Sync {
    async fn fetch_mod(
        &self,
        platform: Platform,
        project_id: &str,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<RemoteMod>;

    async fn match_by_fingerprint(
        &self,
        platform: Platform,
        fingerprints: &[u32],
        cancel: &CancellationToken,
    ) -> Result<Vec<FingerprintMatch>>;

    /// Fails with [`Error::VersionNotFound`] when no version has this hash
    async fn match_by_hash(
        &self,
        platform: Platform,
        hash: &str,
        cancel: &CancellationToken,
    ) -> Result<HashMatch>;

    async fn project_name(
        &self,
        platform: Platform,
        project_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String>;
}

/// Fetches a URL into a local file
///
/// On failure no partially written file is left at `destination`.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, destination: &Path, cancel: &CancellationToken) -> Result<()>;
}

/// Collaborators shared by one reconciliation run
#[derive(Clone)]
pub struct SyncContext {
    pub catalog: Arc<dyn ModCatalog>,
    pub downloader: Arc<dyn Downloader>,
    pub cancel: CancellationToken,
}

impl SyncContext {
    pub fn new(catalog: Arc<dyn ModCatalog>, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            catalog,
            downloader,
            cancel: CancellationToken::new(),
        }
    }

    /// Real catalogs and downloader sharing one rate-limited HTTP client
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Arc::new(HttpClient::from_config(&config.network)?);
        let catalog = PlatformCatalog::with_client(config, http.clone());
        let downloader = HttpDownloader::new(http);
        Ok(Self::new(Arc::new(catalog), Arc::new(downloader)))
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Dispatches catalog calls to the Modrinth and CurseForge clients
pub struct PlatformCatalog {
    modrinth: ModrinthClient,
    curseforge: CurseforgeClient,
}

impl PlatformCatalog {
    pub fn new(modrinth: ModrinthClient, curseforge: CurseforgeClient) -> Self {
        Self {
            modrinth,
            curseforge,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Arc::new(HttpClient::from_config(&config.network)?);
        Ok(Self::with_client(config, http))
    }

    fn with_client(config: &Config, http: Arc<HttpClient>) -> Self {
        let modrinth = ModrinthClient::new(config.modrinth.api_url.clone(), http.clone());
        let curseforge = CurseforgeClient::new(
            config.curseforge.api_url.clone(),
            config.curseforge.api_key.clone(),
            http,
        );
        Self::new(modrinth, curseforge)
    }
}

#[async_trait]
impl ModCatalog for PlatformCatalog {
    async fn fetch_mod(
        &self,
        platform: Platform,
        project_id: &str,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<RemoteMod> {
        match platform {
            Platform::Modrinth => self.modrinth.fetch_mod(project_id, options, cancel).await,
            Platform::Curseforge => self.curseforge.fetch_mod(project_id, options, cancel).await,
        }
    }

    async fn match_by_fingerprint(
        &self,
        platform: Platform,
        fingerprints: &[u32],
        cancel: &CancellationToken,
    ) -> Result<Vec<FingerprintMatch>> {
        match platform {
            Platform::Curseforge => self.curseforge.match_fingerprints(fingerprints, cancel).await,
            Platform::Modrinth => Err(Error::UnsupportedLookup {
                platform,
                lookup: "fingerprint",
            }),
        }
    }

    async fn match_by_hash(
        &self,
        platform: Platform,
        hash: &str,
        cancel: &CancellationToken,
    ) -> Result<HashMatch> {
        match platform {
            Platform::Modrinth => {
                let version = self.modrinth.version_for_hash(hash, cancel).await?;
                Ok(HashMatch {
                    project_id: version.project_id,
                })
            }
            Platform::Curseforge => Err(Error::UnsupportedLookup {
                platform,
                lookup: "hash",
            }),
        }
    }

    async fn project_name(
        &self,
        platform: Platform,
        project_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        match platform {
            Platform::Modrinth => Ok(self.modrinth.get_project(project_id, cancel).await?.title),
            Platform::Curseforge => Ok(self.curseforge.get_project(project_id, cancel).await?.name),
        }
    }
}

/// Next lower patch of a game version, if there is one
///
/// `1.20.3` becomes `1.20.2`; the walk stops at patch `1`.
pub fn next_version_down(version: &str) -> Option<String> {
    let mut segments = version.split('.').map(|s| s.parse::<u32>().unwrap_or(0));
    let major = segments.next().unwrap_or(0);
    let minor = segments.next().unwrap_or(0);
    let patch = segments.next().unwrap_or(0);

    if patch > 1 {
        Some(format!("{}.{}.{}", major, minor, patch - 1))
    } else {
        None
    }
}
