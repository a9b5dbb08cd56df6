//! In-memory catalog and downloader for unit tests

use crate::manifest::Platform;
use crate::registry::{
    Downloader, FetchOptions, FingerprintMatch, HashMatch, ModCatalog, RemoteMod, SyncContext,
};
use crate::{Error, Result};
use async_trait::async_trait;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub(crate) fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// A remote file whose body is served by [`FakeDownloader`]
pub(crate) fn remote(name: &str, file_name: &str, body: &[u8], release_date: &str) -> RemoteMod {
    RemoteMod {
        name: name.to_string(),
        file_name: file_name.to_string(),
        hash: sha1_hex(body),
        download_url: format!("https://cdn.example/{}", file_name),
        release_date: release_date.to_string(),
    }
}

#[derive(Default)]
pub(crate) struct FakeCatalog {
    remotes: Mutex<HashMap<(Platform, String), RemoteMod>>,
    fingerprints: Mutex<HashMap<u32, String>>,
    hashes: Mutex<HashMap<String, String>>,
    pub fetches: Mutex<Vec<(Platform, String, FetchOptions)>>,
    pub batches: Mutex<Vec<Vec<u32>>>,
    pub name_lookups: Mutex<Vec<(Platform, String)>>,
}

impl FakeCatalog {
    pub fn set_remote(&self, platform: Platform, id: &str, remote: RemoteMod) {
        self.remotes
            .lock()
            .unwrap()
            .insert((platform, id.to_string()), remote);
    }

    pub fn set_fingerprint(&self, fingerprint: u32, project_id: &str) {
        self.fingerprints
            .lock()
            .unwrap()
            .insert(fingerprint, project_id.to_string());
    }

    pub fn set_hash(&self, sha1: &str, project_id: &str) {
        self.hashes
            .lock()
            .unwrap()
            .insert(sha1.to_string(), project_id.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl ModCatalog for FakeCatalog {
    async fn fetch_mod(
        &self,
        platform: Platform,
        project_id: &str,
        options: &FetchOptions,
        _cancel: &CancellationToken,
    ) -> Result<RemoteMod> {
        self.fetches
            .lock()
            .unwrap()
            .push((platform, project_id.to_string(), options.clone()));
        self.remotes
            .lock()
            .unwrap()
            .get(&(platform, project_id.to_string()))
            .cloned()
            .ok_or_else(|| Error::ModNotFound {
                platform,
                project_id: project_id.to_string(),
            })
    }

    async fn match_by_fingerprint(
        &self,
        _platform: Platform,
        fingerprints: &[u32],
        _cancel: &CancellationToken,
    ) -> Result<Vec<FingerprintMatch>> {
        self.batches.lock().unwrap().push(fingerprints.to_vec());
        let known = self.fingerprints.lock().unwrap();
        Ok(fingerprints
            .iter()
            .filter_map(|f| {
                known.get(f).map(|id| FingerprintMatch {
                    project_id: id.clone(),
                    fingerprint: *f,
                })
            })
            .collect())
    }

    async fn match_by_hash(
        &self,
        platform: Platform,
        hash: &str,
        _cancel: &CancellationToken,
    ) -> Result<HashMatch> {
        self.hashes
            .lock()
            .unwrap()
            .get(hash)
            .map(|id| HashMatch {
                project_id: id.clone(),
            })
            .ok_or_else(|| Error::VersionNotFound {
                platform,
                hash: hash.to_string(),
            })
    }

    async fn project_name(
        &self,
        platform: Platform,
        project_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<String> {
        self.name_lookups
            .lock()
            .unwrap()
            .push((platform, project_id.to_string()));
        Ok(format!("{} {}", platform, project_id))
    }
}

/// Serves fixed bodies by URL; unknown URLs fail with a 404
#[derive(Default)]
pub(crate) struct FakeDownloader {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn serve(&self, url: &str, body: &[u8]) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_vec());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &str, destination: &Path, _cancel: &CancellationToken) -> Result<()> {
        self.calls.lock().unwrap().push(url.to_string());
        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Api {
                status: 404,
                url: url.to_string(),
            })?;
        fs::write(destination, body).map_err(|e| Error::io(destination, e))
    }
}

pub(crate) struct Fakes {
    pub catalog: Arc<FakeCatalog>,
    pub downloader: Arc<FakeDownloader>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(FakeCatalog::default()),
            downloader: Arc::new(FakeDownloader::default()),
        }
    }

    pub fn context(&self) -> SyncContext {
        SyncContext::new(self.catalog.clone(), self.downloader.clone())
    }

    /// Register `remote` for a project and serve its body
    pub fn publish(&self, platform: Platform, id: &str, remote: RemoteMod, body: &[u8]) {
        self.downloader.serve(&remote.download_url, body);
        self.catalog.set_remote(platform, id, remote);
    }
}
