//! Modrinth API client
//!
//! Projects are looked up by id or slug, versions are filtered by loader and
//! game version on the server and by release type locally. Installed files
//! are identified by their SHA-1 through the `version_file` endpoint.

use crate::http::{read_json, unexpected_status, HttpClient};
use crate::manifest::{Platform, ReleaseType};
use crate::registry::{next_version_down, FetchOptions, RemoteMod};
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.modrinth.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Version {
    pub project_id: String,
    #[serde(default)]
    pub version_number: String,
    pub version_type: ReleaseType,
    pub date_published: DateTime<Utc>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionFile {
    pub filename: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub hashes: VersionFileHashes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionFileHashes {
    #[serde(default)]
    pub sha1: String,
}

impl Version {
    /// The first listed file, whatever the `primary` flags say
    fn main_file(&self) -> Option<&VersionFile> {
        self.files.first()
    }
}

pub struct ModrinthClient {
    base_url: String,
    http: Arc<HttpClient>,
}

impl ModrinthClient {
    pub fn new(base_url: String, http: Arc<HttpClient>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub async fn get_project(&self, project_id: &str, cancel: &CancellationToken) -> Result<Project> {
        let url = format!("{}/v2/project/{}", self.base_url, project_id);
        let response = self.http.send(self.http.get(&url), cancel).await?;

        match response.status() {
            StatusCode::OK => read_json(response).await,
            StatusCode::NOT_FOUND => Err(not_found(project_id)),
            _ => Err(unexpected_status(&response)),
        }
    }

    pub async fn get_versions(
        &self,
        project_id: &str,
        options: &FetchOptions,
        game_version: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Version>> {
        let loaders = serde_json::to_string(&[options.loader])?;
        let game_versions = serde_json::to_string(&[game_version])?;
        let url = Url::parse_with_params(
            &format!("{}/v2/project/{}/version", self.base_url, project_id),
            &[("loaders", loaders), ("game_versions", game_versions)],
        )
        .map_err(|e| Error::Other(format!("Invalid Modrinth URL: {}", e)))?;

        let response = self.http.send(self.http.get(url.as_str()), cancel).await?;
        match response.status() {
            StatusCode::OK => read_json(response).await,
            StatusCode::NOT_FOUND => Err(not_found(project_id)),
            _ => Err(unexpected_status(&response)),
        }
    }

    /// Version owning a file with this SHA-1
    pub async fn version_for_hash(&self, sha1: &str, cancel: &CancellationToken) -> Result<Version> {
        let url = Url::parse_with_params(
            &format!("{}/v2/version_file/{}", self.base_url, sha1),
            &[("algorithm", "sha1")],
        )
        .map_err(|e| Error::Other(format!("Invalid Modrinth URL: {}", e)))?;

        let response = self.http.send(self.http.get(url.as_str()), cancel).await?;
        match response.status() {
            StatusCode::OK => read_json(response).await,
            StatusCode::NOT_FOUND => Err(Error::VersionNotFound {
                platform: Platform::Modrinth,
                hash: sha1.to_string(),
            }),
            _ => Err(unexpected_status(&response)),
        }
    }

    /// Pick the newest file matching `options`
    pub async fn fetch_mod(
        &self,
        project_id: &str,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<RemoteMod> {
        let project = self.get_project(project_id, cancel).await?;
        let mut game_version = options.game_version.clone();

        loop {
            let versions = self
                .get_versions(project_id, options, &game_version, cancel)
                .await?;
            let mut candidates = filter_versions(versions, options, &game_version);

            if candidates.is_empty() {
                match next_version_down(&game_version) {
                    Some(next) if options.allow_fallback => {
                        game_version = next;
                        continue;
                    }
                    _ => return Err(no_compatible_file(project_id)),
                }
            }

            candidates.sort_by(|a, b| b.date_published.cmp(&a.date_published));
            let selected = &candidates[0];
            let file = selected
                .main_file()
                .filter(|f| !f.hashes.sha1.is_empty() && !f.url.is_empty())
                .ok_or_else(|| no_compatible_file(project_id))?;

            return Ok(RemoteMod {
                name: project.title,
                file_name: file.filename.clone(),
                hash: file.hashes.sha1.clone(),
                download_url: file.url.clone(),
                release_date: selected
                    .date_published
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            });
        }
    }
}

fn filter_versions(versions: Vec<Version>, options: &FetchOptions, game_version: &str) -> Vec<Version> {
    match options.fixed_version.as_deref().filter(|v| !v.is_empty()) {
        Some(fixed) => versions
            .into_iter()
            .filter(|v| v.version_number == fixed)
            .collect(),
        None => versions
            .into_iter()
            .filter(|v| options.allowed_release_types.contains(&v.version_type))
            .filter(|v| v.game_versions.iter().any(|gv| gv == game_version))
            .collect(),
    }
}

fn not_found(project_id: &str) -> Error {
    Error::ModNotFound {
        platform: Platform::Modrinth,
        project_id: project_id.to_string(),
    }
}

fn no_compatible_file(project_id: &str) -> Error {
    Error::NoCompatibleFile {
        platform: Platform::Modrinth,
        project_id: project_id.to_string(),
    }
}
