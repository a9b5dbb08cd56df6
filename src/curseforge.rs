//! CurseForge API client
//!
//! Every request carries the `x-api-key` header when a key is configured.

use crate::http::{read_json, unexpected_status, HttpClient};
use crate::manifest::{Loader, Platform, ReleaseType};
use crate::registry::{next_version_down, FetchOptions, FingerprintMatch, RemoteMod};
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BASE_URL: &str = "https://api.curseforge.com/v1";

/// Game id of Minecraft
const MINECRAFT: u32 = 432;

const HASH_SHA1: u8 = 1;
const STATUS_APPROVED: u8 = 4;
const STATUS_RELEASED: u8 = 10;

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    #[serde(default)]
    pub mod_id: u64,
    #[serde(default)]
    pub is_available: bool,
    pub file_name: String,
    pub release_type: u8,
    pub file_status: u8,
    #[serde(default)]
    pub hashes: Vec<FileHash>,
    pub file_date: DateTime<Utc>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub sortable_game_versions: Vec<SortableGameVersion>,
    #[serde(default)]
    pub file_fingerprint: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileHash {
    pub value: String,
    pub algo: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortableGameVersion {
    #[serde(default)]
    pub game_version_name: String,
}

impl File {
    fn sha1(&self) -> Option<&str> {
        self.hashes
            .iter()
            .find(|h| h.algo == HASH_SHA1)
            .map(|h| h.value.as_str())
            .filter(|v| !v.is_empty())
    }

    fn release_type(&self) -> Option<ReleaseType> {
        match self.release_type {
            1 => Some(ReleaseType::Release),
            2 => Some(ReleaseType::Beta),
            3 => Some(ReleaseType::Alpha),
            _ => None,
        }
    }

    fn has_game_version(&self, version: &str) -> bool {
        self.sortable_game_versions
            .iter()
            .any(|gv| gv.game_version_name.eq_ignore_ascii_case(version))
    }
}

#[derive(Debug, Serialize)]
struct FingerprintRequest<'a> {
    fingerprints: &'a [u32],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintResult {
    #[serde(default)]
    exact_matches: Vec<FingerprintHit>,
}

#[derive(Debug, Deserialize)]
struct FingerprintHit {
    #[serde(default)]
    id: u64,
    file: File,
}

/// `modLoaderType` query value
pub fn loader_type(loader: Loader) -> Result<u8> {
    match loader {
        Loader::Forge => Ok(1),
        Loader::Cauldron => Ok(2),
        Loader::Liteloader => Ok(3),
        Loader::Fabric => Ok(4),
        Loader::Quilt => Ok(5),
        Loader::Neoforge => Ok(6),
        other => Err(Error::UnsupportedLoader {
            platform: Platform::Curseforge,
            loader: other.to_string(),
        }),
    }
}

pub struct CurseforgeClient {
    base_url: String,
    api_key: Option<String>,
    http: Arc<HttpClient>,
}

impl CurseforgeClient {
    pub fn new(base_url: String, api_key: Option<String>, http: Arc<HttpClient>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    pub async fn get_project(&self, project_id: &str, cancel: &CancellationToken) -> Result<Project> {
        let url = format!("{}/mods/{}", self.base_url, project_id);
        let response = self
            .http
            .send(self.authorize(self.http.get(&url)), cancel)
            .await?;

        match response.status() {
            StatusCode::OK => Ok(read_json::<DataResponse<Project>>(response).await?.data),
            StatusCode::NOT_FOUND => Err(not_found(project_id)),
            _ => Err(unexpected_status(&response)),
        }
    }

    pub async fn get_files(
        &self,
        project_id: &str,
        game_version: &str,
        loader: u8,
        cancel: &CancellationToken,
    ) -> Result<Vec<File>> {
        let url = format!("{}/mods/{}/files", self.base_url, project_id);
        let request = self
            .http
            .get(&url)
            .query(&[("gameVersion", game_version.to_string()), ("modLoaderType", loader.to_string())]);
        let response = self.http.send(self.authorize(request), cancel).await?;

        match response.status() {
            StatusCode::OK => Ok(read_json::<DataResponse<Vec<File>>>(response).await?.data),
            StatusCode::NOT_FOUND => Err(not_found(project_id)),
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
        let loader = loader_type(options.loader)?;
        let mut game_version = options.game_version.clone();

        loop {
            let files = self.get_files(project_id, &game_version, loader, cancel).await?;
            let mut candidates = filter_files(files, options, &game_version);

            if candidates.is_empty() {
                match next_version_down(&game_version) {
                    Some(next) if options.allow_fallback => {
                        game_version = next;
                        continue;
                    }
                    _ => return Err(no_compatible_file(project_id)),
                }
            }

            candidates.sort_by(|a, b| b.file_date.cmp(&a.file_date));
            let selected = &candidates[0];
            let download_url = selected
                .download_url
                .as_deref()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| no_compatible_file(project_id))?;
            let hash = selected.sha1().ok_or_else(|| no_compatible_file(project_id))?;

            return Ok(RemoteMod {
                name: project.name,
                file_name: selected.file_name.clone(),
                hash: hash.to_string(),
                download_url: download_url.to_string(),
                release_date: selected.file_date.to_rfc3339_opts(SecondsFormat::Secs, true),
            });
        }
    }

    /// Exact fingerprint matches for Minecraft files
    pub async fn match_fingerprints(
        &self,
        fingerprints: &[u32],
        cancel: &CancellationToken,
    ) -> Result<Vec<FingerprintMatch>> {
        let url = format!("{}/fingerprints/{}", self.base_url, MINECRAFT);
        let request = self.http.post(&url).json(&FingerprintRequest { fingerprints });
        let response = self.http.send(self.authorize(request), cancel).await?;

        if response.status() != StatusCode::OK {
            return Err(unexpected_status(&response));
        }

        let result = read_json::<DataResponse<FingerprintResult>>(response).await?.data;
        Ok(result
            .exact_matches
            .into_iter()
            .map(|hit| {
                let project_id = if hit.file.mod_id != 0 { hit.file.mod_id } else { hit.id };
                FingerprintMatch {
                    project_id: project_id.to_string(),
                    fingerprint: hit.file.file_fingerprint,
                }
            })
            .collect())
    }
}

fn filter_files(files: Vec<File>, options: &FetchOptions, game_version: &str) -> Vec<File> {
    let fixed = options.fixed_version.as_deref().filter(|v| !v.is_empty());

    files
        .into_iter()
        .filter(|f| fixed.map_or(true, |name| f.file_name.eq_ignore_ascii_case(name)))
        .filter(|f| f.has_game_version(game_version))
        .filter(|f| {
            f.release_type()
                .is_some_and(|t| options.allowed_release_types.contains(&t))
        })
        .filter(|f| matches!(f.file_status, STATUS_APPROVED | STATUS_RELEASED) && f.is_available)
        .collect()
}

fn not_found(project_id: &str) -> Error {
    Error::ModNotFound {
        platform: Platform::Curseforge,
        project_id: project_id.to_string(),
    }
}

fn no_compatible_file(project_id: &str) -> Error {
    Error::NoCompatibleFile {
        platform: Platform::Curseforge,
        project_id: project_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::Server) -> CurseforgeClient {
        let network = NetworkConfig {
            retry_interval_ms: 1,
            ..NetworkConfig::default()
        };
        CurseforgeClient::new(
            server.url(),
            Some("test-key".to_string()),
            Arc::new(HttpClient::from_config(&network).unwrap()),
        )
    }

    fn options() -> FetchOptions {
        FetchOptions {
            allowed_release_types: vec![ReleaseType::Release, ReleaseType::Beta],
            game_version: "1.20.1".to_string(),
            loader: Loader::Forge,
            allow_fallback: false,
            fixed_version: None,
        }
    }

    fn file(name: &str, release_type: u8, status: u8, date: &str) -> serde_json::Value {
        json!({
            "id": 1,
            "modId": 238222,
            "isAvailable": true,
            "fileName": name,
            "releaseType": release_type,
            "fileStatus": status,
            "hashes": [
                { "value": "md5-value", "algo": 2 },
                { "value": format!("sha1-{}", name), "algo": 1 }
            ],
            "fileDate": date,
            "downloadUrl": format!("https://edge.forgecdn.net/{}", name),
            "sortableGameVersions": [{ "gameVersionName": "1.20.1" }],
            "fileFingerprint": 12345
        })
    }

    async fn mock_project(server: &mut mockito::Server) {
        server
            .mock("GET", "/mods/238222")
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_body(json!({"data": {"id": 238222, "name": "Just Enough Items"}}).to_string())
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_fetch_mod_filters_and_picks_newest() {
        let mut server = mockito::Server::new_async().await;
        mock_project(&mut server).await;
        server
            .mock("GET", "/mods/238222/files")
            .match_header("x-api-key", "test-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("gameVersion".into(), "1.20.1".into()),
                Matcher::UrlEncoded("modLoaderType".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"data": [
                    file("jei-old.jar", 1, 4, "2023-06-01T10:00:00Z"),
                    file("jei-new.jar", 1, 10, "2023-08-01T10:00:00.123Z"),
                    file("jei-alpha.jar", 3, 4, "2023-09-01T10:00:00Z"),
                    file("jei-review.jar", 1, 3, "2023-10-01T10:00:00Z"),
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let remote = client(&server)
            .fetch_mod("238222", &options(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(remote.name, "Just Enough Items");
        assert_eq!(remote.file_name, "jei-new.jar");
        assert_eq!(remote.hash, "sha1-jei-new.jar");
        assert_eq!(remote.release_date, "2023-08-01T10:00:00Z");
    }

    #[tokio::test]
    async fn test_missing_download_url_is_not_compatible() {
        let mut server = mockito::Server::new_async().await;
        mock_project(&mut server).await;
        let mut entry = file("jei.jar", 1, 4, "2023-06-01T10:00:00Z");
        entry["downloadUrl"] = serde_json::Value::Null;
        server
            .mock("GET", "/mods/238222/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"data": [entry]}).to_string())
            .create_async()
            .await;

        let err = client(&server)
            .fetch_mod("238222", &options(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoCompatibleFile { platform: Platform::Curseforge, .. }));
    }

    #[test]
    fn test_loader_types() {
        assert_eq!(loader_type(Loader::Forge).unwrap(), 1);
        assert_eq!(loader_type(Loader::Fabric).unwrap(), 4);
        assert_eq!(loader_type(Loader::Neoforge).unwrap(), 6);
        assert!(matches!(
            loader_type(Loader::Paper),
            Err(Error::UnsupportedLoader { platform: Platform::Curseforge, .. })
        ));
    }

    #[tokio::test]
    async fn test_match_fingerprints() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/fingerprints/432")
            .match_header("x-api-key", "test-key")
            .match_body(Matcher::Json(json!({"fingerprints": [12345, 999]})))
            .with_status(200)
            .with_body(
                json!({"data": {
                    "exactMatches": [{ "id": 238222, "file": file("jei.jar", 1, 4, "2023-06-01T10:00:00Z") }],
                    "unmatchedFingerprints": [999]
                }})
                .to_string(),
            )
            .create_async()
            .await;

        let matches = client(&server)
            .match_fingerprints(&[12345, 999], &CancellationToken::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            matches,
            vec![FingerprintMatch {
                project_id: "238222".to_string(),
                fingerprint: 12345,
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_project_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mods/1")
            .with_status(404)
            .create_async()
            .await;

        let err = client(&server)
            .get_project("1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_expected());
    }
}
