//! Outbound HTTP plumbing
//!
//! Every catalog request and download goes through one [`HttpClient`], which
//! waits on a shared rate limiter before each attempt, retries server errors
//! a bounded number of times with a fixed pause, and gives up promptly when
//! the run's cancellation token fires.

use crate::config::NetworkConfig;
use crate::registry::Downloader;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Request, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const USER_AGENT: &str = concat!("mmm/", env!("CARGO_PKG_VERSION"));

/// Spaces requests evenly; shared by every task of a run
#[derive(Debug)]
pub struct RateLimiter {
    interval: Option<Duration>,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    /// `0` means unlimited
    pub fn new(requests_per_second: u32) -> Self {
        let interval = match requests_per_second {
            0 => None,
            rps => Some(Duration::from_secs(1) / rps),
        };
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait for the next free slot
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        let Some(interval) = self.interval else {
            return Ok(());
        };

        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + interval;
            slot
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep_until(slot) => Ok(()),
        }
    }
}

pub struct HttpClient {
    client: reqwest::Client,
    limiter: RateLimiter,
    max_retries: u32,
    retry_interval: Duration,
    metadata_timeout: Duration,
    download_timeout: Duration,
}

impl HttpClient {
    pub fn from_config(network: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            limiter: RateLimiter::new(network.requests_per_second),
            max_retries: network.max_retries,
            retry_interval: network.retry_interval(),
            metadata_timeout: network.metadata_timeout(),
            download_timeout: network.download_timeout(),
        })
    }

    /// GET with the metadata timeout
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url).timeout(self.metadata_timeout)
    }

    /// POST with the metadata timeout
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url).timeout(self.metadata_timeout)
    }

    /// GET with the download timeout
    pub fn download(&self, url: &str) -> RequestBuilder {
        self.client.get(url).timeout(self.download_timeout)
    }

    pub async fn send(&self, request: RequestBuilder, cancel: &CancellationToken) -> Result<Response> {
        self.execute(request.build()?, cancel).await
    }

    /// Run a request through the limiter and retry policy
    ///
    /// 5xx responses are retried up to `max_retries` times. Any other status,
    /// including the last 5xx, is handed back to the caller.
    pub async fn execute(&self, request: Request, cancel: &CancellationToken) -> Result<Response> {
        let url = request.url().to_string();
        let mut attempt = 0;

        loop {
            self.limiter.wait(cancel).await?;

            let this_try = request
                .try_clone()
                .ok_or_else(|| Error::Other(format!("Request to {} cannot be retried", url)))?;

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                response = self.client.execute(this_try) => {
                    response.map_err(|e| transport_error(e, &url))?
                }
            };

            let status = response.status();
            if !status.is_server_error() || attempt >= self.max_retries {
                return Ok(response);
            }

            attempt += 1;
            debug!(url = %url, status = status.as_u16(), attempt, "retrying after server error");
            // Drain so the connection can be reused
            let _ = response.bytes().await;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.retry_interval) => {}
            }
        }
    }
}

pub(crate) fn transport_error(e: reqwest::Error, url: &str) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            url: url.to_string(),
        }
    } else {
        Error::Http(e)
    }
}

/// Decode a JSON body
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let url = response.url().to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(e, &url))?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub(crate) fn unexpected_status(response: &Response) -> Error {
    Error::Api {
        status: response.status().as_u16(),
        url: response.url().to_string(),
    }
}

/// Streams response bodies to disk through the shared client
pub struct HttpDownloader {
    http: Arc<HttpClient>,
}

impl HttpDownloader {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    async fn write_body(
        &self,
        mut response: Response,
        url: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| Error::io(destination, e))?;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                chunk = response.chunk() => chunk.map_err(|e| transport_error(e, url))?,
            };
            let Some(chunk) = chunk else { break };
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io(destination, e))?;
        }

        file.flush().await.map_err(|e| Error::io(destination, e))?;
        file.sync_all().await.map_err(|e| Error::io(destination, e))
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, destination: &Path, cancel: &CancellationToken) -> Result<()> {
        let response = self.http.send(self.http.download(url), cancel).await?;
        if !response.status().is_success() {
            return Err(unexpected_status(&response));
        }

        let result = self.write_body(response, url, destination, cancel).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(destination).await;
        }
        result
    }
}
