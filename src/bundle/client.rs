// src/bundle/client.rs

//! Release host access
//!
//! [`ReleaseHost`] abstracts the remote side so fetching can be tested
//! without network access. [`HttpReleaseHost`] talks to a GitHub-style
//! release host with reqwest, a bounded request timeout and retries for
//! transport failures.

use crate::config::BundleConfig;
use crate::error::{Error, Result};
use indicatif::ProgressBar;
use reqwest::blocking::{Client, Response};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{is_tag, manifest_file_name, variant_dir_name};

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Remote source of bundle releases
pub trait ReleaseHost: Send + Sync {
    /// Identifier of the most recent release
    fn latest_tag(&self) -> Result<String>;

    /// Stream one suffix archive of a tag into `out`, returning bytes written
    fn fetch_archive(
        &self,
        tag: &str,
        suffix: &str,
        out: &mut dyn Write,
        progress: Option<&ProgressBar>,
    ) -> Result<u64>;

    /// Raw manifest JSON of a tag
    fn fetch_manifest(&self, tag: &str) -> Result<Vec<u8>>;
}

/// Download URL of one suffix archive
pub fn archive_url(repo_url: &str, bundle_name: &str, tag: &str, suffix: &str) -> String {
    format!(
        "{}/releases/download/{}/{}.zip",
        repo_url.trim_end_matches('/'),
        tag,
        variant_dir_name(bundle_name, suffix, tag)
    )
}

/// Download URL of a tag's manifest
pub fn manifest_url(repo_url: &str, bundle_name: &str, tag: &str) -> String {
    format!(
        "{}/releases/download/{}/{}",
        repo_url.trim_end_matches('/'),
        tag,
        manifest_file_name(bundle_name, tag)
    )
}

/// Extract the release tag from a "latest release" response body
pub fn parse_latest_tag(body: &serde_json::Value) -> Result<String> {
    let tag = body
        .get("tag_name")
        .and_then(|t| t.as_str())
        .ok_or_else(|| Error::Resolution("response has no tag_name field".to_string()))?;

    if !is_tag(tag) {
        return Err(Error::Resolution(format!("unrecognized release tag: {tag:?}")));
    }
    Ok(tag.to_string())
}

/// Stream a response body into a writer, updating an optional progress bar
fn stream_response(
    mut response: Response,
    out: &mut dyn Write,
    progress: Option<&ProgressBar>,
    display_name: &str,
) -> Result<u64> {
    let total_size = response.content_length().unwrap_or(0);
    if let Some(pb) = progress {
        if total_size > 0 {
            pb.set_length(total_size);
        }
        pb.set_message(display_name.to_string());
    }

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| Error::Network(format!("Failed to read response: {e}")))?;

        if bytes_read == 0 {
            break;
        }

        out.write_all(&buffer[..bytes_read])?;
        downloaded += bytes_read as u64;

        if let Some(pb) = progress {
            pb.set_position(downloaded);
        }
    }

    out.flush()?;
    Ok(downloaded)
}

/// reqwest-backed release host
pub struct HttpReleaseHost {
    client: Client,
    api_url: String,
    repo_url: String,
    bundle_name: String,
    max_retries: u32,
}

impl HttpReleaseHost {
    /// Create a client from the bundle configuration
    pub fn new(config: &BundleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("cpbundle/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            repo_url: config.repo_url.clone(),
            bundle_name: config.bundle_name.clone(),
            max_retries: config.max_retries,
        })
    }

    /// GET with retries on transport failure; non-success statuses fail at once
    fn get(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::Network(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        let err = Error::from(e);
                        return Err(Error::Network(format!(
                            "{url}: giving up after {attempt} attempts ({err})"
                        )));
                    }
                    warn!("Request to {} failed (attempt {}): {}, retrying...", url, attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

impl ReleaseHost for HttpReleaseHost {
    fn latest_tag(&self) -> Result<String> {
        let url = format!("{}/releases/latest", self.api_url);
        info!("Resolving latest bundle release from {}", url);

        let response = self.get(&url)?;
        let body: serde_json::Value = response
            .json()
            .map_err(|e| Error::Resolution(format!("Failed to parse release JSON: {e}")))?;

        let tag = parse_latest_tag(&body)?;
        debug!("Latest release tag is {}", tag);
        Ok(tag)
    }

    fn fetch_archive(
        &self,
        tag: &str,
        suffix: &str,
        out: &mut dyn Write,
        progress: Option<&ProgressBar>,
    ) -> Result<u64> {
        let url = archive_url(&self.repo_url, &self.bundle_name, tag, suffix);
        info!("Downloading {}", url);
        let response = self.get(&url)?;
        let downloaded = stream_response(response, out, progress, suffix)?;
        info!("Downloaded {} bytes for suffix {}", downloaded, suffix);
        Ok(downloaded)
    }

    fn fetch_manifest(&self, tag: &str) -> Result<Vec<u8>> {
        let url = manifest_url(&self.repo_url, &self.bundle_name, tag);
        info!("Downloading manifest {}", url);
        let response = self.get(&url)?;
        let bytes = response
            .bytes()
            .map_err(|e| Error::Network(format!("Failed to read manifest from {url}: {e}")))?;
        Ok(bytes.to_vec())
    }
}
