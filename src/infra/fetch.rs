//! Fetch layer: HTTP GET with transparent on-disk caching.
//!
//! Two cooperating caches exist. `page_if_needed` consults the generated
//! document for a (year, type) pair; its mere existence means "no parse
//! needed". `raw_get` caches raw response bodies verbatim, keyed by URL, so
//! a re-run never refetches an unchanged split file. A force flag bypasses
//! cache reads but never cache writes.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::common::error::{Result, ScraperError};

/// Outcome of a document-level fetch.
pub enum Fetched {
    /// The generated document already exists; no parse is needed.
    Cached(Vec<u8>),
    /// Fresh body retrieved from the network; the caller must parse and
    /// regenerate the document.
    Fresh { body: String },
}

/// A raw HTTP response. Status is surfaced so callers can treat a
/// not-yet-published upcoming year as informational rather than fatal.
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Returns the cached generated document at `cache_path` when present (and
/// not forced), otherwise fetches `url` and hands back the fresh body.
pub async fn page_if_needed(
    client: &reqwest::Client,
    url: &str,
    cache_path: &Path,
    force: bool,
) -> Result<Fetched> {
    if !force && tokio::fs::try_exists(cache_path).await.unwrap_or(false) {
        debug!("📦 using cached document for {url}");
        let bytes = tokio::fs::read(cache_path).await?;
        return Ok(Fetched::Cached(bytes));
    }

    info!("🔗 fetching {url}");
    let response = client.get(url).send().await?;
    let status = response.status().as_u16();
    if status >= 400 {
        return Err(ScraperError::HttpStatus {
            status,
            url: url.to_string(),
        });
    }

    let body = response.text().await?;
    Ok(Fetched::Fresh { body })
}

/// GET with a transparent raw-body cache keyed by sanitized URL. Successful
/// bodies are persisted verbatim; error responses are returned uncached.
pub async fn raw_get(
    client: &reqwest::Client,
    url: &str,
    cache_root: &Path,
    force: bool,
) -> Result<RawResponse> {
    let cache_file = raw_cache_path(cache_root, url);

    if !force && tokio::fs::try_exists(&cache_file).await.unwrap_or(false) {
        info!("📦 using fetch cache for {url}");
        let body = tokio::fs::read(&cache_file).await?;
        return Ok(RawResponse { status: 200, body });
    }

    info!("🔗 fetching {url}");
    let response = client.get(url).send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?.to_vec();

    if status < 300 {
        tokio::fs::create_dir_all(cache_root).await?;
        tokio::fs::write(&cache_file, &body).await?;
    }

    Ok(RawResponse { status, body })
}

/// Fatal unless the caller downgrades it (upcoming-year soft miss).
pub fn throw_if_http_error(response: &RawResponse, url: &str) -> Result<()> {
    if response.status >= 400 {
        return Err(ScraperError::HttpStatus {
            status: response.status,
            url: url.to_string(),
        });
    }
    Ok(())
}

fn raw_cache_path(cache_root: &Path, url: &str) -> PathBuf {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    cache_root.join(format!("{}.cached.txt", stripped.replace('/', "_")))
}
