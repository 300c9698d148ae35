//! Asset acquisition and publication.
//!
//! The store does no retrying of its own. Failure policy lives in the
//! orchestrator, which decides per asset class whether a miss degrades or
//! fails the job.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use beatcut_common::{BeatcutError, BeatcutResult};

/// Fetches source assets into a working directory and publishes the
/// finished artifact.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Fetch `url` into `dest_dir`, returning the local path.
    async fn download(&self, url: &str, dest_dir: &Path) -> BeatcutResult<PathBuf>;

    /// Publish the artifact at `path` under `key`, returning its locator.
    async fn upload(&self, path: &Path, key: &str) -> BeatcutResult<String>;
}

/// HTTP-backed store for remote assets.
pub struct HttpAssetStore {
    client: reqwest::Client,
    upload_base: Option<String>,
}

impl HttpAssetStore {
    pub fn new(upload_base: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_base,
        }
    }
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn download(&self, url: &str, dest_dir: &Path) -> BeatcutResult<PathBuf> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BeatcutError::acquisition(format!("GET {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(BeatcutError::acquisition(format!(
                "GET {url}: status {}",
                response.status()
            )));
        }

        let name = file_name_for(url);
        let dest = dest_dir.join(name);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BeatcutError::acquisition(format!("reading body of {url}: {e}")))?;
        if bytes.is_empty() {
            return Err(BeatcutError::acquisition(format!("{url}: empty body")));
        }
        tokio::fs::write(&dest, &bytes).await?;

        tracing::debug!(url, path = %dest.display(), bytes = bytes.len(), "Asset downloaded");
        Ok(dest)
    }

    async fn upload(&self, path: &Path, key: &str) -> BeatcutResult<String> {
        let base = self.upload_base.as_deref().ok_or_else(|| {
            BeatcutError::upload("no upload endpoint configured for HTTP asset store")
        })?;

        let body = tokio::fs::read(path).await?;
        let url = format!("{}/{}", base.trim_end_matches('/'), key);
        let response = self
            .client
            .put(&url)
            .body(body)
            .send()
            .await
            .map_err(|e| BeatcutError::upload(format!("PUT {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(BeatcutError::upload(format!(
                "PUT {url}: status {}",
                response.status()
            )));
        }
        Ok(url)
    }
}

/// Filesystem store for local runs: "urls" are paths, publication is a copy.
pub struct LocalAssetStore {
    output_root: PathBuf,
}

impl LocalAssetStore {
    pub fn new(output_root: PathBuf) -> Self {
        Self { output_root }
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn download(&self, url: &str, dest_dir: &Path) -> BeatcutResult<PathBuf> {
        let source = PathBuf::from(url);
        if !source.exists() {
            return Err(BeatcutError::FileNotFound { path: source });
        }
        let dest = dest_dir.join(file_name_for(url));
        tokio::fs::copy(&source, &dest).await?;
        Ok(dest)
    }

    async fn upload(&self, path: &Path, key: &str) -> BeatcutResult<String> {
        let dest = self.output_root.join(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(path, &dest)
            .await
            .map_err(|e| BeatcutError::upload(format!("copy to {}: {e}", dest.display())))?;
        Ok(dest.display().to_string())
    }
}

/// Derive a stable local file name from a URL or path, keeping the
/// extension so downstream tools can sniff the container.
fn file_name_for(url: &str) -> String {
    let tail = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("asset");
    let tail = tail.split(['?', '#']).next().unwrap_or("asset");
    if tail.is_empty() {
        "asset".to_string()
    } else {
        tail.to_string()
    }
}
