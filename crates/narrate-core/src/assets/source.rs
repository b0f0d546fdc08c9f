// Remote content sources for model and voice files

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hf_hub::api::sync::ApiBuilder;

use crate::config::SourceConfig;
use crate::error::{NarrateError, NarrateResult};

/// A named-object store assets are fetched from
///
/// `fetch` writes the complete object to `dest` or returns an error. The store
/// moves `dest` into its final location only after a successful return, so an
/// implementation never has to clean up after itself.
#[cfg_attr(test, mockall::automock)]
pub trait AssetSource: Send + Sync {
    /// Fetch `remote_name` from `repo_id` into `dest`
    fn fetch(&self, repo_id: &str, remote_name: &str, dest: &Path) -> NarrateResult<()>;
}

/// HuggingFace Hub through the `hf-hub` blocking client
///
/// The hub client keeps its own blob cache; the fetched blob is copied out of
/// it so the asset root stays self-contained.
#[derive(Debug, Clone, Default)]
pub struct HfHubSource {
    cache_dir: Option<PathBuf>,
}

impl HfHubSource {
    /// Use the platform default hub cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific hub cache directory
    #[must_use]
    pub fn with_cache_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir: Some(cache_dir),
        }
    }
}

impl AssetSource for HfHubSource {
    fn fetch(&self, repo_id: &str, remote_name: &str, dest: &Path) -> NarrateResult<()> {
        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(cache_dir) = &self.cache_dir {
            builder = builder.with_cache_dir(cache_dir.clone());
        }

        let api = builder
            .build()
            .map_err(|e| NarrateError::asset_resolution(remote_name, e.to_string()))?;

        let cached = api
            .model(repo_id.to_string())
            .get(remote_name)
            .map_err(|e| NarrateError::asset_resolution(remote_name, e.to_string()))?;

        place_from_cache(&cached, dest).map_err(|e| {
            NarrateError::asset_resolution(
                remote_name,
                format!("copy from hub cache {} failed: {e}", cached.display()),
            )
        })
    }
}

/// Hard-link a hub blob to `dest`, copying when the two are on different
/// filesystems or linking is unsupported
fn place_from_cache(cached: &Path, dest: &Path) -> std::io::Result<()> {
    // hf-hub hands out a snapshot symlink; link the blob behind it
    let blob = cached.canonicalize()?;
    if let Err(e) = std::fs::hard_link(&blob, dest) {
        tracing::debug!("Hard link from {:?} failed ({}), copying", blob, e);
        std::fs::copy(&blob, dest)?;
    }
    Ok(())
}

/// Plain HTTP mirror laid out like the hub (`{endpoint}/{repo}/resolve/{revision}/{file}`)
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::blocking::Client,
    endpoint: String,
    revision: String,
}

impl HttpSource {
    /// Create a source for `endpoint` pinned to `revision`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, revision: impl Into<String>) -> NarrateResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("narrate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NarrateError::configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            revision: revision.into(),
        })
    }

    /// URL an object is downloaded from
    #[must_use]
    pub fn url(&self, repo_id: &str, remote_name: &str) -> String {
        format!(
            "{}/{repo_id}/resolve/{}/{remote_name}",
            self.endpoint, self.revision
        )
    }
}

impl AssetSource for HttpSource {
    fn fetch(&self, repo_id: &str, remote_name: &str, dest: &Path) -> NarrateResult<()> {
        let url = self.url(repo_id, remote_name);
        let fail = |message: String| NarrateError::asset_resolution(remote_name, message);

        let mut resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| fail(format!("request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(fail(format!("download failed with status {}", resp.status())));
        }

        let expected = resp.content_length();
        let mut file = File::create(dest).map_err(|e| fail(format!("create failed: {e}")))?;
        let written = resp
            .copy_to(&mut file)
            .map_err(|e| fail(format!("download stream error: {e}")))?;
        file.flush().map_err(|e| fail(format!("flush failed: {e}")))?;

        if let Some(expected) = expected {
            if written != expected {
                return Err(fail(format!(
                    "truncated download: {written} of {expected} bytes"
                )));
            }
        }

        tracing::debug!("Downloaded {} bytes from {}", written, url);
        Ok(())
    }
}

/// Build the source described by `config`
///
/// # Errors
///
/// Returns a configuration error if the source cannot be constructed.
pub fn source_from_config(config: &SourceConfig) -> NarrateResult<Arc<dyn AssetSource>> {
    Ok(match config {
        SourceConfig::HfHub { cache_dir } => Arc::new(
            cache_dir
                .clone()
                .map_or_else(HfHubSource::new, HfHubSource::with_cache_dir),
        ),
        SourceConfig::Http { endpoint, revision } => {
            Arc::new(HttpSource::new(endpoint.clone(), revision.clone())?)
        }
    })
}
