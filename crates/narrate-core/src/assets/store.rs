// AssetStore: resolves local paths for a voice, fetching missing files once

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::source::{source_from_config, AssetSource};
use super::types::{AssetDescriptor, AssetKind, ResolvedAssets};
use crate::config::{AssetLayout, TtsConfig};
use crate::error::{NarrateError, NarrateResult};

/// Guarantees the config, weights and voice files exist under the asset root
pub struct AssetStore {
    root: PathBuf,
    repo_id: String,
    layout: AssetLayout,
    default_voice: String,
    source: Arc<dyn AssetSource>,
    fetch_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStore")
            .field("root", &self.root)
            .field("repo_id", &self.repo_id)
            .field("layout", &self.layout)
            .field("default_voice", &self.default_voice)
            .finish_non_exhaustive()
    }
}

impl AssetStore {
    /// Create a store over `root` backed by `source`
    pub fn new(
        root: impl Into<PathBuf>,
        repo_id: impl Into<String>,
        layout: AssetLayout,
        default_voice: impl Into<String>,
        source: Arc<dyn AssetSource>,
    ) -> Self {
        Self {
            root: root.into(),
            repo_id: repo_id.into(),
            layout,
            default_voice: default_voice.into(),
            source,
            fetch_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a store using the source named in `config`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the source cannot be built.
    pub fn from_config(config: &TtsConfig) -> NarrateResult<Self> {
        let source = source_from_config(&config.source)?;
        Ok(Self::with_source(config, source))
    }

    /// Create a store from `config` with an explicit source
    pub fn with_source(config: &TtsConfig, source: Arc<dyn AssetSource>) -> Self {
        Self::new(
            config.model_dir.clone(),
            config.repo_id.clone(),
            config.layout.clone(),
            config.default_voice.clone(),
            source,
        )
    }

    /// Local asset root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remote repository id
    #[must_use]
    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    /// The three files a synthesis with `voice` depends on
    #[must_use]
    pub fn descriptors(&self, voice: &str) -> [AssetDescriptor; 3] {
        let voice = self.voice_or_default(voice);
        let describe = |kind, remote_name: String| AssetDescriptor {
            kind,
            local_path: self.root.join(&remote_name),
            remote_name,
        };

        [
            describe(AssetKind::Config, self.layout.config_file.clone()),
            describe(AssetKind::Weights, self.layout.weights_file.clone()),
            describe(AssetKind::Voice, self.layout.voice_file(voice)),
        ]
    }

    /// Whether every file for `voice` is already on disk
    #[must_use]
    pub fn is_cached(&self, voice: &str) -> bool {
        self.descriptors(voice)
            .iter()
            .all(|d| d.local_path.is_file())
    }

    /// Ensure the config, weights and voice files exist locally and return their paths
    ///
    /// An empty `voice` resolves the default voice. Files already present are
    /// used as they are.
    ///
    /// # Errors
    ///
    /// Returns `AssetResolution` if any missing file cannot be fetched. Files
    /// fetched before the failure stay in place.
    pub fn resolve(&self, voice: &str) -> NarrateResult<ResolvedAssets> {
        let [config, weights, voice] = self.descriptors(voice);

        Ok(ResolvedAssets {
            config_path: self.ensure(&config)?,
            weights_path: self.ensure(&weights)?,
            voice_path: self.ensure(&voice)?,
        })
    }

    /// Ensure one file exists locally, fetching it if absent
    ///
    /// # Errors
    ///
    /// Returns `AssetResolution` if the fetch fails or the file cannot be
    /// moved into place.
    pub fn ensure(&self, descriptor: &AssetDescriptor) -> NarrateResult<PathBuf> {
        let local_path = &descriptor.local_path;
        if local_path.exists() {
            tracing::debug!("Asset {} present at {:?}", descriptor.remote_name, local_path);
            return Ok(local_path.clone());
        }

        let lock = self.fetch_lock(local_path);
        let fetched = {
            let _guard = lock.lock();
            // Another caller may have finished the fetch while we waited
            if local_path.exists() {
                Ok(())
            } else {
                self.fetch_into_place(descriptor)
            }
        };
        self.release_fetch_lock(local_path, &lock);

        fetched.map(|()| local_path.clone())
    }

    fn fetch_into_place(&self, descriptor: &AssetDescriptor) -> NarrateResult<()> {
        let fail = |message: String| NarrateError::asset_resolution(&descriptor.remote_name, message);

        if let Some(parent) = descriptor.local_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| fail(format!("create {}: {e}", parent.display())))?;
        }

        let staging = descriptor.staging_path();
        tracing::info!(
            "Fetching {} from {} into {:?}",
            descriptor.remote_name,
            self.repo_id,
            descriptor.local_path
        );

        let fetched = self
            .source
            .fetch(&self.repo_id, &descriptor.remote_name, &staging)
            .and_then(|()| {
                std::fs::rename(&staging, &descriptor.local_path)
                    .map_err(|e| fail(format!("move into place: {e}")))
            });

        if let Err(err) = fetched {
            if staging.exists() {
                if let Err(e) = std::fs::remove_file(&staging) {
                    tracing::warn!("Failed to remove staging file {:?}: {}", staging, e);
                }
            }
            return Err(match err {
                e @ NarrateError::AssetResolution { .. } => e,
                other => fail(other.to_string()),
            });
        }

        tracing::info!("Cached {}", descriptor.remote_name);
        Ok(())
    }

    fn fetch_lock(&self, local_path: &Path) -> Arc<Mutex<()>> {
        self.fetch_locks
            .lock()
            .entry(local_path.to_path_buf())
            .or_default()
            .clone()
    }

    /// Drop the table entry once nobody else holds or waits on it
    fn release_fetch_lock(&self, local_path: &Path, lock: &Arc<Mutex<()>>) {
        let mut locks = self.fetch_locks.lock();
        // One reference in the table, one held by the caller
        if Arc::strong_count(lock) == 2 {
            locks.remove(local_path);
        }
    }

    fn voice_or_default<'a>(&'a self, voice: &'a str) -> &'a str {
        if voice.is_empty() {
            &self.default_voice
        } else {
            voice
        }
    }
}
