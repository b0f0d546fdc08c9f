// Voice -> pipeline map with serialized first-use initialization

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{ModelCache, ModelHandle, PipelineHandle, SpeechBackend};
use crate::assets::AssetStore;
use crate::config::InitLocking;
use crate::error::{NarrateError, NarrateResult};
use crate::voice_manager::validate_voice_id;

struct VoiceEntry<P> {
    pipeline: Arc<P>,
    voice_path: PathBuf,
}

/// Lock table guarding the cold path
///
/// `Global` hands every voice the same lock, `PerVoice` one lock per id.
struct InitLocks {
    mode: InitLocking,
    global: Arc<Mutex<()>>,
    per_voice: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InitLocks {
    fn new(mode: InitLocking) -> Self {
        Self {
            mode,
            global: Arc::default(),
            per_voice: Mutex::new(HashMap::new()),
        }
    }

    fn for_voice(&self, voice: &str) -> Arc<Mutex<()>> {
        match self.mode {
            InitLocking::Global => Arc::clone(&self.global),
            InitLocking::PerVoice => self
                .per_voice
                .lock()
                .entry(voice.to_string())
                .or_default()
                .clone(),
        }
    }

    /// Forget a per-voice lock once nobody else holds or waits on it
    fn release(&self, voice: &str, lock: &Arc<Mutex<()>>) {
        if self.mode == InitLocking::Global {
            return;
        }
        let mut per_voice = self.per_voice.lock();
        // One reference in the table, one held by the caller
        if Arc::strong_count(lock) == 2 {
            per_voice.remove(voice);
        }
    }
}

/// One pipeline per voice, all bound to the single shared model
///
/// Warm lookups take only a read lock on the voice map. Cold lookups resolve
/// assets, load the model if needed and build the pipeline while holding the
/// init lock for that voice.
pub struct VoicePipelineCache<B: SpeechBackend> {
    backend: Arc<B>,
    assets: AssetStore,
    models: ModelCache<B>,
    pipelines: RwLock<HashMap<String, VoiceEntry<B::Pipeline>>>,
    init_locks: InitLocks,
    default_voice: String,
}

impl<B: SpeechBackend> VoicePipelineCache<B> {
    /// Create an empty cache
    pub fn new(
        backend: Arc<B>,
        assets: AssetStore,
        default_voice: impl Into<String>,
        init_locking: InitLocking,
    ) -> Self {
        Self {
            models: ModelCache::new(Arc::clone(&backend)),
            backend,
            assets,
            pipelines: RwLock::new(HashMap::new()),
            init_locks: InitLocks::new(init_locking),
            default_voice: default_voice.into(),
        }
    }

    /// Pipeline and voice asset path for `voice`, building them on first use
    ///
    /// An empty `voice` selects the default voice.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a malformed voice id, `AssetResolution`,
    /// `ModelConstruction` or `PipelineConstruction` if initialization fails.
    /// A failed voice stays absent and the next call starts over.
    pub fn get(&self, voice: &str) -> NarrateResult<(PipelineHandle<B>, PathBuf)> {
        let voice = if voice.is_empty() {
            self.default_voice.as_str()
        } else {
            voice
        };
        validate_voice_id(voice)?;

        if let Some(hit) = self.lookup(voice) {
            tracing::debug!("Pipeline cache hit for voice '{}'", voice);
            return Ok(hit);
        }

        let lock = self.init_locks.for_voice(voice);
        let built = {
            let _guard = lock.lock();
            // Built by whoever held the lock before us
            match self.lookup(voice) {
                Some(hit) => Ok(hit),
                None => self.build(voice),
            }
        };
        self.init_locks.release(voice, &lock);
        built
    }

    /// Cold path; the caller holds the init lock for `voice`
    fn build(&self, voice: &str) -> NarrateResult<(PipelineHandle<B>, PathBuf)> {
        let assets = self.assets.resolve(voice)?;
        let model = self.models.get(&assets.config_path, &assets.weights_path)?;

        tracing::info!("Building pipeline for voice '{}'", voice);
        let pipeline = self
            .backend
            .build_pipeline(model, voice)
            .map_err(|e| match e {
                NarrateError::PipelineConstruction { .. } => e,
                other => NarrateError::pipeline_construction(voice, other.to_string()),
            })?;
        let pipeline = Arc::new(pipeline);

        self.pipelines.write().insert(
            voice.to_string(),
            VoiceEntry {
                pipeline: Arc::clone(&pipeline),
                voice_path: assets.voice_path.clone(),
            },
        );

        Ok((pipeline, assets.voice_path))
    }

    fn lookup(&self, voice: &str) -> Option<(PipelineHandle<B>, PathBuf)> {
        self.pipelines
            .read()
            .get(voice)
            .map(|entry| (Arc::clone(&entry.pipeline), entry.voice_path.clone()))
    }

    /// Check if a pipeline for `voice` is resident
    #[must_use]
    pub fn contains(&self, voice: &str) -> bool {
        self.pipelines.read().contains_key(voice)
    }

    /// Ids of every resident voice, sorted
    #[must_use]
    pub fn cached_voices(&self) -> Vec<String> {
        let mut voices: Vec<String> = self.pipelines.read().keys().cloned().collect();
        voices.sort();
        voices
    }

    /// Number of resident pipelines
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.read().len()
    }

    /// Check if no pipeline has been built yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.read().is_empty()
    }

    /// The shared model, if it has been loaded
    #[must_use]
    pub fn model(&self) -> Option<ModelHandle<B>> {
        self.models.loaded()
    }

    /// The underlying asset store
    #[must_use]
    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Voice selected when a request names none
    #[must_use]
    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MockAssetSource;
    use crate::config::AssetLayout;
    use crate::models::{ChunkStream, VoicePipeline};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Named(String);

    impl VoicePipeline for Named {
        fn generate<'a>(&'a self, _: &'a str, _: &'a Path) -> NarrateResult<ChunkStream<'a>> {
            Ok(Box::new(std::iter::once(Ok(vec![0.0; 4]))))
        }
    }

    #[derive(Default)]
    struct CountingBackend {
        builds: AtomicUsize,
        reject: Option<&'static str>,
    }

    impl SpeechBackend for CountingBackend {
        type Model = ();
        type Pipeline = Named;

        fn load_model(&self, _: &Path, _: &Path) -> NarrateResult<()> {
            Ok(())
        }

        fn build_pipeline(&self, _: Arc<()>, voice: &str) -> NarrateResult<Named> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.reject == Some(voice) {
                return Err(NarrateError::synthesis("unsupported language"));
            }
            Ok(Named(voice.to_string()))
        }
    }

    fn cache(root: &Path, backend: CountingBackend) -> VoicePipelineCache<CountingBackend> {
        let mut source = MockAssetSource::new();
        source.expect_fetch().returning(|_, _, dest| {
            std::fs::write(dest, b"asset")?;
            Ok(())
        });
        let assets = AssetStore::new(
            root,
            "hexgrad/Kokoro-82M",
            AssetLayout::kokoro(),
            "af_heart",
            Arc::new(source),
        );
        VoicePipelineCache::new(Arc::new(backend), assets, "af_heart", InitLocking::Global)
    }

    #[test]
    fn test_pipeline_built_once_per_voice() {
        let temp = TempDir::new().unwrap();
        let cache = cache(temp.path(), CountingBackend::default());

        let (first, path) = cache.get("bf_emily").unwrap();
        let (second, _) = cache.get("bf_emily").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.0, "bf_emily");
        assert!(path.ends_with("voices/bf_emily.pt"));
        assert_eq!(cache.backend.builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached_voices(), vec!["bf_emily".to_string()]);
    }

    #[test]
    fn test_empty_voice_is_default() {
        let temp = TempDir::new().unwrap();
        let cache = cache(temp.path(), CountingBackend::default());

        let (pipeline, _) = cache.get("").unwrap();
        assert_eq!(pipeline.0, "af_heart");
        assert!(cache.contains("af_heart"));
        assert!(!cache.contains(""));
    }

    #[test]
    fn test_malformed_voice_rejected_before_fetch() {
        let temp = TempDir::new().unwrap();
        let cache = cache(temp.path(), CountingBackend::default());

        let err = cache.get("../secret").unwrap_err();
        assert!(err.is_user_error());
        assert!(cache.is_empty());
        assert!(!temp.path().join("config.json").exists());
    }

    #[test]
    fn test_build_failure_leaves_voice_absent() {
        let temp = TempDir::new().unwrap();
        let cache = cache(
            temp.path(),
            CountingBackend {
                reject: Some("cf_celine"),
                ..Default::default()
            },
        );

        let err = cache.get("cf_celine").unwrap_err();
        assert!(matches!(err, NarrateError::PipelineConstruction { ref voice, .. } if voice == "cf_celine"));
        assert!(!cache.contains("cf_celine"));
        assert!(cache.model().is_some());

        assert!(cache.get("cf_celine").is_err());
        assert_eq!(cache.backend.builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_per_voice_locks_are_released() {
        let temp = TempDir::new().unwrap();
        let mut source = MockAssetSource::new();
        source.expect_fetch().returning(|_, name, dest| {
            if name.starts_with("voices/zz_") {
                return Err(NarrateError::asset_resolution(name, "404 Not Found"));
            }
            std::fs::write(dest, b"asset")?;
            Ok(())
        });
        let assets = AssetStore::new(
            temp.path(),
            "hexgrad/Kokoro-82M",
            AssetLayout::kokoro(),
            "af_heart",
            Arc::new(source),
        );
        let cache = VoicePipelineCache::new(
            Arc::new(CountingBackend::default()),
            assets,
            "af_heart",
            InitLocking::PerVoice,
        );

        for n in 0..20 {
            assert!(cache.get(&format!("zz_bogus{n}")).is_err());
        }
        cache.get("am_adam").unwrap();

        assert!(cache.init_locks.per_voice.lock().is_empty());
        assert_eq!(cache.cached_voices(), vec!["am_adam".to_string()]);
    }
}
