// Counting fakes shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use narrate_core::{
    AssetSource, ChunkStream, InitLocking, NarrateError, NarrateResult, SpeechBackend, TtsConfig,
    TtsEngine, VoicePipeline,
};
use parking_lot::Mutex;

/// Asset source writing the remote name into the file and counting every fetch
#[derive(Default)]
pub struct FakeSource {
    fetches: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
    delay: Duration,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn fail(&self, remote_name: &str) {
        self.failing.lock().insert(remote_name.to_string());
    }

    pub fn heal(&self, remote_name: &str) {
        self.failing.lock().remove(remote_name);
    }

    pub fn fetches(&self, remote_name: &str) -> usize {
        self.fetches.lock().get(remote_name).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }
}

impl AssetSource for FakeSource {
    fn fetch(&self, _repo_id: &str, remote_name: &str, dest: &Path) -> NarrateResult<()> {
        std::thread::sleep(self.delay);
        *self.fetches.lock().entry(remote_name.to_string()).or_default() += 1;

        if self.failing.lock().contains(remote_name) {
            std::fs::write(dest, b"partial")?;
            return Err(NarrateError::asset_resolution(remote_name, "404 Not Found"));
        }

        std::fs::write(dest, remote_name.as_bytes())?;
        Ok(())
    }
}

/// Model standing in for loaded weights
#[derive(Debug)]
pub struct FakeModel {
    pub weights_path: PathBuf,
}

/// Pipeline emitting one chunk per entry of `plan`, each `n` samples long
#[derive(Debug)]
pub struct FakePipeline {
    pub voice: String,
    plan: Vec<usize>,
    channels: u16,
    texts: Arc<Mutex<Vec<String>>>,
}

impl VoicePipeline for FakePipeline {
    fn generate<'a>(&'a self, text: &'a str, voice_path: &'a Path) -> NarrateResult<ChunkStream<'a>> {
        if !voice_path.is_file() {
            return Err(NarrateError::synthesis(format!("voice file {voice_path:?} missing")));
        }
        assert!(!text.trim().is_empty());
        self.texts.lock().push(text.to_string());

        Ok(Box::new(self.plan.iter().map(|&n| -> NarrateResult<Vec<f32>> {
            Ok((0..n).map(|i| (i as f32 * 0.05).sin() * 0.5).collect())
        })))
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}

/// Backend counting model loads and pipeline builds
pub struct FakeBackend {
    model_loads: AtomicUsize,
    builds: Mutex<HashMap<String, usize>>,
    failing_loads: AtomicUsize,
    build_delay: Duration,
    plan: Vec<usize>,
    channels: u16,
    texts: Arc<Mutex<Vec<String>>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            model_loads: AtomicUsize::new(0),
            builds: Mutex::new(HashMap::new()),
            failing_loads: AtomicUsize::new(0),
            build_delay: Duration::ZERO,
            plan: vec![2400, 1200, 600],
            channels: 1,
            texts: Arc::default(),
        }
    }
}

impl FakeBackend {
    /// Pipelines yield no chunks at all
    pub fn silent() -> Self {
        Self {
            plan: Vec::new(),
            ..Self::default()
        }
    }

    pub fn stereo() -> Self {
        Self {
            plan: vec![4800],
            channels: 2,
            ..Self::default()
        }
    }

    /// The next `n` model loads fail
    pub fn failing_model_loads(n: usize) -> Self {
        Self {
            failing_loads: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    pub fn slow_builds(delay: Duration) -> Self {
        Self {
            build_delay: delay,
            ..Self::default()
        }
    }

    pub fn samples_per_call(&self) -> usize {
        self.plan.iter().sum()
    }

    pub fn model_loads(&self) -> usize {
        self.model_loads.load(Ordering::SeqCst)
    }

    pub fn builds(&self, voice: &str) -> usize {
        self.builds.lock().get(voice).copied().unwrap_or(0)
    }

    /// Every text handed to a pipeline, in call order
    pub fn generated_texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }
}

impl SpeechBackend for FakeBackend {
    type Model = FakeModel;
    type Pipeline = FakePipeline;

    fn load_model(&self, config_path: &Path, weights_path: &Path) -> NarrateResult<FakeModel> {
        self.model_loads.fetch_add(1, Ordering::SeqCst);
        assert!(config_path.is_file(), "config must be resolved before model load");
        assert!(weights_path.is_file(), "weights must be resolved before model load");

        let remaining = self.failing_loads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_loads.store(remaining - 1, Ordering::SeqCst);
            return Err(NarrateError::model_construction("incompatible weights"));
        }

        Ok(FakeModel {
            weights_path: weights_path.to_path_buf(),
        })
    }

    fn build_pipeline(&self, _model: Arc<FakeModel>, voice: &str) -> NarrateResult<FakePipeline> {
        std::thread::sleep(self.build_delay);
        *self.builds.lock().entry(voice.to_string()).or_default() += 1;

        Ok(FakePipeline {
            voice: voice.to_string(),
            plan: self.plan.clone(),
            channels: self.channels,
            texts: Arc::clone(&self.texts),
        })
    }
}

/// Backend handle that keeps counters visible to the test
#[derive(Clone)]
pub struct Shared(pub Arc<FakeBackend>);

impl SpeechBackend for Shared {
    type Model = FakeModel;
    type Pipeline = FakePipeline;

    fn load_model(&self, config_path: &Path, weights_path: &Path) -> NarrateResult<FakeModel> {
        self.0.load_model(config_path, weights_path)
    }

    fn build_pipeline(&self, model: Arc<FakeModel>, voice: &str) -> NarrateResult<FakePipeline> {
        self.0.build_pipeline(model, voice)
    }
}

pub fn test_config(root: &Path, init_locking: InitLocking) -> TtsConfig {
    TtsConfig {
        model_dir: root.join("model"),
        audio_root: root.join("audio"),
        init_locking,
        ..TtsConfig::default()
    }
}

/// Engine over `root` with counters on both the backend and the source
pub fn engine(
    root: &Path,
    backend: FakeBackend,
    source: Arc<FakeSource>,
    init_locking: InitLocking,
) -> (TtsEngine<Shared>, Arc<FakeBackend>) {
    let backend = Arc::new(backend);
    let engine = TtsEngine::with_source(
        test_config(root, init_locking),
        Shared(Arc::clone(&backend)),
        source,
    )
    .unwrap();
    (engine, backend)
}
