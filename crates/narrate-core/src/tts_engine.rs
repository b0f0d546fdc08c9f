//! Synthesis orchestration.
//!
//! [`TtsEngine`] is the public entry point: it validates a request, obtains
//! the voice pipeline from the cache, drains the generation stream into one
//! buffer and writes it under the requester's identity directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assets::{AssetSource, AssetStore};
use crate::audio_writer::{AudioWriter, EncodingSettings};
use crate::config::TtsConfig;
use crate::error::{NarrateError, NarrateResult};
use crate::identity::{output_file_name, resolve_media_path, sanitize_identity};
use crate::models::{ChunkStream, SpeechBackend, VoicePipeline, VoicePipelineCache};
use crate::voice_manager::validate_voice_id;

/// One synthesis request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Text to speak
    pub text: String,
    /// Voice id; the configured default when `None` or empty
    pub voice: Option<String>,
    /// Requester identity scoping the output directory
    pub identity: String,
}

impl SynthesisRequest {
    /// Create a request using the default voice
    pub fn new(text: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            identity: identity.into(),
        }
    }

    /// Select a voice
    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }
}

/// Outcome of a successful synthesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
    /// Absolute path of the written WAV file
    pub output_path: PathBuf,
    /// Sample rate of the file in Hz
    pub sample_rate: u32,
    /// Voice that was used
    pub voice: String,
    /// Interleaved sample count
    pub num_samples: usize,
    /// Channel count
    pub channels: u16,
}

impl SynthesisResult {
    /// Playback length in seconds
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        let frames = self.num_samples / usize::from(self.channels.max(1));
        frames as f64 / f64::from(self.sample_rate)
    }

    /// File name of the output, as stored by callers keeping history
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.output_path.file_name().and_then(|n| n.to_str())
    }
}

/// Snapshot of cache state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Whether the shared model has been constructed
    pub model_loaded: bool,
    /// Voices with a resident pipeline, sorted
    pub cached_voices: Vec<String>,
}

/// Text-to-speech engine owning the asset, model and pipeline caches
pub struct TtsEngine<B: SpeechBackend> {
    config: TtsConfig,
    pipelines: VoicePipelineCache<B>,
}

impl<B: SpeechBackend> std::fmt::Debug for TtsEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtsEngine")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<B: SpeechBackend> TtsEngine<B> {
    /// Create an engine fetching assets from the source named in `config`
    ///
    /// Nothing is fetched or loaded until the first synthesis or [`preload`](Self::preload).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid or the source
    /// cannot be built.
    pub fn new(config: TtsConfig, backend: B) -> NarrateResult<Self> {
        config.validate()?;
        let assets = AssetStore::from_config(&config)?;
        Ok(Self::assemble(config, backend, assets))
    }

    /// Create an engine with an explicit asset source
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid.
    pub fn with_source(
        config: TtsConfig,
        backend: B,
        source: Arc<dyn AssetSource>,
    ) -> NarrateResult<Self> {
        config.validate()?;
        let assets = AssetStore::with_source(&config, source);
        Ok(Self::assemble(config, backend, assets))
    }

    fn assemble(config: TtsConfig, backend: B, assets: AssetStore) -> Self {
        info!(
            "TTS engine over {:?} (repo {}, default voice {}, {:?} init locking)",
            config.model_dir, config.repo_id, config.default_voice, config.init_locking
        );
        let pipelines = VoicePipelineCache::new(
            Arc::new(backend),
            assets,
            config.default_voice.clone(),
            config.init_locking,
        );
        Self { config, pipelines }
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &TtsConfig {
        &self.config
    }

    /// Pipeline cache backing this engine
    #[must_use]
    pub fn pipelines(&self) -> &VoicePipelineCache<B> {
        &self.pipelines
    }

    /// Synthesize `text` and write it to a new WAV file for `identity`
    ///
    /// `voice` falls back to the configured default when `None` or empty. The
    /// call blocks through any asset fetch, model load and generation it needs.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for blank text or a malformed voice id; nothing is written
    /// - `AssetResolution`, `ModelConstruction` or `PipelineConstruction` if the
    ///   voice cannot be initialized
    /// - `EmptyOutput` if the pipeline yields no audio
    /// - `SynthesisError` or `FileError` if generation or writing fails
    pub fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        identity: &str,
    ) -> NarrateResult<SynthesisResult> {
        let voice = self.validate_input(text, voice)?;

        let (pipeline, voice_path) = self.pipelines.get(voice)?;
        let channels = pipeline.channels();
        let samples = drain_stream(pipeline.generate(text.trim(), &voice_path)?, voice)?;

        let safe_identity = sanitize_identity(identity);
        let dir = self.config.audio_root.join(&safe_identity);
        std::fs::create_dir_all(&dir).map_err(|e| {
            NarrateError::file(format!("create output directory {}: {e}", dir.display()))
        })?;

        let file_name = output_file_name(&safe_identity, voice, &Local::now().naive_local());
        let path = dir.join(file_name);
        AudioWriter::with_settings(EncodingSettings::new(self.config.sample_rate, channels))
            .write_wav(&samples, &path)?;
        let output_path = path.canonicalize()?;

        info!(
            "Synthesized {} samples with voice '{}' to {:?}",
            samples.len(),
            voice,
            output_path
        );

        Ok(SynthesisResult {
            output_path,
            sample_rate: self.config.sample_rate,
            voice: voice.to_string(),
            num_samples: samples.len(),
            channels,
        })
    }

    /// [`synthesize`](Self::synthesize) taking a request value
    ///
    /// # Errors
    ///
    /// See [`synthesize`](Self::synthesize).
    pub fn synthesize_request(&self, request: &SynthesisRequest) -> NarrateResult<SynthesisResult> {
        self.synthesize(&request.text, request.voice.as_deref(), &request.identity)
    }

    /// Run a synthesis on the blocking thread pool
    ///
    /// Dropping the returned future does not stop the work; the file is still
    /// written.
    ///
    /// # Errors
    ///
    /// See [`synthesize`](Self::synthesize); a panicked task surfaces as
    /// `ConcurrencyError`.
    pub async fn synthesize_async(
        self: &Arc<Self>,
        request: SynthesisRequest,
    ) -> NarrateResult<SynthesisResult> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.synthesize_request(&request)).await?
    }

    /// Initialize pipelines ahead of traffic
    ///
    /// # Errors
    ///
    /// Stops at the first voice that fails to initialize.
    pub fn preload<I, S>(&self, voices: I) -> NarrateResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for voice in voices {
            let voice = voice.as_ref();
            debug!("Preloading voice '{}'", voice);
            self.pipelines.get(voice)?;
        }
        Ok(())
    }

    /// Cache state snapshot
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            model_loaded: self.pipelines.model().is_some(),
            cached_voices: self.pipelines.cached_voices(),
        }
    }

    /// Resolve a previously written file for serving back to `identity`
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` unless the file exists inside the identity's
    /// directory.
    pub fn media_path(&self, identity: &str, file_name: &str) -> NarrateResult<PathBuf> {
        resolve_media_path(&self.config.audio_root, identity, file_name)
    }

    /// Directory files for `identity` are written to
    #[must_use]
    pub fn identity_dir(&self, identity: &str) -> PathBuf {
        crate::identity::identity_dir(&self.config.audio_root, identity)
    }

    /// Audio root
    #[must_use]
    pub fn audio_root(&self) -> &Path {
        &self.config.audio_root
    }

    fn validate_input<'a>(&'a self, text: &str, voice: Option<&'a str>) -> NarrateResult<&'a str> {
        if text.trim().is_empty() {
            return Err(NarrateError::invalid_input("Text cannot be empty"));
        }

        if text.len() > crate::MAX_TEXT_LENGTH {
            return Err(NarrateError::invalid_input(format!(
                "Text too long: {} bytes (max {})",
                text.len(),
                crate::MAX_TEXT_LENGTH
            )));
        }

        let voice = voice
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.config.default_voice);
        validate_voice_id(voice)?;
        Ok(voice)
    }
}

/// Consume the stream in order into one buffer
fn drain_stream(stream: ChunkStream<'_>, voice: &str) -> NarrateResult<Vec<f32>> {
    let mut samples = Vec::new();
    let mut chunks = 0usize;

    for chunk in stream {
        let chunk = chunk?;
        chunks += 1;
        samples.extend_from_slice(&chunk);
    }

    debug!("Collected {} chunks ({} samples) for voice '{}'", chunks, samples.len(), voice);
    if samples.is_empty() {
        return Err(NarrateError::empty_output(voice));
    }
    Ok(samples)
}
