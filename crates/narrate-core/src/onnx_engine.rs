//! Kokoro backend on ONNX Runtime.
//!
//! The shared model is a pool of sessions over the exported graph plus the
//! phoneme vocabulary from the config file. Each voice pipeline carries its
//! espeak-ng language and lazily loads its style table from the voice file it
//! is handed at generation time.
//!
//! Generation splits the text into segments and runs one inference per
//! segment, so every segment becomes one chunk of the output stream.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{arr1, Array2, ArrayView2};
use once_cell::sync::OnceCell;
use ort::inputs;
use ort::session::Session;
use ort::value::TensorRef;

use crate::error::{NarrateError, NarrateResult};
use crate::models::{AudioChunk, ChunkStream, SpeechBackend, VoicePipeline};
use crate::text::split_segments;
use crate::voice_manager::lang_code;

/// espeak-ng wrapper
pub mod phonemizer;
/// Session pool over the model graph
pub mod session_pool;
/// Phoneme vocabulary
pub mod vocab;
/// Voice style tables
pub mod voice_pack;

pub use phonemizer::{Phonemizer, ESPEAK_BINARY};
pub use session_pool::SessionPool;
pub use vocab::Vocabulary;
pub use voice_pack::{VoicePack, STYLE_DIM};

/// Longest token sequence the graph accepts, excluding the two pad tokens
pub const MAX_TOKENS: usize = 510;

/// Backend settings
#[derive(Debug, Clone)]
pub struct OnnxBackend {
    pool_size: usize,
    speed: f32,
    espeak_binary: PathBuf,
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self {
            pool_size: 1,
            speed: 1.0,
            espeak_binary: PathBuf::from(ESPEAK_BINARY),
        }
    }
}

impl OnnxBackend {
    /// Backend with one session, normal speed and espeak-ng from `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions kept over the model graph
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    /// Speaking rate multiplier
    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Path of the espeak-ng executable
    #[must_use]
    pub fn with_espeak_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.espeak_binary = binary.into();
        self
    }
}

/// Loaded Kokoro graph and vocabulary
#[derive(Debug)]
pub struct KokoroOnnxModel {
    sessions: SessionPool,
    vocab: Vocabulary,
    tokens_input: String,
    speed_is_int32: bool,
}

impl KokoroOnnxModel {
    /// Load the graph at `weights_path` with the vocabulary from `config_path`
    ///
    /// # Errors
    ///
    /// Returns a model construction error if either file is unusable.
    pub fn load(config_path: &Path, weights_path: &Path, pool_size: usize) -> NarrateResult<Self> {
        let vocab = Vocabulary::from_config_file(config_path)?;
        let sessions = SessionPool::load(weights_path, pool_size)?;
        let (tokens_input, speed_is_int32) =
            sessions.with_session(|session| Ok(inspect_inputs(session)))?;

        tracing::info!(
            "Kokoro graph ready: {} phonemes, tokens input '{}', int32 speed: {}",
            vocab.len(),
            tokens_input,
            speed_is_int32
        );

        Ok(Self {
            sessions,
            vocab,
            tokens_input,
            speed_is_int32,
        })
    }

    /// Phoneme vocabulary
    #[must_use]
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    fn infer(&self, tokens: &[i64], style: &[f32], speed: f32) -> NarrateResult<AudioChunk> {
        let mut padded = Vec::with_capacity(tokens.len() + 2);
        padded.push(0);
        padded.extend_from_slice(tokens);
        padded.push(0);
        let tokens_arr = Array2::from_shape_vec((1, padded.len()), padded)?;
        let style_view = ArrayView2::from_shape((1, STYLE_DIM), style)?;

        self.sessions.with_session(|session| {
            let outputs = if self.speed_is_int32 {
                let speed_arr = arr1(&[speed.round() as i32]);
                session.run(inputs![
                    self.tokens_input.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
                    "style" => TensorRef::from_array_view(style_view)?,
                    "speed" => TensorRef::from_array_view(speed_arr.view())?,
                ])?
            } else {
                let speed_arr = arr1(&[speed]);
                session.run(inputs![
                    self.tokens_input.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
                    "style" => TensorRef::from_array_view(style_view)?,
                    "speed" => TensorRef::from_array_view(speed_arr.view())?,
                ])?
            };

            let (_, waveform) = outputs
                .iter()
                .next()
                .ok_or_else(|| NarrateError::synthesis("model produced no output"))?;
            let waveform = waveform.try_extract_array::<f32>()?;
            Ok(waveform.iter().copied().collect())
        })
    }
}

/// Token input name and whether `speed` is int32, read from the graph
fn inspect_inputs(session: &Session) -> (String, bool) {
    let tokens_input = session
        .inputs()
        .iter()
        .map(|input| input.name())
        .find(|name| *name == "input_ids" || *name == "tokens")
        .unwrap_or("input_ids")
        .to_string();

    let speed_is_int32 = session
        .inputs()
        .iter()
        .find(|input| input.name() == "speed")
        .is_some_and(|input| format!("{:?}", input.dtype()).to_lowercase().contains("int32"));

    (tokens_input, speed_is_int32)
}

/// Kokoro pipeline for one voice
#[derive(Debug)]
pub struct KokoroPipeline {
    model: Arc<KokoroOnnxModel>,
    voice: String,
    phonemizer: Phonemizer,
    speed: f32,
    pack: OnceCell<VoicePack>,
}

impl KokoroPipeline {
    /// Voice this pipeline speaks with
    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    fn voice_pack(&self, voice_path: &Path) -> NarrateResult<&VoicePack> {
        self.pack.get_or_try_init(|| {
            tracing::debug!("Loading style table for '{}' from {:?}", self.voice, voice_path);
            VoicePack::load(voice_path)
        })
    }

    /// Audio for one segment, `None` when it has nothing to pronounce
    fn segment_audio(&self, segment: &str, pack: &VoicePack) -> NarrateResult<Option<AudioChunk>> {
        let ipa = self.phonemizer.phonemize(segment)?;
        let tokens = self.model.vocab.encode(&ipa);
        if tokens.is_empty() {
            tracing::warn!("No phoneme tokens for segment {:?}", segment);
            return Ok(None);
        }

        let mut audio = Vec::new();
        for piece in tokens.chunks(MAX_TOKENS) {
            audio.extend(self.model.infer(piece, pack.style(piece.len()), self.speed)?);
        }
        Ok(Some(audio))
    }
}

impl VoicePipeline for KokoroPipeline {
    fn generate<'a>(&'a self, text: &'a str, voice_path: &'a Path) -> NarrateResult<ChunkStream<'a>> {
        let pack = self.voice_pack(voice_path)?;
        Ok(Box::new(
            split_segments(text)
                .into_iter()
                .filter_map(move |segment| self.segment_audio(&segment, pack).transpose()),
        ))
    }
}

impl SpeechBackend for OnnxBackend {
    type Model = KokoroOnnxModel;
    type Pipeline = KokoroPipeline;

    fn load_model(&self, config_path: &Path, weights_path: &Path) -> NarrateResult<KokoroOnnxModel> {
        KokoroOnnxModel::load(config_path, weights_path, self.pool_size)
    }

    fn build_pipeline(&self, model: Arc<KokoroOnnxModel>, voice: &str) -> NarrateResult<KokoroPipeline> {
        let phonemizer = Phonemizer::new(&self.espeak_binary, lang_code(voice));
        tracing::debug!("Voice '{}' uses espeak-ng language {}", voice, phonemizer.language());

        Ok(KokoroPipeline {
            model,
            voice: voice.to_string(),
            phonemizer,
            speed: self.speed,
            pack: OnceCell::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_builder() {
        let backend = OnnxBackend::new()
            .with_pool_size(0)
            .with_speed(1.2)
            .with_espeak_binary("/usr/local/bin/espeak-ng");
        assert_eq!(backend.pool_size, 1);
        assert!((backend.speed - 1.2).abs() < f32::EPSILON);
        assert_eq!(backend.espeak_binary, PathBuf::from("/usr/local/bin/espeak-ng"));
    }

    #[test]
    fn test_load_rejects_missing_vocab() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = temp.path().join("config.json");
        std::fs::write(&config, r#"{"n_token": 178}"#).unwrap();

        let err = OnnxBackend::new()
            .load_model(&config, &temp.path().join("model.onnx"))
            .unwrap_err();
        assert_eq!(err.category(), "model");
    }
}
