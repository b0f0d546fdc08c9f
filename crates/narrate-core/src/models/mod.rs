//! Backend seam and the caches built on top of it
//!
//! A [`SpeechBackend`] knows how to turn asset files into a shared model and
//! how to bind a per-voice [`VoicePipeline`] to that model. The caches in this
//! module make sure each of those constructions happens once.

use std::path::Path;
use std::sync::Arc;

use crate::error::NarrateResult;

/// Single shared model slot
pub mod model_cache;
/// Per-voice pipeline map
pub mod pipeline_cache;

pub use model_cache::ModelCache;
pub use pipeline_cache::VoicePipelineCache;

/// One buffer of samples produced by a single generation step
pub type AudioChunk = Vec<f32>;

/// Ordered, finite sequence of chunks for one input text
pub type ChunkStream<'a> = Box<dyn Iterator<Item = NarrateResult<AudioChunk>> + 'a>;

/// Loaded model shared by every pipeline
pub type ModelHandle<B> = Arc<<B as SpeechBackend>::Model>;

/// Pipeline for one voice
pub type PipelineHandle<B> = Arc<<B as SpeechBackend>::Pipeline>;

/// Model loader and pipeline builder for one synthesis technology
pub trait SpeechBackend: Send + Sync + 'static {
    /// Loaded acoustic model
    type Model: Send + Sync + 'static;
    /// Per-voice synthesis object
    type Pipeline: VoicePipeline + 'static;

    /// Construct the shared model from its config and weights files
    ///
    /// # Errors
    ///
    /// Returns an error if the files are malformed or incompatible.
    fn load_model(&self, config_path: &Path, weights_path: &Path) -> NarrateResult<Self::Model>;

    /// Bind a pipeline for `voice` to the shared model
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline cannot be built for this voice.
    fn build_pipeline(&self, model: Arc<Self::Model>, voice: &str) -> NarrateResult<Self::Pipeline>;
}

/// Turns text into audio chunks for one voice
pub trait VoicePipeline: Send + Sync {
    /// Start generation for `text` using the voice embedding at `voice_path`
    ///
    /// Segmentation is up to the pipeline. The stream must be finite and yield
    /// chunks in playback order.
    ///
    /// # Errors
    ///
    /// Returns an error if generation cannot start; failures part-way through
    /// are yielded by the stream.
    fn generate<'a>(&'a self, text: &'a str, voice_path: &'a Path) -> NarrateResult<ChunkStream<'a>>;

    /// Interleaved channel count of the produced samples
    fn channels(&self) -> u16 {
        crate::DEFAULT_CHANNELS
    }
}
