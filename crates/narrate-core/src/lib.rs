//! # Narrate Core
//!
//! Cached Kokoro text-to-speech with per-identity audio output.
//!
//! ## Features
//!
//! - On-demand asset download from the HuggingFace Hub or an HTTP mirror
//! - One shared model and one pipeline per voice, built once under concurrency
//! - Identity-scoped, timestamped WAV output with a matching containment check
//! - Pluggable backends; an ONNX Runtime backend behind the `onnx` feature
//!
//! ## Example
//!
//! ```rust,ignore
//! use narrate_core::{OnnxBackend, TtsConfig, TtsEngine};
//!
//! fn main() -> anyhow::Result<()> {
//!     let engine = TtsEngine::new(TtsConfig::kokoro_onnx(), OnnxBackend::new())?;
//!     let result = engine.synthesize("Hello, world!", Some("af_heart"), "user@example.com")?;
//!     println!("wrote {} at {} Hz", result.output_path.display(), result.sample_rate);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod audio_writer;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
#[cfg(feature = "onnx")]
pub mod onnx_engine;
pub mod text;
pub mod tts_engine;
pub mod voice_manager;

// Re-export main types for convenience
pub use assets::{AssetDescriptor, AssetSource, AssetStore, HfHubSource, HttpSource, ResolvedAssets};
pub use audio_writer::{AudioWriter, EncodingSettings};
pub use config::{AssetLayout, InitLocking, SourceConfig, TtsConfig};
pub use error::{NarrateError, NarrateResult};
pub use identity::{resolve_media_path, sanitize_identity};
pub use models::{
    AudioChunk, ChunkStream, ModelCache, SpeechBackend, VoicePipeline, VoicePipelineCache,
};
#[cfg(feature = "onnx")]
pub use onnx_engine::OnnxBackend;
pub use tts_engine::{EngineStats, SynthesisRequest, SynthesisResult, TtsEngine};
pub use voice_manager::{validate_voice_id, Gender, Voice, VoiceCatalog};

/// Version information for the narrate-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sample rate of every written file (24 kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Default number of audio channels (mono)
pub const DEFAULT_CHANNELS: u16 = 1;

/// Voice used when a request names none
pub const DEFAULT_VOICE: &str = "af_heart";

/// Remote repository the default asset layout lives in
pub const DEFAULT_REPO_ID: &str = config::KOKORO_REPO_ID;

/// Maximum text length for synthesis (to prevent memory issues)
pub const MAX_TEXT_LENGTH: usize = 100_000;
