//! Engine configuration, loadable from TOML.
//!
//! Every field has a default matching the stock Kokoro-82M deployment, so an
//! empty file (or no file at all) yields a working configuration.
//!
//! ```toml
//! model_dir = "model"
//! audio_root = "audio"
//! default_voice = "af_heart"
//! init_locking = "per_voice"
//!
//! [source]
//! kind = "http"
//! endpoint = "https://hf-mirror.example.com"
//! ```

use std::path::{Component, Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{NarrateError, NarrateResult};
use crate::voice_manager::validate_voice_id;

/// HuggingFace repository holding the PyTorch release of Kokoro-82M
pub const KOKORO_REPO_ID: &str = "hexgrad/Kokoro-82M";

/// HuggingFace repository holding the ONNX export of Kokoro-82M
pub const KOKORO_ONNX_REPO_ID: &str = "onnx-community/Kokoro-82M-v1.0-ONNX";

const VOICE_PLACEHOLDER: &str = "{voice}";

/// Remote names of the three files every synthesis depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLayout {
    /// Shared model configuration
    pub config_file: String,
    /// Shared model weights
    pub weights_file: String,
    /// Per-voice weights; `{voice}` is replaced with the voice id
    pub voice_template: String,
}

impl Default for AssetLayout {
    fn default() -> Self {
        Self::kokoro()
    }
}

impl AssetLayout {
    /// Layout of the PyTorch release (`config.json`, `kokoro-v1_0.pth`, `voices/*.pt`)
    #[must_use]
    pub fn kokoro() -> Self {
        Self {
            config_file: "config.json".to_string(),
            weights_file: "kokoro-v1_0.pth".to_string(),
            voice_template: "voices/{voice}.pt".to_string(),
        }
    }

    /// Layout of the ONNX export consumed by the `onnx` backend
    #[must_use]
    pub fn kokoro_onnx() -> Self {
        Self {
            config_file: "tokenizer.json".to_string(),
            weights_file: "onnx/model.onnx".to_string(),
            voice_template: "voices/{voice}.bin".to_string(),
        }
    }

    /// Remote name of the weights file for `voice`
    #[must_use]
    pub fn voice_file(&self, voice: &str) -> String {
        self.voice_template.replace(VOICE_PLACEHOLDER, voice)
    }

    fn validate(&self) -> NarrateResult<()> {
        for name in [&self.config_file, &self.weights_file, &self.voice_template] {
            validate_relative(name)?;
        }
        if !self.voice_template.contains(VOICE_PLACEHOLDER) {
            return Err(NarrateError::configuration(format!(
                "voice_template '{}' must contain {VOICE_PLACEHOLDER}",
                self.voice_template
            )));
        }
        Ok(())
    }
}

fn validate_relative(name: &str) -> NarrateResult<()> {
    let path = Path::new(name);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if name.is_empty() || escapes {
        return Err(NarrateError::configuration(format!(
            "asset name '{name}' must be a non-empty relative path without '..'"
        )));
    }
    Ok(())
}

/// Where missing assets are fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// HuggingFace Hub through the `hf-hub` client
    HfHub {
        /// Blob cache for the hub client; the platform default when absent
        #[serde(default)]
        cache_dir: Option<PathBuf>,
    },
    /// Plain HTTP mirror serving `{endpoint}/{repo}/resolve/{revision}/{file}`
    Http {
        /// Base URL of the mirror
        endpoint: String,
        /// Git revision to pull
        #[serde(default = "default_revision")]
        revision: String,
    },
}

fn default_revision() -> String {
    "main".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::HfHub { cache_dir: None }
    }
}

/// How first-use initialization is serialized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitLocking {
    /// One lock for all voices: concurrent warm-ups of different voices queue
    #[default]
    Global,
    /// One lock per voice id: different voices warm up in parallel
    PerVoice,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Local asset root
    pub model_dir: PathBuf,
    /// Root under which per-identity output directories are created
    pub audio_root: PathBuf,
    /// Remote repository the assets live in
    pub repo_id: String,
    /// Voice used when a request names none
    pub default_voice: String,
    /// Sample rate written to every output file
    pub sample_rate: u32,
    /// Remote file names
    pub layout: AssetLayout,
    /// Remote source
    pub source: SourceConfig,
    /// First-use serialization strategy
    pub init_locking: InitLocking,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("model"),
            audio_root: PathBuf::from("audio"),
            repo_id: KOKORO_REPO_ID.to_string(),
            default_voice: crate::DEFAULT_VOICE.to_string(),
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            layout: AssetLayout::kokoro(),
            source: SourceConfig::default(),
            init_locking: InitLocking::Global,
        }
    }
}

impl TtsConfig {
    /// Defaults for the ONNX export used by the `onnx` backend
    #[must_use]
    pub fn kokoro_onnx() -> Self {
        Self {
            repo_id: KOKORO_ONNX_REPO_ID.to_string(),
            layout: AssetLayout::kokoro_onnx(),
            ..Self::default()
        }
    }

    /// Place assets and audio under the platform cache/data directories
    ///
    /// # Errors
    ///
    /// Returns an error if the platform directories cannot be determined.
    pub fn with_default_dirs(mut self) -> NarrateResult<Self> {
        let proj_dirs = ProjectDirs::from("ai", "Narrate", "narrate").ok_or_else(|| {
            NarrateError::configuration("Failed to determine project directories")
        })?;

        self.model_dir = proj_dirs.cache_dir().join("models");
        self.audio_root = proj_dirs.data_dir().join("audio");
        tracing::info!("Using platform directories: models={:?}, audio={:?}", self.model_dir, self.audio_root);
        Ok(self)
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed TOML or invalid values.
    pub fn from_toml_str(content: &str) -> NarrateResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document over `base` instead of the stock defaults
    ///
    /// Top-level keys present in `content` replace the corresponding field of
    /// `base` whole; everything else keeps the value from `base`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed TOML or invalid values.
    pub fn from_toml_str_with_base(content: &str, base: &Self) -> NarrateResult<Self> {
        let overrides: toml::Table = toml::from_str(content)?;
        let mut merged = toml::Table::try_from(base).map_err(|e| {
            NarrateError::configuration(format!("Failed to serialize base configuration: {e}"))
        })?;
        merged.extend(overrides);

        let config: Self = toml::Value::Table(merged).try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> NarrateResult<Self> {
        Self::from_toml_str(&read_config_file(path.as_ref())?)
    }

    /// Read a TOML file over `base`, see [`from_toml_str_with_base`](Self::from_toml_str_with_base)
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn from_toml_file_with_base<P: AsRef<Path>>(path: P, base: &Self) -> NarrateResult<Self> {
        Self::from_toml_str_with_base(&read_config_file(path.as_ref())?, base)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first invalid field.
    pub fn validate(&self) -> NarrateResult<()> {
        if self.repo_id.trim().is_empty() {
            return Err(NarrateError::configuration("repo_id cannot be empty"));
        }

        validate_voice_id(&self.default_voice).map_err(|e| {
            NarrateError::configuration(format!("default_voice: {e}"))
        })?;

        if self.sample_rate == 0 {
            return Err(NarrateError::configuration("sample_rate must be greater than 0"));
        }

        self.layout.validate()?;

        if let SourceConfig::Http { endpoint, revision } = &self.source {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(NarrateError::configuration(format!(
                    "source endpoint '{endpoint}' must be an http(s) URL"
                )));
            }
            if revision.is_empty() {
                return Err(NarrateError::configuration("source revision cannot be empty"));
            }
        }

        Ok(())
    }
}

fn read_config_file(path: &Path) -> NarrateResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        NarrateError::configuration(format!("Failed to read {}: {e}", path.display()))
    })
}
