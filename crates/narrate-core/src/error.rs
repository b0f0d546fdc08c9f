//! Error types for the Narrate synthesis engine.

/// Result type alias for Narrate operations
pub type NarrateResult<T> = Result<T, NarrateError>;

/// Main error type for Narrate synthesis operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NarrateError {
    /// Rejected caller input (blank text, malformed voice id, bad media path)
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input
        message: String,
    },

    /// The pipeline produced no audio chunks for otherwise valid input
    #[error("No audio produced by pipeline for voice '{voice}'")]
    EmptyOutput {
        /// Voice whose pipeline yielded nothing
        voice: String,
    },

    /// A required asset could not be fetched or cached locally
    #[error("Failed to resolve asset '{asset}': {message}")]
    AssetResolution {
        /// Remote name of the asset being resolved
        asset: String,
        /// Error message describing the failure
        message: String,
    },

    /// The shared model could not be constructed from its assets
    #[error("Model construction failed: {message}")]
    ModelConstruction {
        /// Error message describing the construction failure
        message: String,
    },

    /// A per-voice pipeline could not be built against the shared model
    #[error("Pipeline construction failed for voice '{voice}': {message}")]
    PipelineConstruction {
        /// Voice whose pipeline failed
        voice: String,
        /// Error message describing the failure
        message: String,
    },

    /// The generation stream failed part-way through
    #[error("Generation failed: {message}")]
    SynthesisError {
        /// Error message describing the failure
        message: String,
    },

    /// Filesystem failure while writing or resolving output
    #[error("File I/O error: {message}")]
    FileError {
        /// Path and operation that failed
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Offending field or value
        message: String,
    },

    /// A worker task panicked or was cancelled
    #[error("Concurrency error: {message}")]
    ConcurrencyError {
        /// Lock or task failure detail
        message: String,
    },
}

impl NarrateError {
    /// Create a new invalid input error
    #[must_use]
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new empty output error
    #[must_use]
    pub fn empty_output<S: Into<String>>(voice: S) -> Self {
        Self::EmptyOutput {
            voice: voice.into(),
        }
    }

    /// Create a new asset resolution error
    #[must_use]
    pub fn asset_resolution<A: Into<String>, S: Into<String>>(asset: A, message: S) -> Self {
        Self::AssetResolution {
            asset: asset.into(),
            message: message.into(),
        }
    }

    /// Create a new model construction error
    #[must_use]
    pub fn model_construction<S: Into<String>>(message: S) -> Self {
        Self::ModelConstruction {
            message: message.into(),
        }
    }

    /// Create a new pipeline construction error
    #[must_use]
    pub fn pipeline_construction<V: Into<String>, S: Into<String>>(voice: V, message: S) -> Self {
        Self::PipelineConstruction {
            voice: voice.into(),
            message: message.into(),
        }
    }

    /// Create a new synthesis error
    #[must_use]
    pub fn synthesis<S: Into<String>>(message: S) -> Self {
        Self::SynthesisError {
            message: message.into(),
        }
    }

    /// Create a new file error
    #[must_use]
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::FileError {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new concurrency error
    #[must_use]
    pub fn concurrency<S: Into<String>>(message: S) -> Self {
        Self::ConcurrencyError {
            message: message.into(),
        }
    }

    /// Check if a later call could succeed without any caller-side change
    ///
    /// Asset fetches and model construction leave no cached failure behind,
    /// so another attempt re-runs them from scratch.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::AssetResolution { .. }
                | Self::ModelConstruction { .. }
                | Self::PipelineConstruction { .. }
                | Self::ConcurrencyError { .. }
        )
    }

    /// Check if this error is due to invalid user input
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::ConfigurationError { .. }
        )
    }

    /// Get the error category for logging
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "input",
            Self::EmptyOutput { .. } => "empty_output",
            Self::AssetResolution { .. } => "asset",
            Self::ModelConstruction { .. } => "model",
            Self::PipelineConstruction { .. } => "pipeline",
            Self::SynthesisError { .. } => "synthesis",
            Self::FileError { .. } => "file",
            Self::ConfigurationError { .. } => "configuration",
            Self::ConcurrencyError { .. } => "concurrency",
        }
    }
}

impl From<std::io::Error> for NarrateError {
    fn from(err: std::io::Error) -> Self {
        Self::file(err.to_string())
    }
}

impl From<serde_json::Error> for NarrateError {
    fn from(err: serde_json::Error) -> Self {
        Self::file(format!("JSON serialization error: {err}"))
    }
}

impl From<toml::de::Error> for NarrateError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(format!("Invalid TOML: {err}"))
    }
}

impl From<hound::Error> for NarrateError {
    fn from(err: hound::Error) -> Self {
        Self::file(format!("WAV encoding error: {err}"))
    }
}

impl From<tokio::task::JoinError> for NarrateError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::concurrency(format!("Synthesis task failed: {err}"))
    }
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for NarrateError {
    fn from(err: ort::Error) -> Self {
        Self::synthesis(format!("ONNX runtime error: {err}"))
    }
}

#[cfg(feature = "onnx")]
impl From<ndarray::ShapeError> for NarrateError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::synthesis(format!("Tensor shape error: {err}"))
    }
}
