//! WAV output for synthesized audio
//!
//! Samples arrive as `f32` in `[-1.0, 1.0]` and are written as integer PCM
//! (16-bit unless configured otherwise) through `hound`.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, warn};

use crate::error::{NarrateError, NarrateResult};

/// PCM encoding settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingSettings {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Bits per sample: 16, 24, or 32 (float)
    pub bit_depth: u16,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            channels: crate::DEFAULT_CHANNELS,
            bit_depth: 16,
        }
    }
}

impl EncodingSettings {
    /// Create 16-bit settings
    #[must_use]
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            ..Default::default()
        }
    }

    /// Set bit depth
    #[must_use]
    pub fn with_bit_depth(mut self, bit_depth: u16) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    /// Validate encoding settings
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an out-of-range rate, channel count or depth.
    pub fn validate(&self) -> NarrateResult<()> {
        if self.sample_rate < 8000 || self.sample_rate > 192_000 {
            return Err(NarrateError::invalid_input(format!(
                "Sample rate must be between 8000 and 192000 Hz, got {}",
                self.sample_rate
            )));
        }

        if self.channels == 0 || self.channels > 8 {
            return Err(NarrateError::invalid_input(format!(
                "Channels must be between 1 and 8, got {}",
                self.channels
            )));
        }

        if !matches!(self.bit_depth, 16 | 24 | 32) {
            return Err(NarrateError::invalid_input(format!(
                "Bit depth must be 16, 24, or 32, got {}",
                self.bit_depth
            )));
        }

        Ok(())
    }

    fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bit_depth,
            sample_format: if self.bit_depth == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

/// Writes sample buffers to WAV files
#[derive(Debug, Clone, Default)]
pub struct AudioWriter {
    settings: EncodingSettings,
}

impl AudioWriter {
    /// Create a writer with custom settings
    #[must_use]
    pub fn with_settings(settings: EncodingSettings) -> Self {
        Self { settings }
    }

    /// Encoding settings in use
    #[must_use]
    pub fn settings(&self) -> &EncodingSettings {
        &self.settings
    }

    /// Write interleaved `samples` to `path`, replacing any existing file
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError` for an empty or non-finite buffer, or
    /// `FileError` if the file cannot be written.
    pub fn write_wav(&self, samples: &[f32], path: &Path) -> NarrateResult<()> {
        self.validate_samples(samples)?;
        self.settings.validate()?;

        debug!(
            "Writing {} samples to {:?} ({} Hz, {} ch, {} bit)",
            samples.len(),
            path,
            self.settings.sample_rate,
            self.settings.channels,
            self.settings.bit_depth
        );

        let mut writer = WavWriter::create(path, self.settings.wav_spec())?;
        match self.settings.bit_depth {
            16 => {
                for &sample in samples {
                    writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?;
                }
            }
            24 => {
                for &sample in samples {
                    writer.write_sample((sample.clamp(-1.0, 1.0) * 8_388_607.0) as i32)?;
                }
            }
            _ => {
                for &sample in samples {
                    writer.write_sample(sample.clamp(-1.0, 1.0))?;
                }
            }
        }
        writer.finalize()?;

        Ok(())
    }

    fn validate_samples(&self, samples: &[f32]) -> NarrateResult<()> {
        if samples.is_empty() {
            return Err(NarrateError::synthesis("Audio data cannot be empty"));
        }

        if samples.len() % usize::from(self.settings.channels.max(1)) != 0 {
            return Err(NarrateError::synthesis(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                self.settings.channels
            )));
        }

        if let Some(i) = samples.iter().position(|s| !s.is_finite()) {
            return Err(NarrateError::synthesis(format!(
                "Invalid audio sample at index {i}: {}",
                samples[i]
            )));
        }

        if samples.iter().any(|s| s.abs() > 1.0) {
            warn!("Audio exceeds range [-1.0, 1.0] and will be clipped");
        }

        Ok(())
    }
}
