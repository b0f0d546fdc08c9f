// Per-voice style table: raw little-endian f32 rows of STYLE_DIM

use std::path::Path;

use crate::error::{NarrateError, NarrateResult};

/// Width of one style vector
pub const STYLE_DIM: usize = 256;

/// Style vectors for one voice, indexed by phoneme token count
#[derive(Debug, Clone, PartialEq)]
pub struct VoicePack {
    data: Vec<f32>,
}

impl VoicePack {
    /// Read a `.bin` voice file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or not a whole number of rows.
    pub fn load(path: &Path) -> NarrateResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes).map_err(|e| {
            NarrateError::synthesis(format!("voice file {}: {e}", path.display()))
        })
    }

    /// Decode raw little-endian `f32` rows
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is empty or not a whole number of rows.
    pub fn from_bytes(bytes: &[u8]) -> NarrateResult<Self> {
        let row_bytes = STYLE_DIM * 4;
        if bytes.is_empty() || bytes.len() % row_bytes != 0 {
            return Err(NarrateError::synthesis(format!(
                "expected a multiple of {row_bytes} bytes, got {}",
                bytes.len()
            )));
        }

        let data = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Self { data })
    }

    /// Number of style rows
    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.len() / STYLE_DIM
    }

    /// Style row for an utterance of `token_count` tokens, clamped to the table
    #[must_use]
    pub fn style(&self, token_count: usize) -> &[f32] {
        let row = token_count.min(self.rows().saturating_sub(1));
        &self.data[row * STYLE_DIM..(row + 1) * STYLE_DIM]
    }
}
