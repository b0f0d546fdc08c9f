//! Voice identifiers and the catalog offered to callers.

use crate::error::{NarrateError, NarrateResult};
use crate::identity::is_safe_char;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Gender classification for voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male voice
    Male,
    /// Female voice
    Female,
    /// Prefix does not encode a gender
    Unknown,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "Male"),
            Self::Female => write!(f, "Female"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One selectable voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Identifier used for asset lookup and output naming (e.g. `af_heart`)
    pub id: String,
    /// Human-readable label
    pub label: String,
}

impl Voice {
    /// Create a new voice entry
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Kokoro language code, taken from the first character of the id
    #[must_use]
    pub fn lang_code(&self) -> char {
        lang_code(&self.id)
    }

    /// Gender, taken from the second character of the id
    #[must_use]
    pub fn gender(&self) -> Gender {
        match self.id.chars().nth(1) {
            Some('f') => Gender::Female,
            Some('m') => Gender::Male,
            _ => Gender::Unknown,
        }
    }
}

static DEFAULT_VOICES: Lazy<Vec<Voice>> = Lazy::new(|| {
    vec![
        Voice::new("af_heart", "Heart (American Female)"),
        Voice::new("af_bella", "Bella (American Female)"),
        Voice::new("am_michael", "Michael (American Male)"),
        Voice::new("bf_emily", "Emily (British Female)"),
        Voice::new("bm_george", "George (British Male)"),
        Voice::new("cf_celine", "Celine (Canadian French)"),
    ]
});

/// Ordered list of voices a front end can offer
#[derive(Debug, Clone)]
pub struct VoiceCatalog {
    voices: Vec<Voice>,
}

impl Default for VoiceCatalog {
    fn default() -> Self {
        Self {
            voices: DEFAULT_VOICES.clone(),
        }
    }
}

impl VoiceCatalog {
    /// Create a catalog with custom voices
    #[must_use]
    pub fn with_voices(voices: Vec<Voice>) -> Self {
        Self { voices }
    }

    /// All voices in display order
    #[must_use]
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Look up a voice by id
    #[must_use]
    pub fn get(&self, voice_id: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.id == voice_id)
    }

    /// Check if the catalog offers `voice_id`
    #[must_use]
    pub fn contains(&self, voice_id: &str) -> bool {
        self.get(voice_id).is_some()
    }
}

/// Kokoro language code for a voice id (`a` = American English, `b` = British, ...)
#[must_use]
pub fn lang_code(voice_id: &str) -> char {
    voice_id.chars().next().unwrap_or('a')
}

/// Check that a voice id is safe to interpolate into asset paths and file names.
///
/// # Errors
///
/// Returns `InvalidInput` for an empty id or one containing characters outside
/// `[A-Za-z0-9_-]`.
pub fn validate_voice_id(voice_id: &str) -> NarrateResult<()> {
    if voice_id.is_empty() {
        return Err(NarrateError::invalid_input("Voice ID cannot be empty"));
    }

    if !voice_id.chars().all(is_safe_char) {
        return Err(NarrateError::invalid_input(format!(
            "Voice ID '{voice_id}' may only contain letters, digits, '_' and '-'"
        )));
    }

    Ok(())
}
