// Phoneme -> token id table read from the model config

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::{NarrateError, NarrateResult};

/// Token id table for IPA symbols
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    ids: HashMap<char, i64>,
}

impl Vocabulary {
    /// Read the table from a JSON config file
    ///
    /// Accepts both the top-level `vocab` object of `config.json` and the
    /// `model.vocab` object of a `tokenizer.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or holds no vocabulary.
    pub fn from_config_file(path: &Path) -> NarrateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let json: Value = serde_json::from_str(&content)?;
        Self::from_json(&json)
    }

    /// Extract the table from a parsed config document
    ///
    /// # Errors
    ///
    /// Returns a model construction error if no vocabulary object is present.
    pub fn from_json(json: &Value) -> NarrateResult<Self> {
        let table = json
            .get("vocab")
            .or_else(|| json.get("model").and_then(|m| m.get("vocab")))
            .and_then(Value::as_object)
            .ok_or_else(|| NarrateError::model_construction("config has no 'vocab' object"))?;

        // Multi-character keys are tokenizer specials, not phonemes
        let ids: HashMap<char, i64> = table
            .iter()
            .filter_map(|(key, id)| {
                let mut chars = key.chars();
                match (chars.next(), chars.next(), id.as_i64()) {
                    (Some(c), None, Some(id)) => Some((c, id)),
                    _ => None,
                }
            })
            .collect();

        if ids.is_empty() {
            return Err(NarrateError::model_construction("vocabulary is empty"));
        }
        Ok(Self { ids })
    }

    /// Map IPA text to token ids, dropping unknown symbols
    #[must_use]
    pub fn encode(&self, ipa: &str) -> Vec<i64> {
        ipa.chars().filter_map(|c| self.ids.get(&c).copied()).collect()
    }

    /// Number of symbols
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_level_vocab() {
        let vocab = Vocabulary::from_json(&json!({"vocab": {"h": 50, "ə": 83, " ": 16}})).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.encode("hə h"), vec![50, 83, 16, 50]);
    }

    #[test]
    fn test_tokenizer_vocab_skips_specials() {
        let vocab = Vocabulary::from_json(&json!({
            "model": {"vocab": {"$": 0, "a": 43, "<pad>": 1}}
        }))
        .unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.encode("a?a"), vec![43, 43]);
    }

    #[test]
    fn test_missing_vocab() {
        let err = Vocabulary::from_json(&json!({"n_token": 178})).unwrap_err();
        assert_eq!(err.category(), "model");
        assert!(Vocabulary::from_json(&json!({"vocab": {}})).is_err());
    }
}
