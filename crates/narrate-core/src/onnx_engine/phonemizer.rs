// Grapheme -> IPA conversion through the espeak-ng binary

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{NarrateError, NarrateResult};

/// Default espeak-ng executable, looked up on `PATH`
pub const ESPEAK_BINARY: &str = "espeak-ng";

/// espeak-ng voice for a Kokoro language code
#[must_use]
pub fn espeak_language(lang_code: char) -> &'static str {
    match lang_code {
        'b' => "en-gb",
        'e' => "es",
        'f' | 'c' => "fr",
        'h' => "hi",
        'i' => "it",
        'j' => "ja",
        'p' => "pt-br",
        'z' => "cmn",
        _ => "en-us",
    }
}

/// Runs espeak-ng for one language
#[derive(Debug, Clone)]
pub struct Phonemizer {
    binary: PathBuf,
    language: &'static str,
}

impl Phonemizer {
    /// Phonemizer for a Kokoro language code
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, lang_code: char) -> Self {
        Self {
            binary: binary.into(),
            language: espeak_language(lang_code),
        }
    }

    /// espeak-ng voice in use
    #[must_use]
    pub fn language(&self) -> &'static str {
        self.language
    }

    /// IPA transcription of `text`, lines joined with spaces
    ///
    /// # Errors
    ///
    /// Returns a synthesis error if espeak-ng is missing or exits non-zero.
    pub fn phonemize(&self, text: &str) -> NarrateResult<String> {
        let mut child = Command::new(&self.binary)
            .args(["--ipa", "--stdin", "-q", "-v", self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                NarrateError::synthesis(format!(
                    "failed to start {}: {e} (is espeak-ng installed?)",
                    self.binary.display()
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // espeak-ng only flushes a line once it sees the terminator
            stdin.write_all(text.as_bytes())?;
            stdin.write_all(b"\n")?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(NarrateError::synthesis(format!(
                "espeak-ng exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(clean_ipa(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Join espeak output lines and drop its `_` pause markers
fn clean_ipa(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace('_', "")
}
