//! Identity scoping for generated audio.
//!
//! Every requester gets its own directory under the audio root, named by
//! [`sanitize_identity`]. The same mapping is used when files are written and
//! when they are served back through [`resolve_media_path`]; the two must never
//! diverge or the containment check stops meaning anything.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{NarrateError, NarrateResult};

/// Token used when the caller supplies no identity.
pub const DEFAULT_IDENTITY: &str = "default";

/// Timestamp layout embedded in output file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Map an arbitrary identity to a filesystem-safe token.
///
/// Every character outside `[A-Za-z0-9_-]` becomes `_`. An empty identity maps
/// to [`DEFAULT_IDENTITY`]. Never fails.
#[must_use]
pub fn sanitize_identity(identity: &str) -> String {
    if identity.is_empty() {
        return DEFAULT_IDENTITY.to_string();
    }

    identity
        .chars()
        .map(|c| if is_safe_char(c) { c } else { '_' })
        .collect()
}

/// Characters allowed verbatim in identity tokens and voice identifiers.
#[must_use]
pub(crate) const fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Directory holding every file produced for `identity`.
#[must_use]
pub fn identity_dir(audio_root: &Path, identity: &str) -> PathBuf {
    audio_root.join(sanitize_identity(identity))
}

/// Output file name for one synthesis.
///
/// `safe_identity` must already be sanitized. Names are unique per
/// (identity, voice, second); two writes within the same second collide.
#[must_use]
pub fn output_file_name(safe_identity: &str, voice: &str, timestamp: &NaiveDateTime) -> String {
    format!(
        "{safe_identity}_{voice}_{}.wav",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Resolve a requested media file for serving back to `identity`.
///
/// Returns the canonical path only when the file exists and lies inside the
/// identity's directory. Anything else (missing directory, missing file,
/// `..` escapes, symlinks pointing out) is rejected as invalid input.
pub fn resolve_media_path(
    audio_root: &Path,
    identity: &str,
    filename: &str,
) -> NarrateResult<PathBuf> {
    let dir = identity_dir(audio_root, identity);
    let dir_resolved = dir.canonicalize().map_err(|_| {
        NarrateError::invalid_input(format!("No media stored for identity '{identity}'"))
    })?;

    let requested = dir
        .join(filename)
        .canonicalize()
        .map_err(|_| NarrateError::invalid_input(format!("Media file '{filename}' not found")))?;

    if !requested.starts_with(&dir_resolved) || !requested.is_file() {
        return Err(NarrateError::invalid_input(format!(
            "Media file '{filename}' not found"
        )));
    }

    Ok(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("user@example.com", "user_example_com")]
    #[case("", "default")]
    #[case("alice", "alice")]
    #[case("Bob-Smith_2", "Bob-Smith_2")]
    #[case("../../etc", "______etc")]
    #[case("a b/c\\d", "a_b_c_d")]
    #[case("é", "_")]
    fn test_sanitize_identity(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_identity(input), expected);
    }

    #[test]
    fn test_traversal_is_neutralized() {
        let token = sanitize_identity("../../etc/passwd");
        assert!(!token.contains('/'));
        assert!(!token.contains(".."));
    }

    #[test]
    fn test_output_file_name() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap();
        assert_eq!(
            output_file_name("user_example_com", "af_heart", &ts),
            "user_example_com_af_heart_20240309_070501.wav"
        );
    }

    #[test]
    fn test_output_file_names_differ_across_seconds() {
        let first = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap();
        let later = first + chrono::Duration::milliseconds(1_500);
        assert_ne!(
            output_file_name("cli", "af_heart", &first),
            output_file_name("cli", "af_heart", &later)
        );
    }

    #[test]
    fn test_resolve_media_path_inside_dir() {
        let root = TempDir::new().unwrap();
        let dir = identity_dir(root.path(), "user@example.com");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("clip.wav"), b"RIFF").unwrap();

        let resolved = resolve_media_path(root.path(), "user@example.com", "clip.wav").unwrap();
        assert!(resolved.ends_with("user_example_com/clip.wav"));
    }

    #[test]
    fn test_resolve_media_path_rejects_escape() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(identity_dir(root.path(), "alice")).unwrap();
        std::fs::create_dir_all(identity_dir(root.path(), "bob")).unwrap();
        std::fs::write(identity_dir(root.path(), "bob").join("secret.wav"), b"RIFF").unwrap();

        let err = resolve_media_path(root.path(), "alice", "../bob/secret.wav").unwrap_err();
        assert!(matches!(err, NarrateError::InvalidInput { .. }));
    }

    #[test]
    fn test_resolve_media_path_rejects_sibling_prefix() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(identity_dir(root.path(), "alice")).unwrap();
        std::fs::create_dir_all(identity_dir(root.path(), "alice2")).unwrap();
        std::fs::write(identity_dir(root.path(), "alice2").join("a.wav"), b"RIFF").unwrap();

        assert!(resolve_media_path(root.path(), "alice", "../alice2/a.wav").is_err());
    }

    #[test]
    fn test_resolve_media_path_missing() {
        let root = TempDir::new().unwrap();
        assert!(resolve_media_path(root.path(), "nobody", "a.wav").is_err());

        std::fs::create_dir_all(identity_dir(root.path(), "alice")).unwrap();
        assert!(resolve_media_path(root.path(), "alice", "missing.wav").is_err());
        assert!(resolve_media_path(root.path(), "alice", "").is_err());
    }

    proptest! {
        #[test]
        fn prop_sanitized_is_safe(identity in ".*") {
            let token = sanitize_identity(&identity);
            prop_assert!(!token.is_empty());
            prop_assert!(token.chars().all(is_safe_char));
            prop_assert!(!token.contains(".."));
        }

        #[test]
        fn prop_sanitize_is_idempotent(identity in ".*") {
            let once = sanitize_identity(&identity);
            prop_assert_eq!(sanitize_identity(&once), once.clone());
        }

        #[test]
        fn prop_sanitize_keeps_char_count(identity in ".+") {
            prop_assert_eq!(
                sanitize_identity(&identity).chars().count(),
                identity.chars().count()
            );
        }
    }
}
