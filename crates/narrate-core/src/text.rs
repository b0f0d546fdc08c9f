//! Text segmentation ahead of generation
//!
//! Each segment becomes one generation step, so one audio chunk. Breaks fall on
//! line breaks and on `.`, `!`, `?`, `;` or `:` followed by whitespace. Segments
//! longer than [`MAX_SEGMENT_CHARS`] are cut at the last space before the limit.

/// Longest segment handed to a single generation step
pub const MAX_SEGMENT_CHARS: usize = 400;

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | ';' | ':')
}

/// Split `text` into trimmed, non-empty segments in reading order
#[must_use]
pub fn split_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' || c == '\r' {
            push_segment(&mut segments, &current);
            current.clear();
            continue;
        }

        current.push(c);
        let at_break = is_terminal(c) && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_break {
            push_segment(&mut segments, &current);
            current.clear();
        }
    }
    push_segment(&mut segments, &current);

    segments
}

fn push_segment(segments: &mut Vec<String>, raw: &str) {
    let mut rest = raw.trim();
    while rest.chars().count() > MAX_SEGMENT_CHARS {
        let limit = rest
            .char_indices()
            .nth(MAX_SEGMENT_CHARS)
            .map_or(rest.len(), |(i, _)| i);
        let cut = rest[..limit].rfind(' ').filter(|&i| i > 0).unwrap_or(limit);
        segments.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        segments.push(rest.to_string());
    }
}
