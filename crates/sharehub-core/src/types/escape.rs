//! Percent-escaping for values stored as path segments.
//!
//! Index values and grantee identities contain `:`, `!`, and `/`, which
//! must not leak into blob-store paths. Escaping must be reversible so
//! `FindByPartial` can match against the original values.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except ASCII alphanumerics, `-`, `_`, and `.` is escaped.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Escape a value for use as a single path segment.
pub fn escape_segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

/// Reverse [`escape_segment`]. Invalid escape sequences decode lossily;
/// only escaped output is ever fed back in.
pub fn unescape_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for value in [
            "user:https://idp.example.org:alice",
            "s1!r1",
            "group:crew/deck",
            "plain",
            "with space",
        ] {
            let escaped = escape_segment(value);
            assert!(!escaped.contains('/'), "escaped {escaped:?} contains a slash");
            assert!(!escaped.contains(':'));
            assert_eq!(unescape_segment(&escaped), value);
        }
    }

    #[test]
    fn test_safe_chars_untouched() {
        assert_eq!(escape_segment("abc-1_2.3"), "abc-1_2.3");
    }
}
