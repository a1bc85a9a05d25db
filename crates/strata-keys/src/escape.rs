//! Percent escaping for key components.
//!
//! Reserved characters are written as `%` followed by two uppercase hex
//! digits of their byte value. Only ASCII characters are ever reserved, so
//! escaping never splits a multi-byte character.
//!
//! Two reserved sets are used:
//! - [`COLUMN_RESERVED`] for the components of a column id (`%` and `:`)
//! - [`PATH_RESERVED`] for file-system path components, which additionally
//!   escapes path separators and a leading `.`

use crate::error::{KeyError, KeyResult};

/// Characters escaped inside a column id component.
pub const COLUMN_RESERVED: &[char] = &['%', ':'];

/// Characters escaped inside a single path component.
pub const PATH_RESERVED: &[char] = &['%', ':', '/', '\\'];

/// Escape every reserved character in `input`.
///
/// # Examples
///
/// ```
/// use strata_keys::escape::{escape_component, COLUMN_RESERVED};
///
/// assert_eq!(escape_component("a:b", COLUMN_RESERVED), "a%3Ab");
/// assert_eq!(escape_component("100%", COLUMN_RESERVED), "100%25");
/// assert_eq!(escape_component("plain", COLUMN_RESERVED), "plain");
/// ```
pub fn escape_component(input: &str, reserved: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if reserved.contains(&ch) {
            push_escaped(&mut out, ch);
        } else {
            out.push(ch);
        }
    }
    out
}

/// Escape `input` for use as one file-system path component.
///
/// A leading `.` is escaped as well, so `.` and `..` can never be produced.
pub fn escape_path_component(input: &str) -> String {
    let escaped = escape_component(input, PATH_RESERVED);
    match escaped.strip_prefix('.') {
        Some(rest) => {
            let mut out = String::with_capacity(escaped.len() + 2);
            push_escaped(&mut out, '.');
            out.push_str(rest);
            out
        }
        None => escaped,
    }
}

/// Reverse [`escape_component`] and [`escape_path_component`].
///
/// Any `%XX` sequence is decoded, whichever reserved set produced it.
/// Only the uppercase hex that the escapers write is accepted, so every
/// key that parses is already in canonical form.
pub fn unescape_component(input: &str) -> KeyResult<String> {
    if !input.contains('%') {
        return Ok(input.to_string());
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let digits = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| KeyError::malformed(input, "truncated escape sequence"))?;
            if digits.iter().any(u8::is_ascii_lowercase) {
                return Err(KeyError::malformed(input, "escape sequence must use uppercase hex"));
            }
            let decoded = hex::decode(digits).map_err(|e| {
                KeyError::malformed(input, format!("invalid escape sequence: {e}"))
            })?;
            out.extend_from_slice(&decoded);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out)
        .map_err(|_| KeyError::malformed(input, "escape sequence decodes to invalid UTF-8"))
}

fn push_escaped(out: &mut String, ch: char) {
    let mut buf = [0u8; 4];
    for byte in ch.encode_utf8(&mut buf).bytes() {
        out.push('%');
        out.push_str(&hex::encode_upper([byte]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_colon_and_percent() {
        assert_eq!(escape_component("C:\\data", COLUMN_RESERVED), "C%3A\\data");
        assert_eq!(escape_component("%3A", COLUMN_RESERVED), "%253A");
    }

    #[test]
    fn unescape_reverses_escape() {
        for input in ["a:b:c", "%", "%%::", "{object_id}/x.fits[0].header[A:B]", ""] {
            let escaped = escape_component(input, COLUMN_RESERVED);
            assert!(!escaped.contains(':'));
            assert_eq!(unescape_component(&escaped).unwrap(), input);
        }
    }

    #[test]
    fn path_escape_removes_separators() {
        let escaped = escape_path_component("{object_id}/{object_id}_red.json[data]");
        assert!(!escaped.contains('/'));
        assert_eq!(
            unescape_component(&escaped).unwrap(),
            "{object_id}/{object_id}_red.json[data]"
        );
    }

    #[test]
    fn path_escape_neutralizes_dot_components() {
        assert_eq!(escape_path_component(".."), "%2E.");
        assert_eq!(escape_path_component("."), "%2E");
        assert_eq!(escape_path_component(".hidden"), "%2Ehidden");
        assert_eq!(unescape_component("%2E.").unwrap(), "..");
    }

    #[test]
    fn unescape_rejects_truncated_sequence() {
        assert!(unescape_component("abc%3").is_err());
        assert!(unescape_component("abc%").is_err());
    }

    #[test]
    fn unescape_rejects_bad_hex() {
        assert!(unescape_component("%ZZ").is_err());
    }

    #[test]
    fn unescape_rejects_lowercase_hex() {
        assert_eq!(unescape_component("a%3Ab").unwrap(), "a:b");
        let err = unescape_component("a%3ab").unwrap_err();
        assert!(err.to_string().contains("uppercase"), "{err}");
        assert!(unescape_component("%2e.").is_err());
    }
}
