//! Fit presence lines into Discord's field limit.
//!
//! Discord measures the limit in UTF-16 bytes, so every code unit costs two
//! bytes regardless of how many bytes it takes in UTF-8.

/// Largest line Discord accepts, in UTF-16 bytes
pub const MAX_PRESENCE_BYTES: usize = 127;

/// Code units kept by the first cut of an oversized line
const TRUNCATED_UNITS: usize = 64;

const ELLIPSIS: &str = "...";

fn utf16_bytes(units: usize) -> usize {
    units * 2
}

/// Byte length of `s` encoded as UTF-16
pub fn byte_count(s: &str) -> usize {
    utf16_bytes(s.encode_utf16().count())
}

/// Shorten `s` to at most [`MAX_PRESENCE_BYTES`], marking the cut with "...".
///
/// Lines that already fit are returned untouched.
pub fn truncate(s: &str) -> String {
    if byte_count(s) <= MAX_PRESENCE_BYTES {
        return s.to_string();
    }

    // 121 rather than 123, so the ellipsis still fits under the limit
    let budget = MAX_PRESENCE_BYTES - byte_count(ELLIPSIS);
    let mut units: Vec<u16> = s.encode_utf16().take(TRUNCATED_UNITS).collect();

    while utf16_bytes(units.len()) > budget {
        units.pop();
    }

    // Never leave half of a surrogate pair behind
    if units
        .last()
        .is_some_and(|unit| (0xD800..0xDC00).contains(unit))
    {
        units.pop();
    }

    let mut truncated = String::from_utf16_lossy(&units);
    truncated.push_str(ELLIPSIS);
    truncated
}
