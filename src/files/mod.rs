//! Document root access.
//!
//! This module maps request targets onto the filesystem below the
//! document root and renders directory listings. It only ever reads.

pub mod listing;
pub mod resolver;

pub use resolver::{DirEntry, ResolvedResource, resolve};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Bytes escaped inside one path segment. Only RFC 3986 unreserved
/// characters are left alone, which also keeps `<`, `>`, `"`, `'` and `&`
/// out of generated HTML attributes.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encodes one path segment (a file name) for use in a URL.
pub fn encode_segment(name: &str) -> String {
    utf8_percent_encode(name, SEGMENT).to_string()
}

/// Percent-decodes one raw path segment.
///
/// Returns `None` for a truncated or non-hex escape, or when the decoded
/// bytes are not UTF-8.
pub fn decode_segment(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3)?;
            if !escape.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}
