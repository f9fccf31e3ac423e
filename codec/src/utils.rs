// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use uuid::Uuid;

#[derive(Debug)]
pub enum StringError {
    InvalidUtf8,
}

/// Convert a byte slice into an owned UTF-8 `String`.
///
/// # Errors
///
/// Returns error if `bytes` is not valid UTF-8.
pub fn to_utf8_string(bytes: &[u8]) -> Result<String, StringError> {
    String::from_utf8(bytes.to_vec()).map_err(|_err| StringError::InvalidUtf8)
}

/// Generate a fresh envelope/subscription identifier.
///
/// Envelope ids are UUID strings, matching the wire contract of existing peers.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Header keys are restricted to `[A-Za-z0-9-]`.
#[must_use]
pub fn is_valid_header_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Custom header values are restricted to `[A-Za-z0-9 ;:,+&?.*/\_-]`.
#[must_use]
pub fn is_valid_header_value(value: &str) -> bool {
    value.bytes().all(|b| {
        b.is_ascii_alphanumeric()
            || matches!(
                b,
                b' ' | b';' | b':' | b',' | b'+' | b'&' | b'?' | b'.' | b'*' | b'/' | b'\\' | b'_' | b'-'
            )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_key_charset() {
        assert!(is_valid_header_key("correlation-Id42"));
        assert!(!is_valid_header_key(""));
        assert!(!is_valid_header_key("has space"));
        assert!(!is_valid_header_key("has.dot"));
    }

    #[test]
    fn header_value_charset() {
        assert!(is_valid_header_value("a/b;c:d,e+f&g?h.i*j_k-l m"));
        assert!(!is_valid_header_value("disallowed#hash"));
    }
}
