//! Opaque cursor tokens.
//!
//! A token is the lowercase hex of a cursor's JSON form. Both directions
//! enforce [`MAX_CURSOR_TOKEN_LEN`], so every token this crate hands out is
//! one it will accept back.

use std::fmt::Write as _;

use thiserror::Error;

use crate::cursor::StreamCursor;

/// Longest token, in hex characters, that is encoded or decoded.
pub const MAX_CURSOR_TOKEN_LEN: usize = 64 * 1024;

/// Errors from [`encode_cursor`].
#[derive(Debug, Error)]
pub enum CursorEncodeError {
    #[error("cursor could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The cursor carries more state than a token may hold.
    #[error("cursor token would be {len} hex chars (max {max})")]
    TooLong { len: usize, max: usize },
}

/// Errors from [`decode_cursor`].
#[derive(Debug, Error)]
pub enum CursorDecodeError {
    #[error("cursor token is empty")]
    Empty,

    #[error("cursor token is {len} hex chars (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("cursor token must have an even number of hex characters")]
    OddLength,

    /// `position` is 1-based.
    #[error("invalid hex character at position {position}")]
    InvalidHex { position: usize },

    #[error("cursor token payload is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encodes a cursor as an opaque token.
///
/// # Errors
///
/// Fails with [`CursorEncodeError::TooLong`] when the token would not be
/// accepted by [`decode_cursor`].
pub fn encode_cursor(cursor: &StreamCursor) -> Result<String, CursorEncodeError> {
    let bytes = serde_json::to_vec(cursor)?;
    let len = bytes.len() * 2;
    if len > MAX_CURSOR_TOKEN_LEN {
        return Err(CursorEncodeError::TooLong {
            len,
            max: MAX_CURSOR_TOKEN_LEN,
        });
    }

    let mut out = String::with_capacity(len);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    Ok(out)
}

/// Decodes a token produced by [`encode_cursor`]. Surrounding whitespace is trimmed.
pub fn decode_cursor(token: &str) -> Result<StreamCursor, CursorDecodeError> {
    let token = token.trim();

    if token.is_empty() {
        return Err(CursorDecodeError::Empty);
    }

    if token.len() > MAX_CURSOR_TOKEN_LEN {
        return Err(CursorDecodeError::TooLong {
            len: token.len(),
            max: MAX_CURSOR_TOKEN_LEN,
        });
    }

    if token.len() % 2 != 0 {
        return Err(CursorDecodeError::OddLength);
    }

    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 2);
    for idx in (0..bytes.len()).step_by(2) {
        let hi = decode_hex_nibble(bytes[idx])
            .ok_or(CursorDecodeError::InvalidHex { position: idx + 1 })?;
        let lo = decode_hex_nibble(bytes[idx + 1])
            .ok_or(CursorDecodeError::InvalidHex { position: idx + 2 })?;
        out.push((hi << 4) | lo);
    }

    Ok(serde_json::from_slice(&out)?)
}

const fn decode_hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{OriginalElement, StreamElement};
    use crate::multi_cursor::MultiCursor;

    #[test]
    fn token_restores_nested_cursor() {
        let cursor = StreamCursor::Multi(
            MultiCursor::new()
                .with_cursor("a", StreamCursor::offset(3))
                .with_cursor(
                    "b",
                    StreamCursor::Concatenated {
                        source: 1,
                        inner: Some(Box::new(StreamCursor::timestamp(99))),
                        before_ms: Some(120),
                    },
                ),
        );
        let token = encode_cursor(&cursor).unwrap();
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(decode_cursor(&format!("  {token}\n")).unwrap(), cursor);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(decode_cursor("   "), Err(CursorDecodeError::Empty)));
        assert!(matches!(decode_cursor("abc"), Err(CursorDecodeError::OddLength)));
        assert!(matches!(
            decode_cursor("zz"),
            Err(CursorDecodeError::InvalidHex { position: 1 })
        ));
        assert!(matches!(
            decode_cursor("7b7d"),
            Err(CursorDecodeError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_oversized_tokens() {
        let token = "0".repeat(MAX_CURSOR_TOKEN_LEN + 2);
        assert!(matches!(
            decode_cursor(&token),
            Err(CursorDecodeError::TooLong { .. })
        ));
    }

    #[test]
    fn refuses_to_encode_what_it_would_not_decode() {
        let buffer: Vec<StreamElement> = (0..2_000)
            .map(|i| StreamElement::new(OriginalElement::new("posts", format!("post-{i}"))))
            .collect();
        let cursor = StreamCursor::Buffered {
            buffer,
            inner: Some(Box::new(StreamCursor::offset(2_000))),
        };
        match encode_cursor(&cursor) {
            Err(CursorEncodeError::TooLong { len, max }) => {
                assert!(len > max);
                assert_eq!(max, MAX_CURSOR_TOKEN_LEN);
            }
            other => panic!("expected an oversized cursor, got {other:?}"),
        }

        let small = StreamCursor::Buffered {
            buffer: Vec::new(),
            inner: Some(Box::new(StreamCursor::offset(2_000))),
        };
        let token = encode_cursor(&small).unwrap();
        assert!(token.len() <= MAX_CURSOR_TOKEN_LEN);
        assert_eq!(decode_cursor(&token).unwrap(), small);
    }
}
