//! # feed-codec (`codec`)
//!
//! Transport encoding for embedding vectors. A vector is packed as
//! little-endian IEEE-754 `f32` values (4 bytes each), concatenated, and
//! rendered as standard padded base64 so it can travel inside JSON.
//!
//! The encoding is bit-exact: `decode_f32_b64(&encode_f32_b64(v))` returns the
//! same bit patterns for every input, including negative zero and subnormals.
//!
//! ```
//! use codec::{decode_f32_b64, encode_f32_b64};
//!
//! let encoded = encode_f32_b64(&[1.0, -2.5]);
//! assert_eq!(encoded, "AACAPwAAIMA=");
//! assert_eq!(decode_f32_b64(&encoded).unwrap(), vec![1.0, -2.5]);
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Width in bytes of one packed vector component.
pub const F32_WIDTH: usize = std::mem::size_of::<f32>();

/// Errors surfaced while decoding an encoded vector.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The text is not valid standard base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded payload cannot be split into whole `f32` values.
    #[error("invalid float32 byte length: {0} is not a multiple of 4")]
    InvalidLength(usize),
}

/// Pack `vector` as little-endian `f32` bytes and base64-encode the result.
pub fn encode_f32_b64(vector: &[f32]) -> String {
    let mut buf = BytesMut::with_capacity(vector.len() * F32_WIDTH);
    for &value in vector {
        buf.put_f32_le(value);
    }
    STANDARD.encode(&buf)
}

/// Decode a base64 little-endian `f32` payload back into a vector.
pub fn decode_f32_b64(encoded: &str) -> Result<Vec<f32>, CodecError> {
    let raw = STANDARD.decode(encoded.trim())?;
    if raw.len() % F32_WIDTH != 0 {
        return Err(CodecError::InvalidLength(raw.len()));
    }

    let mut cursor = raw.as_slice();
    let mut vector = Vec::with_capacity(raw.len() / F32_WIDTH);
    while cursor.has_remaining() {
        vector.push(cursor.get_f32_le());
    }
    Ok(vector)
}
