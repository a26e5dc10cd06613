// Image transport codec: raw bytes ⇄ base64 text

use crate::core::errors::CodecError;
use base64::{engine::general_purpose, Engine};

/// Encode raw image bytes as standard padded base64
pub fn encode(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 text back to raw bytes.
///
/// Leading and trailing ASCII whitespace (a trailing newline from a shell
/// pipeline, for instance) is ignored; anything else outside the alphabet is
/// an error.
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(general_purpose::STANDARD.decode(text.trim_ascii())?)
}
