//! Compact JWS segment codec.
//!
//! A token is `base64url(header).base64url(payload).base64url(signature)`.
//! Nothing here checks signatures, it only moves bytes in and out of the segment encoding.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use serde::{de::DeserializeOwned, Serialize};

/// Unpadded on output, padding-agnostic on input.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors decoding untrusted token data.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The token did not have exactly three segments.
    #[error("incorrect number of segments; expected 3 but got {0}")]
    SegmentCount(usize),

    /// A segment was not valid base64url.
    #[error("invalid base64url segment: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A segment did not hold the expected JSON.
    #[error("invalid JSON segment: {0}")]
    Json(#[from] serde_json::Error),
}

/// Split a token into its header, payload and signature segments.
pub fn split_token(token: &str) -> Result<[&str; 3], DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    match segments.as_slice() {
        &[header, payload, signature] => Ok([header, payload, signature]),
        other => Err(DecodeError::SegmentCount(other.len())),
    }
}

/// JSON-serialize `value` and base64url-encode it.
pub fn encode_segment<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(SEGMENT_ENGINE.encode(serde_json::to_vec(value)?))
}

/// base64url-decode `segment` and JSON-deserialize it into `T`.
pub fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, DecodeError> {
    let bytes = SEGMENT_ENGINE.decode(segment)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// The `header.payload` prefix a signature is computed over.
pub fn signing_input<H: Serialize, P: Serialize>(
    header: &H,
    payload: &P,
) -> Result<String, serde_json::Error> {
    Ok(format!(
        "{}.{}",
        encode_segment(header)?,
        encode_segment(payload)?
    ))
}

/// Encode raw signature bytes as the third segment.
pub fn encode_signature(signature: &[u8]) -> String {
    SEGMENT_ENGINE.encode(signature)
}

/// Decode the third segment into raw signature bytes.
pub fn decode_signature(segment: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(SEGMENT_ENGINE.decode(segment)?)
}

/// Join a signing input and a signature into a complete token.
pub fn assemble(signing_input: &str, signature: &[u8]) -> String {
    format!("{signing_input}.{}", encode_signature(signature))
}
