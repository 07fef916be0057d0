//! Raw PCM payload as delivered by the speech provider

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;

use crate::constants::{BYTES_PER_SAMPLE, SAMPLE_RATE};
use crate::error::CodecError;

/// Immutable little-endian 16-bit mono PCM at 24 kHz.
///
/// The byte length is always even. Clones share the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAudioPayload {
    bytes: Bytes,
}

impl RawAudioPayload {
    /// Wrap raw PCM bytes, rejecting buffers that do not hold whole samples
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self, CodecError> {
        let bytes = bytes.into();
        if bytes.len() % BYTES_PER_SAMPLE != 0 {
            return Err(CodecError::OddByteLength(bytes.len()));
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.bytes.len() / BYTES_PER_SAMPLE
    }

    /// Playback duration at normal speed
    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.sample_count() as f64 / SAMPLE_RATE as f64)
    }
}

/// Decode a standard base64 string into a PCM payload.
///
/// Leading and trailing whitespace is ignored. The empty string is a valid,
/// zero-length payload.
pub fn decode_base64(text: &str) -> Result<RawAudioPayload, CodecError> {
    let decoded = STANDARD
        .decode(text.trim())
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
    RawAudioPayload::from_bytes(decoded)
}

/// Encode a payload back into its wire form
pub fn encode_base64(payload: &RawAudioPayload) -> String {
    STANDARD.encode(payload.as_bytes())
}
