//! WAV container encoder
//!
//! Wraps a PCM payload in the canonical 44-byte RIFF/WAVE header. The
//! payload bytes are copied untouched after the header.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use bytes::Bytes;

use crate::codec::payload::RawAudioPayload;
use crate::constants::{
    BITS_PER_SAMPLE, BLOCK_ALIGN, BYTE_RATE, CHANNELS, SAMPLE_RATE, WAV_HEADER_LEN,
};
use crate::error::CodecError;

/// Bytes of the RIFF chunk that precede the PCM data, excluding the
/// `RIFF` tag and size field themselves
const RIFF_OVERHEAD: u32 = 36;
const FMT_CHUNK_SIZE: u32 = 16;
const FORMAT_PCM: u16 = 1;

/// Self-describing WAV file bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavContainer {
    bytes: Bytes,
}

impl WavContainer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The PCM region following the header
    pub fn pcm_region(&self) -> &[u8] {
        &self.bytes[WAV_HEADER_LEN..]
    }

    /// Parse a container produced by [`to_wav_container`] and recover its
    /// payload. Only the fixed 24 kHz mono 16-bit layout is accepted.
    pub fn parse(bytes: &[u8]) -> Result<RawAudioPayload, CodecError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(CodecError::InvalidContainer(format!(
                "{} bytes is shorter than the header",
                bytes.len()
            )));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(CodecError::InvalidContainer("missing RIFF/WAVE tags".into()));
        }
        if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
            return Err(CodecError::InvalidContainer("unexpected chunk layout".into()));
        }

        let format = LittleEndian::read_u16(&bytes[20..22]);
        let channels = LittleEndian::read_u16(&bytes[22..24]);
        let sample_rate = LittleEndian::read_u32(&bytes[24..28]);
        let bits = LittleEndian::read_u16(&bytes[34..36]);
        if format != FORMAT_PCM
            || channels != CHANNELS
            || sample_rate != SAMPLE_RATE
            || bits != BITS_PER_SAMPLE
        {
            return Err(CodecError::InvalidContainer(format!(
                "unsupported format {} ({} ch, {} Hz, {} bit)",
                format, channels, sample_rate, bits
            )));
        }

        let riff_size = LittleEndian::read_u32(&bytes[4..8]) as usize;
        let data_size = LittleEndian::read_u32(&bytes[40..44]) as usize;
        let available = bytes.len() - WAV_HEADER_LEN;
        if data_size != available || riff_size != data_size + RIFF_OVERHEAD as usize {
            return Err(CodecError::InvalidContainer(format!(
                "size fields (riff {}, data {}) do not match {} payload bytes",
                riff_size, data_size, available
            )));
        }

        RawAudioPayload::from_bytes(Bytes::copy_from_slice(&bytes[WAV_HEADER_LEN..]))
    }
}

/// Build a WAV container around the payload.
///
/// Deterministic: equal payloads always give byte-identical containers.
/// Fails only when the payload cannot be described by 32-bit size fields.
pub fn to_wav_container(payload: &RawAudioPayload) -> Result<WavContainer, CodecError> {
    let data_size = u32::try_from(payload.len())
        .ok()
        .filter(|size| size.checked_add(RIFF_OVERHEAD).is_some())
        .ok_or_else(|| {
            CodecError::EncodeFailure(format!(
                "payload of {} bytes exceeds the RIFF size limit",
                payload.len()
            ))
        })?;

    let mut buf = Vec::with_capacity(WAV_HEADER_LEN + payload.len());
    write_header(&mut buf, data_size)
        .map_err(|e| CodecError::EncodeFailure(e.to_string()))?;
    debug_assert_eq!(buf.len(), WAV_HEADER_LEN);
    buf.extend_from_slice(payload.as_bytes());

    Ok(WavContainer {
        bytes: Bytes::from(buf),
    })
}

fn write_header(buf: &mut Vec<u8>, data_size: u32) -> std::io::Result<()> {
    // RIFF descriptor
    buf.extend_from_slice(b"RIFF");
    buf.write_u32::<LittleEndian>(data_size + RIFF_OVERHEAD)?;
    buf.extend_from_slice(b"WAVE");

    // fmt subchunk
    buf.extend_from_slice(b"fmt ");
    buf.write_u32::<LittleEndian>(FMT_CHUNK_SIZE)?;
    buf.write_u16::<LittleEndian>(FORMAT_PCM)?;
    buf.write_u16::<LittleEndian>(CHANNELS)?;
    buf.write_u32::<LittleEndian>(SAMPLE_RATE)?;
    buf.write_u32::<LittleEndian>(BYTE_RATE)?;
    buf.write_u16::<LittleEndian>(BLOCK_ALIGN)?;
    buf.write_u16::<LittleEndian>(BITS_PER_SAMPLE)?;

    // data subchunk
    buf.extend_from_slice(b"data");
    buf.write_u32::<LittleEndian>(data_size)?;
    Ok(())
}
