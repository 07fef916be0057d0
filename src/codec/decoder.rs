//! PCM decoder
//!
//! Normalizes 16-bit PCM into f32 samples ready for the audio graph.

use byteorder::{ByteOrder, LittleEndian};
use std::sync::Arc;
use std::time::Duration;

use crate::codec::payload::RawAudioPayload;
use crate::constants::{BYTES_PER_SAMPLE, CHANNELS, SAMPLE_RATE};

/// Scale between int16 PCM and normalized float samples
const PCM_SCALE: f32 = 32768.0;

/// Normalized sample buffer
///
/// Samples are shared, so handing a clone to the audio thread does not copy
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
}

impl DecodedAudio {
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub(crate) fn shared_samples(&self) -> Arc<[f32]> {
        self.samples.clone()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples (per channel; the format is mono)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration at a playback rate of 1.0
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Convert a PCM payload into normalized samples: `s / 32768.0`
pub fn to_decoded_audio(payload: &RawAudioPayload) -> DecodedAudio {
    let samples: Arc<[f32]> = payload
        .as_bytes()
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| LittleEndian::read_i16(pair) as f32 / PCM_SCALE)
        .collect();

    DecodedAudio {
        samples,
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
    }
}
