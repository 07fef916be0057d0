//! Payload codec
//!
//! Converts the base64 wire payload into raw PCM bytes, normalizes those
//! bytes into float samples for playback and wraps them in a WAV container
//! for download. Everything here works on plain byte buffers and holds no
//! state, so it is safe to call from several places at once.

pub mod decoder;
pub mod encoder;
pub mod payload;

pub use decoder::{to_decoded_audio, DecodedAudio};
pub use encoder::{to_wav_container, WavContainer};
pub use payload::{decode_base64, encode_base64, RawAudioPayload};
