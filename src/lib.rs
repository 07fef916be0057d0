//! # Spoken Summary
//!
//! Audio core for an application that reads article summaries aloud.
//!
//! ## Architecture Overview
//!
//! ```text
//!   TTS provider (external)          UI shell (external)
//!          │ base64 PCM                 │ play / pause / volume / rate / download
//!          ▼                            ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                Session Orchestrator (session)                    │
//! │  payload replaced ─► stop old playback ─► decode ─► ready        │
//! │  auto-play once per generation, WAV download naming              │
//! └────────────┬───────────────────────────────────┬────────────────┘
//!              │                                   │
//!              ▼                                   ▼
//! ┌──────────────────────────┐      ┌──────────────────────────────┐
//! │   Payload Codec (codec)  │      │ Playback Controller          │
//! │  base64 ─► PCM bytes     │      │ (playback)                   │
//! │  PCM ─► f32 samples      │      │  Idle ◄──► Playing           │
//! │  PCM ─► WAV container    │      │  one active source at most   │
//! └──────────────────────────┘      └──────────────┬───────────────┘
//!                                                  │
//!                                                  ▼
//!                                   ┌──────────────────────────────┐
//!                                   │ Audio Engine (audio)         │
//!                                   │  source ─► gain ─► output    │
//!                                   │  cpal stream / headless      │
//!                                   └──────────────────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod playback;
pub mod session;

pub use error::{Error, ErrorKind, Result};

/// Application-wide constants
pub mod constants {
    /// Sample rate of every payload the provider returns
    pub const SAMPLE_RATE: u32 = 24_000;

    /// Payloads are mono
    pub const CHANNELS: u16 = 1;

    pub const BITS_PER_SAMPLE: u16 = 16;

    pub const BYTES_PER_SAMPLE: usize = 2;

    pub const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;

    pub const BYTE_RATE: u32 = SAMPLE_RATE * BLOCK_ALIGN as u32;

    /// Size of the canonical RIFF/WAVE header
    pub const WAV_HEADER_LEN: usize = 44;

    pub const MIN_VOLUME: f32 = 0.0;
    pub const MAX_VOLUME: f32 = 1.0;
    pub const DEFAULT_VOLUME: f32 = 1.0;

    pub const MIN_PLAYBACK_RATE: f32 = 0.5;
    pub const MAX_PLAYBACK_RATE: f32 = 2.0;
    pub const DEFAULT_PLAYBACK_RATE: f32 = 1.0;

    /// How long a caller waits for the output thread to answer a command
    pub const OUTPUT_COMMAND_TIMEOUT_MS: u64 = 2_000;

    /// Words of the summary used for a history entry title
    pub const TITLE_WORDS: usize = 8;

    /// Words of the summary used for the download filename
    pub const FILENAME_WORDS: usize = 4;

    /// Filename stem used when the summary yields no usable characters
    pub const DEFAULT_FILENAME_STEM: &str = "summary";

    /// Date suffix of download filenames (year, day, month)
    pub const FILENAME_DATE_FORMAT: &str = "%Y-%d-%m";
}
