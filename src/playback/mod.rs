//! Transport control over the single-voice audio graph

pub mod controller;

pub use controller::{PlaybackController, PlaybackState};
