//! Session orchestrator
//!
//! Sequences what happens when a payload arrives: stop whatever is playing,
//! decode the new payload off the event loop, then hold it ready for a manual
//! play or a single automatic play after a generation.

use std::path::{Path, PathBuf};

use crate::audio::{AudioEngine, SourceId};
use crate::codec::{decode_base64, to_decoded_audio, DecodedAudio, RawAudioPayload};
use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::playback::{PlaybackController, PlaybackState};
use crate::session::download::{download, Download};
use crate::session::history::HistoryItem;

/// A decoded payload held ready for playback and download
#[derive(Debug, Clone)]
pub struct ReadyAudio {
    pub payload: RawAudioPayload,
    pub audio: DecodedAudio,
}

pub struct SessionOrchestrator {
    controller: PlaybackController,
    summary: Option<String>,
    ready: Option<ReadyAudio>,
    auto_play_enabled: bool,
    auto_play_armed: bool,
    generation: u64,
    last_error: Option<String>,
}

impl SessionOrchestrator {
    pub fn new(controller: PlaybackController) -> Self {
        Self {
            controller,
            summary: None,
            ready: None,
            auto_play_enabled: true,
            auto_play_armed: false,
            generation: 0,
            last_error: None,
        }
    }

    /// Session over `engine` with configured transport defaults
    pub fn with_settings(engine: AudioEngine, settings: &PlaybackConfig) -> Self {
        let mut session = Self::new(PlaybackController::with_settings(engine, settings));
        session.auto_play_enabled = settings.auto_play;
        session
    }

    /// A new payload replaces the current one.
    ///
    /// Playback is stopped before decoding starts. On a malformed payload
    /// nothing is ready afterwards and playback stays Idle. Inside a Tokio
    /// runtime the decode runs on the blocking pool; otherwise it runs
    /// inline.
    pub async fn on_new_payload(&mut self, base64: impl Into<String>) -> Result<()> {
        self.controller.on_payload_replaced();
        self.ready = None;
        self.auto_play_armed = false;

        let text = base64.into();
        let decoded = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle
                .spawn_blocking(move || decode_ready(&text))
                .await
                .map_err(|e| Error::Task(e.to_string()))
                .and_then(|result| result),
            // No runtime to offload to, decode on the caller's thread
            Err(_) => decode_ready(&text),
        };

        match decoded {
            Ok(ready) => {
                tracing::info!(
                    samples = ready.audio.len(),
                    duration_ms = ready.audio.duration().as_millis() as u64,
                    "Payload decoded"
                );
                self.ready = Some(ready);
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to decode payload: {}", e);
                Err(self.record(e))
            }
        }
    }

    /// A summary and its audio were just generated (first time, or again
    /// after a voice change). Arms a single automatic play.
    pub async fn on_generation_complete(
        &mut self,
        summary: impl Into<String>,
        base64: impl Into<String>,
    ) -> Result<()> {
        self.summary = Some(summary.into());
        self.on_new_payload(base64).await?;

        self.generation += 1;
        self.auto_play_armed = self.auto_play_enabled;
        tracing::debug!(
            generation = self.generation,
            auto_play = self.auto_play_armed,
            "Generation ready"
        );
        Ok(())
    }

    /// Load an entry from the history list. Never plays on its own.
    pub async fn select_history_item(&mut self, item: &HistoryItem) -> Result<()> {
        self.summary = Some(item.summary.clone());
        self.on_new_payload(item.base64_audio.as_str()).await
    }

    /// Drop the current payload, e.g. while a new summary is being made
    pub fn clear(&mut self) {
        self.controller.on_payload_replaced();
        self.ready = None;
        self.summary = None;
        self.auto_play_armed = false;
    }

    /// Play once if a generation armed it and audio is ready.
    ///
    /// The flag is cleared before playing, so a failed or repeated call never
    /// plays again until the next generation. Returns whether play was
    /// issued.
    pub fn auto_play_once(&mut self) -> Result<bool> {
        if !self.auto_play_armed {
            return Ok(false);
        }
        let Some(ready) = &self.ready else {
            return Ok(false);
        };

        self.auto_play_armed = false;
        tracing::debug!(generation = self.generation, "Auto-playing new summary");
        match self.controller.play(&ready.audio) {
            Ok(_) => Ok(true),
            Err(e) => Err(self.record(e)),
        }
    }

    /// Play button: start the ready audio from the beginning, or stop it
    pub fn toggle_play_pause(&mut self) -> Result<PlaybackState> {
        let Some(ready) = &self.ready else {
            return Ok(self.controller.state());
        };
        match self.controller.toggle(&ready.audio) {
            Ok(state) => Ok(state),
            Err(e) => Err(self.record(e)),
        }
    }

    /// Start the ready audio from the beginning
    pub fn play(&mut self) -> Result<Option<SourceId>> {
        let Some(ready) = &self.ready else {
            return Ok(None);
        };
        match self.controller.play(&ready.audio) {
            Ok(id) => Ok(Some(id)),
            Err(e) => Err(self.record(e)),
        }
    }

    pub fn pause(&mut self) -> bool {
        self.controller.pause()
    }

    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.controller.set_volume(volume)
    }

    pub fn set_playback_rate(&mut self, rate: f32) -> f32 {
        self.controller.set_playback_rate(rate)
    }

    /// WAV download of the ready payload, if there is one along with a
    /// summary
    pub fn download(&mut self) -> Result<Option<Download>> {
        let (Some(ready), Some(summary)) = (&self.ready, &self.summary) else {
            return Ok(None);
        };
        match download(&ready.payload, summary) {
            Ok(file) => Ok(Some(file)),
            Err(e) => Err(self.record(e)),
        }
    }

    /// Write the download into `dir`
    pub fn export_wav(&mut self, dir: &Path) -> Result<Option<PathBuf>> {
        match self.download()? {
            Some(file) => file.write_to(dir).map(Some),
            None => Ok(None),
        }
    }

    fn record(&mut self, error: Error) -> Error {
        self.last_error = Some(error.user_message());
        error
    }

    /// Message for the most recent failure, cleared by the next successful
    /// payload
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn ready(&self) -> Option<&ReadyAudio> {
        self.ready.as_ref()
    }

    pub fn auto_play_armed(&self) -> bool {
        self.auto_play_armed
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController {
        &mut self.controller
    }
}

fn decode_ready(text: &str) -> Result<ReadyAudio> {
    let payload = decode_base64(text)?;
    let audio = to_decoded_audio(&payload);
    Ok(ReadyAudio { payload, audio })
}
