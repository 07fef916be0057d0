//! Playback controller
//!
//! Owns the audio engine and drives the Idle / Playing state machine. Every
//! `play` detaches the previous source before connecting the new one, so two
//! sources never render at the same time.

use std::time::{Duration, Instant};

use crate::audio::{AudioEngine, SourceEvent, SourceId};
use crate::codec::DecodedAudio;
use crate::config::PlaybackConfig;
use crate::constants::{
    DEFAULT_PLAYBACK_RATE, DEFAULT_VOLUME, MAX_PLAYBACK_RATE, MAX_VOLUME, MIN_PLAYBACK_RATE,
    MIN_VOLUME,
};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

pub struct PlaybackController {
    engine: AudioEngine,
    active: Option<SourceId>,
    volume: f32,
    playback_rate: f32,
    next_source: u64,
}

impl PlaybackController {
    pub fn new(engine: AudioEngine) -> Self {
        let controller = Self {
            engine,
            active: None,
            volume: DEFAULT_VOLUME,
            playback_rate: DEFAULT_PLAYBACK_RATE,
            next_source: 1,
        };
        controller.engine.graph().set_gain(controller.volume);
        controller
    }

    /// Controller starting from configured volume and rate
    pub fn with_settings(engine: AudioEngine, settings: &PlaybackConfig) -> Self {
        let mut controller = Self::new(engine);
        controller.set_volume(settings.volume);
        controller.set_playback_rate(settings.playback_rate);
        controller
    }

    /// Start `audio` from the beginning, replacing any active source.
    ///
    /// Fails with `PlaybackUnavailable` when the output cannot be resumed;
    /// the controller is then Idle and the call may be retried.
    pub fn play(&mut self, audio: &DecodedAudio) -> Result<SourceId> {
        self.process_events();

        if let Some(previous) = self.detach_active() {
            tracing::debug!(source = %previous, "Stopped previous source before play");
        }

        if let Err(e) = self.engine.resume() {
            tracing::warn!("Playback unavailable: {}", e);
            return Err(e.into());
        }

        let id = SourceId::new(self.next_source);
        self.next_source += 1;

        if let Some(leftover) = self.engine.graph().connect(id, audio, self.playback_rate) {
            tracing::warn!(source = %leftover, "Graph still held a source, replaced it");
        }
        self.active = Some(id);

        tracing::debug!(
            source = %id,
            samples = audio.len(),
            rate = self.playback_rate,
            "Playback started"
        );
        Ok(id)
    }

    /// Stop the active source. There is no resume point; the next `play`
    /// starts from the beginning. Returns whether anything was playing.
    pub fn pause(&mut self) -> bool {
        self.process_events();
        match self.detach_active() {
            Some(id) => {
                tracing::debug!(source = %id, "Playback paused");
                true
            }
            None => false,
        }
    }

    /// Explicit stop. A no-op when Idle.
    pub fn stop(&mut self) {
        if let Some(id) = self.detach_active() {
            tracing::debug!(source = %id, "Playback stopped");
        }
    }

    /// Play/pause button: pause when Playing, otherwise play `audio`
    pub fn toggle(&mut self, audio: &DecodedAudio) -> Result<PlaybackState> {
        self.process_events();
        if self.is_playing() {
            self.pause();
        } else {
            self.play(audio)?;
        }
        Ok(self.state())
    }

    /// The payload behind the player changed. Always ends in Idle.
    pub fn on_payload_replaced(&mut self) {
        if let Some(id) = self.detach_active() {
            tracing::debug!(source = %id, "Payload replaced, stopped stale source");
        }
        // Completions queued for the old source are stale now
        self.process_events();
    }

    /// Set the gain, clamped to [0, 1]. Applies immediately.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        if volume.is_nan() {
            return self.volume;
        }
        self.volume = volume.clamp(MIN_VOLUME, MAX_VOLUME);
        self.engine.graph().set_gain(self.volume);
        self.volume
    }

    /// Set the rate, clamped to [0.5, 2]. Retunes the active source and
    /// becomes the rate of later plays.
    pub fn set_playback_rate(&mut self, rate: f32) -> f32 {
        if rate.is_nan() {
            return self.playback_rate;
        }
        self.playback_rate = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
        if let Some(id) = self.active {
            self.engine.graph().set_source_rate(id, self.playback_rate);
        }
        self.playback_rate
    }

    /// Apply completion events from the render side.
    ///
    /// A completion only clears the state when it belongs to the source
    /// that is still active. Returns the number of completions applied.
    pub fn process_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.engine.events().try_recv() {
            applied += self.apply_event(event) as usize;
        }
        applied
    }

    /// Block until the active source finishes or `timeout` passes.
    /// Returns true when the controller is Idle.
    pub fn wait_for_completion(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.process_events();
        while self.active.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.engine.events().recv_timeout(remaining) {
                Ok(event) => {
                    self.apply_event(event);
                }
                Err(_) => return self.active.is_none(),
            }
        }
        true
    }

    fn apply_event(&mut self, event: SourceEvent) -> bool {
        match event {
            SourceEvent::Ended(id) if self.active == Some(id) => {
                self.active = None;
                tracing::debug!(source = %id, "Playback finished");
                true
            }
            SourceEvent::Ended(id) => {
                tracing::trace!(source = %id, "Ignoring completion of a replaced source");
                false
            }
        }
    }

    fn detach_active(&mut self) -> Option<SourceId> {
        let connected = self.engine.graph().disconnect();
        self.active.take().or(connected)
    }

    pub fn state(&self) -> PlaybackState {
        if self.active.is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_source(&self) -> Option<SourceId> {
        self.active
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{NullOutput, OutputFormat};
    use crate::codec::{to_decoded_audio, RawAudioPayload};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn audio(samples: usize) -> DecodedAudio {
        let bytes: Vec<u8> = (0..samples)
            .flat_map(|i| ((i as i16).wrapping_mul(64)).to_le_bytes())
            .collect();
        to_decoded_audio(&RawAudioPayload::from_bytes(bytes).unwrap())
    }

    fn controller() -> PlaybackController {
        PlaybackController::new(AudioEngine::headless())
    }

    fn render(controller: &PlaybackController, frames: usize) {
        let mut out = vec![0.0f32; frames];
        controller.engine().graph().render(&mut out);
    }

    #[test]
    fn test_play_then_finish() {
        let mut controller = controller();
        let id = controller.play(&audio(4)).unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.active_source(), Some(id));

        render(&controller, 8);
        assert_eq!(controller.process_events(), 1);
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_play_replaces_active_source() {
        let mut controller = controller();
        let first = controller.play(&audio(100)).unwrap();
        let second = controller.play(&audio(100)).unwrap();

        assert_ne!(first, second);
        assert_eq!(controller.engine().graph().active_source(), Some(second));
        assert_eq!(controller.active_source(), Some(second));
    }

    #[test]
    fn test_finished_source_applied_before_next_play() {
        let mut controller = controller();
        controller.play(&audio(2)).unwrap();
        // First source ends on the render side before the second play
        render(&controller, 4);

        let second = controller.play(&audio(100)).unwrap();
        assert_eq!(controller.process_events(), 0);
        assert_eq!(controller.active_source(), Some(second));
        assert!(controller.is_playing());
    }

    #[test]
    fn test_stale_completion_does_not_clear_new_source() {
        let mut controller = controller();
        let first = controller.play(&audio(100)).unwrap();
        let second = controller.play(&audio(100)).unwrap();

        // Completion of the replaced source arrives after the new one started
        assert!(!controller.apply_event(SourceEvent::Ended(first)));
        assert_eq!(controller.active_source(), Some(second));
        assert_eq!(controller.state(), PlaybackState::Playing);

        assert!(controller.apply_event(SourceEvent::Ended(second)));
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_stale_completion_after_pause_and_replay() {
        let mut controller = controller();
        let first = controller.play(&audio(100)).unwrap();
        controller.pause();
        let second = controller.play(&audio(100)).unwrap();

        assert!(!controller.apply_event(SourceEvent::Ended(first)));
        assert_eq!(controller.active_source(), Some(second));
    }

    #[test]
    fn test_pause_from_idle_is_noop() {
        let mut controller = controller();
        assert!(!controller.pause());
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_pause_detaches() {
        let mut controller = controller();
        controller.play(&audio(100)).unwrap();
        assert!(controller.pause());
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(controller.engine().graph().active_source().is_none());
    }

    #[test]
    fn test_toggle() {
        let mut controller = controller();
        let clip = audio(100);
        assert_eq!(controller.toggle(&clip).unwrap(), PlaybackState::Playing);
        assert_eq!(controller.toggle(&clip).unwrap(), PlaybackState::Idle);
        assert_eq!(controller.toggle(&clip).unwrap(), PlaybackState::Playing);
    }

    #[test]
    fn test_payload_replaced_is_idempotent() {
        let mut controller = controller();
        controller.on_payload_replaced();
        assert_eq!(controller.state(), PlaybackState::Idle);

        controller.play(&audio(100)).unwrap();
        controller.on_payload_replaced();
        controller.on_payload_replaced();
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(controller.engine().graph().active_source().is_none());
    }

    #[test]
    fn test_volume_clamped_and_live() {
        let mut controller = controller();
        assert_eq!(controller.set_volume(1.5), 1.0);
        assert_eq!(controller.set_volume(-0.2), 0.0);
        assert_eq!(controller.set_volume(0.35), 0.35);
        assert_eq!(controller.engine().graph().gain(), 0.35);
        assert_eq!(controller.set_volume(f32::NAN), 0.35);
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_rate_clamped_and_retunes_active() {
        let mut controller = controller();
        assert_eq!(controller.set_playback_rate(10.0), 2.0);
        assert_eq!(controller.set_playback_rate(0.1), 0.5);

        // Two samples at half speed last four frames
        controller.play(&audio(2)).unwrap();
        render(&controller, 3);
        assert_eq!(controller.process_events(), 0);

        // Switching to double speed finishes the remainder quickly
        controller.set_playback_rate(2.0);
        render(&controller, 2);
        assert_eq!(controller.process_events(), 1);
        assert!(!controller.is_playing());
    }

    #[test]
    fn test_unavailable_output_leaves_idle() {
        let available = Arc::new(AtomicBool::new(true));
        let engine = AudioEngine::with_driver(
            OutputFormat {
                sample_rate: 24_000,
                channels: 1,
            },
            Box::new(NullOutput::with_availability(available.clone())),
        );
        let mut controller = PlaybackController::new(engine);
        controller.play(&audio(100)).unwrap();

        available.store(false, Ordering::SeqCst);
        let err = controller.play(&audio(100)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::PlaybackUnavailable);
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(controller.engine().graph().active_source().is_none());

        available.store(true, Ordering::SeqCst);
        assert!(controller.play(&audio(100)).is_ok());
    }

    #[test]
    fn test_with_settings_clamps() {
        let settings = PlaybackConfig {
            volume: 4.0,
            playback_rate: 1.2,
            auto_play: true,
        };
        let controller = PlaybackController::with_settings(AudioEngine::headless(), &settings);
        assert_eq!(controller.volume(), 1.0);
        assert_eq!(controller.playback_rate(), 1.2);
    }

    #[test]
    fn test_wait_for_completion() {
        let mut controller = controller();
        assert!(controller.wait_for_completion(Duration::from_millis(1)));

        controller.play(&audio(4)).unwrap();
        let graph = controller.engine().graph().clone();
        let renderer = std::thread::spawn(move || {
            let mut out = vec![0.0f32; 16];
            graph.render(&mut out);
        });
        assert!(controller.wait_for_completion(Duration::from_secs(5)));
        renderer.join().unwrap();
    }
}
