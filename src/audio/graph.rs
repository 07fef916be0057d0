//! Single-voice audio graph: source ─► gain ─► output
//!
//! The graph is shared between the controller (which connects, retunes and
//! disconnects sources) and the output callback (which renders). At most
//! one source is connected at any time. When a source runs out of samples
//! the render call detaches it and reports `SourceEvent::Ended` with the
//! source's identity.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::codec::DecodedAudio;
use crate::constants::DEFAULT_VOLUME;

/// Identity of a connected source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

/// Notifications sent from the render side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    /// The source played to its last sample and was detached
    Ended(SourceId),
}

/// Format of the buffers passed to [`AudioGraph::render`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// A one-shot buffer source with a fractional read cursor
struct Voice {
    id: SourceId,
    samples: Arc<[f32]>,
    source_rate: u32,
    rate: f32,
    cursor: f64,
}

impl Voice {
    /// Linear-interpolated next sample, or `None` once the buffer is exhausted
    fn next_sample(&mut self, output_rate: u32) -> Option<f32> {
        let index = self.cursor as usize;
        let current = *self.samples.get(index)?;
        let next = self.samples.get(index + 1).copied().unwrap_or(current);
        let frac = (self.cursor - index as f64) as f32;

        self.cursor += self.rate as f64 * self.source_rate as f64 / output_rate as f64;
        Some(current + (next - current) * frac)
    }
}

/// The shared source ─► gain ─► output chain
pub struct AudioGraph {
    format: OutputFormat,
    /// f32 gain stored as raw bits
    gain: AtomicU32,
    voice: Mutex<Option<Voice>>,
    events_tx: Sender<SourceEvent>,
}

impl AudioGraph {
    /// Create a graph rendering into `format`, plus the receiver for its
    /// completion events
    pub fn new(format: OutputFormat) -> (Arc<Self>, Receiver<SourceEvent>) {
        let (events_tx, events_rx) = unbounded();
        let graph = Arc::new(Self {
            format,
            gain: AtomicU32::new(DEFAULT_VOLUME.to_bits()),
            voice: Mutex::new(None),
            events_tx,
        });
        (graph, events_rx)
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    pub(crate) fn set_gain(&self, gain: f32) {
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    /// Currently connected source, if any
    pub fn active_source(&self) -> Option<SourceId> {
        self.voice.lock().as_ref().map(|v| v.id)
    }

    /// Connect a new source. Returns the id of a source that was still
    /// connected and got replaced.
    pub(crate) fn connect(&self, id: SourceId, audio: &DecodedAudio, rate: f32) -> Option<SourceId> {
        let voice = Voice {
            id,
            samples: audio.shared_samples(),
            source_rate: audio.sample_rate(),
            rate,
            cursor: 0.0,
        };
        self.voice.lock().replace(voice).map(|old| old.id)
    }

    /// Detach whatever source is connected
    pub(crate) fn disconnect(&self) -> Option<SourceId> {
        self.voice.lock().take().map(|v| v.id)
    }

    /// Retune the connected source if it is still `id`
    pub(crate) fn set_source_rate(&self, id: SourceId, rate: f32) -> bool {
        match self.voice.lock().as_mut() {
            Some(voice) if voice.id == id => {
                voice.rate = rate;
                true
            }
            _ => false,
        }
    }

    /// Fill an interleaved output buffer.
    ///
    /// The mono source is written to every channel of a frame. Frames past
    /// the end of the source are silent.
    pub fn render(&self, out: &mut [f32]) {
        let channels = self.format.channels.max(1) as usize;
        let gain = self.gain();
        let mut ended = None;

        let mut slot = self.voice.lock();
        for frame in out.chunks_mut(channels) {
            let sample = slot
                .as_mut()
                .map(|voice| voice.next_sample(self.format.sample_rate));
            let value = match sample {
                Some(Some(s)) => s * gain,
                Some(None) => {
                    ended = slot.take().map(|v| v.id);
                    0.0
                }
                None => 0.0,
            };
            frame.fill(value);
        }
        drop(slot);

        if let Some(id) = ended {
            let _ = self.events_tx.send(SourceEvent::Ended(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{to_decoded_audio, RawAudioPayload};

    fn audio_from_i16(samples: &[i16]) -> DecodedAudio {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        to_decoded_audio(&RawAudioPayload::from_bytes(bytes).unwrap())
    }

    fn mono_24k() -> OutputFormat {
        OutputFormat {
            sample_rate: 24_000,
            channels: 1,
        }
    }

    #[test]
    fn test_render_silence_without_source() {
        let (graph, events) = AudioGraph::new(mono_24k());
        let mut out = vec![1.0f32; 8];
        graph.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_render_to_completion() {
        let (graph, events) = AudioGraph::new(mono_24k());
        let audio = audio_from_i16(&[8192, 16384, -16384]);
        graph.connect(SourceId::new(1), &audio, 1.0);

        let mut out = vec![0.0f32; 5];
        graph.render(&mut out);

        assert_eq!(out, vec![0.25, 0.5, -0.5, 0.0, 0.0]);
        assert_eq!(events.try_recv().unwrap(), SourceEvent::Ended(SourceId::new(1)));
        assert!(graph.active_source().is_none());
    }

    #[test]
    fn test_gain_applied() {
        let (graph, _events) = AudioGraph::new(mono_24k());
        graph.set_gain(0.5);
        graph.connect(SourceId::new(1), &audio_from_i16(&[16384, 16384]), 1.0);

        let mut out = vec![0.0f32; 2];
        graph.render(&mut out);
        assert_eq!(out, vec![0.25, 0.25]);
    }

    #[test]
    fn test_double_rate_skips_samples() {
        let (graph, _events) = AudioGraph::new(mono_24k());
        graph.connect(SourceId::new(1), &audio_from_i16(&[0, 8192, 16384, 24576]), 2.0);

        let mut out = vec![0.0f32; 2];
        graph.render(&mut out);
        assert_eq!(out, vec![0.0, 0.5]);
    }

    #[test]
    fn test_mono_fans_out_to_all_channels() {
        let (graph, _events) = AudioGraph::new(OutputFormat {
            sample_rate: 24_000,
            channels: 2,
        });
        graph.connect(SourceId::new(1), &audio_from_i16(&[16384]), 1.0);

        let mut out = vec![0.0f32; 4];
        graph.render(&mut out);
        assert_eq!(out, vec![0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_resample_to_48k_interpolates() {
        let (graph, _events) = AudioGraph::new(OutputFormat {
            sample_rate: 48_000,
            channels: 1,
        });
        graph.connect(SourceId::new(1), &audio_from_i16(&[0, 16384]), 1.0);

        let mut out = vec![0.0f32; 4];
        graph.render(&mut out);
        assert_eq!(out, vec![0.0, 0.25, 0.5, 0.5]);
    }

    #[test]
    fn test_connect_replaces_previous() {
        let (graph, _events) = AudioGraph::new(mono_24k());
        let audio = audio_from_i16(&[1, 2, 3]);
        assert_eq!(graph.connect(SourceId::new(1), &audio, 1.0), None);
        assert_eq!(
            graph.connect(SourceId::new(2), &audio, 1.0),
            Some(SourceId::new(1))
        );
        assert_eq!(graph.active_source(), Some(SourceId::new(2)));
    }

    #[test]
    fn test_rate_change_ignores_stale_id() {
        let (graph, _events) = AudioGraph::new(mono_24k());
        graph.connect(SourceId::new(2), &audio_from_i16(&[1, 2]), 1.0);
        assert!(!graph.set_source_rate(SourceId::new(1), 2.0));
        assert!(graph.set_source_rate(SourceId::new(2), 2.0));
    }
}
