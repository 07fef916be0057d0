//! Audio engine: the graph plus the driver that renders it
//!
//! Created once when the application starts and handed to the playback
//! controller, which is the only component that mutates it.

use crossbeam_channel::Receiver;
use std::sync::Arc;

use crate::audio::graph::{AudioGraph, OutputFormat, SourceEvent};
use crate::audio::output::{CpalOutput, NullOutput, OutputDriver};
use crate::config::AudioConfig;
use crate::constants::{CHANNELS, SAMPLE_RATE};
use crate::error::AudioError;

pub struct AudioEngine {
    graph: Arc<AudioGraph>,
    events_rx: Receiver<SourceEvent>,
    driver: Box<dyn OutputDriver>,
}

impl AudioEngine {
    /// Open the configured output device.
    ///
    /// The stream is started right away when possible. If the device
    /// refuses, the engine stays suspended and the next `resume` retries.
    pub fn open(config: &AudioConfig) -> Result<Self, AudioError> {
        let (device, stream_config, sample_format) = CpalOutput::probe(config)?;
        let format = OutputFormat {
            sample_rate: stream_config.sample_rate.0,
            channels: stream_config.channels,
        };
        let (graph, events_rx) = AudioGraph::new(format);
        let output = CpalOutput::open(device, stream_config, sample_format, graph.clone())?;

        let mut engine = Self {
            graph,
            events_rx,
            driver: Box::new(output),
        };
        if let Err(e) = engine.resume() {
            tracing::warn!("Output opened suspended: {}", e);
        }
        Ok(engine)
    }

    /// Engine without audio hardware, rendering at the payload format
    pub fn headless() -> Self {
        Self::with_driver(
            OutputFormat {
                sample_rate: SAMPLE_RATE,
                channels: CHANNELS,
            },
            Box::new(NullOutput::new()),
        )
    }

    /// Engine over an arbitrary driver
    pub fn with_driver(format: OutputFormat, driver: Box<dyn OutputDriver>) -> Self {
        let (graph, events_rx) = AudioGraph::new(format);
        Self {
            graph,
            events_rx,
            driver,
        }
    }

    /// Shared graph. Rendering from it is how headless callers advance
    /// playback.
    pub fn graph(&self) -> &Arc<AudioGraph> {
        &self.graph
    }

    pub(crate) fn events(&self) -> &Receiver<SourceEvent> {
        &self.events_rx
    }

    /// Make sure the output is rendering
    pub fn resume(&mut self) -> Result<(), AudioError> {
        self.driver.resume().map_err(|e| match e {
            AudioError::PlaybackUnavailable(msg) => AudioError::PlaybackUnavailable(msg),
            other => AudioError::PlaybackUnavailable(other.to_string()),
        })
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    pub fn output_name(&self) -> &str {
        self.driver.name()
    }

    /// Stream errors reported by the output since the last call
    pub fn check_errors(&self) -> Option<AudioError> {
        self.driver.check_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_headless_engine() {
        let mut engine = AudioEngine::headless();
        assert_eq!(engine.graph().format().sample_rate, 24_000);
        assert!(!engine.is_running());
        engine.resume().unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.output_name(), "null");
    }

    #[test]
    fn test_resume_failure_is_unavailable() {
        let available = Arc::new(AtomicBool::new(false));
        let mut engine = AudioEngine::with_driver(
            OutputFormat {
                sample_rate: 48_000,
                channels: 2,
            },
            Box::new(NullOutput::with_availability(available.clone())),
        );

        assert!(matches!(
            engine.resume(),
            Err(AudioError::PlaybackUnavailable(_))
        ));

        available.store(true, Ordering::SeqCst);
        assert!(engine.resume().is_ok());
    }
}
