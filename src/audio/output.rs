//! Output drivers
//!
//! A driver pulls rendered frames out of the [`AudioGraph`] and hands them
//! to a sink. The cpal driver owns its stream on a dedicated thread (cpal
//! streams are not `Send` on every platform) and is steered through a
//! command channel. The null driver renders nothing on its own; callers
//! drive `AudioGraph::render` themselves.

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::device::{choose_stream_config, find_output_device};
use crate::audio::graph::AudioGraph;
use crate::config::AudioConfig;
use crate::constants::OUTPUT_COMMAND_TIMEOUT_MS;
use crate::error::AudioError;

/// Something that can start and stop pulling audio from the graph
pub trait OutputDriver: Send {
    /// Start (or keep) rendering. Fails when the output cannot be acquired.
    fn resume(&mut self) -> Result<(), AudioError>;

    fn is_running(&self) -> bool;

    fn name(&self) -> &str;

    /// Next error reported asynchronously by the output, if any
    fn check_errors(&self) -> Option<AudioError> {
        None
    }
}

enum OutputCommand {
    Resume(Sender<Result<(), AudioError>>),
    Shutdown,
}

/// Output through a cpal device
pub struct CpalOutput {
    device_name: String,
    running: Arc<AtomicBool>,
    command_tx: Sender<OutputCommand>,
    error_rx: Receiver<AudioError>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Resolve the configured device and its stream format without opening
    /// a stream yet
    pub fn probe(
        config: &AudioConfig,
    ) -> Result<(cpal::Device, cpal::StreamConfig, cpal::SampleFormat), AudioError> {
        let device = find_output_device(config.output_device.as_deref())?;
        let (stream_config, sample_format) = choose_stream_config(&device, config.buffer_size)?;
        Ok((device, stream_config, sample_format))
    }

    /// Open a stream on `device` that renders from `graph`.
    ///
    /// The stream is built on its own thread; this call waits until it is
    /// built and reports build failures.
    pub fn open(
        device: cpal::Device,
        stream_config: cpal::StreamConfig,
        sample_format: cpal::SampleFormat,
        graph: Arc<AudioGraph>,
    ) -> Result<Self, AudioError> {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let format = graph.format();
        let running = Arc::new(AtomicBool::new(false));
        let (command_tx, command_rx) = bounded::<OutputCommand>(8);
        let (error_tx, error_rx) = bounded::<AudioError>(16);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let running_for_thread = running.clone();
        let handle = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match sample_format {
                    cpal::SampleFormat::F32 => build_stream::<f32>(
                        &device,
                        &stream_config,
                        graph,
                        running_for_thread.clone(),
                        error_tx,
                    ),
                    cpal::SampleFormat::I16 => build_stream::<i16>(
                        &device,
                        &stream_config,
                        graph,
                        running_for_thread.clone(),
                        error_tx,
                    ),
                    cpal::SampleFormat::U16 => build_stream::<u16>(
                        &device,
                        &stream_config,
                        graph,
                        running_for_thread.clone(),
                        error_tx,
                    ),
                    other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
                };

                let stream = match stream {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        tracing::error!("Failed to build output stream: {}", e);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                run_commands(&command_rx, &running_for_thread, || {
                    stream
                        .play()
                        .map_err(|e| AudioError::PlaybackUnavailable(e.to_string()))
                });
                // Stream is dropped here, releasing the device
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(AudioError::StreamError("output thread exited".to_string()));
            }
        }

        tracing::info!(
            "Output stream opened on {}: {}Hz, {} channels",
            device_name,
            format.sample_rate,
            format.channels
        );

        Ok(Self {
            device_name,
            running,
            command_tx,
            error_rx,
            thread_handle: Some(handle),
        })
    }

}

/// Serve driver commands on the output thread until shutdown.
///
/// `start` (re)starts the stream. It runs on every `Resume` that reaches
/// the thread, including after the stream reported an error.
fn run_commands(
    command_rx: &Receiver<OutputCommand>,
    running: &AtomicBool,
    mut start: impl FnMut() -> Result<(), AudioError>,
) {
    while let Ok(command) = command_rx.recv() {
        match command {
            OutputCommand::Resume(reply) => {
                let result = start();
                running.store(result.is_ok(), Ordering::SeqCst);
                let _ = reply.send(result);
            }
            OutputCommand::Shutdown => break,
        }
    }
    running.store(false, Ordering::SeqCst);
}

/// Send a command and wait for the output thread's answer.
///
/// A thread that is gone or does not answer within `timeout` counts as an
/// unavailable output.
fn request(
    command_tx: &Sender<OutputCommand>,
    make: impl FnOnce(Sender<Result<(), AudioError>>) -> OutputCommand,
    timeout: Duration,
) -> Result<(), AudioError> {
    let (reply_tx, reply_rx) = bounded(1);
    command_tx
        .send(make(reply_tx))
        .map_err(|_| AudioError::PlaybackUnavailable("output thread is gone".to_string()))?;
    match reply_rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(AudioError::PlaybackUnavailable(format!(
            "output thread did not answer within {}ms",
            timeout.as_millis()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(AudioError::PlaybackUnavailable(
            "output thread is gone".to_string(),
        )),
    }
}

/// Stream failure reported from the cpal error callback. The stream is no
/// longer trusted to be running, so the next `resume` goes back to it.
fn report_stream_error(running: &AtomicBool, error_tx: &Sender<AudioError>, message: String) {
    tracing::error!("Audio output error: {}", message);
    running.store(false, Ordering::SeqCst);
    let _ = error_tx.try_send(AudioError::StreamError(message));
}

impl OutputDriver for CpalOutput {
    fn resume(&mut self) -> Result<(), AudioError> {
        if self.is_running() {
            return Ok(());
        }
        request(
            &self.command_tx,
            OutputCommand::Resume,
            Duration::from_millis(OUTPUT_COMMAND_TIMEOUT_MS),
        )
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.device_name
    }

    fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.try_recv().ok()
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.command_tx.send(OutputCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    graph: Arc<AudioGraph>,
    running: Arc<AtomicBool>,
    error_tx: Sender<AudioError>,
) -> Result<cpal::Stream, AudioError> {
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                graph.render(&mut scratch);
                for (out, &value) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(value);
                }
            },
            move |err| report_stream_error(&running, &error_tx, err.to_string()),
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

/// Headless driver for tests and machines without audio hardware.
///
/// Nothing pulls from the graph automatically. The availability flag stands
/// in for an output that refuses to start (e.g. a device that is busy).
pub struct NullOutput {
    available: Arc<AtomicBool>,
    running: bool,
}

impl NullOutput {
    pub fn new() -> Self {
        Self::with_availability(Arc::new(AtomicBool::new(true)))
    }

    /// Share an availability flag with the caller, who may flip it to make
    /// `resume` fail
    pub fn with_availability(available: Arc<AtomicBool>) -> Self {
        Self {
            available,
            running: false,
        }
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDriver for NullOutput {
    fn resume(&mut self) -> Result<(), AudioError> {
        if !self.available.load(Ordering::SeqCst) {
            self.running = false;
            return Err(AudioError::PlaybackUnavailable(
                "output is suspended".to_string(),
            ));
        }
        self.running = true;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running && self.available.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    // Driver whose output thread runs the real command loop around a fake
    // stream start
    fn fake_cpal_output(
        starts: Arc<AtomicUsize>,
        fail_after: usize,
    ) -> (CpalOutput, Sender<AudioError>) {
        let running = Arc::new(AtomicBool::new(false));
        let (command_tx, command_rx) = bounded::<OutputCommand>(8);
        let (error_tx, error_rx) = bounded::<AudioError>(16);

        let running_for_thread = running.clone();
        let handle = thread::spawn(move || {
            run_commands(&command_rx, &running_for_thread, || {
                let n = starts.fetch_add(1, Ordering::SeqCst) + 1;
                if n > fail_after {
                    Err(AudioError::PlaybackUnavailable("device unplugged".to_string()))
                } else {
                    Ok(())
                }
            })
        });

        let output = CpalOutput {
            device_name: "fake".to_string(),
            running,
            command_tx,
            error_rx,
            thread_handle: Some(handle),
        };
        (output, error_tx)
    }

    #[test]
    fn test_resume_is_cached_while_stream_is_healthy() {
        let starts = Arc::new(AtomicUsize::new(0));
        let (mut output, _error_tx) = fake_cpal_output(starts.clone(), usize::MAX);

        output.resume().unwrap();
        output.resume().unwrap();
        assert!(output.is_running());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stream_error_forces_resume_back_to_device() {
        let starts = Arc::new(AtomicUsize::new(0));
        let (mut output, error_tx) = fake_cpal_output(starts.clone(), 1);

        output.resume().unwrap();
        assert!(output.is_running());

        report_stream_error(&output.running, &error_tx, "device lost".to_string());
        assert!(!output.is_running());
        assert!(matches!(
            output.check_errors(),
            Some(AudioError::StreamError(_))
        ));

        // The device refuses to restart, so the failure must surface
        assert!(matches!(
            output.resume(),
            Err(AudioError::PlaybackUnavailable(_))
        ));
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert!(!output.is_running());
    }

    #[test]
    fn test_stream_recovers_after_error() {
        let starts = Arc::new(AtomicUsize::new(0));
        let (mut output, error_tx) = fake_cpal_output(starts.clone(), usize::MAX);

        output.resume().unwrap();
        report_stream_error(&output.running, &error_tx, "underrun".to_string());
        output.resume().unwrap();

        assert!(output.is_running());
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_request_times_out_on_wedged_thread() {
        let (command_tx, command_rx) = bounded::<OutputCommand>(1);
        let result = request(
            &command_tx,
            OutputCommand::Resume,
            Duration::from_millis(20),
        );
        assert!(matches!(result, Err(AudioError::PlaybackUnavailable(_))));
        drop(command_rx);
    }

    #[test]
    fn test_request_to_exited_thread() {
        let (command_tx, command_rx) = bounded::<OutputCommand>(1);
        drop(command_rx);
        let result = request(&command_tx, OutputCommand::Resume, Duration::from_secs(1));
        assert!(matches!(result, Err(AudioError::PlaybackUnavailable(_))));
    }

    #[test]
    fn test_null_output_availability() {
        let available = Arc::new(AtomicBool::new(false));
        let mut output = NullOutput::with_availability(available.clone());

        assert!(matches!(
            output.resume(),
            Err(AudioError::PlaybackUnavailable(_))
        ));
        assert!(!output.is_running());

        available.store(true, Ordering::SeqCst);
        assert!(output.resume().is_ok());
        assert!(output.is_running());
    }

    #[test]
    fn test_null_output_loses_device() {
        let available = Arc::new(AtomicBool::new(true));
        let mut output = NullOutput::with_availability(available.clone());
        output.resume().unwrap();

        available.store(false, Ordering::SeqCst);
        assert!(!output.is_running());
    }
}
