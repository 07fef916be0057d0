//! Audio subsystem module

pub mod device;
pub mod engine;
pub mod graph;
pub mod output;

pub use device::{list_output_devices, OutputDeviceInfo};
pub use engine::AudioEngine;
pub use graph::{AudioGraph, OutputFormat, SourceEvent, SourceId};
pub use output::{CpalOutput, NullOutput, OutputDriver};
