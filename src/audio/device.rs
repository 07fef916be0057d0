//! Output device enumeration and stream configuration

use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

use crate::constants::SAMPLE_RATE;
use crate::error::AudioError;

/// Description of an output device for display
#[derive(Debug, Clone, Serialize)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// List all available output devices
pub fn list_output_devices() -> Vec<OutputDeviceInfo> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let default_name = host
        .default_output_device()
        .and_then(|d| d.name().ok());

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let Ok(name) = device.name() {
                let is_default = default_name.as_ref() == Some(&name);
                let (sample_rates, channels) = get_device_capabilities(&device);

                devices.push(OutputDeviceInfo {
                    name,
                    is_default,
                    sample_rates,
                    channels,
                });
            }
        }
    }

    devices
}

fn get_device_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    if let Ok(configs) = device.supported_output_configs() {
        for config in configs {
            for rate_val in [SAMPLE_RATE, 44100, 48000, 96000] {
                let rate = cpal::SampleRate(rate_val);
                if rate >= config.min_sample_rate()
                    && rate <= config.max_sample_rate()
                    && !sample_rates.contains(&rate_val)
                {
                    sample_rates.push(rate_val);
                }
            }

            let ch = config.channels();
            if !channels.contains(&ch) {
                channels.push(ch);
            }
        }
    }

    sample_rates.sort();
    channels.sort();

    (sample_rates, channels)
}

/// Find an output device by name, or the host default when `name` is `None`
pub fn find_output_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();

    let Some(name) = name else {
        return host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()));
    };

    let devices = host
        .output_devices()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;

    for device in devices {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(name.to_string()))
}

/// Pick a stream configuration for the device.
///
/// Prefers running the device at the payload rate so no resampling is
/// needed, otherwise falls back to the device default.
pub fn choose_stream_config(
    device: &cpal::Device,
    buffer_size: Option<u32>,
) -> Result<(cpal::StreamConfig, cpal::SampleFormat), AudioError> {
    let target = cpal::SampleRate(SAMPLE_RATE);
    let native = device.supported_output_configs().ok().and_then(|mut configs| {
        configs.find(|c| {
            c.min_sample_rate() <= target
                && c.max_sample_rate() >= target
                && is_supported_format(c.sample_format())
        })
    });

    let supported = match native {
        Some(range) => range.with_sample_rate(target),
        None => device
            .default_output_config()
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?,
    };

    let sample_format = supported.sample_format();
    if !is_supported_format(sample_format) {
        return Err(AudioError::UnsupportedFormat(format!("{:?}", sample_format)));
    }

    let mut config: cpal::StreamConfig = supported.into();
    if let Some(size) = buffer_size {
        config.buffer_size = cpal::BufferSize::Fixed(size);
    }

    Ok((config, sample_format))
}

fn is_supported_format(format: cpal::SampleFormat) -> bool {
    matches!(
        format,
        cpal::SampleFormat::F32 | cpal::SampleFormat::I16 | cpal::SampleFormat::U16
    )
}
