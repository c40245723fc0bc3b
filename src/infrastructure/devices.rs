//! Audio device enumeration

use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait};

use crate::application::ports::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDirection {
    Input,
    Output,
}

impl DeviceDirection {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for DeviceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A device reported by the default host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub name: String,
    pub direction: DeviceDirection,
    pub is_default: bool,
}

/// Every input device followed by every output device of the default host
pub fn list_devices() -> Result<Vec<AudioDevice>, MediaError> {
    let host = cpal::default_host();

    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let inputs = host
        .input_devices()
        .map_err(|e| MediaError::Platform(e.to_string()))?;
    let mut devices = collect(inputs, DeviceDirection::Input, default_input.as_deref());

    let default_output = host.default_output_device().and_then(|d| d.name().ok());
    let outputs = host
        .output_devices()
        .map_err(|e| MediaError::Platform(e.to_string()))?;
    devices.extend(collect(
        outputs,
        DeviceDirection::Output,
        default_output.as_deref(),
    ));

    Ok(devices)
}

fn collect(
    devices: impl Iterator<Item = cpal::Device>,
    direction: DeviceDirection,
    default_name: Option<&str>,
) -> Vec<AudioDevice> {
    devices
        .filter_map(|device| device.name().ok())
        .map(|name| AudioDevice {
            is_default: default_name == Some(name.as_str()),
            name,
            direction,
        })
        .collect()
}
