use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use yuletide_core::AudioError;

pub struct DeviceManager {
    host: Host,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn list_input_devices(&self) -> Result<Vec<(String, Device)>, AudioError> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;
        Ok(devices.map(|d| (device_name(&d), d)).collect())
    }

    pub fn list_output_devices(&self) -> Result<Vec<(String, Device)>, AudioError> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;
        Ok(devices.map(|d| (device_name(&d), d)).collect())
    }

    /// Resolve a microphone by name; `"default"` picks the host default.
    pub fn input_device(&self, name: &str) -> Result<Device, AudioError> {
        if name == "default" {
            return self
                .host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("no default input device".to_string()));
        }
        self.list_input_devices()?
            .into_iter()
            .find(|(dev_name, _)| dev_name == name)
            .map(|(_, device)| device)
            .ok_or_else(|| AudioError::DeviceNotFound(format!("input device not found: {name}")))
    }

    /// Resolve a speaker by name; `"default"` picks the host default.
    pub fn output_device(&self, name: &str) -> Result<Device, AudioError> {
        if name == "default" {
            return self
                .host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceNotFound("no default output device".to_string()));
        }
        self.list_output_devices()?
            .into_iter()
            .find(|(dev_name, _)| dev_name == name)
            .map(|(_, device)| device)
            .ok_or_else(|| AudioError::DeviceNotFound(format!("output device not found: {name}")))
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn device_name(device: &Device) -> String {
    device.name().unwrap_or_else(|_| "unknown".to_string())
}
