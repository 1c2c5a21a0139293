pub mod backend;
pub mod capture;
pub mod codec;
pub mod device;
pub mod output;
pub mod timeline;

pub use backend::{AudioBackend, CpalBackend, StreamGuard};
pub use capture::{BlockFramer, CaptureEvent, CaptureHandle, CaptureNode};
pub use codec::{PLAYBACK_SAMPLE_RATE, SEND_MIME_TYPE, SEND_SAMPLE_RATE};
pub use device::DeviceManager;
pub use output::OutputNode;
pub use timeline::{BufferId, PlaybackTimeline, ScheduledInfo};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires audio hardware
    fn test_device_enumeration() {
        let manager = DeviceManager::new();
        let inputs = manager.list_input_devices().unwrap();
        let outputs = manager.list_output_devices().unwrap();
        println!("Input devices: {}", inputs.len());
        for (name, _) in &inputs {
            println!("  - {}", name);
        }
        println!("Output devices: {}", outputs.len());
        for (name, _) in &outputs {
            println!("  - {}", name);
        }
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_cpal_backend_opens_default_devices() {
        let backend = CpalBackend::new("default", "default");
        let (timeline, _finished) = PlaybackTimeline::new(PLAYBACK_SAMPLE_RATE);
        let playback = backend.open_playback(timeline).unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let (capture, handle) = backend.open_capture(4096, tx).unwrap();
        assert!(handle.sample_rate() > 0);
        drop(capture);
        drop(playback);
    }
}
