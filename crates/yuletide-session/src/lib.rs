pub mod adapter;
pub mod scheduler;
pub mod transcript;

pub use adapter::{SessionAdapter, SessionCommand, SessionHandle, SessionOptions};
pub use scheduler::{PlaybackScheduler, Slot};
pub use transcript::TranscriptLog;
