//! Live, parameter-adjustable playback of decoded buffers.
//!
//! [`PlaybackEngine`] owns at most one [`PlaybackSession`] and drives an
//! [`OutputDevice`] through the [`PlaybackState`] machine. Devices are
//! acquired through a [`DeviceOpener`]; [`OfflineOpener`] and
//! [`OfflineDevice`] render in-process.

pub mod device;
pub mod engine;
pub mod offline;
pub mod params;
pub mod state;

pub use device::{CompletionCallback, DeviceOpener, DeviceState, NodeId, OutputDevice};
pub use engine::{PlaybackEngine, PlaybackSession};
pub use offline::{AudioConfig, OfflineDevice, OfflineOpener, ResumePolicy};
pub use params::PlaybackParameters;
pub use state::{PlaybackEvent, PlaybackState, SessionToken};
