//! Output device boundary.
//!
//! The engine drives playback through these traits and never touches a
//! concrete backend. A device exposes a small node graph: buffer sources,
//! gain stages and a destination. [`crate::playback::OfflineDevice`] is the
//! in-process implementation.
//!
//! ## Threading
//!
//! Devices are `Send + Sync`. Completion callbacks may run on any thread,
//! including from inside `stop` or `close`; they must not call back into the
//! engine. The engine's callbacks only post a session token to a channel.

use crate::buffer::DecodedAudioBuffer;
use crate::error::DeviceError;
use async_trait::async_trait;
use std::sync::Arc;

/// Handle to a node inside one device's graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// Lifecycle of a device context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// The rendering clock is running
    Running,
    /// Acquired but not rendering; `resume` may start it
    Suspended,
    /// Released; the context cannot be used again
    Closed,
}

/// Callback fired once when a source stops producing output
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Acquires device contexts
#[async_trait]
pub trait DeviceOpener: Send + Sync {
    /// Open a fresh output context
    ///
    /// # Errors
    ///
    /// Returns an error if no output device can be acquired
    async fn open(&self) -> Result<Arc<dyn OutputDevice>, DeviceError>;
}

/// An acquired output context and its node graph
#[async_trait]
pub trait OutputDevice: Send + Sync {
    /// Current lifecycle state
    fn state(&self) -> DeviceState;

    /// Resume a suspended context; no-op when running
    ///
    /// # Errors
    ///
    /// Returns an error if the context cannot be resumed
    async fn resume(&self) -> Result<(), DeviceError>;

    /// Release the context and every node in it
    async fn close(&self);

    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Node that represents the audible output
    fn destination(&self) -> NodeId;

    /// Create a source node bound to `buffer`
    ///
    /// # Errors
    ///
    /// Returns an error if the context is closed
    fn create_source(&self, buffer: Arc<DecodedAudioBuffer>) -> Result<NodeId, DeviceError>;

    /// Create a gain stage
    ///
    /// # Errors
    ///
    /// Returns an error if the context is closed
    fn create_gain(&self) -> Result<NodeId, DeviceError>;

    /// Route `from`'s output into `to`
    ///
    /// # Errors
    ///
    /// Returns an error if either node is unknown
    fn connect(&self, from: NodeId, to: NodeId) -> Result<(), DeviceError>;

    /// Remove every outgoing connection of `node`
    fn disconnect(&self, node: NodeId);

    /// Begin producing output from frame `offset`
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not a source or was already started
    fn start(&self, source: NodeId, offset: usize) -> Result<(), DeviceError>;

    /// Stop a source; idempotent
    fn stop(&self, source: NodeId);

    /// Set source detune in cents
    fn set_detune(&self, source: NodeId, cents: f32);

    /// Set source playback-rate multiplier
    fn set_playback_rate(&self, source: NodeId, rate: f32);

    /// Set gain stage level
    fn set_gain(&self, gain: NodeId, level: f32);

    /// Register the callback fired when `source` ends, naturally or by `stop`
    fn on_ended(&self, source: NodeId, callback: CompletionCallback);

    /// Read position of a source, in frames of its buffer
    fn position(&self, source: NodeId) -> Option<f64>;
}
