//! In-process output device.
//!
//! [`OfflineDevice`] renders its node graph into interleaved float blocks on
//! demand instead of handing them to sound hardware. The caller owns the
//! clock: every [`OfflineDevice::render`] call advances it by the requested
//! number of frames. It is used for rendering to memory and as the device
//! under test for the engine.

use crate::buffer::DecodedAudioBuffer;
use crate::error::DeviceError;
use crate::playback::device::{
    CompletionCallback, DeviceOpener, DeviceState, NodeId, OutputDevice,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Output device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Number of output channels
    pub channels: u16,
    /// Frames rendered per [`OfflineDevice::render_block`] call
    pub block_size: usize,
    /// Whether a freshly opened context starts suspended
    pub start_suspended: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::PROVIDER_SAMPLE_RATE,
            channels: crate::PROVIDER_CHANNELS,
            block_size: 1024,
            start_suspended: false,
        }
    }
}

/// How a suspended [`OfflineDevice`] reacts to `resume`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
    /// Start running
    #[default]
    Resume,
    /// Report success but stay suspended
    StaySuspended,
    /// Report failure
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourcePhase {
    Created,
    Playing,
    Ended,
}

struct SourceNode {
    buffer: Arc<DecodedAudioBuffer>,
    position: f64,
    playback_rate: f32,
    detune: f32,
    phase: SourcePhase,
    on_ended: Option<CompletionCallback>,
}

impl SourceNode {
    fn new(buffer: Arc<DecodedAudioBuffer>) -> Self {
        Self {
            buffer,
            position: 0.0,
            playback_rate: 1.0,
            detune: 0.0,
            phase: SourcePhase::Created,
            on_ended: None,
        }
    }

    /// Frames of buffer advanced per output frame
    fn step(&self, device_rate: u32) -> f64 {
        let computed_rate =
            f64::from(self.playback_rate) * 2f64.powf(f64::from(self.detune) / 1200.0);
        let step =
            computed_rate * f64::from(self.buffer.sample_rate()) / f64::from(device_rate);
        step.max(0.0)
    }

    /// Mix into `out` with nearest-sample reads; returns true once past the end
    fn render_into(&mut self, out: &mut [f32], channels: usize, gain: f32, device_rate: u32) -> bool {
        let step = self.step(device_rate);
        let frame_count = self.buffer.frame_count();
        let source_channels = self.buffer.channels();
        let last_channel = source_channels.len() - 1;

        for frame in out.chunks_exact_mut(channels) {
            let index = self.position as usize;
            if index >= frame_count {
                return true;
            }
            for (c, slot) in frame.iter_mut().enumerate() {
                *slot += source_channels[c.min(last_channel)][index] * gain;
            }
            self.position += step;
        }

        self.position as usize >= frame_count
    }
}

enum NodeKind {
    Destination,
    Gain(f32),
    Source(SourceNode),
}

struct Node {
    kind: NodeKind,
    output: Option<NodeId>,
}

struct Graph {
    state: DeviceState,
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    pending: Vec<CompletionCallback>,
    sources_started: usize,
}

impl Graph {
    fn insert(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node { kind, output: None });
        id
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.state == DeviceState::Closed {
            return Err(DeviceError::new("device context is closed"));
        }
        Ok(())
    }

    fn source_mut(&mut self, id: NodeId) -> Option<&mut SourceNode> {
        match self.nodes.get_mut(&id) {
            Some(Node {
                kind: NodeKind::Source(source),
                ..
            }) => Some(source),
            _ => None,
        }
    }

    /// Product of gains between `id` and the destination, or None if not routed
    fn route_gain(&self, id: NodeId, destination: NodeId) -> Option<f32> {
        let mut level = 1.0;
        let mut current = self.nodes.get(&id)?.output;
        for _ in 0..self.nodes.len() {
            let next = current?;
            if next == destination {
                return Some(level);
            }
            let node = self.nodes.get(&next)?;
            if let NodeKind::Gain(gain) = node.kind {
                level *= gain;
            }
            current = node.output;
        }
        None
    }
}

/// Software output device rendering into memory
pub struct OfflineDevice {
    config: AudioConfig,
    resume_policy: ResumePolicy,
    destination: NodeId,
    graph: Mutex<Graph>,
}

impl std::fmt::Debug for OfflineDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let graph = self.graph.lock();
        f.debug_struct("OfflineDevice")
            .field("config", &self.config)
            .field("state", &graph.state)
            .field("nodes", &graph.nodes.len())
            .finish()
    }
}

impl OfflineDevice {
    /// Create a device with the given configuration
    #[must_use]
    pub fn new(config: AudioConfig) -> Self {
        Self::with_resume_policy(config, ResumePolicy::default())
    }

    /// Create a device with an explicit resume behaviour
    #[must_use]
    pub fn with_resume_policy(config: AudioConfig, resume_policy: ResumePolicy) -> Self {
        let state = if config.start_suspended {
            DeviceState::Suspended
        } else {
            DeviceState::Running
        };
        let mut graph = Graph {
            state,
            nodes: HashMap::new(),
            next_id: 0,
            pending: Vec::new(),
            sources_started: 0,
        };
        let destination = graph.insert(NodeKind::Destination);

        Self {
            config,
            resume_policy,
            destination,
            graph: Mutex::new(graph),
        }
    }

    /// Device configuration
    #[must_use]
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Advance the clock by `frames` and return the mixed interleaved output.
    ///
    /// A suspended or closed device yields silence without advancing sources.
    /// Completion callbacks, including those queued by `stop`, fire after the
    /// block is mixed.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let channels = usize::from(self.config.channels.max(1));
        let mut out = vec![0.0; frames * channels];

        let callbacks = {
            let mut graph = self.graph.lock();
            if graph.state == DeviceState::Running {
                let playing: Vec<NodeId> = graph
                    .nodes
                    .iter()
                    .filter(|(_, node)| {
                        matches!(&node.kind, NodeKind::Source(s) if s.phase == SourcePhase::Playing)
                    })
                    .map(|(id, _)| *id)
                    .collect();

                for id in playing {
                    let gain = graph.route_gain(id, self.destination).unwrap_or(0.0);
                    let Some(source) = graph.source_mut(id) else {
                        continue;
                    };
                    if source.render_into(&mut out, channels, gain, self.config.sample_rate) {
                        source.phase = SourcePhase::Ended;
                        if let Some(callback) = source.on_ended.take() {
                            graph.pending.push(callback);
                        }
                    }
                }
            }
            std::mem::take(&mut graph.pending)
        };

        for callback in callbacks {
            callback();
        }
        out
    }

    /// Render one configured block
    pub fn render_block(&self) -> Vec<f32> {
        self.render(self.config.block_size)
    }

    /// Put a running device into the suspended state
    pub fn suspend(&self) {
        let mut graph = self.graph.lock();
        if graph.state == DeviceState::Running {
            graph.state = DeviceState::Suspended;
        }
    }

    /// Number of sources currently producing output
    #[must_use]
    pub fn active_sources(&self) -> usize {
        self.graph
            .lock()
            .nodes
            .values()
            .filter(|node| matches!(&node.kind, NodeKind::Source(s) if s.phase == SourcePhase::Playing))
            .count()
    }

    /// Number of `start` calls accepted over the device's lifetime
    #[must_use]
    pub fn sources_started(&self) -> usize {
        self.graph.lock().sources_started
    }

    /// Number of nodes in the graph, destination included
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.lock().nodes.len()
    }

    /// Current detune and playback rate of a source
    #[must_use]
    pub fn source_settings(&self, source: NodeId) -> Option<(f32, f32)> {
        let mut graph = self.graph.lock();
        graph
            .source_mut(source)
            .map(|s| (s.detune, s.playback_rate))
    }

    /// Current level of a gain stage
    #[must_use]
    pub fn gain_level(&self, gain: NodeId) -> Option<f32> {
        match self.graph.lock().nodes.get(&gain) {
            Some(Node {
                kind: NodeKind::Gain(level),
                ..
            }) => Some(*level),
            _ => None,
        }
    }
}

#[async_trait]
impl OutputDevice for OfflineDevice {
    fn state(&self) -> DeviceState {
        self.graph.lock().state
    }

    async fn resume(&self) -> Result<(), DeviceError> {
        let mut graph = self.graph.lock();
        match (graph.state, self.resume_policy) {
            (DeviceState::Closed, _) => Err(DeviceError::new("device context is closed")),
            (DeviceState::Running, _) | (DeviceState::Suspended, ResumePolicy::StaySuspended) => {
                Ok(())
            }
            (DeviceState::Suspended, ResumePolicy::Fail) => {
                Err(DeviceError::new("device refused to resume"))
            }
            (DeviceState::Suspended, ResumePolicy::Resume) => {
                graph.state = DeviceState::Running;
                debug!("Offline device resumed");
                Ok(())
            }
        }
    }

    async fn close(&self) {
        let callbacks = {
            let mut graph = self.graph.lock();
            if graph.state == DeviceState::Closed {
                return;
            }
            graph.state = DeviceState::Closed;

            let mut callbacks = std::mem::take(&mut graph.pending);
            for node in graph.nodes.values_mut() {
                if let NodeKind::Source(source) = &mut node.kind {
                    source.phase = SourcePhase::Ended;
                    callbacks.extend(source.on_ended.take());
                }
            }
            let destination = self.destination;
            graph.nodes.retain(|id, _| *id == destination);
            callbacks
        };

        info!("Offline device closed");
        for callback in callbacks {
            callback();
        }
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn destination(&self) -> NodeId {
        self.destination
    }

    fn create_source(&self, buffer: Arc<DecodedAudioBuffer>) -> Result<NodeId, DeviceError> {
        let mut graph = self.graph.lock();
        graph.ensure_open()?;
        Ok(graph.insert(NodeKind::Source(SourceNode::new(buffer))))
    }

    fn create_gain(&self) -> Result<NodeId, DeviceError> {
        let mut graph = self.graph.lock();
        graph.ensure_open()?;
        Ok(graph.insert(NodeKind::Gain(1.0)))
    }

    fn connect(&self, from: NodeId, to: NodeId) -> Result<(), DeviceError> {
        let mut graph = self.graph.lock();
        graph.ensure_open()?;
        if !graph.nodes.contains_key(&to) {
            return Err(DeviceError::new(format!("unknown node {}", to.0)));
        }
        let node = graph
            .nodes
            .get_mut(&from)
            .ok_or_else(|| DeviceError::new(format!("unknown node {}", from.0)))?;
        node.output = Some(to);
        Ok(())
    }

    fn disconnect(&self, node: NodeId) {
        let mut graph = self.graph.lock();
        let remove = match graph.nodes.get_mut(&node) {
            Some(entry) => {
                entry.output = None;
                match &entry.kind {
                    NodeKind::Source(source) => source.phase == SourcePhase::Ended,
                    NodeKind::Gain(_) => true,
                    NodeKind::Destination => false,
                }
            }
            None => false,
        };
        if remove {
            graph.nodes.remove(&node);
        }
    }

    fn start(&self, source: NodeId, offset: usize) -> Result<(), DeviceError> {
        let mut graph = self.graph.lock();
        graph.ensure_open()?;
        let node = graph
            .source_mut(source)
            .ok_or_else(|| DeviceError::new(format!("node {} is not a source", source.0)))?;
        if node.phase != SourcePhase::Created {
            return Err(DeviceError::new(format!("source {} already started", source.0)));
        }
        node.position = offset as f64;
        node.phase = SourcePhase::Playing;
        graph.sources_started += 1;
        Ok(())
    }

    fn stop(&self, source: NodeId) {
        let mut graph = self.graph.lock();
        let callback = match graph.source_mut(source) {
            Some(node) if node.phase != SourcePhase::Ended => {
                node.phase = SourcePhase::Ended;
                node.on_ended.take()
            }
            _ => None,
        };
        // Delivered on the next render or close, like a queued ended event
        graph.pending.extend(callback);
    }

    fn set_detune(&self, source: NodeId, cents: f32) {
        if let Some(node) = self.graph.lock().source_mut(source) {
            node.detune = cents;
        }
    }

    fn set_playback_rate(&self, source: NodeId, rate: f32) {
        if let Some(node) = self.graph.lock().source_mut(source) {
            node.playback_rate = rate;
        }
    }

    fn set_gain(&self, gain: NodeId, level: f32) {
        if let Some(Node {
            kind: NodeKind::Gain(current),
            ..
        }) = self.graph.lock().nodes.get_mut(&gain)
        {
            *current = level;
        }
    }

    fn on_ended(&self, source: NodeId, callback: CompletionCallback) {
        if let Some(node) = self.graph.lock().source_mut(source) {
            node.on_ended = Some(callback);
        }
    }

    fn position(&self, source: NodeId) -> Option<f64> {
        self.graph.lock().source_mut(source).map(|s| s.position)
    }
}

/// Opens [`OfflineDevice`] contexts and keeps a handle to each
#[derive(Debug, Default)]
pub struct OfflineOpener {
    config: AudioConfig,
    unavailable: AtomicBool,
    resume_policy: Mutex<ResumePolicy>,
    opened: Mutex<Vec<Arc<OfflineDevice>>>,
}

impl OfflineOpener {
    /// Create an opener producing devices with `config`
    #[must_use]
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Make subsequent `open` calls fail (or succeed again)
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Relaxed);
    }

    /// Resume behaviour of devices opened from now on
    pub fn set_resume_policy(&self, policy: ResumePolicy) {
        *self.resume_policy.lock() = policy;
    }

    /// Most recently opened device
    #[must_use]
    pub fn latest(&self) -> Option<Arc<OfflineDevice>> {
        self.opened.lock().last().cloned()
    }

    /// Number of successful `open` calls
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }
}

#[async_trait]
impl DeviceOpener for OfflineOpener {
    async fn open(&self) -> Result<Arc<dyn OutputDevice>, DeviceError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(DeviceError::new("no output device available"));
        }
        let device = Arc::new(OfflineDevice::with_resume_policy(
            self.config.clone(),
            *self.resume_policy.lock(),
        ));
        self.opened.lock().push(Arc::clone(&device));
        info!(
            "Opened offline device at {} Hz, {} channels",
            self.config.sample_rate, self.config.channels
        );
        Ok(device)
    }
}
