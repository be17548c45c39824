//! Playback engine: one audible rendering of a decoded buffer at a time.

use crate::buffer::DecodedAudioBuffer;
use crate::error::{DeviceError, ParameterError, PlaybackError};
use crate::playback::device::{DeviceOpener, DeviceState, NodeId, OutputDevice};
use crate::playback::params::PlaybackParameters;
use crate::playback::state::{PlaybackEvent, PlaybackState, SessionToken};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One live rendering: the nodes built for a buffer and the token that names them
#[derive(Debug)]
pub struct PlaybackSession {
    token: SessionToken,
    buffer: Arc<DecodedAudioBuffer>,
    source: NodeId,
    gain: NodeId,
}

impl PlaybackSession {
    /// Token identifying this session
    #[must_use]
    pub const fn token(&self) -> SessionToken {
        self.token
    }

    /// Buffer being rendered
    #[must_use]
    pub fn buffer(&self) -> &Arc<DecodedAudioBuffer> {
        &self.buffer
    }

    /// Source node inside the device graph
    #[must_use]
    pub const fn source(&self) -> NodeId {
        self.source
    }

    /// Gain node inside the device graph
    #[must_use]
    pub const fn gain(&self) -> NodeId {
        self.gain
    }
}

/// Drives an output device so that at most one session is audible.
///
/// Commands take `&mut self`; the engine is meant to be owned by whatever
/// orchestrates playback. Completion callbacks from the device only post the
/// session token to an internal channel, which the engine drains in
/// [`poll_completions`](Self::poll_completions) and
/// [`wait_for_completion`](Self::wait_for_completion), so late or stale
/// completions are filtered by token rather than by timing.
pub struct PlaybackEngine {
    opener: Arc<dyn DeviceOpener>,
    device: Option<Arc<dyn OutputDevice>>,
    session: Option<PlaybackSession>,
    params: PlaybackParameters,
    state: PlaybackState,
    last_token: SessionToken,
    completion_tx: mpsc::UnboundedSender<SessionToken>,
    completion_rx: mpsc::UnboundedReceiver<SessionToken>,
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("state", &self.state)
            .field("params", &self.params)
            .field("session", &self.session)
            .field("has_device", &self.device.is_some())
            .finish()
    }
}

impl PlaybackEngine {
    /// Create an idle engine; no device is acquired until the first `start`
    #[must_use]
    pub fn new(opener: Arc<dyn DeviceOpener>) -> Self {
        Self::with_parameters(opener, PlaybackParameters::default())
    }

    /// Create an idle engine with initial parameters
    #[must_use]
    pub fn with_parameters(opener: Arc<dyn DeviceOpener>, params: PlaybackParameters) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            opener,
            device: None,
            session: None,
            params,
            state: PlaybackState::Idle,
            last_token: SessionToken::ZERO,
            completion_tx,
            completion_rx,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether a session is audible
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Parameters applied to the live session and to the next `start`
    #[must_use]
    pub const fn parameters(&self) -> PlaybackParameters {
        self.params
    }

    /// The live session, if playing
    #[must_use]
    pub const fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Token of the live session
    #[must_use]
    pub fn current_token(&self) -> Option<SessionToken> {
        self.session.as_ref().map(PlaybackSession::token)
    }

    /// Elapsed position of the live session, in frames of its buffer
    #[must_use]
    pub fn position(&self) -> Option<f64> {
        let session = self.session.as_ref()?;
        self.device.as_ref()?.position(session.source)
    }

    /// Start rendering `buffer` from frame 0.
    ///
    /// A playing session is stopped first. The device is acquired (or
    /// resumed) before the graph is built; the caller must await this before
    /// issuing further commands.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::ContextUnavailable`] if the device cannot be opened,
    ///   resumed, or refuses to build the graph
    /// - [`PlaybackError::DeviceSuspended`] if the device stays suspended
    ///
    /// On error the engine is `Idle`.
    pub async fn start(
        &mut self,
        buffer: Arc<DecodedAudioBuffer>,
    ) -> Result<SessionToken, PlaybackError> {
        self.poll_completions();
        self.stop();

        let device = self.acquire().await?;
        let token = self.last_token.next();
        self.last_token = token;

        let session = self.build_session(device.as_ref(), buffer, token)?;
        info!(
            "Started playback session {} ({} frames at {} Hz)",
            token,
            session.buffer.frame_count(),
            session.buffer.sample_rate()
        );
        self.session = Some(session);
        self.apply(PlaybackEvent::Start);
        Ok(token)
    }

    /// Replace the playback parameters.
    ///
    /// While playing, the new values reach the live source and gain stage
    /// immediately without restarting or seeking; while idle they are kept
    /// for the next `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range; nothing changes then
    pub fn update_parameters(&mut self, params: PlaybackParameters) -> Result<(), ParameterError> {
        params.validate()?;
        self.params = params;
        if let (Some(session), Some(device)) = (&self.session, &self.device) {
            Self::apply_parameters(device.as_ref(), session.source, session.gain, &params);
            debug!("Applied {:?} to session {}", params, session.token);
        }
        self.apply(PlaybackEvent::ParamUpdate);
        Ok(())
    }

    /// Update parameters on behalf of a specific session.
    ///
    /// Returns `Ok(false)` without changing anything when `token` is not the
    /// live session, so updates racing a replacement or dispose are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range
    pub fn update_session_parameters(
        &mut self,
        token: SessionToken,
        params: PlaybackParameters,
    ) -> Result<bool, ParameterError> {
        if self.current_token() != Some(token) {
            debug!("Dropping parameter update for stale session {}", token);
            return Ok(false);
        }
        self.update_parameters(params)?;
        Ok(true)
    }

    /// Stop the live session and release its nodes; idempotent
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            if let Some(device) = &self.device {
                device.stop(session.source);
                device.disconnect(session.source);
                device.disconnect(session.gain);
            }
            info!("Stopped playback session {}", session.token);
        }
        self.apply(PlaybackEvent::Stop);
    }

    /// Apply every completion event posted so far.
    ///
    /// Returns true if the live session completed.
    pub fn poll_completions(&mut self) -> bool {
        let mut completed = false;
        while let Ok(token) = self.completion_rx.try_recv() {
            completed |= self.complete(token);
        }
        completed
    }

    /// Wait until the live session ends naturally or is stopped.
    ///
    /// Returns immediately when idle. Stale completions received meanwhile
    /// are discarded.
    pub async fn wait_for_completion(&mut self) {
        self.poll_completions();
        while self.state == PlaybackState::Playing {
            match self.completion_rx.recv().await {
                Some(token) => {
                    self.complete(token);
                }
                None => break,
            }
        }
    }

    /// Stop playback and release the device context; idempotent.
    ///
    /// The next `start` acquires a fresh context.
    pub async fn dispose(&mut self) {
        self.stop();
        if let Some(device) = self.device.take() {
            device.close().await;
            info!("Released audio output context");
        }
        self.apply(PlaybackEvent::Dispose);
        // Completions fired by close belong to released sessions
        self.poll_completions();
    }

    fn complete(&mut self, token: SessionToken) -> bool {
        match self
            .state
            .on_event(PlaybackEvent::Complete(token), self.current_token())
        {
            Some(next) => {
                if let Some(session) = self.session.take() {
                    if let Some(device) = &self.device {
                        device.disconnect(session.source);
                        device.disconnect(session.gain);
                    }
                }
                info!("Playback session {} completed", token);
                self.state = next;
                true
            }
            None => {
                debug!("Discarding completion from stale session {}", token);
                false
            }
        }
    }

    fn apply(&mut self, event: PlaybackEvent) {
        if let Some(next) = self.state.on_event(event, self.current_token()) {
            self.state = next;
        }
    }

    async fn acquire(&mut self) -> Result<Arc<dyn OutputDevice>, PlaybackError> {
        if let Some(device) = &self.device {
            if device.state() == DeviceState::Closed {
                warn!("Audio output context was closed externally, reacquiring");
                self.device = None;
            }
        }

        let device = match &self.device {
            Some(device) => Arc::clone(device),
            None => {
                let device = self.opener.open().await.map_err(|e| {
                    warn!("Failed to acquire audio output context: {}", e);
                    PlaybackError::from(e)
                })?;
                self.device = Some(Arc::clone(&device));
                device
            }
        };

        if device.state() == DeviceState::Suspended {
            device.resume().await.map_err(|e| {
                warn!("Failed to resume audio output context: {}", e);
                PlaybackError::from(e)
            })?;
        }

        match device.state() {
            DeviceState::Running => Ok(device),
            DeviceState::Suspended => Err(PlaybackError::DeviceSuspended),
            DeviceState::Closed => Err(PlaybackError::context_unavailable(
                "device context closed during resume",
            )),
        }
    }

    fn build_session(
        &self,
        device: &dyn OutputDevice,
        buffer: Arc<DecodedAudioBuffer>,
        token: SessionToken,
    ) -> Result<PlaybackSession, PlaybackError> {
        let mut created = Vec::with_capacity(2);
        match self.wire(device, Arc::clone(&buffer), token, &mut created) {
            Ok((source, gain)) => Ok(PlaybackSession {
                token,
                buffer,
                source,
                gain,
            }),
            Err(e) => {
                warn!("Device rejected playback graph: {}", e);
                for node in created {
                    device.stop(node);
                    device.disconnect(node);
                }
                Err(e.into())
            }
        }
    }

    fn wire(
        &self,
        device: &dyn OutputDevice,
        buffer: Arc<DecodedAudioBuffer>,
        token: SessionToken,
        created: &mut Vec<NodeId>,
    ) -> Result<(NodeId, NodeId), DeviceError> {
        let source = device.create_source(buffer)?;
        created.push(source);
        let gain = device.create_gain()?;
        created.push(gain);

        device.connect(source, gain)?;
        device.connect(gain, device.destination())?;

        Self::apply_parameters(device, source, gain, &self.params);

        let completion_tx = self.completion_tx.clone();
        device.on_ended(
            source,
            Box::new(move || {
                // The engine may already be gone; nothing to notify then
                let _ = completion_tx.send(token);
            }),
        );
        device.start(source, 0)?;
        Ok((source, gain))
    }

    fn apply_parameters(
        device: &dyn OutputDevice,
        source: NodeId,
        gain: NodeId,
        params: &PlaybackParameters,
    ) {
        device.set_detune(source, params.detune_cents());
        device.set_playback_rate(source, params.rate_multiplier);
        device.set_gain(gain, params.gain_level);
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        // Silence the live source; closing the context needs `dispose`
        if let (Some(session), Some(device)) = (&self.session, &self.device) {
            device.stop(session.source);
        }
    }
}
