//! Playback state machine.
//!
//! All engine state changes go through [`PlaybackState::on_event`]. The engine
//! performs device side effects, then asks the state machine where it lands;
//! `None` means the event is discarded.

/// Identifies one playback session; strictly increasing per engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionToken(u64);

impl SessionToken {
    /// Token that precedes every issued token
    pub(crate) const ZERO: Self = Self(0);

    /// The token issued after this one
    #[must_use]
    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw token value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Playback state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing is audible
    #[default]
    Idle,
    /// A session is producing output
    Playing,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Playing => write!(f, "Playing"),
        }
    }
}

/// Discrete inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A new session began producing output
    Start,
    /// Explicit stop
    Stop,
    /// A source reached its end
    Complete(SessionToken),
    /// Parameters changed
    ParamUpdate,
    /// The device context was released
    Dispose,
}

impl PlaybackState {
    /// Resolve the state after `event`, given the live session's token.
    ///
    /// Returns `None` when the event must be ignored: a completion whose token
    /// is not the live session's.
    #[must_use]
    pub fn on_event(self, event: PlaybackEvent, live: Option<SessionToken>) -> Option<Self> {
        match event {
            PlaybackEvent::Start => Some(Self::Playing),
            PlaybackEvent::Stop | PlaybackEvent::Dispose => Some(Self::Idle),
            PlaybackEvent::ParamUpdate => Some(self),
            PlaybackEvent::Complete(token) => match (self, live) {
                (Self::Playing, Some(current)) if current == token => Some(Self::Idle),
                _ => None,
            },
        }
    }
}
