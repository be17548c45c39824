//! Error types for the Speakwave audio pipeline.
//!
//! Each stage owns a narrow error enum so callers can match on exactly the
//! failures that stage can produce. [`SpeakwaveError`] wraps all of them for
//! callers that drive the whole pipeline.

/// Result type alias for Speakwave operations
pub type SpeakwaveResult<T> = Result<T, SpeakwaveError>;

/// Failures while turning a provider payload into a [`crate::DecodedAudioBuffer`]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload text is not valid base64
    #[error("Payload is not valid base64: {message}")]
    InvalidEncoding {
        /// Underlying base64 decoder message
        message: String,
    },

    /// Decoded byte length does not split into whole sample frames
    #[error("Malformed PCM payload: {byte_len} bytes is not a multiple of the {block_align}-byte frame size")]
    MalformedPayload {
        /// Number of decoded bytes
        byte_len: usize,
        /// Bytes per frame required by the payload format
        block_align: usize,
    },

    /// Payload decoded to zero bytes
    #[error("Payload contains no audio")]
    EmptyAudioError,

    /// Payload is not the raw PCM layout this decoder understands
    #[error("Unsupported payload format: {detected}")]
    UnsupportedFormat {
        /// Description of what was found instead
        detected: String,
    },
}

/// Failures while building a WAV container
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// There are no channels to interleave
    #[error("Cannot encode audio with zero channels")]
    NoChannels,

    /// A header field cannot represent the buffer
    #[error("Audio is too large for the WAV header: {field} overflows")]
    TooLarge {
        /// Header field that overflowed
        field: &'static str,
    },
}

/// Failures reported by the playback engine
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The output device could not be acquired, resumed, or refused to build the graph
    #[error("Audio output context unavailable: {reason}")]
    ContextUnavailable {
        /// Reason reported by the device
        reason: String,
    },

    /// The output device was acquired but stayed suspended after resume
    #[error("Audio output device is suspended")]
    DeviceSuspended,
}

impl PlaybackError {
    /// Create a new context unavailable error
    #[must_use]
    pub fn context_unavailable<S: Into<String>>(reason: S) -> Self {
        Self::ContextUnavailable {
            reason: reason.into(),
        }
    }
}

/// Failure reported by an output device implementation
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DeviceError {
    /// Error message describing the device issue
    pub message: String,
}

impl DeviceError {
    /// Create a new device error
    #[must_use]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<DeviceError> for PlaybackError {
    fn from(err: DeviceError) -> Self {
        Self::ContextUnavailable {
            reason: err.message,
        }
    }
}

/// Failures while constructing a [`crate::DecodedAudioBuffer`]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// A buffer needs at least one channel
    #[error("Audio buffer must have at least one channel")]
    NoChannels,

    /// Channels disagree on frame count
    #[error("Channel {channel} has {actual} frames, expected {expected}")]
    ChannelLengthMismatch {
        /// Index of the offending channel
        channel: usize,
        /// Frame count of channel 0
        expected: usize,
        /// Frame count of the offending channel
        actual: usize,
    },

    /// Sample rate must be positive
    #[error("Sample rate must be positive")]
    InvalidSampleRate,
}

/// Out-of-range playback parameters
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    /// Pitch outside -12..=12 semitones
    #[error("Pitch must be between -12 and 12 semitones, got {0}")]
    PitchOutOfRange(i32),

    /// Rate outside 0.5..=2.0
    #[error("Rate must be between 0.5 and 2.0, got {0}")]
    RateOutOfRange(f32),

    /// Gain outside 0.0..=2.0
    #[error("Gain must be between 0.0 and 2.0, got {0}")]
    GainOutOfRange(f32),
}

/// Failures while packaging or persisting a download artifact
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    /// Requested extension does not describe the container's bytes
    #[error("Extension '{requested}' does not match container format '{actual}'")]
    ExtensionMismatch {
        /// Extension the caller asked for
        requested: String,
        /// Extension of the container's real format
        actual: String,
    },

    /// Extension names no known container format
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Writing the artifact failed
    #[error("Failed to write artifact: {message}")]
    Io {
        /// Error message describing the file operation failure
        message: String,
    },
}

impl From<std::io::Error> for PackageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Failures while loading configuration
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config: {0}")]
    Io(String),

    /// Config text is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Config parsed but holds invalid values
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Umbrella error for callers driving the whole pipeline
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SpeakwaveError {
    /// Payload decoding failed
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// WAV encoding failed
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Playback failed
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// Buffer construction failed
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// Parameters out of range
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// Packaging failed
    #[error(transparent)]
    Package(#[from] PackageError),

    /// Configuration failed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Background task was cancelled or panicked
    #[error("Background task failed: {message}")]
    Task {
        /// Join error description
        message: String,
    },
}

impl SpeakwaveError {
    /// Check if this error is due to invalid caller input
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Parameter(_) | Self::Buffer(_) | Self::Config(_)
        ) || matches!(
            self,
            Self::Package(PackageError::ExtensionMismatch { .. } | PackageError::UnsupportedFormat(_))
        )
    }

    /// Get the error category for logging
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::Playback(_) => "playback",
            Self::Buffer(_) => "buffer",
            Self::Parameter(_) => "parameter",
            Self::Package(_) => "package",
            Self::Config(_) => "config",
            Self::Task { .. } => "task",
        }
    }
}

impl From<tokio::task::JoinError> for SpeakwaveError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DecodeError::MalformedPayload {
            byte_len: 3,
            block_align: 2,
        };
        assert_eq!(
            err.to_string(),
            "Malformed PCM payload: 3 bytes is not a multiple of the 2-byte frame size"
        );
        assert_eq!(EncodeError::NoChannels.to_string(), "Cannot encode audio with zero channels");
        assert_eq!(
            EncodeError::TooLarge { field: "byte rate" }.to_string(),
            "Audio is too large for the WAV header: byte rate overflows"
        );
        assert_eq!(
            PlaybackError::context_unavailable("no device").to_string(),
            "Audio output context unavailable: no device"
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(SpeakwaveError::from(DecodeError::EmptyAudioError).category(), "decode");
        assert_eq!(SpeakwaveError::from(EncodeError::NoChannels).category(), "encode");
        assert_eq!(SpeakwaveError::from(PlaybackError::DeviceSuspended).category(), "playback");
        assert_eq!(SpeakwaveError::from(BufferError::NoChannels).category(), "buffer");
        assert_eq!(
            SpeakwaveError::from(ParameterError::PitchOutOfRange(13)).category(),
            "parameter"
        );
        assert_eq!(
            SpeakwaveError::from(PackageError::UnsupportedFormat("ogg".into())).category(),
            "package"
        );
        assert_eq!(SpeakwaveError::from(ConfigError::Parse("x".into())).category(), "config");
    }

    #[test]
    fn test_user_errors() {
        assert!(SpeakwaveError::from(DecodeError::EmptyAudioError).is_user_error());
        assert!(SpeakwaveError::from(ParameterError::GainOutOfRange(3.0)).is_user_error());
        assert!(SpeakwaveError::from(PackageError::UnsupportedFormat("mp3".into())).is_user_error());
        assert!(!SpeakwaveError::from(PlaybackError::DeviceSuspended).is_user_error());
        assert!(!SpeakwaveError::from(PackageError::Io { message: "disk full".into() }).is_user_error());
    }

    #[test]
    fn test_device_error_maps_to_context_unavailable() {
        let err = PlaybackError::from(DeviceError::new("graph rejected"));
        assert_eq!(err, PlaybackError::context_unavailable("graph rejected"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = PackageError::from(io_err);
        assert!(matches!(err, PackageError::Io { .. }));
    }

    #[test]
    fn test_transparent_display() {
        let err = SpeakwaveError::from(DecodeError::UnsupportedFormat {
            detected: "RIFF/WAVE container".into(),
        });
        assert_eq!(err.to_string(), "Unsupported payload format: RIFF/WAVE container");
    }
}
