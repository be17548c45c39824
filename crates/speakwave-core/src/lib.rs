//! # Speakwave Core
//!
//! Audio pipeline behind a speech-synthesis front end: the provider's base64
//! PCM payload is decoded into a float buffer, which is then both played back
//! live with adjustable pitch, rate and gain, and encoded into a WAV file for
//! download.
//!
//! ## Features
//!
//! - Strict decoding of raw 16-bit little-endian PCM payloads
//! - Byte-exact 16-bit WAV encoding
//! - Single-session playback engine with token-filtered completion events
//! - In-process offline output device
//! - Timestamped download artifacts
//!
//! ## Example
//!
//! ```rust,no_run
//! use speakwave_core::{
//!     decode_payload, encode_wav, AudioConfig, OfflineOpener, Packager, PlaybackEngine,
//!     PlaybackParameters,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> speakwave_core::SpeakwaveResult<()> {
//!     let buffer = Arc::new(decode_payload("AAD/fwCA")?);
//!
//!     let artifact = Packager::new().package(encode_wav(&buffer)?);
//!     artifact.write_to_dir("downloads")?;
//!
//!     let mut engine = PlaybackEngine::new(Arc::new(OfflineOpener::new(AudioConfig::default())));
//!     engine.start(Arc::clone(&buffer)).await?;
//!     engine.update_parameters(PlaybackParameters::new(2, 1.25, 0.8)?)?;
//!     engine.dispose().await;
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

pub mod buffer;
pub mod config;
pub mod decoder;
pub mod error;
pub mod packager;
pub mod playback;
pub mod wav;

// Re-export main types for convenience
pub use buffer::DecodedAudioBuffer;
pub use config::{DownloadConfig, SpeakwaveConfig};
pub use decoder::{
    decode_in_background, decode_payload, decode_payload_with_format, decode_pcm_bytes,
    Endianness, PcmFormat,
};
pub use error::{
    BufferError, ConfigError, DecodeError, DeviceError, EncodeError, PackageError,
    ParameterError, PlaybackError, SpeakwaveError, SpeakwaveResult,
};
pub use packager::{AudioFormat, DownloadArtifact, Packager};
pub use playback::{
    AudioConfig, DeviceOpener, DeviceState, OfflineDevice, OfflineOpener, OutputDevice,
    PlaybackEngine, PlaybackEvent, PlaybackParameters, PlaybackSession, PlaybackState,
    ResumePolicy, SessionToken,
};
pub use wav::{encode_in_background, encode_wav, encode_wav_frames, EncodedContainer, WavSpec};

/// Version information for the speakwave-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sample rate of provider payloads (24 kHz)
pub const PROVIDER_SAMPLE_RATE: u32 = 24_000;

/// Channel count of provider payloads (mono)
pub const PROVIDER_CHANNELS: u16 = 1;
