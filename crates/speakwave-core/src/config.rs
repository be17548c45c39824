//! TOML configuration.
//!
//! ```toml
//! [payload]
//! sample_rate = 24000
//! channels = 1
//!
//! [playback]
//! pitch_semitones = 2
//! rate_multiplier = 1.25
//! gain_level = 0.8
//!
//! [device]
//! block_size = 512
//!
//! [download]
//! prefix = "speech-"
//! format = "wav"
//! output_dir = "downloads"
//! ```
//!
//! Every section and field is optional and falls back to its default.

use crate::decoder::PcmFormat;
use crate::error::{ConfigError, PackageError};
use crate::packager::{AudioFormat, DownloadArtifact, Packager, DEFAULT_PREFIX};
use crate::playback::{AudioConfig, OfflineOpener, PlaybackEngine, PlaybackParameters};
use crate::wav::EncodedContainer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where and how download artifacts are produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// File name prefix
    pub prefix: String,
    /// Container format, which also fixes the extension
    pub format: AudioFormat,
    /// Directory artifacts are written to, if any
    pub output_dir: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            format: AudioFormat::Wav,
            output_dir: None,
        }
    }
}

impl DownloadConfig {
    /// Packager using the configured prefix
    #[must_use]
    pub fn packager(&self) -> Packager {
        Packager::with_prefix(self.prefix.clone())
    }

    /// Package a container under the configured format and write it to
    /// `output_dir` when one is set
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not match the configured format
    /// or the artifact cannot be written
    pub fn export(
        &self,
        container: EncodedContainer,
    ) -> Result<(DownloadArtifact, Option<PathBuf>), PackageError> {
        let artifact = self
            .packager()
            .package_as(container, self.format.extension())?;
        let written = match &self.output_dir {
            Some(dir) => Some(artifact.write_to_dir(dir)?),
            None => None,
        };
        Ok((artifact, written))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakwaveConfig {
    /// Declared layout of provider payloads
    pub payload: PcmFormat,
    /// Parameters the playback engine starts with
    pub playback: PlaybackParameters,
    /// Output device settings
    pub device: AudioConfig,
    /// Download artifact settings
    pub download: DownloadConfig,
}

impl SpeakwaveConfig {
    /// Parse and validate configuration text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or holds invalid values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Idle engine rendering to an offline device built from `[device]`,
    /// starting with the `[playback]` parameters
    #[must_use]
    pub fn offline_engine(&self) -> PlaybackEngine {
        let opener = Arc::new(OfflineOpener::new(self.device.clone()));
        PlaybackEngine::with_parameters(opener, self.playback)
    }

    /// Check every section for out-of-range values
    ///
    /// # Errors
    ///
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.payload
            .ensure_supported()
            .map_err(|e| ConfigError::Invalid(format!("payload: {e}")))?;
        self.playback
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("playback: {e}")))?;
        if self.device.sample_rate == 0 || self.device.channels == 0 || self.device.block_size == 0 {
            return Err(ConfigError::Invalid(
                "device: sample_rate, channels and block_size must be positive".to_string(),
            ));
        }
        if self.download.prefix.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(
                "download: prefix must not contain path separators".to_string(),
            ));
        }
        Ok(())
    }
}
