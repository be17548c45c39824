//! Download artifact packaging.
//!
//! Wraps an [`EncodedContainer`] into a named artifact
//! (`<prefix><unix millis>.<extension>`) and optionally persists it.

use crate::error::PackageError;
use crate::wav::EncodedContainer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Default artifact file name prefix
pub const DEFAULT_PREFIX: &str = "speakwave-";

/// Supported audio container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// WAV format (uncompressed)
    Wav,
}

impl AudioFormat {
    /// Get file extension for the format
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
        }
    }

    /// Get MIME type for the format
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
        }
    }

    /// Detect format from file extension
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not supported
    pub fn from_extension(extension: &str) -> Result<Self, PackageError> {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "wav" | "wave" => Ok(Self::Wav),
            _ => Err(PackageError::UnsupportedFormat(extension.to_string())),
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}

/// A named, typed byte artifact ready to hand to a download sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    file_name: String,
    mime_type: &'static str,
    created_at: DateTime<Utc>,
    bytes: Vec<u8>,
}

impl DownloadArtifact {
    /// File name including extension
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// MIME type of the bytes
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Creation timestamp embedded in the name
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Artifact bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Write the artifact into `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf, PackageError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| PackageError::Io {
            message: format!("Failed to create directory {}: {e}", dir.display()),
        })?;

        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        info!("Wrote {} bytes to {}", self.bytes.len(), path.display());
        Ok(path)
    }
}

/// Builds [`DownloadArtifact`]s with a fixed name prefix
#[derive(Debug, Clone)]
pub struct Packager {
    prefix: String,
}

impl Packager {
    /// Create a packager with the default prefix
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    /// Create a packager with a custom prefix
    #[must_use]
    pub fn with_prefix<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Name prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Package a container under its own format's extension, stamped now
    #[must_use]
    pub fn package(&self, container: EncodedContainer) -> DownloadArtifact {
        self.package_at(container, Utc::now())
    }

    /// Package a container with a specific creation time
    #[must_use]
    pub fn package_at(&self, container: EncodedContainer, created_at: DateTime<Utc>) -> DownloadArtifact {
        let format = container.format();
        DownloadArtifact {
            file_name: format!(
                "{}{}.{}",
                self.prefix,
                created_at.timestamp_millis(),
                format.extension()
            ),
            mime_type: format.mime_type(),
            created_at,
            bytes: container.into_bytes(),
        }
    }

    /// Package a container under a caller-chosen extension
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::ExtensionMismatch`] unless the extension names
    /// the container's own format
    pub fn package_as(
        &self,
        container: EncodedContainer,
        extension: &str,
    ) -> Result<DownloadArtifact, PackageError> {
        match AudioFormat::from_extension(extension) {
            Ok(format) if format == container.format() => Ok(self.package(container)),
            _ => Err(PackageError::ExtensionMismatch {
                requested: extension.to_string(),
                actual: container.format().extension().to_string(),
            }),
        }
    }
}

impl Default for Packager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::DecodedAudioBuffer;
    use crate::wav::encode_wav;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn container() -> EncodedContainer {
        let buffer = DecodedAudioBuffer::mono(vec![0.0, 0.5, -0.5], 24_000).unwrap();
        encode_wav(&buffer).unwrap()
    }

    #[test]
    fn test_audio_format_extension() {
        assert_eq!(AudioFormat::Wav.extension(), "wav");
        assert_eq!(AudioFormat::Wav.mime_type(), "audio/wav");
        assert_eq!(AudioFormat::Wav.to_string(), "WAV");
    }

    #[test]
    fn test_audio_format_from_extension() {
        assert_eq!(AudioFormat::from_extension("wav").unwrap(), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_extension(".WAV").unwrap(), AudioFormat::Wav);
        assert_eq!(
            AudioFormat::from_extension("mp3"),
            Err(PackageError::UnsupportedFormat("mp3".to_string()))
        );
    }

    #[test]
    fn test_package_names_artifact() {
        let created_at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let artifact = Packager::with_prefix("tts-").package_at(container(), created_at);

        assert_eq!(artifact.file_name(), "tts-1700000000123.wav");
        assert_eq!(artifact.mime_type(), "audio/wav");
        assert_eq!(artifact.created_at(), created_at);
        assert_eq!(artifact.bytes().len(), 44 + 6);
    }

    #[test]
    fn test_package_as_rejects_mislabelled_extension() {
        let result = Packager::new().package_as(container(), "mp3");
        assert_eq!(
            result,
            Err(PackageError::ExtensionMismatch {
                requested: "mp3".to_string(),
                actual: "wav".to_string(),
            })
        );

        let artifact = Packager::new().package_as(container(), "WAV").unwrap();
        assert!(artifact.file_name().starts_with(DEFAULT_PREFIX));
        assert!(artifact.file_name().ends_with(".wav"));
    }

    #[test]
    fn test_write_to_dir() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("nested").join("out");
        let artifact = Packager::new().package(container());

        let path = artifact.write_to_dir(&target).expect("Should write artifact");
        assert_eq!(path.parent(), Some(target.as_path()));
        assert_eq!(std::fs::read(&path).unwrap(), artifact.bytes());
    }
}
