//! Provider payload decoding.
//!
//! The speech provider returns base64 text wrapping raw signed 16-bit
//! little-endian PCM, mono, 24 kHz. The layout is fixed by the provider
//! contract and is described here by [`PcmFormat`]; it is configuration, not
//! something inferred from the payload.

use crate::buffer::DecodedAudioBuffer;
use crate::error::{DecodeError, SpeakwaveResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Byte order of PCM samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Little-endian byte order
    Little,
    /// Big-endian byte order
    Big,
}

/// Declared layout of a raw PCM payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcmFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Sample byte order
    pub endianness: Endianness,
}

impl PcmFormat {
    /// The speech provider's payload contract
    pub const PROVIDER: Self = Self {
        sample_rate: crate::PROVIDER_SAMPLE_RATE,
        channels: crate::PROVIDER_CHANNELS,
        bits_per_sample: 16,
        endianness: Endianness::Little,
    };

    /// Bytes per interleaved frame
    #[must_use]
    pub const fn block_align(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Check that this decoder can interpret the format
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedFormat`] for anything other than
    /// signed 16-bit little-endian PCM with at least one channel and a
    /// positive sample rate
    pub fn ensure_supported(&self) -> Result<(), DecodeError> {
        if self.bits_per_sample != 16 || self.endianness != Endianness::Little {
            return Err(DecodeError::UnsupportedFormat {
                detected: format!(
                    "{}-bit {:?}-endian PCM",
                    self.bits_per_sample, self.endianness
                ),
            });
        }
        if self.channels == 0 || self.sample_rate == 0 {
            return Err(DecodeError::UnsupportedFormat {
                detected: format!(
                    "PCM with {} channels at {} Hz",
                    self.channels, self.sample_rate
                ),
            });
        }
        Ok(())
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::PROVIDER
    }
}

/// Identify a known container by its full header.
///
/// A bare magic prefix is not enough: `RIFF` or `ID3` are ordinary sample
/// values in raw PCM, so the fields that follow the magic must validate too.
fn detect_container(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        // RIFF, chunk size covering at least the form type, WAVE
        [b'R', b'I', b'F', b'F', s0, s1, s2, s3, b'W', b'A', b'V', b'E', ..]
            if u32::from_le_bytes([*s0, *s1, *s2, *s3]) >= 4 =>
        {
            Some("RIFF/WAVE container")
        }
        // ID3v2.2-2.4, no undefined flag bits, syncsafe tag size
        [b'I', b'D', b'3', major, revision, flags, size @ ..]
            if (2..=4).contains(major)
                && *revision != 0xFF
                && flags & 0x0F == 0
                && size.len() >= 4
                && size[..4].iter().all(|b| b & 0x80 == 0) =>
        {
            Some("MP3 with ID3 tag")
        }
        // Ogg page, stream structure version 0, only defined header-type bits
        [b'O', b'g', b'g', b'S', 0, header_type, rest @ ..]
            if header_type & !0x07 == 0 && rest.len() >= 21 =>
        {
            Some("Ogg container")
        }
        // fLaC followed by a 34-byte STREAMINFO block
        [b'f', b'L', b'a', b'C', block_type, 0, 0, 34, rest @ ..]
            if block_type & 0x7F == 0 && rest.len() >= 34 =>
        {
            Some("FLAC stream")
        }
        _ => None,
    }
}

/// Decode a base64 provider payload using the provider contract
///
/// # Errors
///
/// See [`decode_payload_with_format`]
pub fn decode_payload(payload: &str) -> Result<DecodedAudioBuffer, DecodeError> {
    decode_payload_with_format(payload, &PcmFormat::PROVIDER)
}

/// Decode a base64 payload with an explicit PCM layout
///
/// ASCII whitespace in the payload is ignored.
///
/// # Errors
///
/// - [`DecodeError::InvalidEncoding`] if the text is not base64
/// - [`DecodeError::EmptyAudioError`] if it decodes to nothing
/// - [`DecodeError::UnsupportedFormat`] if the bytes are a known container or
///   the format is not 16-bit little-endian
/// - [`DecodeError::MalformedPayload`] if the bytes do not split into whole frames
pub fn decode_payload_with_format(
    payload: &str,
    format: &PcmFormat,
) -> Result<DecodedAudioBuffer, DecodeError> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| DecodeError::InvalidEncoding {
            message: e.to_string(),
        })?;

    decode_pcm_bytes(&bytes, format)
}

/// Decode raw interleaved PCM bytes
///
/// # Errors
///
/// Same as [`decode_payload_with_format`], minus the base64 step
pub fn decode_pcm_bytes(
    bytes: &[u8],
    format: &PcmFormat,
) -> Result<DecodedAudioBuffer, DecodeError> {
    format.ensure_supported()?;

    if bytes.is_empty() {
        return Err(DecodeError::EmptyAudioError);
    }

    if let Some(detected) = detect_container(bytes) {
        return Err(DecodeError::UnsupportedFormat {
            detected: detected.to_string(),
        });
    }

    let block_align = format.block_align();
    if bytes.len() % block_align != 0 {
        return Err(DecodeError::MalformedPayload {
            byte_len: bytes.len(),
            block_align,
        });
    }

    let channel_count = usize::from(format.channels);
    let frame_count = bytes.len() / block_align;
    let mut channels = vec![Vec::with_capacity(frame_count); channel_count];

    for frame in bytes.chunks_exact(block_align) {
        for (channel, sample) in channels.iter_mut().zip(frame.chunks_exact(2)) {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            channel.push(f32::from(value) / 32768.0);
        }
    }

    debug!(
        "Decoded {} frames x {} channels at {} Hz",
        frame_count, channel_count, format.sample_rate
    );

    DecodedAudioBuffer::new(channels, format.sample_rate).map_err(|e| {
        DecodeError::UnsupportedFormat {
            detected: e.to_string(),
        }
    })
}

/// Decode a provider payload on the blocking thread pool
///
/// Decoding is pure; this only moves the work off the async executor for
/// large payloads.
///
/// # Errors
///
/// Returns the decode error, or a task error if the worker was cancelled
pub async fn decode_in_background(
    payload: String,
    format: PcmFormat,
) -> SpeakwaveResult<DecodedAudioBuffer> {
    let buffer =
        tokio::task::spawn_blocking(move || decode_payload_with_format(&payload, &format))
            .await??;
    Ok(buffer)
}
