//! WAV container encoding
//!
//! Produces canonical 44-byte-header RIFF/WAVE/PCM bytes, 16-bit, in memory.

use crate::buffer::DecodedAudioBuffer;
use crate::error::{EncodeError, SpeakwaveResult};
use crate::packager::AudioFormat;
use std::sync::Arc;
use tracing::{debug, warn};

/// Size of the canonical RIFF/WAVE/fmt/data header
pub const WAV_HEADER_LEN: usize = 44;

const BYTES_PER_SAMPLE: u16 = 2;
const BIT_DEPTH: u16 = 16;
const FORMAT_PCM: u16 = 1;

/// Channel layout and rate of a 16-bit WAV stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Sample rate in Hz (e.g., 24000, 44100, 48000)
    pub sample_rate: u32,
}

impl WavSpec {
    /// Describe a 16-bit stream
    #[must_use]
    pub const fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    /// Bits per sample, always 16
    #[must_use]
    pub const fn bit_depth(&self) -> u16 {
        BIT_DEPTH
    }

    /// Get byte rate (bytes per second), or `None` if it overflows `u32`
    #[must_use]
    pub const fn byte_rate(&self) -> Option<u32> {
        match self.sample_rate.checked_mul(self.channels as u32) {
            Some(rate) => rate.checked_mul(BYTES_PER_SAMPLE as u32),
            None => None,
        }
    }

    /// Get block align (bytes per sample frame), or `None` if it overflows `u16`
    #[must_use]
    pub const fn block_align(&self) -> Option<u16> {
        self.channels.checked_mul(BYTES_PER_SAMPLE)
    }

    /// Append the 44-byte header for `data_size` bytes of sample data
    fn write_header(&self, out: &mut Vec<u8>, data_size: u32) -> Result<(), EncodeError> {
        let byte_rate = self
            .byte_rate()
            .ok_or(EncodeError::TooLarge { field: "byte rate" })?;
        let block_align = self
            .block_align()
            .ok_or(EncodeError::TooLarge { field: "block align" })?;
        let riff_size = data_size
            .checked_add(36)
            .ok_or(EncodeError::TooLarge { field: "RIFF chunk size" })?;

        // RIFF chunk
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&riff_size.to_le_bytes()); // File size - 8
        out.extend_from_slice(b"WAVE");

        // fmt chunk
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&BIT_DEPTH.to_le_bytes());

        // data chunk
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_size.to_le_bytes());
        Ok(())
    }
}

/// Encoded WAV bytes tagged with their format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedContainer {
    bytes: Vec<u8>,
    spec: WavSpec,
}

impl EncodedContainer {
    /// Container format, always WAV
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    /// MIME type of the bytes
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.format().mime_type()
    }

    /// Format of the embedded PCM data
    #[must_use]
    pub const fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Complete container bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the container bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total byte length, header included
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether there are no bytes at all; encoded containers always carry a header
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Interleaved little-endian sample bytes of the `data` subchunk
    #[must_use]
    pub fn pcm_data(&self) -> &[u8] {
        &self.bytes[WAV_HEADER_LEN..]
    }
}

/// Quantize one float sample to signed 16-bit.
///
/// Non-negative values scale by 32767 and negative values by 32768, both
/// truncated toward zero, so that `-1.0` maps to `-32768` and `1.0` to `32767`.
#[must_use]
pub fn quantize_sample(sample: f32) -> i16 {
    let clamped = f64::from(sample.clamp(-1.0, 1.0));
    let scaled = if clamped >= 0.0 {
        clamped * 32767.0
    } else {
        clamped * 32768.0
    };
    // `as` truncates toward zero and maps NaN to 0
    scaled as i16
}

/// Encode a whole buffer as WAV
///
/// # Errors
///
/// See [`encode_planar`]
pub fn encode_wav(buffer: &DecodedAudioBuffer) -> Result<EncodedContainer, EncodeError> {
    encode_wav_frames(buffer, None)
}

/// Encode at most `frame_limit` frames of a buffer as WAV
///
/// # Errors
///
/// See [`encode_planar`]
pub fn encode_wav_frames(
    buffer: &DecodedAudioBuffer,
    frame_limit: Option<usize>,
) -> Result<EncodedContainer, EncodeError> {
    encode_planar(buffer.channels(), buffer.sample_rate(), frame_limit)
}

/// Encode planar channels as interleaved 16-bit WAV
///
/// `frame_limit` defaults to the shortest channel's length and is clamped to it.
///
/// # Errors
///
/// - [`EncodeError::NoChannels`] if `channels` is empty
/// - [`EncodeError::TooLarge`] if the channel count, rate or data length does
///   not fit the header's fixed-width fields
pub fn encode_planar<C: AsRef<[f32]>>(
    channels: &[C],
    sample_rate: u32,
    frame_limit: Option<usize>,
) -> Result<EncodedContainer, EncodeError> {
    if channels.is_empty() {
        return Err(EncodeError::NoChannels);
    }

    let available = channels
        .iter()
        .map(|c| c.as_ref().len())
        .min()
        .unwrap_or(0);
    let frames = frame_limit.map_or(available, |limit| {
        if limit > available {
            warn!(
                "Frame limit {} exceeds {} available frames, clamping",
                limit, available
            );
        }
        limit.min(available)
    });

    let channel_count = u16::try_from(channels.len())
        .map_err(|_| EncodeError::TooLarge { field: "channel count" })?;
    let spec = WavSpec::new(channel_count, sample_rate);
    let block_align = spec
        .block_align()
        .ok_or(EncodeError::TooLarge { field: "block align" })?;
    let data_len = frames
        .checked_mul(usize::from(block_align))
        .ok_or(EncodeError::TooLarge { field: "data size" })?;
    let data_size =
        u32::try_from(data_len).map_err(|_| EncodeError::TooLarge { field: "data size" })?;

    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + data_len);
    spec.write_header(&mut bytes, data_size)?;

    for frame in 0..frames {
        for channel in channels {
            let sample = quantize_sample(channel.as_ref()[frame]);
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }

    debug!(
        "Encoded {} frames x {} channels into {} WAV bytes",
        frames,
        channels.len(),
        bytes.len()
    );

    Ok(EncodedContainer { bytes, spec })
}

/// Encode a shared buffer on the blocking thread pool
///
/// # Errors
///
/// Returns the encode error, or a task error if the worker was cancelled
pub async fn encode_in_background(
    buffer: Arc<DecodedAudioBuffer>,
) -> SpeakwaveResult<EncodedContainer> {
    let container = tokio::task::spawn_blocking(move || encode_wav(&buffer)).await??;
    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u16(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    fn samples(container: &EncodedContainer) -> Vec<i16> {
        container
            .pcm_data()
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn test_wav_spec() {
        let spec = WavSpec::new(1, 24000);
        assert_eq!(spec.byte_rate(), Some(48000));
        assert_eq!(spec.block_align(), Some(2));
        assert_eq!(spec.bit_depth(), 16);

        let stereo_spec = WavSpec::new(2, 44100);
        assert_eq!(stereo_spec.byte_rate(), Some(176_400));
        assert_eq!(stereo_spec.block_align(), Some(4));

        assert_eq!(WavSpec::new(1, u32::MAX).byte_rate(), None);
        assert_eq!(WavSpec::new(u16::MAX, 24000).block_align(), None);
    }

    #[test]
    fn test_header_layout() {
        let buffer = DecodedAudioBuffer::new(vec![vec![0.0; 3], vec![0.0; 3]], 24_000).unwrap();
        let container = encode_wav(&buffer).unwrap();
        let bytes = container.as_bytes();

        assert_eq!(bytes.len(), 44 + 3 * 2 * 2);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(read_u32(bytes, 4), bytes.len() as u32 - 8);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(read_u32(bytes, 16), 16);
        assert_eq!(read_u16(bytes, 20), 1);
        assert_eq!(read_u16(bytes, 22), 2);
        assert_eq!(read_u32(bytes, 24), 24_000);
        assert_eq!(read_u32(bytes, 28), 96_000);
        assert_eq!(read_u16(bytes, 32), 4);
        assert_eq!(read_u16(bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(read_u32(bytes, 40), 12);
        assert_eq!(container.mime_type(), "audio/wav");
    }

    #[test]
    fn test_zero_frame_buffer_is_header_only() {
        let buffer = DecodedAudioBuffer::mono(Vec::new(), 24_000).unwrap();
        let container = encode_wav(&buffer).unwrap();
        assert_eq!(container.len(), 44);
        assert_eq!(read_u32(container.as_bytes(), 40), 0);
        assert!(container.pcm_data().is_empty());
    }

    #[test]
    fn test_asymmetric_quantization() {
        let buffer = DecodedAudioBuffer::mono(vec![1.0, -1.0, 0.0], 24_000).unwrap();
        let container = encode_wav(&buffer).unwrap();
        assert_eq!(samples(&container), vec![32767, -32768, 0]);
    }

    #[test]
    fn test_quantize_truncates_toward_zero() {
        assert_eq!(quantize_sample(0.5), 16383);
        assert_eq!(quantize_sample(-0.5), -16384);
        assert_eq!(quantize_sample(-0.000_01), 0);
        assert_eq!(quantize_sample(1.5), 32767);
        assert_eq!(quantize_sample(-3.0), -32768);
        assert_eq!(quantize_sample(f32::NAN), 0);
        assert_eq!(quantize_sample(f32::INFINITY), 32767);
    }

    #[test]
    fn test_interleaves_frame_major() {
        let buffer =
            DecodedAudioBuffer::new(vec![vec![0.5, 1.0], vec![-0.5, -1.0]], 24_000).unwrap();
        let container = encode_wav(&buffer).unwrap();
        assert_eq!(samples(&container), vec![16383, -16384, 32767, -32768]);
    }

    #[test]
    fn test_frame_limit() {
        let buffer = DecodedAudioBuffer::mono(vec![0.25; 10], 24_000).unwrap();
        let partial = encode_wav_frames(&buffer, Some(4)).unwrap();
        assert_eq!(partial.len(), 44 + 8);

        let clamped = encode_wav_frames(&buffer, Some(100)).unwrap();
        assert_eq!(clamped.len(), 44 + 20);
    }

    #[test]
    fn test_no_channels() {
        let channels: Vec<Vec<f32>> = Vec::new();
        assert_eq!(
            encode_planar(&channels, 24_000, None),
            Err(EncodeError::NoChannels)
        );
    }

    #[test]
    fn test_header_overflow_is_rejected() {
        let fast = DecodedAudioBuffer::mono(vec![0.0; 2], u32::MAX).unwrap();
        assert_eq!(
            encode_wav(&fast),
            Err(EncodeError::TooLarge { field: "byte rate" })
        );

        let wide: Vec<Vec<f32>> = vec![Vec::new(); 32_768];
        assert_eq!(
            encode_planar(&wide, 8_000, None),
            Err(EncodeError::TooLarge { field: "block align" })
        );

        let too_many: Vec<Vec<f32>> = vec![Vec::new(); 65_536];
        assert_eq!(
            encode_planar(&too_many, 8_000, None),
            Err(EncodeError::TooLarge { field: "channel count" })
        );
    }

    #[test]
    fn test_highest_representable_rate_still_encodes() {
        let buffer = DecodedAudioBuffer::mono(vec![0.5], u32::MAX / 2).unwrap();
        let container = encode_wav(&buffer).unwrap();
        assert_eq!(read_u32(container.as_bytes(), 28), (u32::MAX / 2) * 2);
    }

    #[tokio::test]
    async fn test_encode_in_background() {
        let buffer = Arc::new(DecodedAudioBuffer::mono(vec![0.1; 8], 24_000).unwrap());
        let container = encode_in_background(buffer).await.expect("Should encode on worker");
        assert_eq!(container.len(), 44 + 16);
    }
}
