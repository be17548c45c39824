//! Decoded, planar float sample buffer shared by playback and encoding.

use crate::error::BufferError;

/// Planar float audio, one sample array per channel.
///
/// Samples are nominally in `[-1.0, 1.0]`. Every channel holds the same number
/// of frames and the buffer is never mutated after construction, so it is
/// shared behind an `Arc` between the playback engine and the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    frame_count: usize,
}

impl DecodedAudioBuffer {
    /// Create a buffer from per-channel sample arrays
    ///
    /// # Errors
    ///
    /// Returns an error if there are no channels, the channels differ in
    /// length, or the sample rate is zero
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, BufferError> {
        if sample_rate == 0 {
            return Err(BufferError::InvalidSampleRate);
        }
        let expected = channels.first().ok_or(BufferError::NoChannels)?.len();
        if let Some((channel, samples)) = channels
            .iter()
            .enumerate()
            .find(|(_, samples)| samples.len() != expected)
        {
            return Err(BufferError::ChannelLengthMismatch {
                channel,
                expected,
                actual: samples.len(),
            });
        }

        Ok(Self {
            channels,
            sample_rate,
            frame_count: expected,
        })
    }

    /// Create a single-channel buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the sample rate is zero
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self, BufferError> {
        Self::new(vec![samples], sample_rate)
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel)
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Number of channels, always at least one
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples of one channel
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// All channels in order
    #[must_use]
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Whether the buffer holds no frames
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Playback duration at the buffer's own sample rate
    #[must_use]
    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.frame_count as f64 / f64::from(self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_creation() {
        let buffer = DecodedAudioBuffer::new(vec![vec![0.0, 0.5], vec![-0.5, 1.0]], 24_000)
            .expect("Should create buffer");
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.sample_rate(), 24_000);
        assert_eq!(buffer.channel(1), Some(&[-0.5, 1.0][..]));
        assert_eq!(buffer.channel(2), None);
    }

    #[test]
    fn test_buffer_rejects_no_channels() {
        assert_eq!(
            DecodedAudioBuffer::new(Vec::new(), 24_000),
            Err(BufferError::NoChannels)
        );
    }

    #[test]
    fn test_buffer_rejects_mismatched_channels() {
        let result = DecodedAudioBuffer::new(vec![vec![0.0; 4], vec![0.0; 4], vec![0.0; 3]], 24_000);
        assert_eq!(
            result,
            Err(BufferError::ChannelLengthMismatch {
                channel: 2,
                expected: 4,
                actual: 3,
            })
        );
    }

    #[test]
    fn test_buffer_rejects_zero_sample_rate() {
        assert_eq!(
            DecodedAudioBuffer::mono(vec![0.0], 0),
            Err(BufferError::InvalidSampleRate)
        );
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = DecodedAudioBuffer::mono(vec![0.0; 12_000], 24_000).unwrap();
        assert_eq!(buffer.duration(), std::time::Duration::from_millis(500));
        assert!(!buffer.is_empty());
    }
}
