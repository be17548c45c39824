//! Live playback parameters.

use crate::error::ParameterError;
use serde::{Deserialize, Serialize};

/// Pitch, rate and gain applied to a playing source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackParameters {
    /// Pitch shift in semitones (-12 to 12)
    pub pitch_semitones: i32,
    /// Playback rate multiplier (0.5 to 2.0)
    pub rate_multiplier: f32,
    /// Output gain (0.0 to 2.0)
    pub gain_level: f32,
}

impl PlaybackParameters {
    /// Valid pitch range in semitones
    pub const PITCH_RANGE: std::ops::RangeInclusive<i32> = -12..=12;
    /// Valid rate multiplier range
    pub const RATE_RANGE: std::ops::RangeInclusive<f32> = 0.5..=2.0;
    /// Valid gain range
    pub const GAIN_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

    /// Create validated parameters
    ///
    /// # Errors
    ///
    /// Returns an error if any value is outside its range
    pub fn new(pitch_semitones: i32, rate_multiplier: f32, gain_level: f32) -> Result<Self, ParameterError> {
        Self::default()
            .with_pitch(pitch_semitones)?
            .with_rate(rate_multiplier)?
            .with_gain(gain_level)
    }

    /// Set pitch in semitones
    ///
    /// # Errors
    ///
    /// Returns an error if pitch is not in -12..=12
    pub fn with_pitch(mut self, pitch_semitones: i32) -> Result<Self, ParameterError> {
        if !Self::PITCH_RANGE.contains(&pitch_semitones) {
            return Err(ParameterError::PitchOutOfRange(pitch_semitones));
        }
        self.pitch_semitones = pitch_semitones;
        Ok(self)
    }

    /// Set rate multiplier
    ///
    /// # Errors
    ///
    /// Returns an error if rate is not in 0.5..=2.0
    pub fn with_rate(mut self, rate_multiplier: f32) -> Result<Self, ParameterError> {
        if !Self::RATE_RANGE.contains(&rate_multiplier) {
            return Err(ParameterError::RateOutOfRange(rate_multiplier));
        }
        self.rate_multiplier = rate_multiplier;
        Ok(self)
    }

    /// Set gain level
    ///
    /// # Errors
    ///
    /// Returns an error if gain is not in 0.0..=2.0
    pub fn with_gain(mut self, gain_level: f32) -> Result<Self, ParameterError> {
        if !Self::GAIN_RANGE.contains(&gain_level) {
            return Err(ParameterError::GainOutOfRange(gain_level));
        }
        self.gain_level = gain_level;
        Ok(self)
    }

    /// Validate fields set directly or loaded from config
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range field
    pub fn validate(&self) -> Result<(), ParameterError> {
        Self::new(self.pitch_semitones, self.rate_multiplier, self.gain_level).map(|_| ())
    }

    /// Source detune in cents
    #[must_use]
    pub fn detune_cents(&self) -> f32 {
        (self.pitch_semitones * 100) as f32
    }
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self {
            pitch_semitones: 0,
            rate_multiplier: 1.0,
            gain_level: 1.0,
        }
    }
}
