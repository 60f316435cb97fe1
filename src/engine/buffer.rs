//! Audio Buffer Management
//!
//! Non-interleaved float buffers used for bus sub-mixes, the mastering chain
//! and the final engine output, plus level helpers for metering.

// ============================================================================
// Constants
// ============================================================================

/// Default sample rate for every engine graph (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default number of frames rendered per graph quantum
pub const DEFAULT_RENDER_QUANTUM: usize = 128;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
///
/// # Arguments
/// * `db` - Value in decibels
///
/// # Returns
/// Linear amplitude (0.0 to 1.0+ range)
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// # Returns
/// Value in decibels. Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Calculate the RMS level of an audio buffer in dB
///
/// Returns -f32::INFINITY for empty or silent buffers.
pub fn calculate_rms(buffer: &AudioBuffer) -> f32 {
    let total_samples = buffer.num_channels() * buffer.num_samples();
    if total_samples == 0 {
        return f32::NEG_INFINITY;
    }

    let sum_squares: f64 = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    let rms = (sum_squares / total_samples as f64).sqrt() as f32;
    linear_to_db(rms)
}

/// Calculate the peak level of an audio buffer in dB
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    linear_to_db(buffer.peak())
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Non-interleaved 32-bit float audio buffer
///
/// # Example
/// ```
/// use ambiente::engine::buffer::{AudioBuffer, ChannelLayout};
///
/// let buffer = AudioBuffer::new(128, ChannelLayout::Stereo);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 128);
/// ```
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a zeroed buffer at the default sample rate
    ///
    /// # Arguments
    /// * `num_samples` - Number of samples per channel
    /// * `layout` - Channel configuration (Mono or Stereo)
    pub fn new(num_samples: usize, layout: ChannelLayout) -> Self {
        Self::with_sample_rate(num_samples, layout, DEFAULT_SAMPLE_RATE)
    }

    /// Create a zeroed buffer with an explicit sample rate
    pub fn with_sample_rate(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; layout.num_channels()],
            sample_rate,
        }
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Alias for channels()
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alias for len()
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.len()
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Borrow both channels of a stereo buffer at once
    ///
    /// Returns None for mono buffers.
    pub fn stereo_mut(&mut self) -> Option<(&mut [f32], &mut [f32])> {
        if self.samples.len() < 2 {
            return None;
        }
        let (left, right) = self.samples.split_at_mut(1);
        Some((left[0].as_mut_slice(), right[0].as_mut_slice()))
    }

    /// Get a sample at the specified channel and index
    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Option<f32> {
        self.samples
            .get(channel)
            .and_then(|ch| ch.get(index).copied())
    }

    /// Set a sample at the specified channel and index
    ///
    /// # Returns
    /// true if the sample was set, false if indices are out of bounds
    #[inline]
    pub fn set_sample(&mut self, channel: usize, index: usize, value: f32) -> bool {
        if let Some(sample) = self
            .samples
            .get_mut(channel)
            .and_then(|ch| ch.get_mut(index))
        {
            *sample = value;
            return true;
        }
        false
    }

    /// Zero every sample, keeping the length
    pub fn clear(&mut self) {
        for channel in &mut self.samples {
            channel.fill(0.0);
        }
    }

    /// Resize every channel to `num_samples` and zero the content
    pub fn reset_len(&mut self, num_samples: usize) {
        for channel in &mut self.samples {
            channel.clear();
            channel.resize(num_samples, 0.0);
        }
    }

    /// Copy the content of `other` into this buffer
    ///
    /// Copies up to the shorter length of both buffers; channels beyond
    /// `other`'s channel count are left untouched.
    pub fn copy_from(&mut self, other: &AudioBuffer) {
        for (dst, src) in self.samples.iter_mut().zip(other.samples.iter()) {
            let n = dst.len().min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
        }
    }

    /// Add `other * gain` into this buffer starting at `offset`
    ///
    /// A mono source is spread to every destination channel.
    pub fn mix_from(&mut self, other: &AudioBuffer, offset: usize, gain: f32) {
        let src_channels = other.channels();
        if src_channels == 0 {
            return;
        }
        for (ch, dst) in self.samples.iter_mut().enumerate() {
            let src = &other.samples[ch.min(src_channels - 1)];
            if offset >= dst.len() {
                continue;
            }
            for (d, s) in dst[offset..].iter_mut().zip(src.iter()) {
                *d += s * gain;
            }
        }
    }

    /// Absolute peak value over all channels (linear)
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new(0, ChannelLayout::Stereo)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_db_conversions() {
        assert_relative_eq!(db_to_linear(0.0), 1.0);
        assert_relative_eq!(db_to_linear(-6.0), 0.501187, epsilon = 1e-5);
        assert_relative_eq!(linear_to_db(1.0), 0.0);
        assert_eq!(linear_to_db(0.0), f32::NEG_INFINITY);
    }

    #[test]
    fn test_new_buffer_is_silent() {
        let buffer = AudioBuffer::with_sample_rate(64, ChannelLayout::Stereo, 16000);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 64);
        assert_eq!(buffer.peak(), 0.0);
        assert_eq!(calculate_rms(&buffer), f32::NEG_INFINITY);
        assert_relative_eq!(buffer.duration_secs(), 0.004);
    }

    #[test]
    fn test_stereo_mut_splits_channels() {
        let mut buffer = AudioBuffer::new(4, ChannelLayout::Stereo);
        {
            let (left, right) = buffer.stereo_mut().unwrap();
            left[0] = 0.5;
            right[0] = -0.25;
        }
        assert_eq!(buffer.get_sample(0, 0), Some(0.5));
        assert_eq!(buffer.get_sample(1, 0), Some(-0.25));

        let mut mono = AudioBuffer::new(4, ChannelLayout::Mono);
        assert!(mono.stereo_mut().is_none());
    }

    #[test]
    fn test_mix_from_with_offset_and_gain() {
        let mut dst = AudioBuffer::new(4, ChannelLayout::Stereo);
        let mut src = AudioBuffer::new(2, ChannelLayout::Mono);
        src.channel_mut(0).copy_from_slice(&[1.0, 1.0]);

        dst.mix_from(&src, 2, 0.5);
        assert_eq!(dst.channel(0), &[0.0, 0.0, 0.5, 0.5]);
        assert_eq!(dst.channel(1), &[0.0, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn test_reset_len_and_clear() {
        let mut buffer = AudioBuffer::new(8, ChannelLayout::Stereo);
        buffer.set_sample(0, 3, 0.7);
        buffer.reset_len(3);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.peak(), 0.0);

        buffer.set_sample(1, 1, -0.9);
        assert_relative_eq!(calculate_peak(&buffer), linear_to_db(0.9));
        buffer.clear();
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn test_set_sample_out_of_bounds() {
        let mut buffer = AudioBuffer::new(2, ChannelLayout::Mono);
        assert!(!buffer.set_sample(1, 0, 1.0));
        assert!(!buffer.set_sample(0, 5, 1.0));
        assert!(buffer.is_finite());
    }
}
