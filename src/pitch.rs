//! Autocorrelation pitch estimator.
//!
//! Estimates the fundamental frequency of a block by windowing it, computing
//! the time-domain autocorrelation, and searching the lag range that maps to
//! the configured frequency range. The peak lag gives the period; the ratio
//! of peak to zero-lag energy gives a confidence score. Successive estimates
//! are smoothed with a one-pole filter so the reported pitch does not jitter
//! between blocks.

use libm::floorf;

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use crate::hann_window::hann_window;

pub const DEFAULT_MIN_FREQUENCY: f32 = 80.0;
pub const DEFAULT_MAX_FREQUENCY: f32 = 2000.0;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;
pub const DEFAULT_SMOOTHING_FACTOR: f32 = 0.8;

/// Result of one detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PitchEstimate {
    /// Smoothed fundamental in Hz, 0.0 when no pitch was found
    pub frequency: f32,
    /// Peak-to-energy ratio in [0, 1]
    pub confidence: f32,
}

impl PitchEstimate {
    /// Estimate for silent, noisy, or out-of-range input.
    pub const NONE: PitchEstimate = PitchEstimate { frequency: 0.0, confidence: 0.0 };

    pub fn is_voiced(&self) -> bool {
        self.frequency > 0.0
    }
}

/// Windowed-autocorrelation pitch estimator.
///
/// All working buffers are sized at construction; `detect` allocates nothing.
pub struct PitchEstimator {
    sample_rate: f32,
    window_size: usize,
    min_frequency: f32,
    max_frequency: f32,
    confidence_threshold: f32,
    smoothing_factor: f32,
    window: Vec<f32>,
    windowed: Vec<f32>,
    autocorrelation: Vec<f32>,
    previous_pitch: f32,
}

impl PitchEstimator {
    /// Create an estimator for blocks of up to `window_size` samples.
    pub fn new(sample_rate: f32, window_size: usize) -> Self {
        let nyquist = sample_rate * 0.5;
        Self {
            sample_rate,
            window_size,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            max_frequency: DEFAULT_MAX_FREQUENCY.min(nyquist),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            window: hann_window(window_size),
            windowed: vec![0.0; window_size],
            autocorrelation: vec![0.0; window_size],
            previous_pitch: 0.0,
        }
    }

    /// Restrict the detectable range; the upper bound is capped at Nyquist.
    pub fn set_frequency_range(&mut self, min_frequency: f32, max_frequency: f32) {
        let nyquist = self.sample_rate * 0.5;
        self.min_frequency = min_frequency.max(1.0);
        self.max_frequency = max_frequency.clamp(self.min_frequency, nyquist);
    }

    /// Minimum peak-to-energy ratio below which a block is reported unpitched.
    pub fn set_confidence_threshold(&mut self, threshold: f32) {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
    }

    /// One-pole smoothing weight on the previous estimate; 0.0 disables
    /// smoothing.
    pub fn set_smoothing_factor(&mut self, factor: f32) {
        self.smoothing_factor = factor.clamp(0.0, 1.0);
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Estimate the fundamental of `samples`.
    ///
    /// Returns [`PitchEstimate::NONE`] when the block is longer than the
    /// window, the lag range is empty, the confidence falls below the
    /// threshold, or the detected frequency leaves the configured range. The
    /// smoothing register only advances on a successful estimate.
    pub fn detect(&mut self, samples: &[f32]) -> PitchEstimate {
        let n = samples.len();
        if n == 0 || n > self.window_size {
            return PitchEstimate::NONE;
        }

        for i in 0..n {
            self.windowed[i] = samples[i] * self.window[i];
        }

        for lag in 0..n {
            let mut sum = 0.0f32;
            for i in 0..n - lag {
                sum += self.windowed[i] * self.windowed[i + lag];
            }
            self.autocorrelation[lag] = sum;
        }

        let lag_min = (floorf(self.sample_rate / self.max_frequency) as usize).max(1);
        let lag_max = (floorf(self.sample_rate / self.min_frequency) as usize).min(n - 1);
        if lag_min >= lag_max {
            return PitchEstimate::NONE;
        }

        // Peak search; ties break toward the lowest lag.
        let mut best_lag = lag_min;
        let mut best_value = self.autocorrelation[lag_min];
        for lag in lag_min + 1..=lag_max {
            if self.autocorrelation[lag] > best_value {
                best_value = self.autocorrelation[lag];
                best_lag = lag;
            }
        }

        let energy = self.autocorrelation[0];
        let confidence = if energy > 0.0 { (best_value / energy).clamp(0.0, 1.0) } else { 0.0 };
        if confidence < self.confidence_threshold {
            return PitchEstimate::NONE;
        }

        let frequency = self.sample_rate / best_lag as f32;
        if frequency < self.min_frequency || frequency > self.max_frequency {
            return PitchEstimate::NONE;
        }

        self.previous_pitch = if self.previous_pitch == 0.0 {
            frequency
        } else {
            self.smoothing_factor * self.previous_pitch
                + (1.0 - self.smoothing_factor) * frequency
        };

        PitchEstimate { frequency: self.previous_pitch, confidence }
    }

    /// Forget the previous estimate so the next block starts cold.
    pub fn reset(&mut self) {
        self.previous_pitch = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    fn sine_block(frequency: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * libm::sinf(2.0 * PI * frequency * i as f32 / sample_rate))
            .collect()
    }

    #[test]
    fn test_detects_440_hz_sine() {
        let mut estimator = PitchEstimator::new(44100.0, 512);
        let block = sine_block(440.0, 44100.0, 512, 0.5);
        let estimate = estimator.detect(&block);
        assert!(
            (estimate.frequency - 440.0).abs() < 10.0,
            "detected {} Hz",
            estimate.frequency
        );
        assert!(estimate.confidence >= 0.3, "confidence {}", estimate.confidence);
    }

    #[test]
    fn test_detects_220_hz_sine() {
        let mut estimator = PitchEstimator::new(44100.0, 1024);
        let block = sine_block(220.0, 44100.0, 1024, 0.8);
        let estimate = estimator.detect(&block);
        assert!(
            (estimate.frequency - 220.0).abs() < 5.0,
            "detected {} Hz",
            estimate.frequency
        );
    }

    #[test]
    fn test_silence_is_unpitched() {
        let mut estimator = PitchEstimator::new(44100.0, 512);
        let estimate = estimator.detect(&[0.0; 512]);
        assert_eq!(estimate, PitchEstimate::NONE);
    }

    #[test]
    fn test_oversized_block_is_rejected() {
        let mut estimator = PitchEstimator::new(44100.0, 256);
        let block = sine_block(440.0, 44100.0, 512, 0.5);
        assert_eq!(estimator.detect(&block), PitchEstimate::NONE);
    }

    #[test]
    fn test_empty_block_is_rejected() {
        let mut estimator = PitchEstimator::new(44100.0, 256);
        assert_eq!(estimator.detect(&[]), PitchEstimate::NONE);
    }

    #[test]
    fn test_below_range_frequency_is_rejected() {
        // A 50 Hz period does not fit the lag window, so whatever peak the
        // search lands on maps above the configured maximum and is dropped.
        let mut estimator = PitchEstimator::new(44100.0, 512);
        let block = sine_block(50.0, 44100.0, 512, 0.8);
        assert_eq!(estimator.detect(&block), PitchEstimate::NONE);
    }

    #[test]
    fn test_empty_lag_range_is_rejected() {
        let mut estimator = PitchEstimator::new(44100.0, 512);
        // min above max after the Nyquist cap collapses the range.
        estimator.set_frequency_range(20000.0, 22000.0);
        let block = sine_block(440.0, 44100.0, 512, 0.5);
        assert_eq!(estimator.detect(&block), PitchEstimate::NONE);
    }

    #[test]
    fn test_cold_start_takes_first_estimate() {
        let mut estimator = PitchEstimator::new(44100.0, 512);
        let block = sine_block(440.0, 44100.0, 512, 0.5);
        let first = estimator.detect(&block);
        // No history to smooth against: the first estimate is used directly.
        assert!((first.frequency - 441.0).abs() < 2.0);
    }

    #[test]
    fn test_smoothing_pulls_toward_history() {
        let mut estimator = PitchEstimator::new(44100.0, 1024);
        let low = sine_block(220.0, 44100.0, 1024, 0.8);
        let high = sine_block(440.0, 44100.0, 1024, 0.8);
        let first = estimator.detect(&low);
        let second = estimator.detect(&high);
        // With smoothing factor 0.8 the jump to 440 is mostly suppressed.
        assert!(second.frequency > first.frequency);
        assert!(
            second.frequency < 300.0,
            "smoothed estimate moved too far: {}",
            second.frequency
        );
    }

    #[test]
    fn test_reset_clears_history() {
        let mut estimator = PitchEstimator::new(44100.0, 1024);
        let low = sine_block(220.0, 44100.0, 1024, 0.8);
        let high = sine_block(440.0, 44100.0, 1024, 0.8);
        estimator.detect(&low);
        estimator.reset();
        let fresh = estimator.detect(&high);
        assert!(
            (fresh.frequency - 441.0).abs() < 5.0,
            "history leaked through reset: {}",
            fresh.frequency
        );
    }

    #[test]
    fn test_partial_block_shorter_than_window() {
        let mut estimator = PitchEstimator::new(44100.0, 1024);
        let block = sine_block(440.0, 44100.0, 512, 0.5);
        let estimate = estimator.detect(&block);
        assert!((estimate.frequency - 440.0).abs() < 10.0);
    }
}
