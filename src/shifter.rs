//! Time-domain pitch shifter with an envelope follower.
//!
//! Resynthesis reads the input block through a fractional phase accumulator
//! advanced by the pitch ratio, linearly interpolating between neighboring
//! samples, and scales the result by an attack/release amplitude envelope
//! tracked from the input. The phase and envelope registers persist across
//! blocks so consecutive calls stay continuous.

use libm::{expf, fabsf, floorf};

use crate::config::ProcessingResult;

pub const DEFAULT_ATTACK_TIME: f32 = 0.01;
pub const DEFAULT_RELEASE_TIME: f32 = 0.1;

/// Lowest and highest effective pitch ratios the shifter will apply.
const MIN_RATIO: f32 = 0.5;
const MAX_RATIO: f32 = 2.0;

/// One-pole coefficient for an attack or release time in seconds.
fn envelope_coefficient(time_seconds: f32, sample_rate: f32) -> f32 {
    if time_seconds <= 0.0 {
        return 1.0;
    }
    1.0 - expf(-1.0 / (time_seconds * sample_rate))
}

/// Shifts a detected fundamental toward a target fundamental.
pub struct PitchShifter {
    sample_rate: f32,
    buffer_size: usize,
    attack_time: f32,
    release_time: f32,
    attack_coefficient: f32,
    release_coefficient: f32,
    preserve_formants: bool,
    phase: f32,
    envelope: f32,
}

impl PitchShifter {
    pub fn new(sample_rate: f32, buffer_size: usize) -> Self {
        Self {
            sample_rate,
            buffer_size,
            attack_time: DEFAULT_ATTACK_TIME,
            release_time: DEFAULT_RELEASE_TIME,
            attack_coefficient: envelope_coefficient(DEFAULT_ATTACK_TIME, sample_rate),
            release_coefficient: envelope_coefficient(DEFAULT_RELEASE_TIME, sample_rate),
            preserve_formants: false,
            phase: 0.0,
            envelope: 0.0,
        }
    }

    /// Recompute the envelope coefficients for new attack/release times.
    pub fn set_envelope_times(&mut self, attack_seconds: f32, release_seconds: f32) {
        self.attack_time = attack_seconds.max(0.0);
        self.release_time = release_seconds.max(0.0);
        self.attack_coefficient = envelope_coefficient(self.attack_time, self.sample_rate);
        self.release_coefficient = envelope_coefficient(self.release_time, self.sample_rate);
    }

    pub fn attack_time(&self) -> f32 {
        self.attack_time
    }

    pub fn release_time(&self) -> f32 {
        self.release_time
    }

    /// The baseline resynthesis leaves formants untouched; the flag is
    /// carried for callers that swap in a formant-aware stage.
    pub fn set_preserve_formants(&mut self, preserve: bool) {
        self.preserve_formants = preserve;
    }

    pub fn preserve_formants(&self) -> bool {
        self.preserve_formants
    }

    /// Resynthesis latency in samples (half the analysis block).
    pub fn latency_samples(&self) -> usize {
        self.buffer_size / 2
    }

    /// Shift one mono block from `detected_hz` toward `target_hz`.
    ///
    /// With `strength <= 0` or unpitched input the block is copied through
    /// bit-exactly and no state advances. The effective ratio is
    /// `1 + strength * (target/detected - 1)`, clamped to [0.5, 2.0].
    pub fn process(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        detected_hz: f32,
        target_hz: f32,
        strength: f32,
    ) -> ProcessingResult {
        let n = input.len().min(output.len());
        let mut result = ProcessingResult {
            success: true,
            detected_pitch: detected_hz,
            corrected_pitch: detected_hz,
            confidence: 0.0,
            latency_samples: self.latency_samples(),
        };

        if detected_hz <= 0.0 || strength <= 0.0 {
            output[..n].copy_from_slice(&input[..n]);
            return result;
        }

        let raw_ratio = target_hz / detected_hz;
        let ratio = (1.0 + strength * (raw_ratio - 1.0)).clamp(MIN_RATIO, MAX_RATIO);
        let block_len = n as f32;

        for j in 0..n {
            let index = floorf(self.phase) as usize;
            let fraction = self.phase - index as f32;
            let resampled = if index + 1 < n {
                (1.0 - fraction) * input[index] + fraction * input[index + 1]
            } else if index < n {
                input[index]
            } else {
                0.0
            };

            self.phase += ratio;
            if self.phase >= block_len {
                self.phase = 0.0;
            }

            let level = fabsf(input[j]);
            let coefficient = if level > self.envelope {
                self.attack_coefficient
            } else {
                self.release_coefficient
            };
            self.envelope += coefficient * (level - self.envelope);

            output[j] = resampled * self.envelope;
        }

        result.corrected_pitch = detected_hz * ratio;
        result.confidence = 0.8;
        result
    }

    /// Shift a single multi-channel frame.
    ///
    /// The sample-level shift runs on channel 0 and the result is broadcast
    /// to every output channel.
    pub fn process_frame(
        &mut self,
        input_frame: &[f32],
        output_frame: &mut [f32],
        detected_hz: f32,
        target_hz: f32,
        strength: f32,
    ) -> ProcessingResult {
        let sample = input_frame.first().copied().unwrap_or(0.0);
        let mut shifted = [0.0f32; 1];
        let result = self.process(&[sample], &mut shifted, detected_hz, target_hz, strength);
        for channel in output_frame.iter_mut() {
            *channel = shifted[0];
        }
        result
    }

    /// Clear the phase accumulator and envelope register.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.envelope = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    #[cfg(not(feature = "std"))]
    use alloc::{vec, vec::Vec};

    fn sine_block(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len).map(|i| libm::sinf(2.0 * PI * frequency * i as f32 / sample_rate)).collect()
    }

    #[test]
    fn test_zero_strength_is_bit_exact_identity() {
        let mut shifter = PitchShifter::new(44100.0, 512);
        let input = sine_block(440.0, 44100.0, 512);
        let mut output = vec![0.0f32; 512];
        let result = shifter.process(&input, &mut output, 440.0, 220.0, 0.0);
        assert!(result.success);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(output, input);
    }

    #[test]
    fn test_unpitched_input_passes_through() {
        let mut shifter = PitchShifter::new(44100.0, 512);
        let input = sine_block(440.0, 44100.0, 512);
        let mut output = vec![0.0f32; 512];
        let result = shifter.process(&input, &mut output, 0.0, 440.0, 1.0);
        assert!(result.success);
        assert_eq!(output, input);
    }

    #[test]
    fn test_passthrough_leaves_state_untouched() {
        let mut shifter = PitchShifter::new(44100.0, 512);
        let input = sine_block(440.0, 44100.0, 512);
        let mut output = vec![0.0f32; 512];
        // Prime the registers with a real shift, then snapshot.
        shifter.process(&input, &mut output, 440.0, 660.0, 1.0);
        let (phase, envelope) = (shifter.phase, shifter.envelope);
        shifter.process(&input, &mut output, 440.0, 660.0, 0.0);
        assert_eq!(shifter.phase, phase);
        assert_eq!(shifter.envelope, envelope);
    }

    #[test]
    fn test_octave_up_reports_doubled_pitch() {
        let mut shifter = PitchShifter::new(44100.0, 512);
        let input = sine_block(440.0, 44100.0, 512);
        let mut output = vec![0.0f32; 512];
        let result = shifter.process(&input, &mut output, 440.0, 880.0, 1.0);
        assert!(result.success);
        assert!((result.corrected_pitch - 880.0).abs() < 1e-3);
        assert_eq!(result.confidence, 0.8);
    }

    #[test]
    fn test_ratio_clamped_to_two_octaves() {
        let mut shifter = PitchShifter::new(44100.0, 512);
        let input = sine_block(440.0, 44100.0, 512);
        let mut output = vec![0.0f32; 512];
        let up = shifter.process(&input, &mut output, 100.0, 1000.0, 1.0);
        assert!((up.corrected_pitch - 200.0).abs() < 1e-3);
        shifter.reset();
        let down = shifter.process(&input, &mut output, 1000.0, 100.0, 1.0);
        assert!((down.corrected_pitch - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_partial_strength_scales_ratio() {
        let mut shifter = PitchShifter::new(44100.0, 512);
        let input = sine_block(440.0, 44100.0, 512);
        let mut output = vec![0.0f32; 512];
        // Half strength toward an octave up lands at 1.5x.
        let result = shifter.process(&input, &mut output, 440.0, 880.0, 0.5);
        assert!((result.corrected_pitch - 660.0).abs() < 1e-3);
    }

    #[test]
    fn test_envelope_rises_on_loud_input_and_decays_on_silence() {
        let mut shifter = PitchShifter::new(44100.0, 512);
        shifter.set_envelope_times(0.001, 0.005);
        let loud = vec![0.9f32; 512];
        let silent = vec![0.0f32; 512];
        let mut output = vec![0.0f32; 512];
        shifter.process(&loud, &mut output, 440.0, 440.0, 1.0);
        let after_loud = shifter.envelope;
        assert!(after_loud > 0.5, "envelope did not charge: {after_loud}");
        shifter.process(&silent, &mut output, 440.0, 440.0, 1.0);
        assert!(shifter.envelope < after_loud * 0.2, "envelope did not decay");
    }

    #[test]
    fn test_phase_persists_across_blocks() {
        let mut shifter = PitchShifter::new(44100.0, 512);
        let input = sine_block(440.0, 44100.0, 512);
        let mut output = vec![0.0f32; 512];
        // Ratio 1.5 leaves a fractional phase at the end of a 512 block.
        shifter.process(&input, &mut output, 440.0, 660.0, 1.0);
        let carried = shifter.phase;
        assert!(carried > 0.0);
        shifter.reset();
        assert_eq!(shifter.phase, 0.0);
        assert_eq!(shifter.envelope, 0.0);
    }

    #[test]
    fn test_latency_is_half_block() {
        let shifter = PitchShifter::new(44100.0, 512);
        assert_eq!(shifter.latency_samples(), 256);
    }

    #[test]
    fn test_frame_broadcasts_to_all_channels() {
        let mut shifter = PitchShifter::new(44100.0, 512);
        let input = [0.25f32, -0.75];
        let mut output = [0.0f32; 2];
        let result = shifter.process_frame(&input, &mut output, 440.0, 440.0, 0.0);
        assert!(result.success);
        // Channel 0 drives the shift; both outputs carry it.
        assert_eq!(output[0], output[1]);
        assert_eq!(output[0], 0.25);
    }

    #[test]
    fn test_preserve_formants_flag_persists() {
        let mut shifter = PitchShifter::new(44100.0, 512);
        assert!(!shifter.preserve_formants());
        shifter.set_preserve_formants(true);
        assert!(shifter.preserve_formants());
    }
}
