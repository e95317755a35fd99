//! Configuration types for the pitch-correction engine

use crate::error::EngineError;
use crate::scales::Scale;

/// Which stages of the pipeline run for each block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Detect pitch and shift toward it without snapping to a scale
    PitchCorrection,
    /// Report detected and quantized pitch; audio passes through untouched
    Quantization,
    /// Detect pitch, quantize to the active scale, and shift toward the target
    FullAutotune,
    /// Copy input to output verbatim
    Bypass,
}

impl ProcessingMode {
    /// Derive the mode from the correction / quantization feature switches.
    pub fn from_features(correction: bool, quantization: bool) -> Self {
        match (correction, quantization) {
            (true, true) => ProcessingMode::FullAutotune,
            (true, false) => ProcessingMode::PitchCorrection,
            (false, true) => ProcessingMode::Quantization,
            (false, false) => ProcessingMode::Bypass,
        }
    }
}

/// Engine configuration.
///
/// `sample_rate`, `buffer_size` and `channels` describe the stream shape and
/// are fixed once the engine is constructed; everything else can be changed
/// between blocks through the engine's mutators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Samples per analysis block (powers of two preferred)
    pub buffer_size: usize,
    /// Interleaved channels per frame
    pub channels: usize,
    /// Blend between detected pitch (0.0) and target pitch (1.0)
    pub correction_strength: f32,
    /// Blend in MIDI space between the input note and the nearest scale note
    pub quantize_strength: f32,
    /// Envelope follower attack time in seconds
    pub attack_time: f32,
    /// Envelope follower release time in seconds
    pub release_time: f32,
    /// Active scale
    pub scale: Scale,
    /// Root of the active scale as a MIDI note number (0-127)
    pub key_center: u8,
    /// Active pipeline mode
    pub mode: ProcessingMode,
    /// Formant preservation flag, carried to the resynthesizer
    pub preserve_formants: bool,
    /// Tempo for timing quantization, clamped to [60, 200] BPM
    pub tempo_bpm: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            buffer_size: 512,
            channels: 1,
            correction_strength: 1.0,
            quantize_strength: 1.0,
            attack_time: 0.01,
            release_time: 0.1,
            scale: Scale::Chromatic,
            key_center: 60,
            mode: ProcessingMode::FullAutotune,
            preserve_formants: false,
            tempo_bpm: 120.0,
        }
    }
}

impl EngineConfig {
    /// Create a configuration for a given stream shape, with validation.
    pub fn new(sample_rate: f32, buffer_size: usize, channels: usize) -> Result<Self, EngineError> {
        let config = Self { sample_rate, buffer_size, channels, ..Default::default() };
        config.validate()?;
        Ok(config)
    }

    /// Check the stream shape parameters.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.sample_rate > 0.0) || !self.sample_rate.is_finite() {
            return Err(EngineError::InvalidConfiguration);
        }
        if self.buffer_size == 0 || self.channels == 0 {
            return Err(EngineError::InvalidConfiguration);
        }
        Ok(())
    }

    /// Suggested analysis block size for a sample rate.
    pub fn recommended_buffer_size(sample_rate: f32) -> usize {
        if sample_rate <= 22050.0 {
            128
        } else if sample_rate <= 44100.0 {
            256
        } else if sample_rate <= 48000.0 {
            512
        } else if sample_rate <= 96000.0 {
            1024
        } else {
            2048
        }
    }

    /// Duration of one full analysis block in milliseconds.
    pub fn block_duration_ms(&self) -> f32 {
        1000.0 * self.buffer_size as f32 / self.sample_rate
    }
}

/// Outcome of processing one block or frame.
///
/// `success == false` means a precondition was violated and the output was
/// left untouched. A silent or unpitched block is not a failure: it reports
/// `success == true` with `detected_pitch == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProcessingResult {
    /// Whether the block was processed
    pub success: bool,
    /// Detected fundamental in Hz, 0.0 when no pitch was found
    pub detected_pitch: f32,
    /// Target fundamental the output was shifted toward, in Hz
    pub corrected_pitch: f32,
    /// Detection confidence in [0, 1]
    pub confidence: f32,
    /// Resynthesis latency in samples
    pub latency_samples: usize,
}

impl ProcessingResult {
    /// Result for a rejected call: output untouched.
    pub fn failure() -> Self {
        Self::default()
    }
}
