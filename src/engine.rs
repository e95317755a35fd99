//! Engine driver: owns the pipeline components and runs the
//! estimate -> quantize -> resynthesize chain for each block.

use core::mem;
use std::time::Instant;

use crate::config::{EngineConfig, ProcessingMode, ProcessingResult};
use crate::debug_log;
use crate::error::EngineError;
use crate::metrics::{LatencyHistory, PerformanceMetrics};
use crate::ml::{InferenceBackend, MlRuntime};
use crate::pitch::PitchEstimator;
use crate::quantizer::{Note, Quantizer, TimeSignature};
use crate::ring_buffer::FrameRingBuffer;
use crate::scales::Scale;
use crate::shifter::PitchShifter;

/// How many analysis blocks the input queue can stage ahead of processing.
const INPUT_QUEUE_BLOCKS: usize = 4;

/// Real-time monophonic pitch-correction engine.
///
/// The engine exclusively owns its estimator, shifter, quantizer, and input
/// queue; multiple engines are fully independent. `process` and
/// `process_frame` are synchronous, allocation-free after construction, and
/// meant to be driven from a single (audio) thread. Configuration mutators
/// must not interleave with a `process` call; the borrow checker enforces
/// this within one thread.
pub struct Engine {
    config: EngineConfig,
    estimator: PitchEstimator,
    shifter: PitchShifter,
    quantizer: Quantizer,
    input_queue: FrameRingBuffer,
    latency: LatencyHistory,
    frames_processed: u64,
    ml: MlRuntime,
    // Scratch buffers, sized at construction.
    mono: Vec<f32>,
    shifted: Vec<f32>,
    ml_scratch: Vec<f32>,
    queued: Vec<f32>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let mut config = config;
        config.correction_strength = config.correction_strength.clamp(0.0, 1.0);
        config.quantize_strength = config.quantize_strength.clamp(0.0, 1.0);
        config.key_center = config.key_center.min(127);

        let mut shifter = PitchShifter::new(config.sample_rate, config.buffer_size);
        shifter.set_envelope_times(config.attack_time, config.release_time);
        shifter.set_preserve_formants(config.preserve_formants);

        let mut quantizer = Quantizer::new(config.sample_rate);
        quantizer.set_tempo(config.tempo_bpm);
        config.tempo_bpm = quantizer.tempo();

        Ok(Self {
            estimator: PitchEstimator::new(config.sample_rate, config.buffer_size),
            shifter,
            quantizer,
            input_queue: FrameRingBuffer::new(
                config.buffer_size * INPUT_QUEUE_BLOCKS + 1,
                config.channels,
            ),
            latency: LatencyHistory::new(),
            frames_processed: 0,
            ml: MlRuntime::new(),
            mono: vec![0.0; config.buffer_size],
            shifted: vec![0.0; config.buffer_size],
            ml_scratch: vec![0.0; config.buffer_size],
            queued: vec![0.0; config.buffer_size * config.channels],
            config,
        })
    }

    /// Construct for a stream shape with default parameters.
    pub fn with_stream(
        sample_rate: f32,
        buffer_size: usize,
        channels: usize,
    ) -> Result<Self, EngineError> {
        Self::new(EngineConfig::new(sample_rate, buffer_size, channels)?)
    }

    /// Suggested analysis block size for a sample rate.
    pub fn recommended_buffer_size(sample_rate: f32) -> usize {
        EngineConfig::recommended_buffer_size(sample_rate)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one block of `frame_count` interleaved frames.
    ///
    /// Preconditions: `frame_count` in `(0, buffer_size]` and both slices
    /// hold at least `frame_count * channels` samples. On violation the
    /// output is left untouched and the result reports `success == false`.
    ///
    /// In the correction modes the analysis runs on a mono downmix (mean of
    /// channels 0 and 1) and the shifted signal is broadcast to every output
    /// channel.
    pub fn process(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        frame_count: usize,
    ) -> ProcessingResult {
        let started = Instant::now();
        if frame_count == 0 || frame_count > self.config.buffer_size {
            return ProcessingResult::failure();
        }
        let samples = frame_count * self.config.channels;
        if input.len() < samples || output.len() < samples {
            return ProcessingResult::failure();
        }

        let result = match self.config.mode {
            ProcessingMode::Bypass => {
                output[..samples].copy_from_slice(&input[..samples]);
                ProcessingResult { success: true, ..Default::default() }
            }
            ProcessingMode::Quantization => self.process_quantization(input, output, frame_count),
            ProcessingMode::PitchCorrection => {
                self.process_pipeline(input, output, frame_count, false)
            }
            ProcessingMode::FullAutotune => {
                self.process_pipeline(input, output, frame_count, true)
            }
        };

        self.latency.record(started.elapsed().as_secs_f32() * 1000.0);
        self.frames_processed += self.config.buffer_size as u64;
        result
    }

    /// Process a single frame; equivalent to `process` with `frame_count = 1`.
    pub fn process_frame(&mut self, input: &[f32], output: &mut [f32]) -> ProcessingResult {
        self.process(input, output, 1)
    }

    /// Stage interleaved frames for later processing; returns how many frames
    /// were accepted. Never blocks, so it may be called from an I/O thread
    /// while the audio thread runs `process_queued`.
    pub fn queue_input(&mut self, frames: &[f32]) -> usize {
        self.input_queue.write(frames)
    }

    /// Frames currently staged in the input queue.
    pub fn queued_frames(&self) -> usize {
        self.input_queue.available()
    }

    /// Dequeue up to `frame_count` staged frames and process them.
    ///
    /// Fewer frames than requested may be available; the block actually
    /// processed is reported through the output slice prefix. An empty queue
    /// yields `success == false` with the output untouched.
    pub fn process_queued(&mut self, output: &mut [f32], frame_count: usize) -> ProcessingResult {
        let channels = self.config.channels;
        if frame_count == 0
            || frame_count > self.config.buffer_size
            || output.len() < frame_count * channels
        {
            return ProcessingResult::failure();
        }
        let mut staged = mem::take(&mut self.queued);
        let got = self.input_queue.read(&mut staged[..frame_count * channels]);
        let result = if got == 0 {
            ProcessingResult::failure()
        } else {
            self.process(&staged[..got * channels], output, got)
        };
        self.queued = staged;
        result
    }

    fn process_pipeline(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        frame_count: usize,
        quantize: bool,
    ) -> ProcessingResult {
        self.downmix(input, frame_count);
        let estimate = self.estimator.detect(&self.mono[..frame_count]);

        let target = if !estimate.is_voiced() {
            0.0
        } else if quantize {
            self.quantizer.quantize_pitch(
                estimate.frequency,
                self.config.scale,
                self.config.key_center,
                self.config.quantize_strength,
            )
        } else {
            estimate.frequency
        };

        let shift = self.shifter.process(
            &self.mono[..frame_count],
            &mut self.shifted[..frame_count],
            estimate.frequency,
            target,
            self.config.correction_strength,
        );

        let channels = self.config.channels;
        for frame in 0..frame_count {
            let base = frame * channels;
            for channel in 0..channels {
                output[base + channel] = self.shifted[frame];
            }
        }

        // With a model active, the first frame of the block comes from the
        // model instead of the time-domain shifter.
        if self
            .ml
            .process(
                &self.mono[..frame_count],
                estimate.frequency,
                self.config.correction_strength,
                &mut self.ml_scratch[..frame_count],
            )
            .is_some()
        {
            for channel in 0..channels {
                output[channel] = self.ml_scratch[0];
            }
        }

        ProcessingResult {
            success: true,
            detected_pitch: estimate.frequency,
            corrected_pitch: if estimate.is_voiced() { shift.corrected_pitch } else { 0.0 },
            confidence: estimate.confidence,
            latency_samples: shift.latency_samples,
        }
    }

    fn process_quantization(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        frame_count: usize,
    ) -> ProcessingResult {
        // Audio passes through; only the report carries the quantization.
        let samples = frame_count * self.config.channels;
        output[..samples].copy_from_slice(&input[..samples]);

        self.downmix(input, frame_count);
        let estimate = self.estimator.detect(&self.mono[..frame_count]);
        let target = if estimate.is_voiced() {
            self.quantizer.quantize_pitch(
                estimate.frequency,
                self.config.scale,
                self.config.key_center,
                self.config.quantize_strength,
            )
        } else {
            0.0
        };

        ProcessingResult {
            success: true,
            detected_pitch: estimate.frequency,
            corrected_pitch: target,
            confidence: estimate.confidence,
            latency_samples: 0,
        }
    }

    /// Mono analysis signal: channel 0 for mono streams, the mean of channels
    /// 0 and 1 otherwise.
    fn downmix(&mut self, input: &[f32], frame_count: usize) {
        let channels = self.config.channels;
        for frame in 0..frame_count {
            let base = frame * channels;
            self.mono[frame] = if channels == 1 {
                input[base]
            } else {
                0.5 * (input[base] + input[base + 1])
            };
        }
    }

    /// Apply the tunable parameters from `params`.
    ///
    /// The stream shape (`sample_rate`, `buffer_size`, `channels`) is fixed
    /// at construction and is not taken from `params`. Out-of-range values
    /// are clamped.
    pub fn set_parameters(&mut self, params: &EngineConfig) {
        self.config.correction_strength = params.correction_strength.clamp(0.0, 1.0);
        self.config.quantize_strength = params.quantize_strength.clamp(0.0, 1.0);
        self.config.attack_time = params.attack_time.max(0.0);
        self.config.release_time = params.release_time.max(0.0);
        self.config.scale = params.scale;
        self.config.key_center = params.key_center.min(127);
        self.config.mode = params.mode;
        self.config.preserve_formants = params.preserve_formants;
        self.shifter.set_envelope_times(self.config.attack_time, self.config.release_time);
        self.shifter.set_preserve_formants(self.config.preserve_formants);
        self.set_tempo(params.tempo_bpm);
        debug_log!(
            "parameters updated: mode={:?} scale={:?} key={} correction={:.2} quantize={:.2}",
            self.config.mode,
            self.config.scale,
            self.config.key_center,
            self.config.correction_strength,
            self.config.quantize_strength
        );
    }

    pub fn set_mode(&mut self, mode: ProcessingMode) {
        debug_log!("mode change: {:?} -> {:?}", self.config.mode, mode);
        self.config.mode = mode;
    }

    pub fn set_scale(&mut self, scale: Scale, key_center: u8) {
        self.config.scale = scale;
        self.config.key_center = key_center.min(127);
        debug_log!("scale change: {:?} rooted at {}", scale, self.config.key_center);
    }

    /// Store intervals for [`Scale::Custom`].
    pub fn set_custom_scale(&mut self, intervals: &[u8]) {
        self.quantizer.set_custom_scale(intervals);
    }

    /// Set the tempo for timing quantization, clamped to [60, 200] BPM.
    pub fn set_tempo(&mut self, bpm: f32) {
        self.quantizer.set_tempo(bpm);
        self.config.tempo_bpm = self.quantizer.tempo();
    }

    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.quantizer.set_time_signature(time_signature);
    }

    /// Map the correction / quantization / formant switches onto a mode.
    pub fn configure_features(
        &mut self,
        enable_correction: bool,
        enable_quantization: bool,
        enable_formants: bool,
    ) {
        self.set_mode(ProcessingMode::from_features(enable_correction, enable_quantization));
        self.config.preserve_formants = enable_formants;
        self.shifter.set_preserve_formants(enable_formants);
    }

    /// Quantization report for a frequency against the active scale and key.
    pub fn nearest_note(&self, input_hz: f32) -> Note {
        self.quantizer.nearest_note(input_hz, self.config.scale, self.config.key_center)
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    /// Rolling performance counters.
    pub fn get_performance_metrics(&self) -> PerformanceMetrics {
        let average_latency_ms = self.latency.average_ms();
        PerformanceMetrics {
            average_latency_ms,
            cpu_usage_percent: 100.0 * average_latency_ms / self.config.block_duration_ms(),
            frames_processed: self.frames_processed,
        }
    }

    /// Clear every stateful component: estimator history, shifter phase and
    /// envelope, the input queue, and the performance counters.
    pub fn reset(&mut self) {
        self.estimator.reset();
        self.shifter.reset();
        self.input_queue.clear();
        self.latency.clear();
        self.frames_processed = 0;
        debug_log!("engine reset");
    }

    /// Register an external inference runtime for the ML path.
    pub fn set_inference_backend(&mut self, backend: Box<dyn InferenceBackend>) {
        self.ml.set_backend(backend);
    }

    /// Attempt to load a model; false when no backend is registered or the
    /// load fails.
    pub fn load_model(&mut self, path: &str) -> bool {
        let loaded = self.ml.load_model(path);
        debug_log!("model load from {:?}: {}", path, loaded);
        loaded
    }

    /// Enable ML processing; silently stays disabled without a loaded model.
    pub fn set_ml_processing_enabled(&mut self, enabled: bool) {
        self.ml.set_enabled(enabled);
    }

    pub fn is_ml_processing_enabled(&self) -> bool {
        self.ml.is_enabled()
    }

    pub fn get_ml_model_info(&self) -> String {
        self.ml.model_info()
    }
}
