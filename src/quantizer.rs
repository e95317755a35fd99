//! Scale quantizer: maps continuous frequencies to the nearest in-scale
//! pitch, and event times to the nearest rhythmic grid line.

use libm::{exp2f, fabsf, floorf, log2f, roundf};

use crate::scales::{CustomScale, NOTE_NAMES, Scale};

const MIN_TEMPO_BPM: f32 = 60.0;
const MAX_TEMPO_BPM: f32 = 200.0;

/// A quantized pitch: frequency, MIDI number, and how far the input sat from
/// it in cents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// Quantized frequency in Hz
    pub frequency: f32,
    /// MIDI note number of the quantized pitch
    pub midi_number: i32,
    /// Deviation of the input from the quantized pitch, in cents
    pub cents_deviation: f32,
    /// Pitch-class name of the quantized pitch
    pub name: &'static str,
}

impl Note {
    /// Placeholder for unpitched input.
    pub const NONE: Note =
        Note { frequency: 0.0, midi_number: 0, cents_deviation: 0.0, name: "" };
}

/// Rhythmic grid resolutions, all derived from the quarter note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridResolution {
    Quarter,
    Eighth,
    Sixteenth,
    Triplet,
    Dotted,
}

/// Time signature for timing quantization.
///
/// Compound meters (6/8, 12/8) halve the samples-per-beat so the eighth note
/// becomes the beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub const fn new(numerator: u8, denominator: u8) -> Self {
        Self { numerator, denominator }
    }

    pub fn is_compound(&self) -> bool {
        self.denominator == 8 && self.numerator % 3 == 0
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

/// Maps frequencies to the nearest pitch of a selected scale and event times
/// to a tempo grid.
///
/// Stateless apart from the tempo/meter settings and the custom scale, so a
/// single instance serves every block.
#[derive(Debug, Clone)]
pub struct Quantizer {
    sample_rate: f32,
    tempo_bpm: f32,
    time_signature: TimeSignature,
    samples_per_beat: f32,
    custom_scale: CustomScale,
}

impl Quantizer {
    pub fn new(sample_rate: f32) -> Self {
        let mut quantizer = Quantizer {
            sample_rate,
            tempo_bpm: 120.0,
            time_signature: TimeSignature::default(),
            samples_per_beat: 0.0,
            custom_scale: CustomScale::default(),
        };
        quantizer.update_grid();
        quantizer
    }

    /// Fractional MIDI note number for a frequency; 0.0 for unpitched input.
    pub fn frequency_to_midi(frequency_hz: f32) -> f32 {
        if frequency_hz <= 0.0 {
            return 0.0;
        }
        69.0 + 12.0 * log2f(frequency_hz / 440.0)
    }

    /// Frequency in Hz for a (possibly fractional) MIDI note number.
    pub fn midi_to_frequency(midi: f32) -> f32 {
        440.0 * exp2f((midi - 69.0) / 12.0)
    }

    /// Pull `input_hz` toward the nearest pitch of `scale` rooted at
    /// `key_center`, by `strength`.
    ///
    /// `strength` blends linearly in MIDI space: 0.0 returns the input
    /// unchanged, 1.0 snaps fully to the scale. Unpitched input (<= 0 Hz)
    /// passes through.
    pub fn quantize_pitch(
        &self,
        input_hz: f32,
        scale: Scale,
        key_center: u8,
        strength: f32,
    ) -> f32 {
        if input_hz <= 0.0 || strength <= 0.0 {
            return input_hz;
        }
        let midi_in = Self::frequency_to_midi(input_hz);
        let midi_quantized = self.nearest_scale_midi(midi_in, scale, key_center);
        let strength = strength.clamp(0.0, 1.0);
        Self::midi_to_frequency(midi_in + strength * (midi_quantized - midi_in))
    }

    /// Full quantization report for `input_hz` at strength 1.
    pub fn nearest_note(&self, input_hz: f32, scale: Scale, key_center: u8) -> Note {
        if input_hz <= 0.0 {
            return Note::NONE;
        }
        let midi_in = Self::frequency_to_midi(input_hz);
        let midi_quantized = self.nearest_scale_midi(midi_in, scale, key_center);
        let frequency = Self::midi_to_frequency(midi_quantized);
        let cents = 1200.0 * log2f(input_hz / frequency);
        let midi_number = roundf(midi_quantized) as i32;
        Note {
            frequency,
            midi_number,
            cents_deviation: cents.clamp(-1200.0, 1200.0),
            name: NOTE_NAMES[midi_number.rem_euclid(12) as usize],
        }
    }

    /// Nearest scale member to a fractional MIDI number.
    ///
    /// Candidates are each interval in the input's octave plus the same
    /// interval an octave up; on an exact tie the interval scanned first wins.
    fn nearest_scale_midi(&self, midi_in: f32, scale: Scale, key_center: u8) -> f32 {
        let intervals = match scale.intervals() {
            Some(intervals) => intervals,
            None => self.custom_scale.intervals(),
        };
        let root = key_center.min(127) as f32;
        let distance = midi_in - root;
        let octave = floorf(distance / 12.0);
        let remainder = distance - 12.0 * octave;

        let mut best = intervals[0] as f32;
        let mut best_distance = fabsf(remainder - best);
        for &interval in intervals {
            for candidate in [interval as f32, interval as f32 + 12.0] {
                let candidate_distance = fabsf(remainder - candidate);
                if candidate_distance < best_distance {
                    best_distance = candidate_distance;
                    best = candidate;
                }
            }
        }
        root + 12.0 * octave + best
    }

    /// Pull an event time (in samples) toward the nearest grid line by
    /// `strength`.
    pub fn quantize_timing(&self, time_samples: f32, grid: GridResolution, strength: f32) -> f32 {
        if strength <= 0.0 {
            return time_samples;
        }
        let samples_per_grid = self.samples_per_grid(grid);
        if samples_per_grid <= 0.0 {
            return time_samples;
        }
        let grid_position = time_samples / samples_per_grid;
        let strength = strength.clamp(0.0, 1.0);
        let snapped = grid_position + strength * (roundf(grid_position) - grid_position);
        snapped * samples_per_grid
    }

    /// Grid spacing in samples for the current tempo and meter.
    pub fn samples_per_grid(&self, grid: GridResolution) -> f32 {
        match grid {
            GridResolution::Quarter => self.samples_per_beat,
            GridResolution::Eighth => self.samples_per_beat / 2.0,
            GridResolution::Sixteenth => self.samples_per_beat / 4.0,
            GridResolution::Triplet => self.samples_per_beat / 3.0,
            GridResolution::Dotted => self.samples_per_beat * 1.5,
        }
    }

    /// Set the tempo, clamped to [60, 200] BPM.
    pub fn set_tempo(&mut self, bpm: f32) {
        self.tempo_bpm = bpm.clamp(MIN_TEMPO_BPM, MAX_TEMPO_BPM);
        self.update_grid();
    }

    pub fn tempo(&self) -> f32 {
        self.tempo_bpm
    }

    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.time_signature = time_signature;
        self.update_grid();
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    /// Store intervals for [`Scale::Custom`]; they are mod-reduced, sorted,
    /// and deduplicated.
    pub fn set_custom_scale(&mut self, intervals: &[u8]) {
        self.custom_scale.set(intervals);
    }

    pub fn custom_scale(&self) -> &[u8] {
        self.custom_scale.intervals()
    }

    fn update_grid(&mut self) {
        let mut samples_per_beat = 60.0 / self.tempo_bpm * self.sample_rate;
        if self.time_signature.is_compound() {
            samples_per_beat *= 0.5;
        }
        self.samples_per_beat = samples_per_beat;
    }
}
