//! Optional neural-inference seam.
//!
//! The engine can delegate part of its correction work to an external model.
//! No inference runtime ships with this crate; a collaborator implements
//! [`InferenceBackend`] over their runtime of choice and registers it on the
//! engine. Without a backend, or without a loaded model, every ML entry
//! point degrades to the traditional pipeline.

/// Samples per inference call: the model consumes an `audio_buffer` tensor of
/// shape `[1, 512]`.
pub const ML_FRAME_SIZE: usize = 512;

/// Contract an external inference runtime must satisfy.
///
/// Tensor layout expected from the model:
///
/// | tensor | shape | semantics |
/// |---|---|---|
/// | `audio_buffer` (input) | `[1, 512]` | input samples |
/// | `target_pitch` (input, optional) | `[1, 1]` | detected frequency in Hz |
/// | `correction_strength` (input, optional) | `[1, 1]` | in `[0, 1]` |
/// | `corrected_audio` (output) | `[1, 512]` | output samples |
/// | `confidence` (output, optional) | `[1, 1]` | in `[0, 1]` |
pub trait InferenceBackend: Send {
    /// Attempt to load a model from a path; returns whether the load
    /// succeeded.
    fn load_model(&mut self, path: &str) -> bool;

    /// Whether a model is currently loaded and runnable.
    fn is_model_loaded(&self) -> bool;

    /// Human-readable description of the loaded model.
    fn model_info(&self) -> String;

    /// Run the model over `audio`, writing corrected samples into `output`.
    /// Returns the model's confidence in `[0, 1]`.
    fn process(
        &mut self,
        audio: &[f32],
        detected_pitch: f32,
        correction_strength: f32,
        output: &mut [f32],
    ) -> f32;
}

/// Engine-side state for the inference seam: the registered backend plus the
/// user's enable switch.
#[derive(Default)]
pub struct MlRuntime {
    backend: Option<Box<dyn InferenceBackend>>,
    enabled: bool,
}

impl MlRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an inference runtime. Replacing the backend drops any model
    /// the previous one had loaded.
    pub fn set_backend(&mut self, backend: Box<dyn InferenceBackend>) {
        self.backend = Some(backend);
        self.enabled = false;
    }

    /// Attempt to load a model; false when no backend is registered or the
    /// backend rejects the path.
    pub fn load_model(&mut self, path: &str) -> bool {
        match &mut self.backend {
            Some(backend) => backend.load_model(path),
            None => false,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.backend.as_ref().is_some_and(|backend| backend.is_model_loaded())
    }

    /// Enable or disable ML processing. Enabling without a loaded model is a
    /// silent no-op.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled && self.model_loaded();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.model_loaded()
    }

    /// Human-readable state of the seam.
    pub fn model_info(&self) -> String {
        match &self.backend {
            None => String::from("no inference backend registered; traditional pipeline active"),
            Some(backend) if !backend.is_model_loaded() => {
                String::from("no model loaded; traditional pipeline active")
            }
            Some(backend) => backend.model_info(),
        }
    }

    /// Run the model when active; `None` means the caller should use the
    /// traditional pipeline.
    pub fn process(
        &mut self,
        audio: &[f32],
        detected_pitch: f32,
        correction_strength: f32,
        output: &mut [f32],
    ) -> Option<f32> {
        if !self.enabled {
            return None;
        }
        match &mut self.backend {
            Some(backend) if backend.is_model_loaded() => {
                Some(backend.process(audio, detected_pitch, correction_strength, output))
            }
            _ => None,
        }
    }
}
