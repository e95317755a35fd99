//! Error types for the pitch-correction engine

/// Errors that can occur while constructing or reconfiguring the engine.
///
/// Per-block processing problems are never reported through this enum; they
/// surface in-band via [`crate::ProcessingResult`] so the audio thread never
/// unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// Configuration parameters are invalid (zero sample rate, zero buffer
    /// size, zero channels)
    InvalidConfiguration,
    /// Input/output buffer size doesn't match the configured block shape
    BufferSizeMismatch,
}

#[cfg(feature = "std")]
impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidConfiguration => {
                write!(f, "Invalid engine configuration")
            }
            EngineError::BufferSizeMismatch => {
                write!(f, "Input/output buffer size mismatch")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EngineError {}
