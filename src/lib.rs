#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Core modules
pub mod config;
pub mod error;
pub mod scales;

// Analysis and resynthesis
pub mod hann_window;
pub mod pitch;
pub mod quantizer;
pub mod shifter;

// Buffer management
pub mod metrics;
pub mod ring_buffer;

// Engine driver (needs wall-clock timing for latency accounting)
#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
pub mod engine;

// Optional neural-inference seam
#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
pub mod ml;

// Re-export main API
pub use config::{EngineConfig, ProcessingMode, ProcessingResult};
pub use error::EngineError;
pub use metrics::PerformanceMetrics;
pub use pitch::{PitchEstimate, PitchEstimator};
pub use quantizer::{GridResolution, Note, Quantizer, TimeSignature};
pub use ring_buffer::FrameRingBuffer;
pub use scales::Scale;
pub use shifter::PitchShifter;

#[cfg(feature = "std")]
pub use engine::Engine;
#[cfg(feature = "std")]
pub use ml::{InferenceBackend, MlRuntime};

macro_rules! debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "debug-logging")]
        log::debug!($($arg)*);
    }};
}
pub(crate) use debug_log;
