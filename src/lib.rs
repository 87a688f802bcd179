//! Background waveform generation for a desktop music library.
//!
//! Tracks are submitted as [`WaveformRequest`]s; a bounded pool of worker
//! threads normalizes each source file to raw PCM, reduces it to a
//! fixed-width [`AmplitudeProfile`], publishes the result into the shared
//! [`WaveformCache`], and reports the outcome over an [`AnalysisEvent`]
//! channel. Failures are contained per request.

pub mod app_dirs;
pub mod config;
pub mod logging;
pub mod service;
pub mod waveform;

pub use config::{ConfigError, PipelineSettings};
pub use service::{AnalysisEvent, WaveformService};
pub use waveform::{
    AmplitudeProfile, AnalysisError, AudioFormat, CachePersistError, WaveformCache,
    WaveformRequest,
};
