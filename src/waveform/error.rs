use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::AudioFormat;

/// Failure modes of a single analysis request.
///
/// Every variant is caught at the worker boundary; none of them stops the
/// pool or propagates to callers of the service facade.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The request names a format with no decoder wired up.
    #[error("No decoder available for {format} input {path:?}")]
    UnsupportedFormat { format: AudioFormat, path: PathBuf },
    /// The external decode step or the temp-file handling around it failed.
    #[error("Transcode failed for {path:?}: {message}")]
    TranscodeFailed { path: PathBuf, message: String },
    /// The PCM stream was malformed, truncated, or unreadable.
    #[error("PCM extraction failed for {path:?}: {message}")]
    ExtractionFailed { path: PathBuf, message: String },
    /// Guard rejection for overlong tracks; logged as a skip, not a failure.
    #[error("Track duration {actual:?} exceeds the {limit:?} analysis cap")]
    DurationExceeded { actual: Duration, limit: Duration },
    /// The cancel token fired before this request finished; a skip, not a
    /// failure.
    #[error("Analysis cancelled for {path:?}")]
    Cancelled { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_exceeded_formats_both_durations() {
        let err = AnalysisError::DurationExceeded {
            actual: Duration::from_millis(2_000_000),
            limit: Duration::from_millis(1_582_000),
        };
        let text = err.to_string();
        assert!(text.contains("2000s"));
        assert!(text.contains("1582s"));
    }

    #[test]
    fn unsupported_format_names_the_format() {
        let err = AnalysisError::UnsupportedFormat {
            format: AudioFormat::Flac,
            path: PathBuf::from("/music/track.flac"),
        };
        assert!(err.to_string().contains("flac"));
    }
}
