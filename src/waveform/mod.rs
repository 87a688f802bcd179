//! Waveform analysis building blocks: PCM extraction, downsampling,
//! transcoding, and the shared profile cache.

mod cache;
mod downsample;
mod error;
mod extract;
mod transcode;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use cache::{CachePersistError, WaveformCache};
pub use downsample::downsample;
pub use error::AnalysisError;
pub use extract::extract_amplitudes;
pub use transcode::normalize_to_pcm;

/// Source container format of a track submitted for analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Linear PCM in a RIFF container; read directly, no transcode.
    Wav,
    /// Decoded through the external transcode step.
    Mp3,
    /// Declared extension point, not yet wired to a decoder.
    M4a,
    /// Declared extension point, not yet wired to a decoder.
    Flac,
}

impl AudioFormat {
    /// Guess the format from a file extension, case-insensitively.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("wav") {
            Some(Self::Wav)
        } else if ext.eq_ignore_ascii_case("mp3") {
            Some(Self::Mp3)
        } else if ext.eq_ignore_ascii_case("m4a") {
            Some(Self::M4a)
        } else if ext.eq_ignore_ascii_case("flac") {
            Some(Self::Flac)
        } else {
            None
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Flac => "flac",
        };
        f.write_str(name)
    }
}

/// One track submitted for waveform analysis.
///
/// Consumed exactly once by a worker and discarded afterwards, whether the
/// analysis succeeded or failed.
#[derive(Clone, Debug)]
pub struct WaveformRequest {
    /// Library identifier of the track.
    pub track_id: i64,
    /// Absolute path of the source audio file.
    pub path: PathBuf,
    /// Container format of the source file.
    pub format: AudioFormat,
    /// Total playing time as reported by the library catalogue.
    pub total_duration: Duration,
}

/// Fixed-width sequence of normalized amplitude magnitudes.
///
/// Every profile produced by the pipeline has exactly the configured bucket
/// count, regardless of input length, and is never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmplitudeProfile {
    buckets: Vec<f32>,
}

impl AmplitudeProfile {
    pub(crate) fn from_buckets(buckets: Vec<f32>) -> Self {
        Self { buckets }
    }

    /// A silent profile of `width` buckets.
    pub fn zeroed(width: usize) -> Self {
        Self {
            buckets: vec![0.0; width],
        }
    }

    /// Number of buckets in the profile.
    pub fn width(&self) -> usize {
        self.buckets.len()
    }

    /// The normalized magnitudes, in track order.
    pub fn values(&self) -> &[f32] {
        &self.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension_ignores_case() {
        assert_eq!(
            AudioFormat::from_extension(Path::new("a/b/Track.WAV")),
            Some(AudioFormat::Wav)
        );
        assert_eq!(
            AudioFormat::from_extension(Path::new("track.Mp3")),
            Some(AudioFormat::Mp3)
        );
        assert_eq!(AudioFormat::from_extension(Path::new("track.ogg")), None);
        assert_eq!(AudioFormat::from_extension(Path::new("no_extension")), None);
    }

    #[test]
    fn zeroed_profile_has_requested_width() {
        let profile = AmplitudeProfile::zeroed(520);
        assert_eq!(profile.width(), 520);
        assert!(profile.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn profile_serializes_as_plain_array() {
        let profile = AmplitudeProfile::from_buckets(vec![0.25, 0.5]);
        let json = serde_json::to_string(&profile).unwrap();
        assert_eq!(json, "[0.25,0.5]");
        let back: AmplitudeProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
