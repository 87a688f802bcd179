//! Normalizes source audio into a raw 16-bit little-endian PCM payload.
//!
//! WAV input is read straight out of its RIFF data chunk; compressed formats
//! go through an external ffmpeg invocation inside a scratch directory that is
//! removed when the call returns, success or not.

use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::TempDir;
use tracing::debug;

use super::{AnalysisError, AudioFormat};

/// Decode `path` into raw interleaved s16le PCM bytes.
///
/// Formats without a wired decoder are rejected up front so callers can
/// report them without touching the filesystem.
pub fn normalize_to_pcm(path: &Path, format: AudioFormat) -> Result<Vec<u8>, AnalysisError> {
    match format {
        AudioFormat::Wav => wav_pcm_payload(path),
        AudioFormat::Mp3 => transcode_in(path, std::env::temp_dir()),
        AudioFormat::M4a | AudioFormat::Flac => Err(AnalysisError::UnsupportedFormat {
            format,
            path: path.to_path_buf(),
        }),
    }
}

/// Pull the raw sample bytes out of a 16-bit integer PCM WAV file.
///
/// hound validates the header first; the data chunk is then located by
/// walking the RIFF chunk list so the payload is returned untouched, without
/// a decode pass over every sample.
fn wav_pcm_payload(path: &Path) -> Result<Vec<u8>, AnalysisError> {
    let extraction_failed = |message: String| AnalysisError::ExtractionFailed {
        path: path.to_path_buf(),
        message,
    };

    let reader = hound::WavReader::open(path)
        .map_err(|err| extraction_failed(format!("Invalid WAV header: {err}")))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(extraction_failed(format!(
            "Expected 16-bit integer PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    drop(reader);

    let bytes = std::fs::read(path).map_err(|err| extraction_failed(err.to_string()))?;
    riff_data_chunk(&bytes)
        .map(|payload| payload.to_vec())
        .ok_or_else(|| extraction_failed("No data chunk in RIFF container".to_string()))
}

/// Locate the `data` chunk payload inside a RIFF/WAVE byte stream.
fn riff_data_chunk(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut offset = 12usize;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let chunk_size =
            u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().ok()?) as usize;
        let chunk_data = offset + 8;
        if chunk_data + chunk_size > bytes.len() {
            return None;
        }
        if id == b"data" {
            return Some(&bytes[chunk_data..chunk_data + chunk_size]);
        }
        offset = chunk_data + chunk_size;
        // Chunks are word-aligned; odd sizes carry a pad byte.
        if chunk_size % 2 == 1 {
            offset = offset.saturating_add(1);
        }
    }
    None
}

/// Transcode a compressed file to s16le PCM through ffmpeg, using a scratch
/// directory under `scratch_root`.
///
/// The source is copied into the scratch directory before invoking ffmpeg so
/// the library file is never handed to the external process, and the whole
/// directory is dropped on return.
fn transcode_in(path: &Path, scratch_root: impl AsRef<Path>) -> Result<Vec<u8>, AnalysisError> {
    let transcode_failed = |message: String| AnalysisError::TranscodeFailed {
        path: path.to_path_buf(),
        message,
    };

    let scratch = TempDir::new_in(scratch_root)
        .map_err(|err| transcode_failed(format!("Failed to create scratch dir: {err}")))?;
    let source = scratch.path().join("source.mp3");
    let decoded = scratch.path().join("decoded.pcm");
    std::fs::copy(path, &source)
        .map_err(|err| transcode_failed(format!("Failed to stage source copy: {err}")))?;

    debug!(source = ?path, scratch = ?scratch.path(), "Transcoding to raw PCM");
    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-y", "-i"])
        .arg(&source)
        .args(["-f", "s16le", "-acodec", "pcm_s16le", "-ar", "44100", "-ac", "2"])
        .arg(&decoded)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|err| transcode_failed(format!("Failed to launch ffmpeg: {err}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(transcode_failed(format!("ffmpeg failed: {}", stderr.trim())));
    }

    std::fs::read(&decoded)
        .map_err(|err| transcode_failed(format!("Failed to read decoded PCM: {err}")))
}
