//! Pipeline settings with TOML persistence.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;

pub const CONFIG_FILE_NAME: &str = "settings.toml";

const MAX_WORKER_COUNT: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to resolve application directory: {0}")]
    AppDir(String),
    #[error("Failed to create {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path:?}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize {path:?}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
}

/// Tunable parameters of the waveform pipeline.
///
/// Unknown keys in the settings file are ignored; missing keys fall back to
/// the defaults, so older files keep loading after upgrades.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Number of analysis worker threads.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Bucket count of every produced amplitude profile.
    #[serde(default = "default_profile_width")]
    pub profile_width: usize,
    /// Tracks longer than this are skipped before any decode work.
    #[serde(default = "default_max_track_duration_ms")]
    pub max_track_duration_ms: u64,
    /// Visual amplitude multiplier applied during extraction.
    #[serde(default = "default_height_coefficient")]
    pub height_coefficient: f32,
}

fn default_worker_count() -> usize {
    1
}

fn default_profile_width() -> usize {
    520
}

fn default_max_track_duration_ms() -> u64 {
    1_582_000
}

fn default_height_coefficient() -> f32 {
    4.3
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            profile_width: default_profile_width(),
            max_track_duration_ms: default_max_track_duration_ms(),
            height_coefficient: default_height_coefficient(),
        }
    }
}

impl PipelineSettings {
    /// Clamp out-of-range values after deserialization or user edits.
    pub fn normalized(mut self) -> Self {
        self.worker_count = self.worker_count.clamp(1, MAX_WORKER_COUNT);
        self.profile_width = self.profile_width.max(1);
        self
    }
}

/// Resolve the settings file path inside the application directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(|err| ConfigError::AppDir(err.to_string()))?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load settings from disk, returning defaults if the file is missing.
pub fn load_or_default() -> Result<PipelineSettings, ConfigError> {
    load_from_path(&config_path()?)
}

pub fn load_from_path(path: &Path) -> Result<PipelineSettings, ConfigError> {
    if !path.exists() {
        return Ok(PipelineSettings::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<PipelineSettings>(&text)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
        .map(PipelineSettings::normalized)
}

/// Persist settings to disk, overwriting any previous contents.
pub fn save(settings: &PipelineSettings) -> Result<(), ConfigError> {
    save_to_path(settings, &config_path()?)
}

/// Write the TOML settings file atomically to prevent partial writes on crash.
pub fn save_to_path(settings: &PipelineSettings, path: &Path) -> Result<(), ConfigError> {
    let data = toml::to_string_pretty(settings).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => {
            return Err(ConfigError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::other("settings path has no parent directory"),
            });
        }
    };
    std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })?;
    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    tmp.write_all(data.as_bytes())
        .map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    tmp.persist(path).map_err(|err| ConfigError::Write {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_the_documented_values() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.worker_count, 1);
        assert_eq!(settings.profile_width, 520);
        assert_eq!(settings.max_track_duration_ms, 1_582_000);
        assert!((settings.height_coefficient - 4.3).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_from_path(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings, PipelineSettings::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let settings = PipelineSettings {
            worker_count: 4,
            profile_width: 260,
            max_track_duration_ms: 60_000,
            height_coefficient: 1.0,
        };
        save_to_path(&settings, &path).unwrap();
        assert_eq!(load_from_path(&path).unwrap(), settings);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "worker_count = 3\n").unwrap();
        let settings = load_from_path(&path).unwrap();
        assert_eq!(settings.worker_count, 3);
        assert_eq!(settings.profile_width, 520);
    }

    #[test]
    fn out_of_range_values_are_clamped_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "worker_count = 9999\nprofile_width = 0\n").unwrap();
        let settings = load_from_path(&path).unwrap();
        assert_eq!(settings.worker_count, 64);
        assert_eq!(settings.profile_width, 1);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "worker_count = \"lots\"").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }
}
