//! Shared in-memory store of finished amplitude profiles.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::debug;

use super::AmplitudeProfile;

/// Failure to persist or restore the profile cache.
#[derive(Debug, Error)]
pub enum CachePersistError {
    #[error("Cache file IO failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cache file is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Concurrent map from track id to its finished amplitude profile.
///
/// Readers (the UI thread) and writers (pool workers) share the cache behind
/// a `RwLock`; profiles are handed out as `Arc` clones so lookups never copy
/// bucket data.
#[derive(Debug, Default)]
pub struct WaveformCache {
    profiles: RwLock<HashMap<i64, Arc<AmplitudeProfile>>>,
}

impl WaveformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the profile for a track, if analysis has finished.
    pub fn get(&self, track_id: i64) -> Option<Arc<AmplitudeProfile>> {
        self.profiles
            .read()
            .expect("waveform cache lock poisoned")
            .get(&track_id)
            .cloned()
    }

    /// Store a finished profile, replacing any previous one for the track.
    pub fn insert(&self, track_id: i64, profile: AmplitudeProfile) {
        self.profiles
            .write()
            .expect("waveform cache lock poisoned")
            .insert(track_id, Arc::new(profile));
    }

    /// Drop a cached profile, e.g. when the track leaves the library.
    pub fn remove(&self, track_id: i64) {
        self.profiles
            .write()
            .expect("waveform cache lock poisoned")
            .remove(&track_id);
    }

    pub fn contains(&self, track_id: i64) -> bool {
        self.profiles
            .read()
            .expect("waveform cache lock poisoned")
            .contains_key(&track_id)
    }

    pub fn len(&self) -> usize {
        self.profiles
            .read()
            .expect("waveform cache lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the cache to `path` as JSON, atomically.
    ///
    /// Entries are keyed by track id in sorted order so the file is stable
    /// across runs with identical contents.
    pub fn store(&self, path: &Path) -> Result<(), CachePersistError> {
        let snapshot: BTreeMap<i64, AmplitudeProfile> = self
            .profiles
            .read()
            .expect("waveform cache lock poisoned")
            .iter()
            .map(|(id, profile)| (*id, profile.as_ref().clone()))
            .collect();
        let json = serde_json::to_string(&snapshot)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        debug!(entries = snapshot.len(), ?path, "Persisted waveform cache");
        Ok(())
    }

    /// Rebuild a cache from a file written by [`WaveformCache::store`].
    pub fn load(path: &Path) -> Result<Self, CachePersistError> {
        let json = std::fs::read_to_string(path)?;
        let snapshot: BTreeMap<i64, AmplitudeProfile> = serde_json::from_str(&json)?;
        let cache = Self::new();
        {
            let mut profiles = cache
                .profiles
                .write()
                .expect("waveform cache lock poisoned");
            for (id, profile) in snapshot {
                profiles.insert(id, Arc::new(profile));
            }
        }
        debug!(entries = cache.len(), ?path, "Restored waveform cache");
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn profile(values: &[f32]) -> AmplitudeProfile {
        AmplitudeProfile::from_buckets(values.to_vec())
    }

    #[test]
    fn insert_replaces_previous_profile() {
        let cache = WaveformCache::new();
        cache.insert(7, profile(&[0.1]));
        cache.insert(7, profile(&[0.9]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(7).unwrap().values(), &[0.9]);
    }

    #[test]
    fn get_misses_return_none() {
        let cache = WaveformCache::new();
        assert!(cache.get(1).is_none());
        assert!(!cache.contains(1));
    }

    #[test]
    fn remove_drops_the_entry() {
        let cache = WaveformCache::new();
        cache.insert(3, profile(&[0.5]));
        cache.remove(3);
        assert!(cache.is_empty());
    }

    #[test]
    fn store_then_load_round_trips_every_profile() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("waveforms.json");

        let cache = WaveformCache::new();
        cache.insert(1, profile(&[0.0, 0.25, 0.5]));
        cache.insert(42, profile(&[1.0]));
        cache.insert(-6, profile(&[]));
        cache.store(&path).unwrap();

        let restored = WaveformCache::load(&path).unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.get(1).unwrap().values(), &[0.0, 0.25, 0.5]);
        assert_eq!(restored.get(42).unwrap().values(), &[1.0]);
        assert_eq!(restored.get(-6).unwrap().width(), 0);
    }

    #[test]
    fn store_is_byte_stable_for_identical_contents() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.json");
        let second = dir.path().join("b.json");

        let cache = WaveformCache::new();
        cache.insert(9, profile(&[0.5]));
        cache.insert(2, profile(&[0.25]));
        cache.store(&first).unwrap();
        cache.store(&second).unwrap();

        assert_eq!(
            std::fs::read(&first).unwrap(),
            std::fs::read(&second).unwrap()
        );
    }

    #[test]
    fn malformed_cache_file_is_reported_not_panicked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("waveforms.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = WaveformCache::load(&path).unwrap_err();
        assert!(matches!(err, CachePersistError::Malformed(_)));
    }

    #[test]
    fn missing_cache_file_is_an_io_error() {
        let err = WaveformCache::load(Path::new("/nonexistent/waveforms.json")).unwrap_err();
        assert!(matches!(err, CachePersistError::Io(_)));
    }
}
