//! Background analysis service: admission queue, worker pool, and the
//! facade the rest of the application talks to.

mod pool;
mod queue;

use std::sync::Arc;
use std::sync::mpsc::Sender;

use tracing::debug;

use crate::config::PipelineSettings;
use crate::waveform::{AmplitudeProfile, WaveformCache, WaveformRequest};
use pool::WaveformWorkerPool;
use queue::RequestQueue;

/// Outcome notification for one analysis request.
///
/// Exactly one event is sent per accepted request, whatever happens to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalysisEvent {
    /// The profile is now in the cache.
    Completed { track_id: i64 },
    /// The request was rejected by a guard before any decode work.
    Skipped { track_id: i64, reason: String },
    /// The request went through the pipeline and broke somewhere.
    Failed { track_id: i64, error: String },
}

impl AnalysisEvent {
    pub fn track_id(&self) -> i64 {
        match self {
            Self::Completed { track_id }
            | Self::Skipped { track_id, .. }
            | Self::Failed { track_id, .. } => *track_id,
        }
    }
}

/// Entry point to the waveform pipeline.
///
/// Owns the queue and worker pool; shares the profile cache with its caller.
/// The pool starts lazily on the first accepted request and is joined on
/// [`WaveformService::shutdown`] or drop.
pub struct WaveformService {
    settings: PipelineSettings,
    cache: Arc<WaveformCache>,
    events: Sender<AnalysisEvent>,
    queue: Arc<RequestQueue>,
    pool: WaveformWorkerPool,
}

impl WaveformService {
    pub fn new(
        settings: PipelineSettings,
        cache: Arc<WaveformCache>,
        events: Sender<AnalysisEvent>,
    ) -> Self {
        Self {
            settings,
            cache,
            events,
            queue: Arc::new(RequestQueue::new()),
            pool: WaveformWorkerPool::new(),
        }
    }

    /// Submit a track for analysis. Returns false without queuing anything
    /// when the profile is already cached, the track is already queued or
    /// in flight, or the service has been shut down. Never blocks on
    /// analysis work.
    pub fn enqueue(&mut self, request: WaveformRequest) -> bool {
        if self.pool.is_shut_down() {
            debug!(
                track_id = request.track_id,
                "Waveform request refused after shutdown"
            );
            return false;
        }
        if self.cache.contains(request.track_id) {
            debug!(track_id = request.track_id, "Waveform already cached");
            return false;
        }
        let track_id = request.track_id;
        if !self.queue.push(request) {
            debug!(track_id, "Waveform request already in flight");
            return false;
        }
        self.pool.start(
            &self.settings,
            Arc::clone(&self.queue),
            Arc::clone(&self.cache),
            self.events.clone(),
        );
        true
    }

    /// Cache lookup; never triggers analysis.
    pub fn waveform(&self, track_id: i64) -> Option<Arc<AmplitudeProfile>> {
        self.cache.get(track_id)
    }

    /// Requests accepted but not yet picked up by a worker.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Requests currently inside the decode/extract section.
    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    /// Park the workers; queued requests stay queued.
    pub fn cancel(&self) {
        self.pool.cancel();
    }

    pub fn resume(&self) {
        self.pool.resume();
    }

    /// Stop the workers and join them. Queued requests are dropped.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}

impl Drop for WaveformService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::AudioFormat;
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::time::Duration;

    fn service_with_cache(cache: Arc<WaveformCache>) -> WaveformService {
        let (tx, _rx) = mpsc::channel();
        WaveformService::new(PipelineSettings::default(), cache, tx)
    }

    fn request(track_id: i64) -> WaveformRequest {
        WaveformRequest {
            track_id,
            path: PathBuf::from(format!("/music/{track_id}.wav")),
            format: AudioFormat::Wav,
            total_duration: Duration::from_secs(180),
        }
    }

    #[test]
    fn cached_track_is_not_re_enqueued() {
        let cache = Arc::new(WaveformCache::new());
        cache.insert(1, AmplitudeProfile::zeroed(520));
        let mut service = service_with_cache(Arc::clone(&cache));

        assert!(!service.enqueue(request(1)));
        assert_eq!(service.queue_len(), 0);
    }

    #[test]
    fn waveform_is_a_pure_cache_read() {
        let cache = Arc::new(WaveformCache::new());
        cache.insert(2, AmplitudeProfile::zeroed(4));
        let service = service_with_cache(Arc::clone(&cache));

        assert_eq!(service.waveform(2).unwrap().width(), 4);
        assert!(service.waveform(3).is_none());
        assert_eq!(service.queue_len(), 0);
    }

    #[test]
    fn event_track_id_accessor_covers_all_variants() {
        let events = [
            AnalysisEvent::Completed { track_id: 1 },
            AnalysisEvent::Skipped {
                track_id: 2,
                reason: String::new(),
            },
            AnalysisEvent::Failed {
                track_id: 3,
                error: String::new(),
            },
        ];
        let ids: Vec<i64> = events.iter().map(AnalysisEvent::track_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
