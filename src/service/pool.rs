use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{JoinHandle, sleep};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::queue::RequestQueue;
use super::AnalysisEvent;
use crate::config::PipelineSettings;
use crate::waveform::{
    AnalysisError, WaveformCache, WaveformRequest, downsample, extract_amplitudes,
    normalize_to_pcm,
};

/// Long-lived worker pool that drains the request queue and publishes
/// finished profiles into the shared cache.
pub(super) struct WaveformWorkerPool {
    cancel: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    threads: Vec<JoinHandle<()>>,
}

impl WaveformWorkerPool {
    pub(super) fn new() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            threads: Vec::new(),
        }
    }

    /// True once [`WaveformWorkerPool::shutdown`] has run; the pool never
    /// restarts after that.
    pub(super) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Spawn the worker threads. Idempotent; later calls and calls after
    /// shutdown are no-ops.
    pub(super) fn start(
        &mut self,
        settings: &PipelineSettings,
        queue: Arc<RequestQueue>,
        cache: Arc<WaveformCache>,
        events: Sender<AnalysisEvent>,
    ) {
        if !self.threads.is_empty() || self.is_shut_down() {
            return;
        }
        let worker_count = settings.worker_count.max(1);
        debug!(worker_count, "Starting waveform worker pool");
        for worker_index in 0..worker_count {
            self.threads.push(spawn_worker(
                worker_index,
                settings.clone(),
                Arc::clone(&queue),
                Arc::clone(&cache),
                events.clone(),
                Arc::clone(&self.cancel),
                Arc::clone(&self.shutdown),
                Arc::clone(&self.in_flight),
            ));
        }
    }

    /// Number of requests currently inside the decode/extract section.
    pub(super) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub(super) fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub(super) fn resume(&self) {
        self.cancel.store(false, Ordering::Relaxed);
    }

    pub(super) fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.cancel.store(true, Ordering::Relaxed);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WaveformWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_worker(
    worker_index: usize,
    settings: PipelineSettings,
    queue: Arc<RequestQueue>,
    cache: Arc<WaveformCache>,
    events: Sender<AnalysisEvent>,
    cancel: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("waveform-worker-{worker_index}"))
        .spawn(move || loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            if cancel.load(Ordering::Relaxed) {
                sleep(Duration::from_millis(50));
                continue;
            }
            let Some(request) = queue.pop(&shutdown) else {
                break;
            };
            let track_id = request.track_id;
            in_flight.fetch_add(1, Ordering::Relaxed);
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                analyze_request(&request, &settings, &cache, &cancel)
            }))
            .unwrap_or_else(|payload| Err(AnalysisError::ExtractionFailed {
                path: request.path.clone(),
                message: panic_to_string(payload),
            }));
            in_flight.fetch_sub(1, Ordering::Relaxed);
            queue.finish(track_id);

            let event = match outcome {
                Ok(()) => {
                    debug!(track_id, "Waveform analysis finished");
                    AnalysisEvent::Completed { track_id }
                }
                Err(AnalysisError::DurationExceeded { actual, limit }) => {
                    info!(track_id, ?actual, ?limit, "Waveform analysis skipped");
                    AnalysisEvent::Skipped {
                        track_id,
                        reason: AnalysisError::DurationExceeded { actual, limit }.to_string(),
                    }
                }
                Err(err @ AnalysisError::Cancelled { .. }) => {
                    info!(track_id, "Waveform analysis cancelled");
                    AnalysisEvent::Skipped {
                        track_id,
                        reason: err.to_string(),
                    }
                }
                Err(err) => {
                    warn!(track_id, "Waveform analysis failed: {err}");
                    AnalysisEvent::Failed {
                        track_id,
                        error: err.to_string(),
                    }
                }
            };
            // The receiver may be gone during teardown; nothing to report to.
            let _ = events.send(event);
        })
        .expect("spawn waveform worker")
}

/// Run one request through guard, transcode, extract, downsample, and cache
/// publish. Nothing is published unless every stage succeeds.
fn analyze_request(
    request: &WaveformRequest,
    settings: &PipelineSettings,
    cache: &WaveformCache,
    cancel: &AtomicBool,
) -> Result<(), AnalysisError> {
    let limit = Duration::from_millis(settings.max_track_duration_ms);
    if request.total_duration > limit {
        return Err(AnalysisError::DurationExceeded {
            actual: request.total_duration,
            limit,
        });
    }
    if cancel.load(Ordering::Relaxed) {
        return Err(cancelled(request));
    }
    let pcm = normalize_to_pcm(&request.path, request.format)?;
    if cancel.load(Ordering::Relaxed) {
        return Err(cancelled(request));
    }
    let amplitudes = extract_amplitudes(&pcm, settings.height_coefficient);
    let profile = downsample(&amplitudes, settings.profile_width);
    cache.insert(request.track_id, profile);
    Ok(())
}

fn cancelled(request: &WaveformRequest) -> AnalysisError {
    AnalysisError::Cancelled {
        path: request.path.clone(),
    }
}

fn panic_to_string(payload: Box<dyn std::any::Any + Send>) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown panic payload".to_string()
    };
    format!("Analysis worker panicked: {message}")
}
