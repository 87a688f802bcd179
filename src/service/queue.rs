use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::waveform::WaveformRequest;

/// Bounded wakeup interval so blocked workers re-check the shutdown flag.
const POP_WAIT: Duration = Duration::from_millis(50);

/// FIFO handoff between enqueuers and pool workers.
///
/// A track id stays in the in-flight set from the moment its request is
/// accepted until the worker that consumed it calls [`RequestQueue::finish`],
/// so a track can never be queued or analyzed twice concurrently. Re-pushes
/// of an in-flight track are rejected, not queued behind it.
pub(super) struct RequestQueue {
    queue: Mutex<VecDeque<WaveformRequest>>,
    ready: Condvar,
    len: AtomicUsize,
    in_flight: Mutex<HashSet<i64>>,
}

impl RequestQueue {
    pub(super) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            len: AtomicUsize::new(0),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Queue a request, returning false if the track is already in flight.
    pub(super) fn push(&self, request: WaveformRequest) -> bool {
        let mut guard = self.queue.lock().expect("request queue lock");
        {
            let mut in_flight = self.in_flight.lock().expect("request queue in-flight lock");
            if !in_flight.insert(request.track_id) {
                return false;
            }
        }
        guard.push_back(request);
        self.len.fetch_add(1, Ordering::Relaxed);
        self.ready.notify_one();
        true
    }

    /// Block until a request is available or `shutdown` is set.
    ///
    /// The popped track stays marked in flight; the worker must call
    /// [`RequestQueue::finish`] once the outcome is decided.
    pub(super) fn pop(&self, shutdown: &AtomicBool) -> Option<WaveformRequest> {
        let mut guard = self.queue.lock().expect("request queue lock");
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return None;
            }
            if let Some(request) = guard.pop_front() {
                self.len.fetch_sub(1, Ordering::Relaxed);
                return Some(request);
            }
            let (next_guard, _) = self
                .ready
                .wait_timeout(guard, POP_WAIT)
                .expect("request queue wait");
            guard = next_guard;
        }
    }

    /// Release the in-flight mark for a track whose analysis has concluded.
    pub(super) fn finish(&self, track_id: i64) {
        self.in_flight
            .lock()
            .expect("request queue in-flight lock")
            .remove(&track_id);
    }

    pub(super) fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(super) fn is_in_flight(&self, track_id: i64) -> bool {
        self.in_flight
            .lock()
            .expect("request queue in-flight lock")
            .contains(&track_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::AudioFormat;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    fn request(track_id: i64) -> WaveformRequest {
        WaveformRequest {
            track_id,
            path: PathBuf::from(format!("/music/{track_id}.wav")),
            format: AudioFormat::Wav,
            total_duration: Duration::from_secs(180),
        }
    }

    #[test]
    fn requests_come_out_in_push_order() {
        let queue = RequestQueue::new();
        let shutdown = AtomicBool::new(false);
        assert!(queue.push(request(1)));
        assert!(queue.push(request(2)));
        assert_eq!(queue.pop(&shutdown).unwrap().track_id, 1);
        assert_eq!(queue.pop(&shutdown).unwrap().track_id, 2);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn duplicate_push_is_rejected_while_in_flight() {
        let queue = RequestQueue::new();
        let shutdown = AtomicBool::new(false);
        assert!(queue.push(request(5)));
        assert!(!queue.push(request(5)));

        // Popping hands the request to a worker but keeps the mark.
        let popped = queue.pop(&shutdown).unwrap();
        assert_eq!(popped.track_id, 5);
        assert!(queue.is_in_flight(5));
        assert!(!queue.push(request(5)));

        queue.finish(5);
        assert!(queue.push(request(5)));
    }

    #[test]
    fn pop_returns_none_on_shutdown() {
        let queue = RequestQueue::new();
        let shutdown = AtomicBool::new(true);
        assert!(queue.pop(&shutdown).is_none());
    }

    #[test]
    fn blocked_pop_observes_late_shutdown() {
        let queue = Arc::new(RequestQueue::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let queue = Arc::clone(&queue);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || queue.pop(&shutdown))
        };
        std::thread::sleep(Duration::from_millis(20));
        shutdown.store(true, Ordering::Relaxed);
        assert!(handle.join().unwrap().is_none());
    }

    #[test]
    fn blocked_pop_wakes_on_push() {
        let queue = Arc::new(RequestQueue::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let queue = Arc::clone(&queue);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || queue.pop(&shutdown))
        };
        std::thread::sleep(Duration::from_millis(20));
        assert!(queue.push(request(11)));
        assert_eq!(handle.join().unwrap().unwrap().track_id, 11);
    }
}
