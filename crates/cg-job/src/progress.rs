//! Progress reporting.
//!
//! The engine pushes raw completion ratios into a [`RatioSink`]; the
//! [`ProgressReporter`] maps each one through [`percent_from_ratio`] and
//! republishes it on a `watch` channel, to the active job's observer, and on
//! the event bus. Ratios that arrive while no job is active are dropped.

use std::sync::Arc;

use cg_core::events::{EventBus, EventPayload};
use cg_core::JobId;
use cg_engine::RatioSink;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::observer::JobObserver;

/// Convert an engine ratio to a whole percentage in `0..=100`.
///
/// Rounds to nearest and clamps; NaN maps to 0. No monotonicity is
/// enforced.
pub fn percent_from_ratio(ratio: f64) -> u8 {
    if ratio.is_nan() {
        return 0;
    }
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

struct ActiveJob {
    job_id: JobId,
    observer: Arc<JobObserver>,
}

/// Republishes engine ratios as the current progress percentage.
pub struct ProgressReporter {
    tx: watch::Sender<u8>,
    active: Mutex<Option<ActiveJob>>,
    events: Option<Arc<EventBus>>,
}

impl ProgressReporter {
    /// Create a reporter, optionally mirroring updates onto an event bus.
    pub fn new(events: Option<Arc<EventBus>>) -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            tx,
            active: Mutex::new(None),
            events,
        }
    }

    /// Subscribe to percentage updates.
    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.tx.subscribe()
    }

    /// The current percentage.
    pub fn current(&self) -> u8 {
        *self.tx.borrow()
    }

    /// A sink to register with the engine. It stays valid across jobs.
    pub fn sink(self: &Arc<Self>) -> RatioSink {
        let reporter = Arc::clone(self);
        Arc::new(move |ratio: f64| reporter.on_ratio(ratio))
    }

    /// Reset to 0 and start accepting ratios for `job_id`.
    pub fn begin(&self, job_id: JobId, observer: Arc<JobObserver>) {
        *self.active.lock() = Some(ActiveJob { job_id, observer });
        self.tx.send_replace(0);
    }

    /// Stop accepting ratios and reset to 0.
    pub fn finish(&self) {
        self.active.lock().take();
        self.tx.send_replace(0);
    }

    /// Handle one raw ratio from the engine.
    pub fn on_ratio(&self, ratio: f64) {
        let (job_id, observer) = match self.active.lock().as_ref() {
            Some(active) => (active.job_id, Arc::clone(&active.observer)),
            None => {
                tracing::trace!("Dropping progress ratio {ratio} with no active job");
                return;
            }
        };

        let percent = percent_from_ratio(ratio);
        let changed = self.tx.send_if_modified(|current| {
            if *current == percent {
                false
            } else {
                *current = percent;
                true
            }
        });

        if changed {
            observer.progress(percent);
            if let Some(ref events) = self.events {
                events.broadcast(EventPayload::JobProgress { job_id, percent });
            }
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("current", &self.current())
            .field("active", &self.active.lock().as_ref().map(|a| a.job_id))
            .finish()
    }
}
