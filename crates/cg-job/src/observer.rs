//! Per-job callbacks for the calling layer.

use crate::output::OutputResource;

type ProgressFn = Box<dyn Fn(u8) + Send + Sync>;
type DoneFn = Box<dyn Fn(Result<&OutputResource, &cg_core::Error>) + Send + Sync>;

/// Callbacks a caller attaches to a single job.
///
/// `on_progress` receives each new percentage (0--100) while the engine
/// runs; `on_done` fires exactly once per `run_job` call with its outcome,
/// including calls rejected before the job starts.
pub struct JobObserver {
    progress: ProgressFn,
    done: DoneFn,
}

impl JobObserver {
    /// An observer that discards everything.
    pub fn noop() -> Self {
        Self {
            progress: Box::new(|_| {}),
            done: Box::new(|_| {}),
        }
    }

    /// Builder: set the progress callback.
    pub fn on_progress(mut self, callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.progress = Box::new(callback);
        self
    }

    /// Builder: set the completion callback.
    pub fn on_done(
        mut self,
        callback: impl Fn(Result<&OutputResource, &cg_core::Error>) + Send + Sync + 'static,
    ) -> Self {
        self.done = Box::new(callback);
        self
    }

    pub(crate) fn progress(&self, percent: u8) {
        (self.progress)(percent);
    }

    pub(crate) fn done(&self, outcome: Result<&OutputResource, &cg_core::Error>) {
        (self.done)(outcome);
    }
}

impl Default for JobObserver {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for JobObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobObserver").finish_non_exhaustive()
    }
}
