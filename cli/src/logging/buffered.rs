//! Buffered logger for targets running on worker threads.
use std::sync::{Arc, Mutex, PoisonError};

use super::logger::{Logger, emit};
use super::types::{Level, Log};

/// Buffered logger for one target.
///
/// Captures output in memory so that concurrently running targets do not
/// interleave their console output.  The captured entries are replayed in
/// order when [`flush_and_complete`](Self::flush_and_complete) is called.
#[derive(Debug)]
pub struct BufferedLog {
    inner: Arc<Logger>,
    entries: Mutex<Vec<(Level, String)>>,
}

impl BufferedLog {
    /// Create a new buffered logger backed by the given [`Logger`].
    #[must_use]
    pub const fn new(inner: Arc<Logger>) -> Self {
        Self {
            inner,
            entries: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, level: Level, msg: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, msg.to_string()));
    }

    /// Replay all buffered entries and remove `target` from the progress
    /// line.
    ///
    /// Holds the backing logger's flush lock so entries from two targets
    /// finishing at once are never interleaved.
    pub fn flush_and_complete(&self, target: &str) {
        let _guard = self
            .inner
            .flush_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.inner.clear_progress();
        let entries = std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner));
        for (level, msg) in &entries {
            emit(*level, msg);
        }
        self.inner.finish(target);
    }
}

impl Log for BufferedLog {
    fn stage(&self, msg: &str) {
        self.push(Level::Stage, msg);
    }

    fn info(&self, msg: &str) {
        self.push(Level::Info, msg);
    }

    fn debug(&self, msg: &str) {
        self.push(Level::Debug, msg);
    }

    fn warn(&self, msg: &str) {
        self.push(Level::Warn, msg);
    }

    fn error(&self, msg: &str) {
        self.push(Level::Error, msg);
    }

    fn dry_run(&self, msg: &str) {
        self.push(Level::DryRun, msg);
    }
}
