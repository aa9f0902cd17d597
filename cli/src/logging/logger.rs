//! Structured console logger with a live progress line.
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use super::types::{Level, Log};
use super::utils::{log_file_path, terminal_columns, truncate_to};

/// Tracing target for stage headers.
pub(super) const STAGE_TARGET: &str = "dotfile::stage";

/// Tracing target for dry-run plan lines.
pub(super) const DRY_RUN_TARGET: &str = "dotfile::dry_run";

/// Width of the `  ▹ ` prefix in front of the progress line.
const PROGRESS_PREFIX_WIDTH: usize = 4;

/// Emit `msg` at `level` through tracing.
pub(super) fn emit(level: Level, msg: &str) {
    match level {
        Level::Stage => tracing::info!(target: STAGE_TARGET, "{msg}"),
        Level::Info => tracing::info!("{msg}"),
        Level::Debug => tracing::debug!("{msg}"),
        Level::Warn => tracing::warn!("{msg}"),
        Level::Error => tracing::error!("{msg}"),
        Level::DryRun => tracing::info!(target: DRY_RUN_TARGET, "{msg}"),
    }
}

/// Implement [`Log`] by delegating to [`emit`] with the matching level.
macro_rules! forward_log_methods {
    ($($method:ident => $level:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                emit(Level::$level, msg);
            }
        )+
    };
}

/// Console logger.
///
/// All messages are also written to a persistent log file at
/// `$XDG_CACHE_HOME/dotfile/<command>.log` (default
/// `~/.cache/dotfile/<command>.log`) by the file layer installed in
/// [`init_subscriber`](super::subscriber::init_subscriber).
#[derive(Debug)]
pub struct Logger {
    log_file: Option<PathBuf>,
    /// Serializes console output from concurrent target flushes.
    pub(super) flush_lock: Mutex<()>,
    /// Targets currently running on worker threads.
    pub(super) active: Mutex<Vec<String>>,
    /// Whether a progress line is currently displayed.
    ///
    /// The line is always truncated to one terminal row, so clearing it
    /// never needs cursor-up movement.
    pub(super) progress_shown: Mutex<bool>,
}

impl Logger {
    /// Create a new logger for `command`.
    ///
    /// Only stores the log file path for display in the report; the file is
    /// created by the subscriber's file layer.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            log_file: log_file_path(command),
            flush_lock: Mutex::new(()),
            active: Mutex::new(Vec::new()),
            progress_shown: Mutex::new(false),
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Write an empty line to the console.
    pub fn blank(&self) {
        let _guard = self
            .flush_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.clear_progress();
        writeln!(std::io::stdout()).ok();
    }

    /// Erase the progress line from the console.
    ///
    /// Must be called while holding `flush_lock`.
    pub(super) fn clear_progress(&self) {
        let mut shown = self
            .progress_shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *shown {
            let mut out = std::io::stdout();
            write!(out, "\r\x1b[K").ok();
            out.flush().ok();
            *shown = false;
        }
    }

    /// Draw the progress line listing `names`.
    ///
    /// Must be called while holding `flush_lock`.
    pub(super) fn draw_progress(&self, names: &str) {
        let width = terminal_columns().saturating_sub(PROGRESS_PREFIX_WIDTH);
        let mut out = std::io::stdout();
        write!(out, "  \x1b[2m▹ {}\x1b[0m", truncate_to(names, width)).ok();
        out.flush().ok();
        *self
            .progress_shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = true;
    }

    /// Record that `target` started on a worker thread and redraw the
    /// progress line.
    pub fn notify_start(&self, target: &str) {
        let _guard = self
            .flush_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.clear_progress();
        let names = {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active.push(target.to_string());
            active.join(", ")
        };
        self.draw_progress(&names);
    }

    /// Remove `target` from the active set; redraw if others remain.
    ///
    /// Must be called while holding `flush_lock`.
    pub(super) fn finish(&self, target: &str) {
        let remaining = {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active.retain(|n| n != target);
            (!active.is_empty()).then(|| active.join(", "))
        };
        if let Some(names) = remaining {
            self.draw_progress(&names);
        }
    }
}

impl Log for Logger {
    forward_log_methods! {
        stage => Stage,
        info => Info,
        debug => Debug,
        warn => Warn,
        error => Error,
        dry_run => DryRun,
    }
}
