//! Logging infrastructure for structured console and file output.

mod buffered;
mod logger;
mod subscriber;
mod types;
mod utils;

pub use buffered::BufferedLog;
pub use logger::Logger;
pub use subscriber::init_subscriber;
pub use types::{Level, Log};
#[cfg(test)]
pub(crate) use utils::strip_ansi;

/// Serializes `XDG_CACHE_HOME` manipulation across parallel test threads.
#[cfg(test)]
pub(crate) static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Create a Logger backed by an isolated per-thread tracing subscriber
/// with a [`FileLayer`](subscriber::FileLayer), so that tracing events
/// emitted by logger methods actually reach the log file during tests.
///
/// The returned guard must be kept alive for the duration of the test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let env_lock = TEST_ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    // SAFETY: Protected by TEST_ENV_MUTEX; restored before lock is released.
    #[allow(unsafe_code)]
    unsafe {
        std::env::set_var("XDG_CACHE_HOME", tmp.path());
    }
    let file_layer = subscriber::FileLayer::new("test").expect("failed to create file layer");
    let log = Logger::new("test");
    // SAFETY: Protected by TEST_ENV_MUTEX.
    #[allow(unsafe_code)]
    unsafe {
        std::env::remove_var("XDG_CACHE_HOME");
    }
    drop(env_lock);
    let subscriber =
        tracing_subscriber::registry().with(file_layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (log, tmp, guard)
}

/// In-memory [`Log`] used by unit tests to assert on emitted messages.
#[cfg(test)]
pub(crate) mod test_helpers {
    use super::{Level, Log};
    use std::sync::{Mutex, PoisonError};

    /// Captures every message with its level.
    #[derive(Debug, Default)]
    pub struct CaptureLog {
        entries: Mutex<Vec<(Level, String)>>,
    }

    impl CaptureLog {
        /// Messages logged at `level`, in order.
        pub fn at(&self, level: Level) -> Vec<String> {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }

        /// Whether any message at any level contains `needle`.
        pub fn contains(&self, needle: &str) -> bool {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .any(|(_, m)| m.contains(needle))
        }

        fn push(&self, level: Level, msg: &str) {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((level, msg.to_string()));
        }
    }

    impl Log for CaptureLog {
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
}
