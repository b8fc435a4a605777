//! Test utilities for Baton.
//!
//! This module provides shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - A phase macro for readable test output
//! - Coordinator constructors with a fast-polling worker
//! - Deadline guards for tests that could hang
//! - A lock for tests that mutate `BATON_*` variables
//!
//! # Example
//! ```ignore
//! use baton::test_utils::{init_test_logging, test_coordinator};
//!
//! init_test_logging();
//! let order = test_coordinator();
//! order.declare("noop", |_| Ok(()));
//! ```

use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard, Once};
use std::thread;
use std::time::Duration;

use tracing_subscriber::fmt::format::FmtSpan;

use crate::config::BatonConfig;
use crate::coordinator::Coordinator;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Default deadline of [`assert_completes_within`] callers in this crate.
pub const DEFAULT_TEST_DEADLINE: Duration = Duration::from_secs(10);

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Configuration with a worker that never sleeps longer than 10µs.
#[must_use]
pub fn test_config() -> BatonConfig {
    BatonConfig::new()
        .idle_spins(16)
        .idle_backoff(Duration::from_micros(10))
        .unit_thread_prefix("baton-test")
}

/// Create a coordinator for tests, with logging initialized.
#[must_use]
pub fn test_coordinator() -> Coordinator {
    init_test_logging();
    Coordinator::with_config(test_config()).expect("failed to start test coordinator")
}

/// Runs `f` on a helper thread and fails the test if it does not finish
/// within `deadline`.
///
/// A panic inside `f` is re-raised on the calling thread.
pub fn assert_completes_within<F, T>(deadline: Duration, description: &str, f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let runner = thread::Builder::new()
        .name(format!("deadline:{description}"))
        .spawn(move || {
            let _ = tx.send(f());
        })
        .expect("failed to spawn deadline thread");
    match rx.recv_timeout(deadline) {
        Ok(value) => {
            tracing::debug!(
                description = %description,
                deadline_ms = deadline.as_millis(),
                "operation completed within deadline"
            );
            let _ = runner.join();
            value
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match runner.join() {
            Err(payload) => std::panic::resume_unwind(payload),
            Ok(()) => panic!("operation '{description}' ended without a result"),
        },
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("operation '{description}' did not complete within {deadline:?}");
        }
    }
}

/// Log the step a multi-thread test has reached.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, unit = ?$crate::unit::current_name(), "test phase: {}", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Assert that a result failed with a specific error kind.
#[macro_export]
macro_rules! assert_error_kind {
    ($result:expr, $kind:expr) => {
        match $result {
            Err(err) => assert_eq!(err.kind(), $kind, "unexpected error: {err}"),
            Ok(value) => unreachable!("expected {:?}, got Ok({:?})", $kind, value),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};

    #[test]
    fn completes_within_returns_the_value() {
        let value = assert_completes_within(DEFAULT_TEST_DEADLINE, "answer", || 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_coordinator_uses_the_test_prefix() {
        let order = test_coordinator();
        assert_eq!(order.config().unit_thread_prefix, "baton-test");
        crate::test_complete!("test_coordinator_uses_the_test_prefix");
    }

    #[test]
    fn error_kind_macro_matches() {
        let result: crate::Result<()> = Err(Error::shutdown());
        crate::assert_error_kind!(result, ErrorKind::Shutdown);
    }
}
