#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use std::sync::mpsc;
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use baton::{BatonConfig, Coordinator, Status, Unit};
use parking_lot::Mutex;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Deadline for a whole scenario; a handoff bug shows up as a hang.
pub const SCENARIO_DEADLINE: Duration = Duration::from_secs(20);

/// Initialize test logging, honoring `RUST_LOG` and defaulting to `debug`.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// A coordinator with a fast-polling worker.
pub fn coordinator() -> Coordinator {
    init_test_logging();
    Coordinator::with_config(
        BatonConfig::new()
            .idle_spins(16)
            .idle_backoff(Duration::from_micros(10)),
    )
    .expect("failed to start coordinator")
}

/// Runs `scenario` on its own thread and fails if it does not end in time.
pub fn within_deadline<F>(description: &str, scenario: F)
where
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let runner = thread::Builder::new()
        .name(format!("scenario:{description}"))
        .spawn(move || {
            scenario();
            let _ = tx.send(());
        })
        .expect("failed to spawn scenario thread");
    match rx.recv_timeout(SCENARIO_DEADLINE) {
        Ok(()) => {
            let _ = runner.join();
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            if let Err(payload) = runner.join() {
                std::panic::resume_unwind(payload);
            }
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("scenario '{description}' did not complete within {SCENARIO_DEADLINE:?}");
        }
    }
}

/// Spins until `unit` reports `status`.
pub fn wait_for_status(unit: &Unit, status: Status) {
    while unit.status() != status {
        thread::yield_now();
    }
}

/// Thread-safe log of observations, in the order they were made.
#[derive(Debug)]
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            seen: Arc::clone(&self.seen),
        }
    }
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, value: T) {
        self.seen.lock().push(value);
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.seen.lock().clone()
    }
}
