//! Configuration for a coordinator.
//!
//! The configuration controls the threads the harness creates and how the
//! worker idles:
//! - Thread names for the worker and for spawned units
//! - Stack size of spawned units
//! - Idle policy of the worker when the queue is empty
//! - Default terminate method used by shutdown and drop
//!
//! # Configuration Precedence
//!
//! 1. **Programmatic**: builder methods on [`BatonConfig`]
//! 2. **Environment variables**: `BATON_*`, see [`env`]
//! 3. **Config file**: TOML, with the `config-file` feature
//! 4. **Defaults**: [`BatonConfig::default()`]

pub mod env;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::handoff::TerminateMethod;

pub use env::ConfigError;

/// Default name of the worker thread.
pub const DEFAULT_WORKER_THREAD_NAME: &str = "baton-worker";
/// Default prefix of unit thread names.
pub const DEFAULT_UNIT_THREAD_PREFIX: &str = "baton";
/// Default number of yields before the idle worker starts sleeping.
pub const DEFAULT_IDLE_SPINS: u32 = 64;
/// Default bounded sleep of the idle worker.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_micros(50);

/// Configuration for a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatonConfig {
    /// OS thread name of the worker.
    pub worker_thread_name: String,
    /// Unit threads are named `<prefix>:<unit name>`.
    pub unit_thread_prefix: String,
    /// Stack size of unit threads in bytes; `None` uses the platform default.
    pub stack_size: Option<usize>,
    /// Yields the idle worker performs before it starts sleeping.
    pub idle_spins: u32,
    /// Sleep between polls of an idle worker, once spinning is exhausted.
    ///
    /// Zero keeps the worker yielding.
    pub idle_backoff: Duration,
    /// Terminate method used when the coordinator is dropped.
    pub default_terminate: TerminateMethod,
}

impl BatonConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            worker_thread_name: DEFAULT_WORKER_THREAD_NAME.to_string(),
            unit_thread_prefix: DEFAULT_UNIT_THREAD_PREFIX.to_string(),
            stack_size: None,
            idle_spins: DEFAULT_IDLE_SPINS,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            default_terminate: TerminateMethod::Kill,
        }
    }

    /// Creates the default configuration with `BATON_*` overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();
        env::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Sets the worker thread name.
    #[must_use]
    pub fn worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    /// Sets the unit thread name prefix.
    #[must_use]
    pub fn unit_thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.unit_thread_prefix = prefix.into();
        self
    }

    /// Sets the stack size of unit threads.
    #[must_use]
    pub const fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Sets how many times the idle worker yields before sleeping.
    #[must_use]
    pub const fn idle_spins(mut self, spins: u32) -> Self {
        self.idle_spins = spins;
        self
    }

    /// Sets the bounded sleep of an idle worker.
    #[must_use]
    pub const fn idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    /// Sets the terminate method used on drop.
    #[must_use]
    pub const fn default_terminate(mut self, method: TerminateMethod) -> Self {
        self.default_terminate = method;
        self
    }

    /// Returns a thread builder for the unit called `name`.
    pub(crate) fn unit_thread(&self, name: &str) -> std::thread::Builder {
        let builder =
            std::thread::Builder::new().name(format!("{}:{name}", self.unit_thread_prefix));
        match self.stack_size {
            Some(bytes) => builder.stack_size(bytes),
            None => builder,
        }
    }

    /// Returns a thread builder for the worker.
    pub(crate) fn worker_thread(&self) -> std::thread::Builder {
        std::thread::Builder::new().name(self.worker_thread_name.clone())
    }
}

impl Default for BatonConfig {
    fn default() -> Self {
        Self::new()
    }
}
