//! Baton: deterministic ordering of threads for concurrency tests.
//!
//! # Overview
//!
//! A test declares named bodies on a [`Coordinator`], then hands control from
//! one unit to the next with [`pass_to`](Handle::pass_to). The caller is
//! suspended until the spawned unit reaches a chosen lifecycle event: it ran,
//! it went to sleep or it exited. Errors in a spawned unit are raised in the
//! unit that handed off to it, so a failing body fails the test.
//!
//! Ordering is driven by one worker that runs queued actions in FIFO order;
//! nothing relies on timers.
//!
//! # Module Structure
//!
//! - [`unit`]: Execution units with an observable, interruptible lifecycle
//! - [`handoff`]: The handoff protocol, its options and the resume watcher
//! - [`coordinator`]: The harness: declarations, shutdown, joins
//! - [`queue`]: The FIFO queue of deferred actions
//! - [`worker`]: The single consumer of the queue
//! - [`registry`]: Names and declared bodies
//! - [`config`]: Thread naming and worker idle policy
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use baton::{unit, Coordinator, ResumeEvent};
//!
//! let order = Coordinator::new()?;
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let log = Arc::clone(&seen);
//! order.declare("second", move |_| {
//!     log.lock().unwrap().push("second");
//!     unit::sleep()
//! });
//!
//! order.pass_to("second", ResumeEvent::Sleep)?;
//! seen.lock().unwrap().push("first");
//! assert_eq!(*seen.lock().unwrap(), ["second", "first"]);
//! # Ok::<(), baton::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod handoff;
pub mod queue;
pub mod registry;
mod roster;
pub mod unit;
pub mod worker;

#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

pub use config::{BatonConfig, ConfigError};
pub use coordinator::{Coordinator, Handle};
pub use error::{Error, ErrorCategory, ErrorContext, ErrorKind, Result, ResultExt};
pub use handoff::{OptionError, PassOptions, ResumeEvent, TerminateMethod};
pub use queue::Step;
pub use registry::{Body, Name};
pub use unit::{Outcome, Status, Unit, UnitId};
pub use worker::WORKER_NAME;
