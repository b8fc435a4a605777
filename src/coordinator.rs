//! The coordinator: owns the registry, the roster, the queue and the worker.
//!
//! [`Coordinator`] is the owning value; dropping it shuts everything down.
//! [`Handle`] is a cheap reference that bodies and queued actions capture.
//!
//! ```no_run
//! use baton::{Coordinator, ResumeEvent};
//!
//! let order = Coordinator::new()?;
//! order.declare("child", |parent| {
//!     parent.wakeup();
//!     Ok(())
//! });
//! order.pass_to("child", ResumeEvent::Exit)?;
//! order.join_all()?;
//! # Ok::<(), baton::Error>(())
//! ```

use core::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::config::BatonConfig;
use crate::error::{Error, Result};
use crate::handoff::TerminateMethod;
use crate::queue::{Step, TaskQueue};
use crate::registry::{Name, Registry};
use crate::roster::Roster;
use crate::unit::{self, Unit};
use crate::worker;

pub(crate) struct Inner {
    pub(crate) config: BatonConfig,
    pub(crate) registry: Registry,
    pub(crate) roster: Roster,
    pub(crate) queue: Arc<TaskQueue>,
    pub(crate) worker: Unit,
}

/// Clonable reference to a coordinator.
#[derive(Clone)]
pub struct Handle {
    pub(crate) inner: Arc<Inner>,
}

/// A deterministic-ordering harness.
///
/// Dereferences to [`Handle`]. Dropping it runs
/// [`apocalypse`](Handle::apocalypse) with the configured default method.
pub struct Coordinator {
    handle: Handle,
}

impl Coordinator {
    /// Creates a coordinator with the default configuration and starts its
    /// worker.
    pub fn new() -> Result<Self> {
        Self::with_config(BatonConfig::default())
    }

    /// Creates a coordinator with `config` and starts its worker.
    pub fn with_config(config: BatonConfig) -> Result<Self> {
        let queue = Arc::new(TaskQueue::new());
        let worker = worker::start(Arc::clone(&queue), &config)?;
        tracing::debug!(worker = %worker.id(), thread = %config.worker_thread_name, "coordinator started");
        Ok(Self {
            handle: Handle {
                inner: Arc::new(Inner {
                    config,
                    registry: Registry::default(),
                    roster: Roster::default(),
                    queue,
                    worker,
                }),
            },
        })
    }

    /// Returns a clonable handle to this coordinator.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }
}

impl Deref for Coordinator {
    type Target = Handle;

    fn deref(&self) -> &Handle {
        &self.handle
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.handle.apocalypse_with_default();
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Coordinator").field(&self.handle).finish()
    }
}

impl Handle {
    /// Declares `body` under `name`, replacing any earlier declaration.
    ///
    /// The body runs on a fresh unit each time the name is passed to, and
    /// receives the unit that passed to it.
    pub fn declare<F>(&self, name: impl Into<Name>, body: F)
    where
        F: Fn(Unit) -> Result<()> + Send + Sync + 'static,
    {
        self.inner.registry.declare(name.into(), Arc::new(body));
    }

    /// Returns the name of the calling unit.
    ///
    /// Units spawned by [`pass_to`](Self::pass_to) report their declared name
    /// and the worker reports [`WORKER_NAME`](crate::WORKER_NAME). Any other
    /// thread has no name, including threads started from inside a body.
    #[must_use]
    pub fn current(&self) -> Option<Name> {
        unit::current_name()
    }

    /// Appends `action` to the queue.
    ///
    /// Returns false, and drops the action, once the coordinator is shut down.
    pub fn enqueue<F>(&self, action: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.queue.push(Box::new(move || {
            action();
            Step::Continue
        }))
    }

    /// Waits for every unit spawned so far, including units spawned while
    /// waiting.
    ///
    /// Returns the first failure in spawn order. An error raised into the
    /// calling unit while it waits is returned at once.
    pub fn join_all(&self) -> Result<()> {
        self.ensure_off_worker("join_all")?;
        let me = unit::current();
        let mut joined = 0;
        let mut first_failure = None;
        loop {
            let batch = self.inner.roster.since(joined);
            if batch.is_empty() {
                break;
            }
            joined += batch.len();
            for unit in batch.into_iter().filter(|unit| *unit != me) {
                unit.await_termination()?;
                if let Some(err) = unit.failure() {
                    first_failure.get_or_insert(err);
                }
            }
        }
        tracing::debug!(units = joined, failed = first_failure.is_some(), "joined all units");
        first_failure.map_or(Ok(()), Err)
    }

    /// Shuts the coordinator down.
    ///
    /// A final action applies `method` to every spawned unit, then drops
    /// every pending action, every unit and every declaration, and stops the
    /// worker. Blocks until the worker has stopped, unless called from a
    /// queued action. Calling it again does nothing.
    ///
    /// With [`TerminateMethod::Join`] a unit that waits on the queue never
    /// ends, so shutdown does not end either.
    pub fn apocalypse(&self, method: TerminateMethod) {
        let inner = Arc::clone(&self.inner);
        let accepted = self.inner.queue.push(Box::new(move || {
            let units = inner.roster.take();
            for unit in &units {
                match method {
                    TerminateMethod::Kill => unit.kill(),
                    TerminateMethod::Join => unit.wait_terminated(),
                }
            }
            let dropped = inner.queue.close();
            let declarations = inner.registry.len();
            inner.registry.clear();
            tracing::info!(method = ?method, units = units.len(), dropped, declarations, "apocalypse");
            Step::Shutdown
        }));
        if !accepted {
            tracing::trace!("apocalypse after shutdown");
        }
        if !self.inner.worker.is_current() {
            self.inner.worker.wait_terminated();
        }
    }

    /// Runs [`apocalypse`](Self::apocalypse) with the configured default
    /// method.
    pub fn apocalypse_with_default(&self) {
        self.apocalypse(self.inner.config.default_terminate);
    }

    /// Returns true once the queue stopped accepting actions.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        !self.inner.queue.is_open()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BatonConfig {
        &self.inner.config
    }

    /// Returns the worker unit.
    #[must_use]
    pub fn worker(&self) -> &Unit {
        &self.inner.worker
    }

    /// Fails if the calling unit is the worker, which cannot suspend.
    pub(crate) fn ensure_off_worker(&self, op: &str) -> Result<()> {
        if self.inner.worker.is_current() {
            return Err(Error::would_deadlock(format!(
                "{op} cannot be called from a queued action"
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("worker", &self.inner.worker)
            .field("registry", &self.inner.registry)
            .field("units", &self.inner.roster.len())
            .field("pending", &self.inner.queue.len())
            .finish()
    }
}
