//! The handoff protocol: spawn a named unit and suspend the caller until a
//! chosen lifecycle event of that unit.
//!
//! # Protocol
//!
//! 1. The caller fetches the body declared under the name and pushes a spawn
//!    action onto the queue, then parks.
//! 2. On the worker, the spawn action starts the unit and adds it to the roster.
//! 3. The new unit publishes itself to the caller, waits until the caller is
//!    suspended, arms a [`watcher`] and runs the body.
//! 4. The watcher polls the unit from the queue until the requested event is
//!    seen (the caller is woken), the event became impossible or the body
//!    failed (an error is raised in the caller).
//!
//! Every handoff has exactly one resolution: one wake or one error.

mod options;
mod wait;
pub mod watcher;

pub use options::{OptionError, PassOptions, ResumeEvent, TerminateMethod};

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::coordinator::Handle;
use crate::error::Result;
use crate::queue::Step;
use crate::registry::{Body, Name};
use crate::unit::{self, Status, Unit, Wait};
use watcher::{Watch, WatchState};

const PENDING: u8 = 0;
const RESOLVED: u8 = 1;
const FAILED: u8 = 2;
const ABANDONED: u8 = 3;

/// How a wait on behalf of a parked unit ended.
///
/// Only one of resolve, fail and abandon takes effect.
#[derive(Debug, Default)]
pub(crate) struct Resolution(AtomicU8);

impl Resolution {
    fn settle(&self, to: u8) -> bool {
        self.0
            .compare_exchange(PENDING, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// The waiter may proceed. Call before waking it.
    pub(crate) fn resolve(&self) -> bool {
        self.settle(RESOLVED)
    }

    /// The waiter will be failed. Call before raising into it.
    pub(crate) fn fail(&self) -> bool {
        self.settle(FAILED)
    }

    /// The waiter stopped waiting on its own.
    pub(crate) fn abandon(&self) -> bool {
        self.settle(ABANDONED)
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst) == PENDING
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.0.load(Ordering::SeqCst) == RESOLVED
    }
}

/// Parks `unit` until `resolution` is resolved, abandoning it on error.
pub(crate) fn park_for(unit: &Unit, resolution: &Resolution) -> Result<()> {
    let parked = unit.park(Wait::Until(&|| resolution.is_resolved()));
    if parked.is_err() {
        resolution.abandon();
    }
    parked
}

impl Handle {
    /// Spawns the unit declared under `name` and suspends the caller until
    /// the unit reaches the event in `options`.
    ///
    /// The body receives the caller's unit. Returns the spawned unit.
    ///
    /// Without a resume event the caller sleeps until something wakes it,
    /// usually the body itself through [`Unit::wakeup`].
    ///
    /// # Errors
    ///
    /// - [`UnknownName`](crate::ErrorKind::UnknownName) if nothing is declared
    ///   under `name`; nothing is spawned.
    /// - [`WouldDeadlock`](crate::ErrorKind::WouldDeadlock) when called from a
    ///   queued action.
    /// - [`Shutdown`](crate::ErrorKind::Shutdown) after shutdown.
    /// - [`CannotResume`](crate::ErrorKind::CannotResume) if the unit was
    ///   expected to sleep but terminated instead.
    /// - The body's own failure, if it fails before the caller is resumed.
    /// - Any error raised into the caller while it is suspended.
    pub fn pass_to(&self, name: impl Into<Name>, options: impl Into<PassOptions>) -> Result<Unit> {
        let name = name.into();
        let options = options.into();
        self.ensure_off_worker("pass_to")?;
        let body = self.inner.registry.fetch(&name)?;
        let caller = unit::current();
        let slot: Arc<Mutex<Option<Unit>>> = Arc::default();
        let resolution = Arc::new(Resolution::default());

        let handle = self.clone();
        let spawn_name = name.clone();
        let spawn_caller = caller.clone();
        let spawn_slot = Arc::clone(&slot);
        let spawn_resolution = Arc::clone(&resolution);
        let accepted = self.inner.queue.push(Box::new(move || {
            let spawned = handle.spawn_unit(
                &spawn_name,
                body,
                spawn_caller.clone(),
                options.resume_on,
                spawn_slot,
                spawn_resolution,
            );
            match spawned {
                Ok(unit) => handle.inner.roster.push(unit),
                Err(err) => {
                    tracing::error!(name = %spawn_name, error = %err, "failed to spawn unit");
                    spawn_caller.raise(err);
                }
            }
            Step::Continue
        }));
        if !accepted {
            return Err(crate::error::Error::shutdown());
        }
        tracing::debug!(name = %name, caller = %caller, resume_on = ?options.resume_on, "handing off");

        loop {
            match options.resume_on {
                Some(_) => park_for(&caller, &resolution)?,
                None => caller.park(Wait::Wake)?,
            }
            if let Some(unit) = slot.lock().clone() {
                return Ok(unit);
            }
        }
    }

    fn spawn_unit(
        &self,
        name: &Name,
        body: Body,
        caller: Unit,
        resume_on: Option<ResumeEvent>,
        slot: Arc<Mutex<Option<Unit>>>,
        resolution: Arc<Resolution>,
    ) -> Result<Unit> {
        let handle = self.clone();
        let thread = self.inner.config.unit_thread(name.as_str());
        Unit::spawn(name.clone(), thread, move || {
            let me = unit::current();
            *slot.lock() = Some(me.clone());

            let parked_caller = caller.clone();
            handle.wait_until(move || {
                parked_caller.status() == Status::Suspended || !parked_caller.is_alive()
            })?;

            watcher::schedule(
                &handle.inner.queue,
                Watch {
                    caller: caller.clone(),
                    target: me,
                    resume_on,
                    resolution,
                    state: WatchState::Initial,
                },
            );
            drop(handle);
            body(caller)
        })
    }
}
