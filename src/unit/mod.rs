//! Execution units: OS threads with an observable, interruptible lifecycle.
//!
//! A [`Unit`] is a handle to one thread. The harness cannot inspect the native
//! state of a thread, so units track their own lifecycle: every suspension goes
//! through [`sleep`] (or an internal latch wait), and every other unit can read
//! the resulting [`Status`].
//!
//! # Capabilities
//!
//! - **park**: [`sleep`] suspends the calling unit until another unit calls
//!   [`Unit::wakeup`] on it.
//! - **unpark**: [`Unit::wakeup`] resumes a suspended unit. Waking a unit that
//!   is not suspended does nothing; no wake token is stored.
//! - **observe**: [`Unit::status`] reports the lifecycle status.
//! - **interrupt**: [`Unit::raise`] and [`Unit::kill`] deliver an error at the
//!   target's next suspension point or [`checkpoint`].
//!
//! Threads that were not spawned by the harness get a handle lazily, the first
//! time they call [`current`]. Such a handle has no name and is marked
//! terminated when its thread exits.

mod status;

pub use status::{Outcome, Status};

use core::fmt;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, ErrorContext, Result, ResultExt};
use crate::registry::Name;

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: RefCell<Option<CurrentGuard>> = const { RefCell::new(None) };
}

/// Process-unique identifier of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(u64);

impl UnitId {
    fn next() -> Self {
        Self(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Suspended,
    Exiting,
    Terminated,
}

#[derive(Debug)]
struct State {
    phase: Phase,
    woken: bool,
    raised: Option<Error>,
    killed: bool,
    outcome: Option<Outcome>,
    joiners: Vec<Unit>,
}

impl State {
    /// Pending interrupt, raised errors first. A kill stays pending for good.
    fn take_interrupt(&mut self) -> Option<Error> {
        self.raised
            .take()
            .or_else(|| self.killed.then(Error::killed))
    }
}

struct Shared {
    id: UnitId,
    name: Option<Name>,
    state: Mutex<State>,
    cvar: Condvar,
    terminated: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// What a parked unit waits for.
#[derive(Clone, Copy)]
pub(crate) enum Wait<'a> {
    /// Any [`Unit::wakeup`].
    Wake,
    /// The condition becoming true; wakes that find it false are ignored.
    ///
    /// Evaluated under the unit's own lock, so it must not lock anything.
    Until(&'a dyn Fn() -> bool),
}

/// Handle to an execution unit.
///
/// Cloning the handle is cheap; all clones refer to the same unit. Handles
/// compare equal when they refer to the same unit.
#[derive(Clone)]
pub struct Unit {
    shared: Arc<Shared>,
}

impl Unit {
    fn new(name: Option<Name>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: UnitId::next(),
                name,
                state: Mutex::new(State {
                    phase: Phase::Running,
                    woken: false,
                    raised: None,
                    killed: false,
                    outcome: None,
                    joiners: Vec::new(),
                }),
                cvar: Condvar::new(),
                terminated: AtomicBool::new(false),
                thread: Mutex::new(None),
            }),
        }
    }

    /// Spawns a thread running `f` as a new named unit.
    ///
    /// The body's error (or panic) becomes the unit's failure.
    pub(crate) fn spawn<F>(name: Name, builder: Builder, f: F) -> Result<Self>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let unit = Self::new(Some(name));
        let inner = unit.clone();
        let handle = builder
            .spawn(move || inner.run(f))
            .with_context(|| format!("failed to start a thread for unit {unit}"))?;
        *unit.shared.thread.lock() = Some(handle);
        tracing::debug!(unit = %unit.id(), name = %unit, "unit spawned");
        Ok(unit)
    }

    fn run<F>(self, f: F)
    where
        F: FnOnce() -> Result<()>,
    {
        CURRENT.with(|slot| {
            *slot.borrow_mut() = Some(CurrentGuard {
                unit: self.clone(),
                adopted: false,
            });
        });
        let result = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result,
            Err(payload) => Err(Error::panicked(payload.as_ref())),
        };
        let outcome = match Outcome::from_result(result) {
            Outcome::Failed(err) if err.context().unit.is_none() => {
                Outcome::Failed(err.with_context(ErrorContext {
                    unit: Some(self.id()),
                    name: self.name().cloned(),
                }))
            }
            outcome => outcome,
        };
        self.shared.state.lock().phase = Phase::Exiting;
        CURRENT.with(|slot| slot.borrow_mut().take());
        self.finish(outcome);
    }

    fn finish(&self, outcome: Outcome) {
        tracing::trace!(unit = %self.id(), name = %self, status = %outcome.status(), "unit terminated");
        self.publish(outcome);
    }

    /// Publishes the outcome and releases joiners. Never logs: it also runs
    /// from a thread-local destructor, after the subscriber's own
    /// thread-locals may be gone.
    fn publish(&self, outcome: Outcome) {
        let joiners = {
            let mut state = self.shared.state.lock();
            state.phase = Phase::Terminated;
            state.outcome = Some(outcome);
            self.shared.terminated.store(true, Ordering::SeqCst);
            std::mem::take(&mut state.joiners)
        };
        self.shared.cvar.notify_all();
        for joiner in joiners {
            joiner.nudge();
        }
    }

    /// Makes a parked unit re-check its wait condition without waking it.
    ///
    /// A unit in [`sleep`] stays asleep; only latched parks can return.
    fn nudge(&self) {
        drop(self.shared.state.lock());
        self.shared.cvar.notify_all();
    }

    /// Returns the unit's id.
    #[must_use]
    pub fn id(&self) -> UnitId {
        self.shared.id
    }

    /// Returns the name the unit was spawned under, if any.
    #[must_use]
    pub fn name(&self) -> Option<&Name> {
        self.shared.name.as_ref()
    }

    /// Returns the unit's current lifecycle status.
    #[must_use]
    pub fn status(&self) -> Status {
        let state = self.shared.state.lock();
        match state.phase {
            Phase::Running => Status::Runnable,
            Phase::Suspended => Status::Suspended,
            Phase::Exiting => Status::Indeterminate,
            Phase::Terminated => state
                .outcome
                .as_ref()
                .map_or(Status::TerminatedNormally, Outcome::status),
        }
    }

    /// Returns true until the unit has terminated.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.shared.terminated.load(Ordering::SeqCst)
    }

    /// Returns the unit's outcome once it has terminated.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.shared.state.lock().outcome.clone()
    }

    /// Returns the error the unit terminated with, if any.
    #[must_use]
    pub fn failure(&self) -> Option<Error> {
        self.shared
            .state
            .lock()
            .outcome
            .as_ref()
            .and_then(Outcome::failure)
            .cloned()
    }

    /// Resumes the unit if it is suspended.
    ///
    /// Returns true if the unit was suspended. A wake sent to a unit that is
    /// running is dropped.
    pub fn wakeup(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.phase != Phase::Suspended {
            return false;
        }
        state.woken = true;
        drop(state);
        self.shared.cvar.notify_all();
        true
    }

    /// Raises `err` in the unit.
    ///
    /// The error is returned by the unit's current or next suspension, or by
    /// its next [`checkpoint`]. Returns false if the unit's body has already
    /// returned, since nothing would ever observe the error.
    pub fn raise(&self, err: Error) -> bool {
        let mut state = self.shared.state.lock();
        if matches!(state.phase, Phase::Exiting | Phase::Terminated) {
            return false;
        }
        tracing::debug!(unit = %self.id(), name = %self, error = %err, "raising into unit");
        state.raised = Some(err);
        drop(state);
        self.shared.cvar.notify_all();
        true
    }

    /// Kills the unit.
    ///
    /// Every suspension and [`checkpoint`] of the unit fails with
    /// [`ErrorKind::Killed`](crate::ErrorKind::Killed) from now on; a body that
    /// propagates it ends normally. A body that never suspends or checks in
    /// cannot be killed.
    pub fn kill(&self) {
        let mut state = self.shared.state.lock();
        if matches!(state.phase, Phase::Exiting | Phase::Terminated) || state.killed {
            return;
        }
        tracing::debug!(unit = %self.id(), name = %self, "killing unit");
        state.killed = true;
        drop(state);
        self.shared.cvar.notify_all();
    }

    /// Blocks the calling unit until this unit has terminated.
    ///
    /// Returns the unit's failure, if it failed. The wait is a suspension
    /// point of the caller, so errors raised into the caller end it early.
    pub fn join(&self) -> Result<()> {
        self.await_termination()?;
        self.failure().map_or(Ok(()), Err)
    }

    /// Suspends the calling unit until this unit has terminated.
    ///
    /// Errors are the caller's own: a refused self-join or an interrupt
    /// delivered while waiting. The unit's failure is not reported.
    pub(crate) fn await_termination(&self) -> Result<()> {
        let me = current();
        if me == *self {
            return Err(Error::would_deadlock(format!("{self} cannot join itself")));
        }
        {
            let mut state = self.shared.state.lock();
            if state.phase != Phase::Terminated {
                state.joiners.push(me.clone());
            }
        }
        let terminated = &self.shared.terminated;
        if let Err(err) = me.park(Wait::Until(&|| terminated.load(Ordering::SeqCst))) {
            self.shared.state.lock().joiners.retain(|joiner| *joiner != me);
            return Err(err);
        }
        if let Some(handle) = self.shared.thread.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Blocks the calling thread until this unit has terminated.
    ///
    /// Unlike [`join`](Self::join) this is not a suspension point: the caller
    /// stays runnable and cannot be interrupted.
    pub(crate) fn wait_terminated(&self) {
        let mut state = self.shared.state.lock();
        while state.phase != Phase::Terminated {
            self.shared.cvar.wait(&mut state);
        }
    }

    /// Suspends the calling unit, which must be `self`.
    pub(crate) fn park(&self, wait: Wait<'_>) -> Result<()> {
        debug_assert!(self.is_current(), "a unit can only park itself");
        let mut state = self.shared.state.lock();
        state.woken = false;
        loop {
            if let Some(err) = state.take_interrupt() {
                state.phase = Phase::Running;
                return Err(err);
            }
            let ready = match wait {
                Wait::Wake => state.woken,
                Wait::Until(condition) => condition(),
            };
            if ready {
                state.phase = Phase::Running;
                return Ok(());
            }
            state.phase = Phase::Suspended;
            self.shared.cvar.wait(&mut state);
        }
    }

    /// Returns true if this is the calling thread's unit.
    #[must_use]
    pub fn is_current(&self) -> bool {
        CURRENT.with(|slot| {
            slot.borrow()
                .as_ref()
                .is_some_and(|guard| guard.unit == *self)
        })
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.shared.id == other.shared.id
    }
}

impl Eq for Unit {}

impl std::hash::Hash for Unit {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.shared.id.hash(state);
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shared.name {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{}", self.shared.id),
        }
    }
}

/// Thread-local slot owner. Adopted handles end with their thread.
struct CurrentGuard {
    unit: Unit,
    adopted: bool,
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        if self.adopted {
            self.unit.publish(Outcome::Completed);
        }
    }
}

/// Returns the calling thread's unit, adopting the thread if needed.
#[must_use]
pub fn current() -> Unit {
    CURRENT.with(|slot| {
        slot.borrow_mut()
            .get_or_insert_with(|| CurrentGuard {
                unit: Unit::new(None),
                adopted: true,
            })
            .unit
            .clone()
    })
}

/// Returns the name of the calling thread's unit without adopting the thread.
#[must_use]
pub fn current_name() -> Option<Name> {
    CURRENT.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(|guard| guard.unit.name().cloned())
    })
}

/// Suspends the calling unit until another unit wakes it.
///
/// Fails with the pending error if one was raised into the unit, or with
/// [`ErrorKind::Killed`](crate::ErrorKind::Killed) once the unit was killed.
pub fn sleep() -> Result<()> {
    current().park(Wait::Wake)
}

/// Returns the calling unit's pending interrupt, without suspending.
///
/// Bodies that spin should call this so they can be killed.
pub fn checkpoint() -> Result<()> {
    let unit = current();
    let pending = unit.shared.state.lock().take_interrupt();
    pending.map_or(Ok(()), Err)
}
