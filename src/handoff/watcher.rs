//! The resume watcher: decides when the caller of a handoff is resumed.
//!
//! A watcher observes one spawned unit (the target) on behalf of one caller.
//! Each poll is a single queue action that reads the target's status, feeds it
//! to [`transition`], applies the resulting [`Effect`] and, unless the new
//! state is terminal, pushes the next poll to the back of the queue.
//!
//! The decision itself is the pure function [`transition`], so the whole
//! protocol can be checked without threads.
//!
//! # Transition table
//!
//! First matching row wins.
//!
//! | state | resume on | observed | effect | next |
//! |---|---|---|---|---|
//! | terminal | any | any | `Stop` | unchanged |
//! | any | any | caller dead | `Stop` | `Dead` |
//! | any | any | `Indeterminate` | `Repoll` | unchanged |
//! | any | any | `TerminatedWithError` | `Raise` | `Errored` |
//! | `Initial` | run | `Runnable`, `Suspended` | `Wake` | `Ran` |
//! | `Initial` | run, exit | `TerminatedNormally` | `Wake` | `Finished` |
//! | `Initial` | sleep | `Suspended` | `Wake` | `Ran` |
//! | `Initial` | sleep | `TerminatedNormally` | `CannotResume` | `Errored` |
//! | `Initial`, `Ran` | any | `TerminatedNormally` | `Stop` | `Finished` |
//! | otherwise | | | `Repoll` | unchanged |
//!
//! A watcher is armed by the target itself once its body is about to run, so
//! for the run event a suspended or finished target has provably run.

use std::sync::Arc;

use crate::error::{Error, ErrorKind};
use crate::handoff::{Resolution, ResumeEvent};
use crate::queue::{Step, TaskQueue};
use crate::unit::{Status, Unit};

/// Progress of a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchState {
    /// Nothing delivered to the caller yet.
    Initial,
    /// The caller was woken; watching continues for a late failure.
    Ran,
    /// An error was delivered to the caller.
    Errored,
    /// The caller ended before resolution.
    Dead,
    /// The target ended normally and nothing is left to deliver.
    Finished,
}

impl WatchState {
    /// Returns true if the watcher performs no further action.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Errored | Self::Dead | Self::Finished)
    }
}

/// What a poll saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Status of the target.
    pub target: Status,
    /// Whether the caller is still alive.
    pub caller_alive: bool,
}

/// What a poll does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Nothing yet; poll again.
    Repoll,
    /// Resume the caller.
    Wake,
    /// Re-raise the target's failure in the caller.
    Raise,
    /// Fail the caller: the target exited instead of suspending.
    CannotResume,
    /// Nothing to do; stop watching.
    Stop,
}

/// Decides the next watcher state and effect. Pure.
#[must_use]
pub fn transition(
    state: WatchState,
    resume_on: Option<ResumeEvent>,
    seen: Observation,
) -> (WatchState, Effect) {
    use Effect::{CannotResume, Raise, Repoll, Stop, Wake};
    use ResumeEvent::{Exit, Run, Sleep};
    use Status::{Indeterminate, Runnable, Suspended, TerminatedNormally, TerminatedWithError};
    use WatchState::{Dead, Errored, Finished, Initial, Ran};

    if state.is_terminal() {
        return (state, Stop);
    }
    if !seen.caller_alive {
        return (Dead, Stop);
    }
    match (state, resume_on, seen.target) {
        (_, _, Indeterminate) => (state, Repoll),
        (_, _, TerminatedWithError) => (Errored, Raise),
        (Initial, Some(Run), Runnable | Suspended) | (Initial, Some(Sleep), Suspended) => {
            (Ran, Wake)
        }
        (Initial, Some(Run | Exit), TerminatedNormally) => (Finished, Wake),
        (Initial, Some(Sleep), TerminatedNormally) => (Errored, CannotResume),
        (Initial | Ran, _, TerminatedNormally) => (Finished, Stop),
        _ => (state, Repoll),
    }
}

/// One handoff being watched.
pub(crate) struct Watch {
    pub(crate) caller: Unit,
    pub(crate) target: Unit,
    pub(crate) resume_on: Option<ResumeEvent>,
    /// Settled before the caller is woken or failed; the caller ignores
    /// other wakes.
    pub(crate) resolution: Arc<Resolution>,
    pub(crate) state: WatchState,
}

impl Watch {
    /// Runs one poll and applies its effect. Returns the new state.
    pub(crate) fn poll(&mut self) -> WatchState {
        let seen = Observation {
            target: self.target.status(),
            caller_alive: self.caller.is_alive(),
        };
        let (next, effect) = transition(self.state, self.resume_on, seen);
        if next != self.state || effect != Effect::Repoll {
            tracing::trace!(
                target_unit = %self.target,
                caller = %self.caller,
                resume_on = ?self.resume_on,
                observed = %seen.target,
                from = ?self.state,
                to = ?next,
                effect = ?effect,
                "watcher transition"
            );
        }
        match effect {
            Effect::Wake => {
                if self.resolution.resolve() {
                    self.caller.wakeup();
                    tracing::debug!(target_unit = %self.target, caller = %self.caller, "caller resumed");
                }
            }
            Effect::Raise => {
                self.resolution.fail();
                if let Some(err) = self.target.failure() {
                    self.caller.raise(err);
                }
            }
            Effect::CannotResume => {
                if self.resolution.fail() {
                    let err = match self.target.name() {
                        Some(name) => Error::cannot_resume(name),
                        None => Error::new(ErrorKind::CannotResume),
                    };
                    self.caller.raise(err);
                }
            }
            Effect::Repoll | Effect::Stop => {}
        }
        self.state = next;
        next
    }
}

/// Pushes the next poll of `watch` onto `queue`.
pub(crate) fn schedule(queue: &Arc<TaskQueue>, mut watch: Watch) -> bool {
    let next_queue = Arc::clone(queue);
    queue.push(Box::new(move || {
        if !watch.poll().is_terminal() {
            schedule(&next_queue, watch);
        }
        Step::Continue
    }))
}
