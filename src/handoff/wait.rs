//! Suspending a unit until a condition holds.

use std::sync::Arc;

use crate::coordinator::Handle;
use crate::error::{Error, Result};
use crate::handoff::{park_for, Resolution};
use crate::queue::{Step, TaskQueue};
use crate::unit::{self, Unit};

type Condition = Arc<dyn Fn() -> bool + Send + Sync>;

impl Handle {
    /// Suspends the calling unit until `condition` holds.
    ///
    /// Returns at once if the condition already holds. Otherwise the condition
    /// is re-evaluated by queued actions, on the worker, and the caller is
    /// woken by the first one that finds it true.
    ///
    /// # Errors
    ///
    /// - [`WouldDeadlock`](crate::ErrorKind::WouldDeadlock) when called from a
    ///   queued action.
    /// - [`Shutdown`](crate::ErrorKind::Shutdown) after shutdown.
    /// - Any error raised into the caller while it is suspended.
    pub fn wait_until<F>(&self, condition: F) -> Result<()>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.ensure_off_worker("wait_until")?;
        if condition() {
            return Ok(());
        }
        let waiter = unit::current();
        let resolution = Arc::new(Resolution::default());
        let recheck = Recheck {
            waiter: waiter.clone(),
            condition: Arc::new(condition),
            resolution: Arc::clone(&resolution),
        };
        if !recheck.schedule(&self.inner.queue) {
            return Err(Error::shutdown());
        }
        park_for(&waiter, &resolution)
    }
}

struct Recheck {
    waiter: Unit,
    condition: Condition,
    resolution: Arc<Resolution>,
}

impl Recheck {
    fn schedule(self, queue: &Arc<TaskQueue>) -> bool {
        let next_queue = Arc::clone(queue);
        queue.push(Box::new(move || {
            if !self.resolution.is_pending() || !self.waiter.is_alive() {
                return Step::Continue;
            }
            if (self.condition)() {
                if self.resolution.resolve() {
                    self.waiter.wakeup();
                }
            } else {
                self.schedule(&next_queue);
            }
            Step::Continue
        }))
    }
}
