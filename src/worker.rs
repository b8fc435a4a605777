//! The worker: the single consumer of a coordinator's task queue.
//!
//! The worker runs on its own unit and never suspends: when the queue is empty
//! it yields, and once its spin budget is spent it sleeps for a bounded
//! interval. A long sleep would stall every pending watcher.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::BatonConfig;
use crate::error::Result;
use crate::queue::{Step, TaskQueue};
use crate::registry::Name;
use crate::unit::Unit;

/// Name the worker unit reports from [`current`](crate::Handle::current).
pub const WORKER_NAME: &str = "internal_worker";

#[derive(Debug, Clone, Copy)]
struct IdlePolicy {
    spins: u32,
    backoff: Duration,
}

impl IdlePolicy {
    fn wait(self, idle_rounds: u32) {
        if idle_rounds < self.spins || self.backoff.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.backoff);
        }
    }
}

/// Starts the worker for `queue`.
pub(crate) fn start(queue: Arc<TaskQueue>, config: &BatonConfig) -> Result<Unit> {
    let idle = IdlePolicy {
        spins: config.idle_spins,
        backoff: config.idle_backoff,
    };
    let worker_queue = Arc::clone(&queue);
    let started = Unit::spawn(Name::from(WORKER_NAME), config.worker_thread(), move || {
        run(&worker_queue, idle);
        Ok(())
    });
    if started.is_err() {
        queue.close();
    }
    started
}

fn run(queue: &TaskQueue, idle: IdlePolicy) {
    tracing::info!(spins = idle.spins, backoff_us = idle.backoff.as_micros(), "worker started");
    let mut idle_rounds: u32 = 0;
    let mut executed: u64 = 0;
    loop {
        let Some(task) = queue.pop() else {
            idle.wait(idle_rounds);
            idle_rounds = idle_rounds.saturating_add(1);
            continue;
        };
        idle_rounds = 0;
        executed += 1;
        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Step::Continue) => {}
            Ok(Step::Shutdown) => break,
            Err(payload) => {
                let err = crate::error::Error::panicked(payload.as_ref());
                tracing::error!(error = %err, "queued action panicked");
            }
        }
    }
    let dropped = queue.close();
    tracing::info!(executed, dropped, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn config() -> BatonConfig {
        BatonConfig::new().idle_spins(4).idle_backoff(Duration::from_micros(10))
    }

    #[test]
    fn runs_actions_in_order_until_shutdown() {
        let queue = Arc::new(TaskQueue::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for value in 1..=3 {
            let seen = Arc::clone(&seen);
            queue.push(Box::new(move || {
                seen.lock().push(value);
                Step::Continue
            }));
        }
        queue.push(Box::new(|| Step::Shutdown));
        let worker = start(Arc::clone(&queue), &config()).expect("worker");
        worker.join().expect("worker ends cleanly");
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        assert!(!queue.is_open());
        assert_eq!(worker.name().map(Name::as_str), Some(WORKER_NAME));
    }

    #[test]
    fn survives_a_panicking_action() {
        let queue = Arc::new(TaskQueue::new());
        let seen = Arc::new(Mutex::new(false));
        let worker = start(Arc::clone(&queue), &config()).expect("worker");
        queue.push(Box::new(|| panic!("bad action")));
        let flag = Arc::clone(&seen);
        queue.push(Box::new(move || {
            *flag.lock() = true;
            Step::Shutdown
        }));
        worker.join().expect("worker ends cleanly");
        assert!(*seen.lock());
    }
}
