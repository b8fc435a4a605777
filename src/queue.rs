//! The task queue: deferred actions consumed by exactly one worker.
//!
//! The queue is the only serialization point of the harness. Actions run one
//! at a time, in the order they were pushed; an action that pushes more actions
//! puts them behind everything already queued.
//!
//! The queue accepts work only while its worker is alive. Once closed, pushes
//! are dropped, which is how shutdown prevents post-mortem scheduling.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;

/// What the worker does after running an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep consuming.
    Continue,
    /// Stop the worker.
    Shutdown,
}

/// A deferred action.
pub(crate) type Task = Box<dyn FnOnce() -> Step + Send>;

struct QueueState {
    tasks: VecDeque<Task>,
    open: bool,
}

pub(crate) struct TaskQueue {
    state: Mutex<QueueState>,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                open: true,
            }),
        }
    }

    /// Appends `task`. Returns false, dropping the task, once closed.
    pub(crate) fn push(&self, task: Task) -> bool {
        let mut state = self.state.lock();
        if !state.open {
            return false;
        }
        state.tasks.push_back(task);
        true
    }

    /// Takes the oldest task.
    pub(crate) fn pop(&self) -> Option<Task> {
        self.state.lock().tasks.pop_front()
    }

    /// Drops every queued task and refuses new ones. Returns how many were dropped.
    pub(crate) fn close(&self) -> usize {
        let dropped = {
            let mut state = self.state.lock();
            state.open = false;
            std::mem::take(&mut state.tasks)
        };
        // Tasks may own handles whose drop touches the queue again.
        let count = dropped.len();
        drop(dropped);
        count
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TaskQueue")
            .field("len", &state.tasks.len())
            .field("open", &state.open)
            .finish()
    }
}
