// Task lifecycle shared by the state machines.
//
// Every machine is a tagged state plus a `TaskClock` that counts ticks spent
// in the current state. `transition` is the only way to change state and it
// always zeroes the counter, so the first tick a state runs sees
// `ticks_in_state() == 0`. Machines call `end_tick` once at the bottom of
// their tick; it advances the counter unless a transition happened during
// that tick.
//
// `TaskStatus` is what a session's `tick` returns to the dispatcher: still
// running, or stopped for good with a success or a `TaskError`.
//
// See also: `gather.rs`, `survival.rs`, `construction.rs` (the machines),
// `companion.rs` (consumes `TaskStatus`).

use crate::error::TaskError;
use serde::Serialize;
use std::fmt::Debug;

/// Outcome of one tick of a task session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
    Failed(TaskError),
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

/// Current state plus ticks spent in it.
#[derive(Clone, Debug, Serialize)]
pub struct TaskClock<S> {
    state: S,
    ticks_in_state: u64,
    #[serde(skip)]
    transitioned: bool,
    #[serde(skip)]
    machine: &'static str,
}

impl<S: Copy + PartialEq + Debug> TaskClock<S> {
    pub fn new(machine: &'static str, initial: S) -> Self {
        Self {
            state: initial,
            ticks_in_state: 0,
            transitioned: false,
            machine,
        }
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn ticks_in_state(&self) -> u64 {
        self.ticks_in_state
    }

    pub fn is(&self, state: S) -> bool {
        self.state == state
    }

    /// Enter `to`, zeroing the tick counter. Re-entering the current state
    /// also resets it.
    pub fn transition(&mut self, to: S) {
        tracing::debug!(
            machine = self.machine,
            from = ?self.state,
            to = ?to,
            after_ticks = self.ticks_in_state,
            "transition"
        );
        self.state = to;
        self.ticks_in_state = 0;
        self.transitioned = true;
    }

    /// Close out a tick.
    pub fn end_tick(&mut self) {
        if self.transitioned {
            self.transitioned = false;
        } else {
            self.ticks_in_state += 1;
        }
    }
}
