//! Cooperative run-to-completion scheduling.
//!
//! Node logic never blocks waiting for time to pass. A component that wants to
//! continue later posts a [`Task`] with a delay and returns; the owner of the
//! [`TimerQueue`] dispatches due tasks one at a time. Posting a task that is
//! already pending moves it to the new due time, so every task identity has at
//! most one pending instance.

use log::{debug, warn};
use std::collections::HashSet;
use std::mem::{discriminant, Discriminant};
use std::time::Duration;

use crate::output::link::Tag;

pub type Ticks = u64;

pub const TICKS_PER_SEC: Ticks = 1024;

pub fn ticks_to_duration(ticks: Ticks) -> Duration {
    Duration::from_micros(ticks.saturating_mul(1_000_000) / TICKS_PER_SEC)
}

/// Smallest duration that converts back to at least `ticks`.
pub fn ticks_to_duration_ceil(ticks: Ticks) -> Duration {
    let micros = ticks.saturating_mul(1_000_000);
    Duration::from_micros(micros / TICKS_PER_SEC + (micros % TICKS_PER_SEC != 0) as u64)
}

pub fn duration_to_ticks(duration: Duration) -> Ticks {
    (duration.as_micros().saturating_mul(TICKS_PER_SEC as u128) / 1_000_000) as Ticks
}

pub fn secs_to_ticks(secs: u32) -> Ticks {
    secs as Ticks * TICKS_PER_SEC
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    MeasurementCycle,
    MeasurementStep,
    DrainQueue,
    TransmitTimeout(Tag),
}

pub trait Scheduler {
    fn now(&self) -> Ticks;

    /// Make a kind of task known to the scheduler. Tasks of unregistered kinds
    /// are refused by `post` and `post_delayed`.
    fn register(&mut self, task: Task);

    fn post(&mut self, task: Task) {
        self.post_delayed(task, 0);
    }

    fn post_delayed(&mut self, task: Task, delay: Ticks);

    fn cancel(&mut self, task: Task);

    fn is_scheduled(&self, task: Task) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    due: Ticks,
    seq: u64,
    task: Task,
}

/// Virtual-clock implementation of [`Scheduler`]. Time only moves when the
/// owner calls [`TimerQueue::advance_to`].
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Ticks,
    seq: u64,
    pending: Vec<Pending>,
    registered: HashSet<Discriminant<Task>>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_to(&mut self, ticks: Ticks) {
        if ticks > self.now {
            self.now = ticks;
        }
    }

    pub fn next_due(&self) -> Option<Ticks> {
        self.pending.iter().map(|p| p.due).min()
    }

    pub fn pop_due(&mut self) -> Option<Task> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= self.now)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)?;
        Some(self.pending.swap_remove(index).task)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn remaining(&self, task: Task) -> Option<Ticks> {
        self.pending
            .iter()
            .find(|p| p.task == task)
            .map(|p| p.due.saturating_sub(self.now))
    }
}

impl Scheduler for TimerQueue {
    fn now(&self) -> Ticks {
        self.now
    }

    fn register(&mut self, task: Task) {
        self.registered.insert(discriminant(&task));
    }

    fn post_delayed(&mut self, task: Task, delay: Ticks) {
        if !self.registered.contains(&discriminant(&task)) {
            warn!("⚠️  Refusing to post unregistered task {:?}", task);
            return;
        }

        self.pending.retain(|p| p.task != task);
        self.seq += 1;
        let due = self.now.saturating_add(delay);
        debug!("⏱️  {:?} due at tick {}", task, due);
        self.pending.push(Pending {
            due,
            seq: self.seq,
            task,
        });
    }

    fn cancel(&mut self, task: Task) {
        self.pending.retain(|p| p.task != task);
    }

    fn is_scheduled(&self, task: Task) -> bool {
        self.pending.iter().any(|p| p.task == task)
    }
}
