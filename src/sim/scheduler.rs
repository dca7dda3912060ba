//! Cooperative single-threaded scheduler
//!
//! Tasks are plain values keyed by a virtual millisecond clock. `advance`
//! pops one due task at a time and hands it to a dispatch function together
//! with the scheduler itself, so a running task may schedule or cancel others.
//! Nothing runs concurrently; every dispatch runs to completion.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

/// Opaque handle returned when scheduling a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

/// What a repeating task wants after it ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskControl {
    Continue,
    Stop,
}

/// A dispatch that failed. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CallbackFault(pub String);

/// Summary of one `advance` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fired: usize,
    pub faults: Vec<CallbackFault>,
}

#[derive(Debug)]
struct Entry<T> {
    task: T,
    due: u64,
    /// `None` for one-shot tasks
    interval: Option<u64>,
}

/// Virtual-clock task queue
#[derive(Debug)]
pub struct Scheduler<T> {
    now: u64,
    next_handle: u64,
    /// (due, handle) orders by time, then by registration
    queue: BTreeSet<(u64, TaskHandle)>,
    entries: HashMap<TaskHandle, Entry<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_handle: 1,
            queue: BTreeSet::new(),
            entries: HashMap::new(),
        }
    }

    /// Current virtual time in milliseconds
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Number of live (not yet fired or cancelled) tasks
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Fire `task` every `interval_ms`, first one interval from now
    pub fn schedule_repeating(&mut self, interval_ms: u64, task: T) -> TaskHandle {
        let interval = interval_ms.max(1);
        self.insert(self.now + interval, Some(interval), task)
    }

    /// Fire `task` once after `delay_ms`
    pub fn schedule_once(&mut self, delay_ms: u64, task: T) -> TaskHandle {
        self.insert(self.now + delay_ms, None, task)
    }

    /// Cancel a task. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        match self.entries.remove(&handle) {
            Some(entry) => {
                self.queue.remove(&(entry.due, handle));
                true
            }
            None => false,
        }
    }

    /// Drop every pending task
    pub fn cancel_all(&mut self) {
        self.queue.clear();
        self.entries.clear();
    }

    fn insert(&mut self, due: u64, interval: Option<u64>, task: T) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.queue.insert((due, handle));
        self.entries.insert(
            handle,
            Entry {
                task,
                due,
                interval,
            },
        );
        handle
    }

    /// Pop the earliest task due at or before `deadline`
    fn pop_due(&mut self, deadline: u64) -> Option<(u64, TaskHandle)> {
        let &(due, handle) = self.queue.first()?;
        if due > deadline {
            return None;
        }
        self.queue.pop_first()
    }
}

impl<T: Clone> Scheduler<T> {
    /// Advance the clock by `elapsed_ms`, dispatching every task that comes due.
    ///
    /// Tasks scheduled during dispatch with a due time inside the window also
    /// fire in this call. A fault is logged and counted; the loop keeps going
    /// and a faulting repeating task stays armed.
    pub fn advance<C, F>(&mut self, elapsed_ms: u64, ctx: &mut C, mut dispatch: F) -> TickReport
    where
        F: FnMut(&mut C, &mut Scheduler<T>, TaskHandle, T) -> Result<TaskControl, CallbackFault>,
    {
        let deadline = self.now + elapsed_ms;
        let mut report = TickReport::default();

        while let Some((due, handle)) = self.pop_due(deadline) {
            self.now = due;
            let Some(task) = self.entries.get(&handle).map(|e| e.task.clone()) else {
                continue;
            };

            report.fired += 1;
            let control = match dispatch(ctx, self, handle, task) {
                Ok(control) => control,
                Err(fault) => {
                    log::error!("Scheduled task {:?} faulted: {}", handle, fault);
                    report.faults.push(fault);
                    TaskControl::Continue
                }
            };

            // The task may have cancelled itself while running
            let Some(entry) = self.entries.get_mut(&handle) else {
                continue;
            };
            match (entry.interval, control) {
                (Some(interval), TaskControl::Continue) => {
                    entry.due = due + interval;
                    self.queue.insert((entry.due, handle));
                }
                _ => {
                    self.entries.remove(&handle);
                }
            }
        }

        self.now = deadline;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        log: &mut Vec<&'static str>,
        _: &mut Scheduler<&'static str>,
        _: TaskHandle,
        name: &'static str,
    ) -> Result<TaskControl, CallbackFault> {
        log.push(name);
        Ok(TaskControl::Continue)
    }

    #[test]
    fn test_same_tick_runs_in_registration_order() {
        let mut sched = Scheduler::new();
        sched.schedule_once(40, "a");
        sched.schedule_once(40, "b");
        sched.schedule_once(10, "early");
        sched.schedule_once(40, "c");

        let mut log = Vec::new();
        let report = sched.advance(40, &mut log, record);
        assert_eq!(log, vec!["early", "a", "b", "c"]);
        assert_eq!(report.fired, 4);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_repeating_rearms() {
        let mut sched = Scheduler::new();
        sched.schedule_repeating(40, "road");
        let mut log = Vec::new();
        sched.advance(200, &mut log, record);
        assert_eq!(log.len(), 5);
        assert_eq!(sched.pending(), 1);
        assert_eq!(sched.now(), 200);
    }

    #[test]
    fn test_cancelled_due_task_never_fires() {
        let mut sched: Scheduler<&'static str> = Scheduler::new();
        let _first = sched.schedule_once(40, "canceller");
        let victim = sched.schedule_once(40, "victim");

        let mut log = Vec::new();
        sched.advance(40, &mut log, |log, sched, _, name| {
            log.push(name);
            if name == "canceller" {
                assert!(sched.cancel(victim));
            }
            Ok(TaskControl::Continue)
        });
        assert_eq!(log, vec!["canceller"]);
        assert!(!sched.cancel(victim));
    }

    #[test]
    fn test_fault_does_not_halt_processing() {
        let mut sched = Scheduler::new();
        sched.schedule_repeating(40, "bad");
        sched.schedule_once(40, "good");

        let mut log = Vec::new();
        let report = sched.advance(80, &mut log, |log, _, _, name| {
            log.push(name);
            if name == "bad" {
                return Err(CallbackFault("malformed step".into()));
            }
            Ok(TaskControl::Continue)
        });
        assert_eq!(log, vec!["bad", "good", "bad"]);
        assert_eq!(report.faults.len(), 2);
        assert_eq!(sched.pending(), 1);
    }

    #[test]
    fn test_stop_unregisters_repeating_task() {
        let mut sched = Scheduler::new();
        let handle = sched.schedule_repeating(10, 3u32);
        let mut remaining = 3u32;
        sched.advance(1_000, &mut remaining, |remaining, _, _, _| {
            *remaining -= 1;
            Ok(if *remaining == 0 {
                TaskControl::Stop
            } else {
                TaskControl::Continue
            })
        });
        assert_eq!(remaining, 0);
        assert!(!sched.is_scheduled(handle));
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_self_cancel_inside_dispatch() {
        let mut sched = Scheduler::new();
        sched.schedule_repeating(10, "loop");
        let mut count = 0;
        sched.advance(100, &mut count, |count, sched, handle, _| {
            *count += 1;
            sched.cancel(handle);
            Ok(TaskControl::Continue)
        });
        assert_eq!(count, 1);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_task_scheduled_during_dispatch_fires_in_window() {
        let mut sched = Scheduler::new();
        sched.schedule_once(10, "first");
        let mut log = Vec::new();
        sched.advance(50, &mut log, |log, sched, _, name| {
            log.push(name);
            if name == "first" {
                sched.schedule_once(10, "second");
                sched.schedule_once(100, "later");
            }
            Ok(TaskControl::Continue)
        });
        assert_eq!(log, vec!["first", "second"]);
        assert_eq!(sched.pending(), 1);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let mut sched = Scheduler::new();
        sched.schedule_repeating(0, "spin");
        let mut log = Vec::new();
        sched.advance(3, &mut log, record);
        assert_eq!(log.len(), 3);
    }
}
