use std::fmt;

use crate::task::Fault;

use super::TaskId;

/// Something observable the scheduler did.
///
/// `index` is the task's position in the scheduler's run order, i.e. the order it was added in.
#[derive(Debug)]
pub enum Event<'a> {
    /// A quantum is about to run on the task.
    Started { id: TaskId, index: usize },

    /// The task's last quantum ended with a fault.
    Failed {
        id: TaskId,
        index: usize,
        fault: &'a Fault,
    },

    /// The task reached its terminal state. Follows `Failed` for faulted tasks.
    Completed { id: TaskId, index: usize },

    /// The preemption source fired `ticks` times since it was last drained.
    Preempted { ticks: u64 },
}

impl Event<'_> {
    pub fn task(&self) -> Option<TaskId> {
        match self {
            Event::Started { id, .. } | Event::Failed { id, .. } | Event::Completed { id, .. } => {
                Some(*id)
            }
            Event::Preempted { .. } => None,
        }
    }
}

impl fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Started { index, .. } => write!(f, "task #{} started running", index),
            Event::Failed { index, fault, .. } => {
                write!(f, "task #{} failed with fault: {}", index, fault)
            }
            Event::Completed { index, .. } => write!(f, "task #{} completed", index),
            Event::Preempted { ticks } => write!(f, "preemption source fired {} time(s)", ticks),
        }
    }
}

pub(crate) type EventHook = Box<dyn FnMut(&Event<'_>)>;

pub(super) fn report(scheduler: usize, hook: &mut Option<EventHook>, event: Event<'_>) {
    match event {
        Event::Started { .. } => log::debug!("[sched#{}] {}", scheduler, event),
        Event::Failed { .. } => log::warn!("[sched#{}] {}", scheduler, event),
        Event::Completed { .. } => log::info!("[sched#{}] {}", scheduler, event),
        Event::Preempted { .. } => log::trace!("[sched#{}] {}", scheduler, event),
    }

    if let Some(hook) = hook {
        hook(&event);
    }
}
