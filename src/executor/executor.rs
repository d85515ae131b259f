use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use slotmap::SlotMap;

use crate::{
    driver::{PreemptionSource, Timer},
    task::{dbg_context, debugging::TaskDebugger, Pipe, Quantum, Task},
    utils::id::gen_id,
};

use super::{
    builder::Builder,
    event::{report, Event, EventHook},
    TaskId,
};

scoped_tls::scoped_thread_local!(static CURRENT: Context);

/// Set for the duration of a single quantum.
struct Context {
    scheduler: usize,
    task: TaskId,
}

/// Returns the id of the task whose quantum is executing on this thread, if any.
pub fn current_task() -> Option<TaskId> {
    if CURRENT.is_set() {
        Some(CURRENT.with(|cx| cx.task))
    } else {
        None
    }
}

/// Returns the id of the scheduler running a quantum on this thread, if any.
pub fn current_scheduler() -> Option<usize> {
    if CURRENT.is_set() {
        Some(CURRENT.with(|cx| cx.scheduler))
    } else {
        None
    }
}

/// Ends a run from anywhere, including from inside a task or another thread.
///
/// The scheduler finishes the quantum in progress and returns.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn start(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Drives a set of tasks to completion, one quantum at a time.
///
/// Every quantum goes to the first ready task in the order tasks were added. A task that is
/// ready again after its quantum is picked again before any task added after it.
pub struct Scheduler<T> {
    id: usize,
    tasks: SlotMap<TaskId, Task<T>>,

    /// Run order. Never reordered or shrunk.
    order: Vec<TaskId>,

    running: StopHandle,
    interval: Duration,
    idle_backoff: Option<Duration>,
    source: Option<Box<dyn PreemptionSource>>,
    on_event: Option<EventHook>,
}

impl<T: Clone + 'static> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Scheduler<T> {
    /// Creates a scheduler preempting every 500ms.
    pub fn new() -> Self {
        Builder::new().build()
    }

    pub(super) fn from_builder(builder: &mut Builder) -> Self {
        Self {
            id: gen_id(),
            tasks: SlotMap::with_capacity_and_key(16),
            order: Vec::new(),
            running: StopHandle::default(),
            interval: builder.interval,
            idle_backoff: builder.idle_backoff,
            source: builder.source.take(),
            on_event: builder.on_event.take(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Appends a task to the run order.
    pub fn add(&mut self, task: Task<T>) -> TaskId {
        let label = task.label();
        let id = self.tasks.insert(task);
        self.order.push(id);
        TaskDebugger::register(id, label);
        id
    }

    /// Appends tasks in iteration order.
    pub fn add_all(&mut self, tasks: impl IntoIterator<Item = Task<T>>) -> Vec<TaskId> {
        tasks.into_iter().map(|task| self.add(task)).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task<T>> {
        self.tasks.get(id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task<T>> {
        self.tasks.get_mut(id)
    }

    /// Position of the task in the run order.
    pub fn index_of(&self, id: TaskId) -> Option<usize> {
        self.order.iter().position(|&t| t == id)
    }

    /// Tasks in run order.
    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &Task<T>)> + '_ {
        self.order
            .iter()
            .filter_map(move |&id| self.tasks.get(id).map(|task| (id, task)))
    }

    /// Removes and returns all tasks in run order.
    pub fn into_tasks(mut self) -> Vec<Task<T>> {
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|id| {
                TaskDebugger::unregister(id);
                self.tasks.remove(id)
            })
            .collect()
    }

    /// Output channel of `id`, created on first use.
    pub fn stdout(&mut self, id: TaskId) -> Option<Pipe<T>> {
        self.tasks.get_mut(id).map(Task::stdout)
    }

    /// Connects `producer`'s output to `consumer`'s input.
    ///
    /// Returns `None` if either task is unknown.
    pub fn pipe(&mut self, producer: TaskId, consumer: TaskId) -> Option<Pipe<T>> {
        if !self.tasks.contains_key(consumer) {
            return None;
        }
        let pipe = self.tasks.get_mut(producer)?.stdout();
        self.tasks.get_mut(consumer)?.set_stdin(pipe.clone());
        Some(pipe)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.running.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    /// Runs until no task is ready or the run is stopped.
    ///
    /// Faults inside tasks never surface here; inspect the tasks afterwards. The only error is a
    /// failure to set up the preemption source, returned before any task runs.
    ///
    /// # Panics
    ///
    /// If called from inside a task's quantum.
    pub fn run_all(&mut self) -> io::Result<()> {
        assert!(
            !CURRENT.is_set(),
            "There is already a Scheduler running a task on this thread."
        );

        self.arm()?;
        self.running.start();
        log::debug!("[sched#{}] running {} tasks", self.id, self.order.len());

        let mut this = scopeguard::guard(self, |this| this.finish());
        while this.running.is_running() {
            let quantum = match this.run_quantum() {
                Some((_, quantum)) => quantum,
                None => break,
            };

            this.preempt();

            if quantum == Quantum::Starved {
                if let Some(backoff) = this.idle_backoff {
                    thread::sleep(backoff);
                }
            }
        }

        Ok(())
    }

    /// Runs a single quantum on the first ready task and returns it, or `None` if no task is
    /// ready.
    ///
    /// # Panics
    ///
    /// If called from inside a task's quantum.
    pub fn run_next(&mut self) -> Option<TaskId> {
        assert!(
            !CURRENT.is_set(),
            "There is already a Scheduler running a task on this thread."
        );
        self.run_quantum().map(|(id, _)| id)
    }

    fn next_ready(&self) -> Option<(usize, TaskId)> {
        self.order
            .iter()
            .copied()
            .enumerate()
            .find(|&(_, id)| self.tasks.get(id).map_or(false, Task::is_ready))
    }

    fn run_quantum(&mut self) -> Option<(TaskId, Quantum)> {
        let (index, id) = self.next_ready()?;
        Some((id, self.run_job(index, id)))
    }

    fn run_job(&mut self, index: usize, id: TaskId) -> Quantum {
        report(self.id, &mut self.on_event, Event::Started { id, index });

        let task = match self.tasks.get_mut(id) {
            Some(task) => task,
            None => return Quantum::Skipped,
        };

        let cx = Context {
            scheduler: self.id,
            task: id,
        };
        let state = task.state_string();
        let quantum = CURRENT.set(&cx, || dbg_context!(id, &state, "run", { task.run() }));

        if quantum == Quantum::Finished {
            if let Some(fault) = task.fault() {
                report(
                    self.id,
                    &mut self.on_event,
                    Event::Failed { id, index, fault },
                );
            }
            report(self.id, &mut self.on_event, Event::Completed { id, index });
        } else {
            log::trace!(
                "[sched#{}] task #{} {:?} -> {}",
                self.id,
                index,
                quantum,
                task.state_string()
            );
        }

        quantum
    }

    fn arm(&mut self) -> io::Result<()> {
        if self.interval.is_zero() {
            return Ok(());
        }

        let source = match self.source.take() {
            Some(source) => source,
            None => Box::new(Timer::new()?),
        };
        log::debug!(
            "[sched#{}] arming preemption source every {:?}",
            self.id,
            self.interval
        );
        self.source.insert(source).arm(self.interval)
    }

    /// Runs one quantum per preemption tick that fired since the last check.
    fn preempt(&mut self) {
        if self.interval.is_zero() {
            return;
        }
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return,
        };
        let ticks = match source.drain() {
            Ok(ticks) => ticks,
            Err(err) => {
                log::warn!("[sched#{}] cannot read preemption source: {}", self.id, err);
                return;
            }
        };
        if ticks == 0 {
            return;
        }

        report(self.id, &mut self.on_event, Event::Preempted { ticks });
        for _ in 0..ticks {
            if !self.running.is_running() || self.run_quantum().is_none() {
                break;
            }
        }
    }

    fn finish(&mut self) {
        self.running.stop();
        if self.interval.is_zero() {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            if let Err(err) = source.disarm() {
                log::warn!(
                    "[sched#{}] cannot disarm preemption source: {}",
                    self.id,
                    err
                );
            }
        }
    }
}

impl<T> Drop for Scheduler<T> {
    fn drop(&mut self) {
        for &id in &self.order {
            TaskDebugger::unregister(id);
        }
    }
}
