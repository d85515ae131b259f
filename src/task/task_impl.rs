//! Units of work driven by the scheduler
//!
//! # Execution models
//!
//! A task runs in one of two ways:
//!
//! * **Run-to-completion**: the body is a plain callable. The first quantum calls it and the task
//!   is done afterwards, whether the call succeeded or not. There is no partial progress.
//! * **Step-resumable**: the body is a [`Coroutine`]. Each quantum resumes it exactly once,
//!   recording at most one produced value. The task stays ready until the coroutine is exhausted
//!   or faults.
//!
//! # Pipes
//!
//! A task owns an optional output channel, created the first time [`Task::stdout`] is called.
//! Every value a step-resumable task produces is recorded in its results and pushed into that
//! channel; the final item is always [`Item::EndOfStream`], whether the coroutine ran out of
//! values or faulted.
//!
//! Another task may hold that channel as its input. Once started, such a consumer only makes
//! progress when a value is waiting; an empty channel leaves it ready without doing anything.
//!
//! # Faults
//!
//! Errors and panics raised by a body are caught at the task boundary, stored as a [`Fault`] and
//! turn the task terminal. They never propagate to whoever is driving the task.
use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use crate::channel::Channel;

use super::{
    coroutine::{self, Coroutine, Step},
    fault::{BoxError, Fault},
    state::{State, TransitionToRunning},
    Item,
};

/// A channel carrying one task's output stream.
pub type Pipe<T> = Arc<Channel<Item<T>>>;

type Thunk<T> = Box<dyn FnOnce() -> Result<T, BoxError>>;

enum Body<T> {
    /// Taken on the first run.
    Complete(Option<Thunk<T>>),
    Step(Box<dyn Coroutine<T>>),
}

/// What a single quantum achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantum {
    /// The task was not ready. Nothing happened.
    Skipped,

    /// The task waited on an empty input channel. Still ready, no progress.
    Starved,

    /// The task advanced and is ready for another quantum.
    Progressed,

    /// The task reached its terminal state, normally or with a fault.
    Finished,
}

pub struct Task<T> {
    body: Body<T>,
    state: State,
    fault: Option<Fault>,
    results: Vec<Item<T>>,

    /// Upstream task's output. Not owned.
    input: Option<Pipe<T>>,

    /// Created on demand.
    output: Option<Pipe<T>>,

    label: Option<&'static str>,
}

impl<T: 'static> Task<T> {
    fn new(body: Body<T>) -> Self {
        Self {
            body,
            state: State::new(),
            fault: None,
            results: Vec::new(),
            input: None,
            output: None,
            label: None,
        }
    }

    /// Creates a run-to-completion task.
    pub fn complete<F, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + 'static,
        E: Into<BoxError>,
    {
        Self::new(Body::Complete(Some(Box::new(move || f().map_err(Into::into)))))
    }

    /// Creates a step-resumable task.
    pub fn interruptible(co: impl Coroutine<T> + 'static) -> Self {
        Self::new(Body::Step(Box::new(co)))
    }

    /// Creates a step-resumable task yielding the elements of `iter`.
    pub fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
    {
        Self::interruptible(coroutine::from_iter(iter))
    }
}

impl<T> Task<T> {
    /// Names the task in logs. Labelled tasks are traced by the
    /// [`TaskDebugger`](super::debugging::TaskDebugger).
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn label(&self) -> Option<&'static str> {
        self.label
    }

    pub fn is_interruptible(&self) -> bool {
        matches!(self.body, Body::Step(_))
    }

    pub fn is_ready(&self) -> bool {
        self.state.load().is_ready()
    }

    pub fn is_done(&self) -> bool {
        self.state.load().is_done()
    }

    pub fn is_started(&self) -> bool {
        self.state.load().is_started()
    }

    pub(crate) fn state_string(&self) -> String {
        self.state.to_compact_string()
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Everything the task produced so far, in order.
    pub fn results(&self) -> &[Item<T>] {
        &self.results
    }

    /// Value returned by a run-to-completion task, or the first value a step-resumable one
    /// produced.
    pub fn result(&self) -> Option<&T> {
        self.results.first().and_then(Item::value)
    }

    pub fn into_results(self) -> Vec<Item<T>> {
        self.results
    }

    /// Returns the task's output channel, creating it on first use.
    pub fn stdout(&mut self) -> Pipe<T> {
        self.output
            .get_or_insert_with(|| Arc::new(Channel::unbounded()))
            .clone()
    }

    /// Attaches an upstream output channel as this task's input.
    pub fn set_stdin(&mut self, pipe: Pipe<T>) {
        self.input = Some(pipe);
    }

    pub fn stdin(&self) -> Option<&Pipe<T>> {
        self.input.as_ref()
    }
}

impl<T: Clone> Task<T> {
    /// Executes one quantum.
    ///
    /// Does nothing unless the task is ready.
    pub fn run(&mut self) -> Quantum {
        let started = match self.state.transition_to_running() {
            TransitionToRunning::NotReady => return Quantum::Skipped,
            TransitionToRunning::Running { started } => started,
        };

        #[cfg(feature = "debugging")]
        let before = self.state.load();

        let quantum = match &mut self.body {
            Body::Complete(thunk) => {
                let thunk = thunk.take();
                self.run_to_completion(thunk)
            }
            Body::Step(_) => self.step(started),
        };

        #[cfg(feature = "debugging")]
        self.check_invariants(before, quantum);

        quantum
    }

    fn run_to_completion(&mut self, thunk: Option<Thunk<T>>) -> Quantum {
        match (thunk, &self.input) {
            (Some(_), Some(_)) => {
                log::warn!("run-to-completion task has an input attached, body skipped");
            }
            (Some(thunk), None) => {
                self.state.set_started();
                match catch_unwind(AssertUnwindSafe(thunk)) {
                    Ok(Ok(v)) => {
                        if let Some(out) = &self.output {
                            out.put(Item::Value(v.clone()));
                        }
                        self.results.push(Item::Value(v));
                    }
                    Ok(Err(e)) => self.fault = Some(Fault::Error(e)),
                    Err(payload) => self.fault = Some(Fault::from_panic(payload)),
                }
            }
            (None, _) => {}
        }

        if let Some(out) = &self.output {
            out.put(Item::EndOfStream);
        }
        self.state.transition_to_done();
        Quantum::Finished
    }

    fn step(&mut self, started: bool) -> Quantum {
        let input = match (&self.input, started) {
            (Some(pipe), true) => match pipe.try_get() {
                Ok(item) => Some(item),
                Err(_) => {
                    self.state.transition_to_idle();
                    return Quantum::Starved;
                }
            },
            _ => {
                self.state.set_started();
                None
            }
        };

        let Body::Step(co) = &mut self.body else {
            unreachable!("step called on a run-to-completion task");
        };

        match catch_unwind(AssertUnwindSafe(|| co.resume(input))) {
            Ok(Step::Yielded(v)) => {
                self.emit(Item::Value(v));
                self.state.transition_to_idle();
                Quantum::Progressed
            }
            Ok(Step::Suspended) => {
                self.state.transition_to_idle();
                Quantum::Progressed
            }
            Ok(Step::Exhausted) => {
                self.emit(Item::EndOfStream);
                self.state.transition_to_done();
                Quantum::Finished
            }
            Ok(Step::Faulted(e)) => self.fail(Fault::Error(e)),
            Err(payload) => self.fail(Fault::from_panic(payload)),
        }
    }

    fn fail(&mut self, fault: Fault) -> Quantum {
        self.emit(Item::EndOfStream);
        self.fault = Some(fault);
        self.state.transition_to_done();
        Quantum::Finished
    }

    fn emit(&mut self, item: Item<T>) {
        if let Some(out) = &self.output {
            out.put(item.clone());
        }
        self.results.push(item);
    }

    #[cfg(feature = "debugging")]
    fn check_invariants(&self, before: super::state::Snapshot, quantum: Quantum) {
        let after = self.state.load();
        assert!(
            !(after.is_ready() && after.is_done()),
            "task is both ready and done: {}",
            after.to_compact_string()
        );
        assert!(
            !before.is_done() || after.is_done(),
            "done task was revived"
        );
        assert_eq!(
            quantum == Quantum::Finished,
            after.is_done(),
            "quantum {:?} disagrees with state {}",
            quantum,
            after.to_compact_string()
        );
        assert!(
            self.fault.is_none() || after.is_done(),
            "fault recorded on a live task"
        );
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("label", &self.label)
            .field("interruptible", &self.is_interruptible())
            .field("state", &self.state)
            .field("fault", &self.fault)
            .field("results", &self.results.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::task::coroutine;

    fn drive<T: Clone>(task: &mut Task<T>) -> usize {
        let mut quanta = 0;
        while task.is_ready() {
            task.run();
            quanta += 1;
        }
        quanta
    }

    #[test]
    fn run_to_completion_result() {
        let mut task = Task::complete(|| Ok::<_, BoxError>(42));
        assert!(task.is_ready());
        assert_eq!(task.run(), Quantum::Finished);
        assert!(task.is_done());
        assert!(!task.is_ready());
        assert!(task.is_started());
        assert!(task.fault().is_none());
        assert_eq!(task.result(), Some(&42));
        assert_eq!(task.run(), Quantum::Skipped);
    }

    #[test]
    fn run_to_completion_error_is_captured() {
        let mut task = Task::<u8>::complete(|| Err("broken"));
        assert_eq!(task.run(), Quantum::Finished);
        assert!(task.is_done());
        assert_eq!(task.fault().map(ToString::to_string).as_deref(), Some("broken"));
        assert!(task.results().is_empty());
    }

    #[test]
    fn run_to_completion_panic_is_captured() {
        let mut task = Task::<u8>::complete(|| -> Result<u8, BoxError> { panic!("oops") });
        task.run();
        assert!(task.is_done());
        assert!(task.fault().map_or(false, Fault::is_panic));
    }

    #[test]
    fn run_to_completion_with_input_skips_body() {
        let called = Rc::new(RefCell::new(false));
        let mut task = Task::complete({
            let called = called.clone();
            move || {
                *called.borrow_mut() = true;
                Ok::<_, BoxError>(1)
            }
        });
        task.set_stdin(Arc::new(Channel::unbounded()));
        task.run();
        assert!(task.is_done());
        assert!(!task.is_started());
        assert!(!*called.borrow());
    }

    #[test]
    fn run_to_completion_feeds_output() {
        let mut task = Task::complete(|| Ok::<_, BoxError>("hi"));
        let out = task.stdout();
        task.run();
        assert_eq!(out.try_get(), Ok(Item::Value("hi")));
        assert_eq!(out.try_get(), Ok(Item::EndOfStream));
    }

    #[test]
    fn six_quanta_for_five_values() {
        let mut task = Task::from_iter(0..5);
        let quanta = drive(&mut task);
        assert_eq!(quanta, 6);
        assert!(task.is_done());
        assert!(task.fault().is_none());
        let expected: Vec<Item<i32>> = vec![
            0.into(),
            1.into(),
            2.into(),
            3.into(),
            4.into(),
            Item::EndOfStream,
        ];
        assert_eq!(task.results(), expected.as_slice());
    }

    #[test]
    fn end_of_stream_arrives_exactly_once_at_done() {
        let mut task = Task::from_iter(vec!['a', 'b']);
        while task.is_ready() {
            task.run();
            let eofs = task.results().iter().filter(|i| i.is_end()).count();
            assert_eq!(eofs, task.is_done() as usize);
            if let Some(last) = task.results().last() {
                assert_eq!(last.is_end(), task.is_done());
            }
        }
    }

    #[test]
    fn output_mirrors_results() {
        let mut task = Task::interruptible(coroutine::try_from_iter(vec![
            Ok(1),
            Ok(2),
            Err("third"),
        ]));
        let out = task.stdout();
        drive(&mut task);

        let mut pushed = Vec::new();
        while let Ok(item) = out.try_get() {
            pushed.push(item);
        }
        assert_eq!(pushed, task.results());
        assert_eq!(pushed.last(), Some(&Item::EndOfStream));
        assert_eq!(task.fault().map(ToString::to_string).as_deref(), Some("third"));
    }

    #[test]
    fn panicking_coroutine_ends_the_stream() {
        let mut n = 0;
        let mut task = Task::interruptible(coroutine::from_fn(move |_| {
            n += 1;
            if n == 2 {
                panic!("second step");
            }
            Step::Yielded(n)
        }));
        let out = task.stdout();
        drive(&mut task);
        assert!(task.is_done());
        assert!(task.fault().map_or(false, Fault::is_panic));
        assert_eq!(task.results(), &[Item::Value(1), Item::EndOfStream]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn starved_consumer_stays_ready() {
        let upstream: Pipe<u32> = Arc::new(Channel::unbounded());
        let mut consumer = Task::interruptible(coroutine::relay());
        consumer.set_stdin(upstream.clone());

        // priming step runs without input
        assert_eq!(consumer.run(), Quantum::Progressed);
        assert!(consumer.is_started());

        for _ in 0..100 {
            assert_eq!(consumer.run(), Quantum::Starved);
            assert!(consumer.is_ready());
            assert!(!consumer.is_done());
        }
        assert!(consumer.results().is_empty());

        upstream.put(Item::Value(7));
        assert_eq!(consumer.run(), Quantum::Progressed);
        assert_eq!(consumer.results(), &[Item::Value(7)]);

        upstream.put(Item::EndOfStream);
        assert_eq!(consumer.run(), Quantum::Finished);
        assert_eq!(consumer.results(), &[Item::Value(7), Item::EndOfStream]);
    }
}
