use core::fmt;

/// Set if the task is eligible to be picked for its next quantum.
///
/// Cleared for the duration of a quantum. Can't be set once the task is done.
const READY: u8 = 1 << 0;

/// Set once the task reached a terminal outcome, either normally or with a fault.
///
/// Once set can't be unset.
const DONE: u8 = 1 << 1;

/// Set the first time the task's body is entered.
///
/// Distinguishes a task that has never run from one that is suspended mid-way.
const STARTED: u8 = 1 << 2;

/// State a task is initialized with
const INITIAL_STATE: u8 = READY;

#[must_use]
pub(super) enum TransitionToRunning {
    /// The task is not ready, nothing to do.
    NotReady,

    /// The task may run. `started` tells whether it has been entered before.
    Running { started: bool },
}

/// Current state value
#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) struct Snapshot(u8);

impl Snapshot {
    pub(crate) fn is_ready(self) -> bool {
        self.0 & READY == READY
    }

    fn set_ready(&mut self) {
        self.0 |= READY
    }

    fn unset_ready(&mut self) {
        self.0 &= !READY
    }

    pub(crate) fn is_done(self) -> bool {
        self.0 & DONE == DONE
    }

    fn set_done(&mut self) {
        self.0 |= DONE
    }

    pub(crate) fn is_started(self) -> bool {
        self.0 & STARTED == STARTED
    }

    fn set_started(&mut self) {
        self.0 |= STARTED
    }

    pub(crate) fn to_compact_string(self) -> String {
        format!(
            "r:{}|s:{}|d:{}",
            self.is_ready() as i32,
            self.is_started() as i32,
            self.is_done() as i32,
        )
    }
}

pub(crate) struct State(u8);

impl State {
    pub(crate) fn new() -> Self {
        State(INITIAL_STATE)
    }

    // Loads the current state into a new Snapshot
    pub(crate) fn load(&self) -> Snapshot {
        Snapshot(self.0)
    }

    // Sets the current state to a Snapshot
    fn store(&mut self, val: Snapshot) {
        debug_assert!(
            !(val.is_ready() && val.is_done()),
            "a task can't be both ready and done"
        );
        debug_assert!(
            !self.load().is_done() || val.is_done(),
            "a done task can't be revived"
        );
        self.0 = val.0
    }

    /// Takes the task out of the ready set for the duration of a quantum.
    pub(super) fn transition_to_running(&mut self) -> TransitionToRunning {
        let mut snapshot = self.load();
        if !snapshot.is_ready() {
            return TransitionToRunning::NotReady;
        }
        debug_assert!(!snapshot.is_done());

        snapshot.unset_ready();
        self.store(snapshot);
        TransitionToRunning::Running {
            started: snapshot.is_started(),
        }
    }

    pub(super) fn set_started(&mut self) {
        let mut snapshot = self.load();
        snapshot.set_started();
        self.store(snapshot);
    }

    /// Puts a running task back into the ready set after a non-terminal quantum.
    pub(super) fn transition_to_idle(&mut self) {
        let mut snapshot = self.load();
        debug_assert!(!snapshot.is_done());
        snapshot.set_ready();
        self.store(snapshot);
    }

    /// Marks the task terminal.
    pub(super) fn transition_to_done(&mut self) {
        let mut snapshot = self.load();
        snapshot.unset_ready();
        snapshot.set_done();
        self.store(snapshot);
    }

    pub(crate) fn to_compact_string(&self) -> String {
        self.load().to_compact_string()
    }
}

impl fmt::Debug for State {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.load();
        snapshot.fmt(fmt)
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Snapshot")
            .field("is_ready", &self.is_ready())
            .field("is_started", &self.is_started())
            .field("is_done", &self.is_done())
            .finish()
    }
}
