use std::time::Duration;

use crate::driver::PreemptionSource;

use super::{
    event::{Event, EventHook},
    Scheduler,
};

/// How often the preemption source fires by default.
const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// How long the loop sleeps after a quantum that found its input empty.
const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(1);

pub struct Builder {
    /// Period of the preemption source. Zero disables preemption.
    pub(super) interval: Duration,

    /// Pause after a starved quantum. `None` busy-polls.
    pub(super) idle_backoff: Option<Duration>,

    /// Defaults to a [`Timer`](crate::driver::Timer), created when the run starts.
    pub(super) source: Option<Box<dyn PreemptionSource>>,

    pub(super) on_event: Option<EventHook>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            idle_backoff: Some(DEFAULT_IDLE_BACKOFF),
            source: None,
            on_event: None,
        }
    }

    /// Sets the preemption interval.
    ///
    /// The default is 500ms. Zero disables preemption.
    pub fn interval(&mut self, val: Duration) -> &mut Self {
        self.interval = val;
        self
    }

    /// Sets the preemption interval in seconds.
    ///
    /// # Panics
    ///
    /// If `secs` is negative, not finite, too large for a [`Duration`], or positive but below one
    /// nanosecond.
    pub fn interval_secs(&mut self, secs: f64) -> &mut Self {
        assert!(
            secs.is_finite() && secs >= 0.0,
            "Preemption interval must be a non-negative number of seconds"
        );
        let interval = match Duration::try_from_secs_f64(secs) {
            Ok(interval) => interval,
            Err(_) => panic!("Preemption interval of {}s overflows a Duration", secs),
        };
        // only an explicit zero disables preemption
        assert!(
            secs == 0.0 || !interval.is_zero(),
            "Preemption interval of {}s rounds down to zero",
            secs
        );
        self.interval(interval)
    }

    pub fn disable_preemption(&mut self) -> &mut Self {
        self.interval(Duration::ZERO)
    }

    /// Sets how long the scheduler sleeps after a quantum in which a task was waiting on an empty
    /// input channel. `None` makes the loop spin.
    ///
    /// The default is 1ms.
    pub fn idle_backoff(&mut self, val: Option<Duration>) -> &mut Self {
        self.idle_backoff = val;
        self
    }

    /// Replaces the default timer with another preemption source.
    pub fn preemption_source(&mut self, source: impl PreemptionSource + 'static) -> &mut Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Installs a hook receiving every [`Event`] in addition to the log output.
    pub fn on_event<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&Event<'_>) + 'static,
    {
        self.on_event = Some(Box::new(f));
        self
    }

    /// Creates the scheduler.
    ///
    /// The preemption source and event hook move into the scheduler; building again from the same
    /// builder yields a scheduler with the default timer and no hook.
    pub fn build<T: Clone + 'static>(&mut self) -> Scheduler<T> {
        Scheduler::from_builder(self)
    }
}
