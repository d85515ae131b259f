//! Host preemption sources.
//!
//! A preemption source fires periodically, independent of the scheduler's main loop. Firing does
//! not interrupt anything: expirations accumulate in the source until the scheduler drains them
//! between two quanta, so every quantum, whether triggered by the loop or by the timer, runs
//! strictly one at a time.

use std::{io, time::Duration};

mod timer;

pub use timer::Timer;

pub trait PreemptionSource {
    /// Starts firing every `interval`.
    fn arm(&mut self, interval: Duration) -> io::Result<()>;

    /// Stops firing. Pending expirations are discarded.
    fn disarm(&mut self) -> io::Result<()>;

    /// Returns how many times the source fired since the last call, without blocking.
    fn drain(&mut self) -> io::Result<u64>;
}

impl<P: PreemptionSource + ?Sized> PreemptionSource for Box<P> {
    fn arm(&mut self, interval: Duration) -> io::Result<()> {
        (**self).arm(interval)
    }

    fn disarm(&mut self) -> io::Result<()> {
        (**self).disarm()
    }

    fn drain(&mut self) -> io::Result<u64> {
        (**self).drain()
    }
}
