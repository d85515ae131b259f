//! Single-producer/single-consumer FIFO channels connecting tasks.
//!
//! One side is usually a task's output, written from inside the scheduler. The other side is
//! either another task (which only ever reads without blocking) or an external consumer which
//! may block until a value shows up, possibly from another thread.

use std::time::Duration;

use crossbeam::channel::{
    self, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError,
};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GetError {
    /// No value available right now.
    #[error("channel is empty")]
    Empty,

    /// No value arrived before the deadline.
    #[error("timed out waiting for a value")]
    Timeout,
}

#[derive(PartialEq, Eq, thiserror::Error)]
pub enum PutError<T> {
    /// The channel is bounded and at capacity. The value is handed back.
    #[error("channel is full")]
    Full(T),
}

impl<T> std::fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PutError::Full(_) => f.write_str("Full(..)"),
        }
    }
}

impl<T> PutError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PutError::Full(v) => v,
        }
    }
}

/// Both endpoints live in the channel, so it can never disconnect while it is reachable.
#[derive(Debug)]
pub struct Channel<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> Channel<T> {
    pub fn unbounded() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Creates a channel holding at most `capacity` values.
    ///
    /// # Panics
    ///
    /// If `capacity` is zero.
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "Channel capacity cannot be set to 0");
        let (tx, rx) = channel::bounded(capacity);
        Self { tx, rx }
    }

    /// `None` for unbounded channels.
    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Appends `value` at the tail.
    ///
    /// Never blocks on an unbounded channel. A bounded channel blocks until the consumer makes
    /// room.
    pub fn put(&self, value: T) {
        // only fails once the receiver is gone, and it lives in `self`
        let _ = self.tx.send(value);
    }

    /// Appends `value` at the tail, failing instead of blocking when the channel is full.
    pub fn try_put(&self, value: T) -> Result<(), PutError<T>> {
        self.tx.try_send(value).map_err(|err| match err {
            TrySendError::Full(v) | TrySendError::Disconnected(v) => PutError::Full(v),
        })
    }

    /// Removes the head of the queue.
    ///
    /// With `block` set, waits until a value is available; this never returns an error. Without
    /// it, returns [`GetError::Empty`] right away when there is nothing to take, leaving the
    /// channel untouched.
    ///
    /// Blocking is meant for consumers outside the scheduler. A task blocking here would stall
    /// every other task.
    pub fn get(&self, block: bool) -> Result<T, GetError> {
        if block {
            self.rx.recv().map_err(|_| GetError::Empty)
        } else {
            self.try_get()
        }
    }

    pub fn try_get(&self) -> Result<T, GetError> {
        self.rx.try_recv().map_err(|err| match err {
            TryRecvError::Empty | TryRecvError::Disconnected => GetError::Empty,
        })
    }

    /// Like a blocking [`get`](Self::get), but gives up after `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, GetError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected => GetError::Timeout,
        })
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    #[test]
    fn fifo_order() {
        let ch = Channel::unbounded();
        for i in 0..5 {
            ch.put(i);
        }
        assert_eq!(ch.len(), 5);
        let got: Vec<_> = (0..5).map(|_| ch.get(false).unwrap()).collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
        assert!(ch.is_empty());
    }

    #[test]
    fn non_blocking_get_on_empty() {
        let ch = Channel::<u32>::unbounded();
        assert_eq!(ch.try_get(), Err(GetError::Empty));
        assert_eq!(ch.try_get(), Err(GetError::Empty));
        assert!(ch.is_empty());

        ch.put(9);
        assert_eq!(ch.try_get(), Ok(9));
    }

    #[test]
    fn blocking_get_waits_for_producer() {
        let ch = Arc::new(Channel::unbounded());
        let producer = {
            let ch = ch.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                ch.put("late");
            })
        };
        assert_eq!(ch.get(true), Ok("late"));
        producer.join().unwrap();
    }

    #[test]
    fn get_timeout_expires() {
        let ch = Channel::<u8>::unbounded();
        assert_eq!(
            ch.get_timeout(Duration::from_millis(10)),
            Err(GetError::Timeout)
        );
        ch.put(1);
        assert_eq!(ch.get_timeout(Duration::from_millis(10)), Ok(1));
    }

    #[test]
    fn bounded_try_put_fails_when_full() {
        let ch = Channel::bounded(2);
        assert_eq!(ch.capacity(), Some(2));
        ch.try_put(1).unwrap();
        ch.try_put(2).unwrap();
        let err = ch.try_put(3).unwrap_err();
        assert_eq!(err.into_inner(), 3);
        assert_eq!(ch.try_get(), Ok(1));
        ch.try_put(3).unwrap();
    }

    #[test]
    fn bounded_put_blocks_until_drained() {
        let ch = Arc::new(Channel::bounded(1));
        ch.put(0);
        let producer = {
            let ch = ch.clone();
            thread::spawn(move || {
                for i in 1..4 {
                    ch.put(i);
                }
            })
        };
        let got: Vec<_> = (0..4).map(|_| ch.get(true).unwrap()).collect();
        producer.join().unwrap();
        assert_eq!(got, vec![0, 1, 2, 3]);
    }

    #[test]
    fn shared_across_threads() {
        fn is_send_sync<T: Send + Sync>() {}
        is_send_sync::<Channel<u64>>();

        let ch = Arc::new(Channel::unbounded());
        assert_eq!(ch.capacity(), None);
        let producers: Vec<_> = (0..4)
            .map(|n| {
                let ch = ch.clone();
                thread::spawn(move || ch.put(n))
            })
            .collect();
        let mut got: Vec<_> = (0..4).map(|_| ch.get(true).unwrap()).collect();
        for p in producers {
            p.join().unwrap();
        }
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3]);
        assert_eq!(ch.get_timeout(Duration::from_millis(5)), Err(GetError::Timeout));
    }

    #[test]
    #[should_panic(expected = "Channel capacity cannot be set to 0")]
    fn zero_capacity_panics() {
        let _ = Channel::<()>::bounded(0);
    }
}
