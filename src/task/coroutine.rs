//! Resumable computations driven one step at a time.
//!
//! A [`Coroutine`] is an explicit state machine: every call to [`Coroutine::resume`] advances it
//! to its next suspension point and reports what happened there. The saved state lives in the
//! implementing type, so nothing depends on language-level suspension.
//!
//! The first call to `resume` receives `None`. A coroutine attached to an input channel then
//! receives every item read from that channel, including the final [`Item::EndOfStream`].

use std::fmt;

use super::{fault::BoxError, Item};

/// Outcome of a single [`Coroutine::resume`] call.
pub enum Step<T> {
    /// Produced a value and suspended. More steps may follow.
    Yielded(T),

    /// Suspended without producing anything, e.g. a consumer priming itself before its first
    /// input arrives.
    Suspended,

    /// Ran out of values. Terminal.
    Exhausted,

    /// Failed. Terminal.
    Faulted(BoxError),
}

impl<T: fmt::Debug> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Yielded(v) => f.debug_tuple("Yielded").field(v).finish(),
            Step::Suspended => f.write_str("Suspended"),
            Step::Exhausted => f.write_str("Exhausted"),
            Step::Faulted(e) => f.debug_tuple("Faulted").field(&e.to_string()).finish(),
        }
    }
}

pub trait Coroutine<T> {
    /// Advance to the next suspension point.
    ///
    /// Must not be called again after returning [`Step::Exhausted`] or [`Step::Faulted`].
    fn resume(&mut self, input: Option<Item<T>>) -> Step<T>;
}

impl<T, C> Coroutine<T> for Box<C>
where
    C: Coroutine<T> + ?Sized,
{
    fn resume(&mut self, input: Option<Item<T>>) -> Step<T> {
        (**self).resume(input)
    }
}

/// Coroutine yielding the elements of an iterator. Input is ignored.
#[derive(Debug)]
pub struct Iter<I> {
    iter: I,
}

pub fn from_iter<I: IntoIterator>(iter: I) -> Iter<I::IntoIter> {
    Iter {
        iter: iter.into_iter(),
    }
}

impl<T, I> Coroutine<T> for Iter<I>
where
    I: Iterator<Item = T>,
{
    fn resume(&mut self, _input: Option<Item<T>>) -> Step<T> {
        match self.iter.next() {
            Some(v) => Step::Yielded(v),
            None => Step::Exhausted,
        }
    }
}

/// Coroutine yielding `Ok` values of an iterator and faulting on the first `Err`.
#[derive(Debug)]
pub struct TryIter<I> {
    iter: I,
}

pub fn try_from_iter<I: IntoIterator>(iter: I) -> TryIter<I::IntoIter> {
    TryIter {
        iter: iter.into_iter(),
    }
}

impl<T, E, I> Coroutine<T> for TryIter<I>
where
    I: Iterator<Item = Result<T, E>>,
    E: Into<BoxError>,
{
    fn resume(&mut self, _input: Option<Item<T>>) -> Step<T> {
        match self.iter.next() {
            Some(Ok(v)) => Step::Yielded(v),
            Some(Err(e)) => Step::Faulted(e.into()),
            None => Step::Exhausted,
        }
    }
}

/// Coroutine backed by a closure holding its own state.
pub struct FromFn<F> {
    f: F,
}

pub fn from_fn<T, F>(f: F) -> FromFn<F>
where
    F: FnMut(Option<Item<T>>) -> Step<T>,
{
    FromFn { f }
}

impl<T, F> Coroutine<T> for FromFn<F>
where
    F: FnMut(Option<Item<T>>) -> Step<T>,
{
    fn resume(&mut self, input: Option<Item<T>>) -> Step<T> {
        (self.f)(input)
    }
}

/// Consumer that forwards every value it receives and finishes on [`Item::EndOfStream`].
pub fn relay<T>() -> FromFn<impl FnMut(Option<Item<T>>) -> Step<T>> {
    from_fn(|input: Option<Item<T>>| match input {
        None => Step::Suspended,
        Some(Item::Value(v)) => Step::Yielded(v),
        Some(Item::EndOfStream) => Step::Exhausted,
    })
}
