//! A minimal cooperative task scheduler.
//!
//! Tasks are driven one quantum at a time by a [`Scheduler`]. Step-resumable tasks can be
//! chained through [`Channel`]s so one task's output becomes another task's input.

#[macro_use(defer)]
extern crate scopeguard;

pub mod channel;
pub mod driver;
pub mod executor;
pub mod task;
mod utils;

pub use channel::Channel;
pub use executor::{current_task, Builder, Event, Scheduler, StopHandle, TaskId};
pub use task::{Coroutine, Fault, Item, Step, Task};
