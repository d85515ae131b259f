use slotmap::new_key_type;

mod builder;
mod event;
#[allow(clippy::module_inception)]
mod executor;

pub use builder::Builder;
pub use event::Event;
pub use executor::{current_scheduler, current_task, Scheduler, StopHandle};

new_key_type! {
    /// Stable handle of a task inside its scheduler.
    pub struct TaskId;
}
