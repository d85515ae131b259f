pub mod coroutine;
pub mod debugging;
mod fault;
mod item;
mod state;
mod task_impl;

pub use coroutine::{Coroutine, Step};
pub use fault::{BoxError, Fault};
pub use item::Item;
pub use task_impl::{Pipe, Quantum, Task};

/// Mark context for task operation
macro_rules! dbg_context {
    ($id:expr, $state:expr, $name:tt, $($body:tt)*) => {{
        let entered = $crate::task::debugging::TaskDebugger::enter($id, $state, $name);

        defer! {
            if entered {
                $crate::task::debugging::TaskDebugger::leave();
            }
        }

        $($body)*
    }};
}

pub(crate) use dbg_context;
