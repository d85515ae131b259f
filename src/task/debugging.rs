use std::{cell::RefCell, collections::HashMap, time::Instant};

use crate::executor::TaskId;

thread_local! {
    static DEBUGGER: RefCell<Option<TaskDebugger>> = RefCell::new(None)
}

/// Per-thread tracer for selected tasks.
///
/// Tasks passing the filter (by default: those carrying a label) get every scheduler operation
/// performed on them logged at debug level, together with their state and the stack of enclosing
/// operation contexts.
pub struct TaskDebugger {
    registry: HashMap<TaskId, TaskInfo>,
    filter: fn(Option<&'static str>) -> bool,
    task_count: usize,
    context: Vec<&'static str>,
}

#[derive(Debug)]
struct TaskInfo {
    id: TaskId,
    label: Option<&'static str>,
    ts: Instant,
}

fn has_label(label: Option<&'static str>) -> bool {
    label.is_some()
}

impl TaskInfo {
    fn new(id: TaskId, label: Option<&'static str>) -> Self {
        Self {
            id,
            label,
            ts: Instant::now(),
        }
    }
}

impl TaskDebugger {
    fn with<F, R>(f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        DEBUGGER.with(|dbg| {
            let mut dbg = dbg.borrow_mut();
            let dbg = dbg.get_or_insert_with(|| TaskDebugger {
                registry: HashMap::new(),
                filter: has_label,
                task_count: 0,
                context: Vec::new(),
            });
            f(dbg)
        })
    }

    /// Only tasks registered after this call are affected.
    pub fn set_filter(filter: fn(Option<&'static str>) -> bool) {
        Self::with(|dbg| {
            dbg.filter = filter;
        });
    }

    pub fn debug_aged_tasks(older_than: std::time::Duration) {
        Self::with(|dbg| {
            let mut count = 0;
            for v in dbg.registry.values() {
                let age = v.ts.elapsed();
                if age > older_than {
                    count += 1;
                    dbg.debug_task_info(v, "-", format!("age: {:?}", age).as_str())
                }
            }
            if count > 0 {
                log::debug!("found {} tasks older than {:?}", count, older_than)
            }
        })
    }

    /// Number of tasks registered on this thread, traced or not.
    pub fn task_count() -> usize {
        Self::with(|dbg| dbg.task_count)
    }

    pub(crate) fn register(id: TaskId, label: Option<&'static str>) -> bool {
        Self::with(|dbg| {
            dbg.task_count += 1;
            if (dbg.filter)(label) {
                dbg.registry.insert(id, TaskInfo::new(id, label));
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn unregister(id: TaskId) {
        Self::with(|dbg| {
            dbg.task_count = dbg.task_count.saturating_sub(1);
            dbg.registry.remove(&id);
        });
    }

    pub(crate) fn leave() {
        Self::with(|dbg| {
            dbg.context.pop();
        });
    }

    pub(crate) fn enter(id: TaskId, state: &str, ctx: &'static str) -> bool {
        Self::with(|dbg| {
            if let Some(info) = dbg.registry.get(&id) {
                dbg.context.push(ctx);
                dbg.debug_task_info(info, state, "");
                true
            } else {
                false
            }
        })
    }

    fn debug_task_info(&self, info: &TaskInfo, state: &str, msg: &str) {
        log::debug!(
            "[{:?}][{}][label:{}][{}]{}",
            info.id,
            state,
            info.label.unwrap_or(""),
            self.context.join("|"),
            msg
        )
    }
}
