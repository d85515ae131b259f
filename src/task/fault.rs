use std::any::Any;

/// Error type task bodies report failures with.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// A failure captured while advancing a task.
///
/// Faults never escape the task that raised them: they are stored on the task, reported by the
/// scheduler and the task becomes terminal.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    /// The body returned an error.
    #[error("{0}")]
    Error(BoxError),

    /// The body panicked.
    #[error("panicked: {0}")]
    Panic(String),
}

impl Fault {
    pub fn error(err: impl Into<BoxError>) -> Self {
        Fault::Error(err.into())
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Fault::Panic(msg)
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Fault::Panic(_))
    }
}

#[cfg(test)]
mod test {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::Fault;

    #[test]
    fn panic_payload_message() {
        let payload = catch_unwind(AssertUnwindSafe(|| panic!("bad {}", 7))).unwrap_err();
        let fault = Fault::from_panic(payload);
        assert!(fault.is_panic());
        assert_eq!(fault.to_string(), "panicked: bad 7");
    }

    #[test]
    fn error_display_is_the_source_message() {
        let fault = Fault::error("disk on fire");
        assert!(!fault.is_panic());
        assert_eq!(fault.to_string(), "disk on fire");
    }
}
