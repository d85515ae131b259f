use std::fmt;

/// A single element of a task's output stream.
///
/// `EndOfStream` is its own variant rather than a reserved payload value, so it can never be
/// confused with anything a task legitimately produces. Once a task pushes `EndOfStream` into its
/// output channel, nothing else follows it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Item<T> {
    Value(T),
    EndOfStream,
}

impl<T> Item<T> {
    pub fn is_end(&self) -> bool {
        matches!(self, Item::EndOfStream)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Item::Value(v) => Some(v),
            Item::EndOfStream => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Item::Value(v) => Some(v),
            Item::EndOfStream => None,
        }
    }
}

impl<T> From<T> for Item<T> {
    fn from(value: T) -> Self {
        Item::Value(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Item<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Value(v) => v.fmt(f),
            Item::EndOfStream => f.write_str("EOF"),
        }
    }
}
