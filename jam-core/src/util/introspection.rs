use std::fmt::Debug;

/// Snapshots the hidden state of an implementor, so tests can assert on what it was asked to do.
pub trait Introspect<T: Debug> {
    fn introspect(&self) -> T;
}
