//! Strategy capability

use common::{Bar, Signal};

/// Strategy trait that users must implement.
///
/// Called once per bar in timestamp order. Any state the strategy keeps
/// between calls must be owned by the implementation so a fresh instance
/// replays deterministically.
pub trait Strategy: Send {
    /// Signal for `bar`, or `None` to stay put.
    ///
    /// # Errors
    ///
    /// An error aborts the whole run.
    fn analyze(&mut self, bar: &Bar) -> anyhow::Result<Option<Signal>>;
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn analyze(&mut self, bar: &Bar) -> anyhow::Result<Option<Signal>> {
        (**self).analyze(bar)
    }
}

impl<S: Strategy + ?Sized> Strategy for &mut S {
    fn analyze(&mut self, bar: &Bar) -> anyhow::Result<Option<Signal>> {
        (**self).analyze(bar)
    }
}
