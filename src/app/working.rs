// SPDX-License-Identifier: MIT

use std::fmt;

type Change<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Mutable state bound to one unit of work.
///
/// Changes can be applied immediately through `value_mut`, or staged and
/// applied in order by `flush_changes`.
pub struct WorkingState<S> {
    value: S,
    pending: Vec<Change<S>>,
}

impl<S> WorkingState<S> {
    pub fn new(value: S) -> Self {
        Self {
            value,
            pending: Vec::new(),
        }
    }

    pub fn value(&self) -> &S {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut S {
        &mut self.value
    }

    /// Queue a change for the next flush
    pub fn stage<F>(&mut self, change: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.pending.push(Box::new(change));
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Apply staged changes in the order they were queued
    pub fn flush_changes(&mut self) {
        for change in self.pending.drain(..) {
            change(&mut self.value);
        }
    }

    /// Flush and release the state
    pub fn into_inner(mut self) -> S {
        self.flush_changes();
        self.value
    }
}

impl<S: fmt::Debug> fmt::Debug for WorkingState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkingState")
            .field("value", &self.value)
            .field("pending", &self.pending.len())
            .finish()
    }
}
