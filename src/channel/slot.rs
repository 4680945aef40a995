//! Last-write-wins hand-off slot.

use parking_lot::Mutex;

/// Holds at most one pending value. Submitting replaces whatever is pending;
/// taking empties the slot. Neither side ever waits on the other beyond the
/// few instructions it takes to swap an `Option`.
#[derive(Debug)]
pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    /// Store `value`, returning the superseded one if it was never taken.
    pub fn submit(&self, value: T) -> Option<T> {
        self.value.lock().replace(value)
    }

    /// Take the pending value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.value.lock().take()
    }

    pub fn is_pending(&self) -> bool {
        self.value.lock().is_some()
    }

    pub fn clear(&self) {
        self.value.lock().take();
    }
}

impl<T: Clone> LatestSlot<T> {
    /// Copy of the pending value without consuming it
    pub fn peek(&self) -> Option<T> {
        self.value.lock().clone()
    }
}
