//! Identity types for the session core.
//!
//! `VarId` is a direct index into the variable registry and the ring
//! buffer's per-variable arrays. `CallerId` names an observer attached to a
//! linked channel; it is chosen by the consumer. `ListenerId` is returned
//! when a session listener is added and removes it again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Index into `VariableRegistry` and `RingBufferStore` arrays.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl VarId {
    pub const INVALID: VarId = VarId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "VarId(INVALID)")
        } else {
            write!(f, "VarId({})", self.0)
        }
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Observer identity for a linked channel mailbox.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerId(pub u64);

static NEXT_CALLER_ID: AtomicU64 = AtomicU64::new(1);

impl CallerId {
    /// Allocate a process-unique caller id.
    pub fn next() -> Self {
        CallerId(NEXT_CALLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallerId({})", self.0)
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Handle for removing a session listener.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
    pub fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}
