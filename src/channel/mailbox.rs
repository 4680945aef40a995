//! Per-caller single-slot mailboxes.
//!
//! Each registered caller owns exactly one slot. Delivering overwrites every
//! slot, so a caller that falls behind only ever finds the newest payload
//! and memory stays bounded by the number of callers.
//!
//! The newest payload is also kept for callers that register later. It is
//! stored under the same lock as the slots, so a caller registering while a
//! delivery is in flight is seeded with either the payload it would have
//! received or a newer one, never an older one.

use crate::id::CallerId;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug)]
struct Slots<T> {
    slots: HashMap<CallerId, Option<T>>,
    latest: Option<T>,
}

#[derive(Debug)]
pub struct CallerMailboxes<T> {
    inner: Mutex<Slots<T>>,
}

impl<T> Default for CallerMailboxes<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Slots {
                slots: HashMap::new(),
                latest: None,
            }),
        }
    }
}

impl<T: Clone> CallerMailboxes<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `caller`, seeding its slot with the latest payload. Re-registering
    /// keeps any payload that is already pending.
    pub fn register(&self, caller: CallerId) {
        let mut inner = self.inner.lock();
        let seed = inner.latest.clone();
        let slot = inner.slots.entry(caller).or_insert(None);
        if slot.is_none() {
            *slot = seed;
        }
    }

    /// Returns false if `caller` was not registered.
    pub fn remove(&self, caller: CallerId) -> bool {
        self.inner.lock().slots.remove(&caller).is_some()
    }

    /// Keep `payload` as the latest and overwrite every caller's slot with it.
    pub fn deliver(&self, payload: T) {
        let mut inner = self.inner.lock();
        for slot in inner.slots.values_mut() {
            *slot = Some(payload.clone());
        }
        inner.latest = Some(payload);
    }

    /// Take the pending payload for `caller`.
    pub fn take(&self, caller: CallerId) -> Option<T> {
        self.inner.lock().slots.get_mut(&caller).and_then(Option::take)
    }

    /// Last delivered payload
    pub fn latest(&self) -> Option<T> {
        self.inner.lock().latest.clone()
    }

    /// Drop the latest payload and everything pending.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.latest = None;
        for slot in inner.slots.values_mut() {
            *slot = None;
        }
    }

    /// Whether some caller has consumed its last payload and is waiting.
    pub fn has_awaiting(&self) -> bool {
        self.inner.lock().slots.values().any(Option::is_none)
    }

    pub fn is_registered(&self, caller: CallerId) -> bool {
        self.inner.lock().slots.contains_key(&caller)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().slots.is_empty()
    }
}
