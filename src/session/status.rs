//! Latest published session state, readable from any thread.

use super::types::{SessionMode, SessionProperties, SessionTiming};
use crate::buffer::BufferProperties;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Copy of everything the scheduler last published
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub mode: SessionMode,
    pub buffer: BufferProperties,
    pub session: SessionProperties,
    /// Bumped whenever recorded history is rewritten (crop, fill, resize)
    pub data_revision: u64,
    /// Ticks executed since the scheduler started
    pub tick_count: u64,
    pub initialized: bool,
}

/// Scheduler-written, reader-polled status cell
#[derive(Debug)]
pub struct SharedStatus {
    inner: RwLock<StatusSnapshot>,
}

impl SharedStatus {
    pub fn new(mode: SessionMode, buffer: BufferProperties, timing: &SessionTiming) -> Self {
        Self {
            inner: RwLock::new(StatusSnapshot {
                mode,
                buffer,
                session: timing.session_properties(mode),
                data_revision: 0,
                tick_count: 0,
                initialized: false,
            }),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        *self.inner.read()
    }

    pub fn mode(&self) -> SessionMode {
        self.inner.read().mode
    }

    pub fn buffer_properties(&self) -> BufferProperties {
        self.inner.read().buffer
    }

    pub fn session_properties(&self) -> SessionProperties {
        self.inner.read().session
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut StatusSnapshot)) {
        f(&mut self.inner.write());
    }
}
