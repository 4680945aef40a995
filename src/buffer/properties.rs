//! Buffer index state.
//!
//! [`BufferProperties`] is the single index model shared by every variable
//! array in the ring buffer. It is `Copy` so the scheduler can hand out
//! snapshots freely; only the scheduler thread mutates the live instance.
//!
//! Every setter returns `true` when the state actually changed. Out-of-range
//! input is rejected by returning `false`, which callers use to decide
//! whether a republish is warranted.

use super::tools::{compute_sub_length, compute_to_index, is_inside_bounds};
use serde::{Deserialize, Serialize};

/// Snapshot of the ring buffer's size and window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferProperties {
    size: usize,
    current_index: usize,
    in_point: usize,
    out_point: usize,
    active_buffer_length: usize,
}

impl BufferProperties {
    /// Fresh properties with every index at zero. `size` is raised to 1 if zero.
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            current_index: 0,
            in_point: 0,
            out_point: 0,
            active_buffer_length: 1,
        }
    }

    /// Build properties from explicit indices, rejecting any index `>= size`.
    pub fn from_parts(
        size: usize,
        current_index: usize,
        in_point: usize,
        out_point: usize,
    ) -> Option<Self> {
        if size == 0 || current_index >= size || in_point >= size || out_point >= size {
            return None;
        }
        let mut props = Self {
            size,
            current_index,
            in_point,
            out_point,
            active_buffer_length: 1,
        };
        props.update_active_length();
        Some(props)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[inline]
    pub fn in_point(&self) -> usize {
        self.in_point
    }

    #[inline]
    pub fn out_point(&self) -> usize {
        self.out_point
    }

    /// Length of `[in_point, out_point]` measured forward, wrapping
    #[inline]
    pub fn active_buffer_length(&self) -> usize {
        self.active_buffer_length
    }

    /// Whether `index` lies inside the active window
    pub fn is_in_active_window(&self, index: usize) -> bool {
        is_inside_bounds(index, self.in_point, self.out_point, self.size)
    }

    fn update_active_length(&mut self) {
        self.active_buffer_length =
            compute_sub_length(self.in_point, self.out_point, self.size).unwrap_or(1);
    }

    /// Move the current index forward by `step`.
    ///
    /// With `wrap` the index wraps modulo `size`, otherwise it clamps at `size - 1`.
    pub fn increment(&mut self, wrap: bool, step: usize) -> bool {
        let previous = self.current_index;
        self.current_index = if wrap {
            (self.current_index + step % self.size) % self.size
        } else {
            self.current_index.saturating_add(step).min(self.size - 1)
        };
        previous != self.current_index
    }

    /// Move the current index backward by `step`, clamping at 0.
    pub fn decrement(&mut self, step: usize) -> bool {
        let previous = self.current_index;
        self.current_index = self.current_index.saturating_sub(step);
        previous != self.current_index
    }

    pub fn set_current_index(&mut self, index: usize) -> bool {
        if index >= self.size || index == self.current_index {
            return false;
        }
        self.current_index = index;
        true
    }

    pub fn set_in_point(&mut self, index: usize) -> bool {
        if index >= self.size || index == self.in_point {
            return false;
        }
        self.in_point = index;
        self.update_active_length();
        true
    }

    pub fn set_out_point(&mut self, index: usize) -> bool {
        if index >= self.size || index == self.out_point {
            return false;
        }
        self.out_point = index;
        self.update_active_length();
        true
    }

    /// Advance while recording: the out-point follows the current index and
    /// the in-point is pushed forward once the buffer is full.
    pub fn advance_recording(&mut self) {
        self.increment(true, 1);
        self.out_point = self.current_index;
        if self.in_point == self.current_index {
            self.in_point = (self.in_point + 1) % self.size;
        }
        self.update_active_length();
    }

    /// Step forward inside `[in_point, out_point]`; passing the out-point
    /// restarts at the in-point.
    pub fn step_within_window(&mut self, step: usize) -> bool {
        let previous = self.current_index;
        self.current_index = match self.window_offset() {
            Some(offset) if offset + step < self.active_buffer_length => {
                compute_to_index(self.in_point, offset + step + 1, self.size)
                    .unwrap_or(self.in_point)
            }
            _ => self.in_point,
        };
        previous != self.current_index
    }

    /// Step backward inside `[in_point, out_point]`; passing the in-point
    /// restarts at the out-point.
    pub fn step_back_within_window(&mut self, step: usize) -> bool {
        let previous = self.current_index;
        self.current_index = match self.window_offset() {
            Some(offset) if offset >= step => {
                compute_to_index(self.in_point, offset - step + 1, self.size)
                    .unwrap_or(self.out_point)
            }
            _ => self.out_point,
        };
        previous != self.current_index
    }

    /// Offset of the current index from the in-point, if inside the window
    fn window_offset(&self) -> Option<usize> {
        if self.is_in_active_window(self.current_index) {
            compute_sub_length(self.in_point, self.current_index, self.size).map(|l| l - 1)
        } else {
            None
        }
    }

    /// Replace every field at once after a structural change of the arrays.
    pub(crate) fn reset(&mut self, size: usize, current_index: usize, in_point: usize, out_point: usize) {
        if let Some(props) = Self::from_parts(size, current_index, in_point, out_point) {
            *self = props;
        }
    }
}

impl Default for BufferProperties {
    fn default() -> Self {
        Self::new(1)
    }
}
