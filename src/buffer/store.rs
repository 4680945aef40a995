//! Ring buffer storage for variable history.
//!
//! [`RingBufferStore`] keeps one contiguous `Vec<f64>` per registered
//! variable. All arrays share the same size and the same [`BufferProperties`],
//! so every index move applies to every variable in lock-step.
//!
//! The store is plain data: it has no locks and is owned by the scheduler
//! thread. Consumers only ever see [`BufferSample`] copies.

use super::properties::BufferProperties;
use super::request::{CropBufferRequest, FillBufferRequest};
use super::sample::BufferSample;
use super::tools::{compute_from_index, compute_sub_length, is_inside_bounds, ring_array_copy};
use crate::id::VarId;
use crate::variables::VariableRegistry;

/// Per-variable circular history with shared index state
#[derive(Debug, Clone)]
pub struct RingBufferStore {
    properties: BufferProperties,
    buffers: Vec<Vec<f64>>,
}

impl RingBufferStore {
    /// Create a store with `variable_count` zeroed arrays of `size` samples.
    pub fn new(size: usize, variable_count: usize) -> Self {
        let properties = BufferProperties::new(size);
        Self {
            buffers: vec![vec![0.0; properties.size()]; variable_count],
            properties,
        }
    }

    /// Create a store sized for every variable in `registry`.
    pub fn for_registry(registry: &VariableRegistry, size: usize) -> Self {
        Self::new(size, registry.len())
    }

    #[inline]
    pub fn properties(&self) -> &BufferProperties {
        &self.properties
    }

    /// Index state; moving indices never touches the arrays.
    #[inline]
    pub fn properties_mut(&mut self) -> &mut BufferProperties {
        &mut self.properties
    }

    pub fn variable_count(&self) -> usize {
        self.buffers.len()
    }

    /// Raw history of one variable
    pub fn values(&self, var: VarId) -> Option<&[f64]> {
        self.buffers.get(var.index()).map(Vec::as_slice)
    }

    /// Store every live value at the current index.
    pub fn write_buffer(&mut self, registry: &VariableRegistry) {
        let index = self.properties.current_index();
        for (buffer, value) in self.buffers.iter_mut().zip(registry.values()) {
            buffer[index] = *value;
        }
    }

    /// Load every value at the current index into the live registry.
    pub fn read_buffer(&self, registry: &mut VariableRegistry) {
        let index = self.properties.current_index();
        for (value, buffer) in registry.values_mut().iter_mut().zip(&self.buffers) {
            *value = buffer[index];
        }
    }

    /// Store one value at the current index.
    pub fn write_value(&mut self, var: VarId, value: f64) -> bool {
        let index = self.properties.current_index();
        match self.buffers.get_mut(var.index()) {
            Some(buffer) => {
                buffer[index] = value;
                true
            }
            None => false,
        }
    }

    /// Value of `var` at `index`
    pub fn read_value(&self, var: VarId, index: usize) -> Option<f64> {
        self.buffers.get(var.index())?.get(index).copied()
    }

    /// Copy `length` samples of `var` starting at `from`, wrapping.
    pub fn copy(&self, var: VarId, from: usize, length: usize) -> Option<BufferSample> {
        let buffer = self.buffers.get(var.index())?;
        if length == 0 || length > buffer.len() || from >= buffer.len() {
            return None;
        }
        let values = ring_array_copy(buffer, from, length);
        BufferSample::new(var, from, values, self.properties)
    }

    fn reallocate(&mut self, start: usize, new_size: usize) {
        for buffer in &mut self.buffers {
            *buffer = ring_array_copy(buffer, start, new_size);
        }
    }

    /// Reallocate every array to `new_size`, keeping as much of the active
    /// window as fits. Data nearest the out-point wins when shrinking.
    ///
    /// Returns false for a zero or unchanged size.
    pub fn resize(&mut self, new_size: usize) -> bool {
        let old = self.properties;
        let old_size = old.size();
        if new_size == 0 || new_size == old_size {
            return false;
        }

        let active = old.active_buffer_length();
        let (start, in_point, out_point, current) = if new_size < active {
            let start = compute_from_index(old.out_point(), new_size, old_size).unwrap_or(0);
            let out_point = new_size - 1;
            let current = if is_inside_bounds(old.current_index(), start, old.out_point(), old_size) {
                let from_end = compute_sub_length(old.current_index(), old.out_point(), old_size)
                    .unwrap_or(1);
                out_point + 1 - from_end
            } else {
                out_point
            };
            (start, 0, out_point, current)
        } else {
            let out_point = active - 1;
            let current = if old.is_in_active_window(old.current_index()) {
                compute_sub_length(old.in_point(), old.current_index(), old_size).unwrap_or(1) - 1
            } else {
                out_point
            };
            (old.in_point(), 0, out_point, current)
        };

        self.reallocate(start, new_size);
        self.properties.reset(new_size, current, in_point, out_point);
        tracing::debug!(
            old_size,
            new_size,
            current,
            out_point,
            "ring buffer resized"
        );
        true
    }

    /// Keep only `[request.from, request.to]`; the buffer shrinks to exactly
    /// that window and every index resets to cover it.
    pub fn crop(&mut self, request: &CropBufferRequest) -> bool {
        let Some(new_size) = request.cropped_size(self.properties.size()) else {
            tracing::warn!(?request, size = self.properties.size(), "rejected crop request");
            return false;
        };
        self.reallocate(request.from, new_size);
        self.properties.reset(new_size, 0, 0, new_size - 1);
        tracing::debug!(from = request.from, to = request.to, new_size, "ring buffer cropped");
        true
    }

    /// Overwrite `[request.from, request.to]` with zeros or each variable's live value.
    pub fn fill(&mut self, request: &FillBufferRequest, registry: &VariableRegistry) -> bool {
        let size = self.properties.size();
        let Some(length) = request.filled_size(size) else {
            tracing::warn!(?request, size, "rejected fill request");
            return false;
        };
        for (buffer, live) in self.buffers.iter_mut().zip(registry.values()) {
            let value = if request.zero_fill { 0.0 } else { *live };
            for offset in 0..length {
                buffer[(request.from + offset) % size] = value;
            }
        }
        true
    }
}
