//! Immutable buffer snapshots handed to consumers.

use super::properties::BufferProperties;
use super::tools::{compute_sub_length, is_inside_bounds};
use crate::id::VarId;

/// Values of one variable over the inclusive circular range `[from, to]`,
/// in logical order, together with the properties valid at capture time.
///
/// `values.len()` always equals the circular length of `[from, to]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSample {
    variable: VarId,
    from: usize,
    to: usize,
    values: Vec<f64>,
    properties: BufferProperties,
}

impl BufferSample {
    /// Build a sample, rejecting inconsistent ranges.
    pub fn new(
        variable: VarId,
        from: usize,
        values: Vec<f64>,
        properties: BufferProperties,
    ) -> Option<Self> {
        let size = properties.size();
        if values.is_empty() || values.len() > size || from >= size {
            return None;
        }
        let to = (from + values.len() - 1) % size;
        Some(Self {
            variable,
            from,
            to,
            values,
            properties,
        })
    }

    #[inline]
    pub fn variable(&self) -> VarId {
        self.variable
    }

    #[inline]
    pub fn from(&self) -> usize {
        self.from
    }

    #[inline]
    pub fn to(&self) -> usize {
        self.to
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn properties(&self) -> &BufferProperties {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the buffer index `index` is covered by this sample
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        is_inside_bounds(index, self.from, self.to, self.properties.size())
    }

    /// Value captured for buffer index `index`, if covered
    pub fn value_at(&self, index: usize) -> Option<f64> {
        if !self.contains(index) {
            return None;
        }
        let offset = compute_sub_length(self.from, index, self.properties.size())? - 1;
        self.values.get(offset).copied()
    }
}
