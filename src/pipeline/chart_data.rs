//! Reconstruction of full buffer views from partial samples.
//!
//! A consumer typically asks only for what changed since its last update, so
//! each [`BufferSample`] covers part of the buffer. [`ChartData::reconstruct`]
//! merges the new sample over the previous full view and recomputes the
//! value range of the active window.

use crate::buffer::tools::is_inside_bounds;
use crate::buffer::{BufferProperties, BufferSample};
use crate::id::VarId;
use crate::types::IncrementalStats;

/// Full-length view of one variable's history, ready to render
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    variable: VarId,
    values: Vec<f64>,
    min: f64,
    max: f64,
    properties: BufferProperties,
    sample_range: Option<(usize, usize)>,
    resynced: bool,
}

impl ChartData {
    /// All-zero view for the given properties
    pub fn empty(properties: BufferProperties) -> Self {
        Self {
            variable: VarId::INVALID,
            values: vec![0.0; properties.size()],
            min: 0.0,
            max: 0.0,
            properties,
            sample_range: None,
            resynced: true,
        }
    }

    /// Merge `sample` over `previous`.
    ///
    /// Indices covered by the sample take the sampled value; the rest keep the
    /// previous view's value, or 0 when there is none. A previous view whose
    /// length differs from the sample's buffer size is discarded, since the
    /// buffer was resized or cropped in between. Non-finite values become 0.
    pub fn reconstruct(sample: &BufferSample, previous: Option<&ChartData>) -> Self {
        let properties = *sample.properties();
        let size = properties.size();
        let previous = previous.filter(|p| p.values.len() == size);
        let (from, to) = (sample.from(), sample.to());
        let sampled = sample.values();

        let values: Vec<f64> = (0..size)
            .map(|index| {
                let y = if from <= to {
                    if index >= from && index <= to {
                        sampled[index - from]
                    } else {
                        previous.map_or(0.0, |p| p.values[index])
                    }
                } else if index <= to {
                    sampled[index + size - from]
                } else if index >= from {
                    sampled[index - from]
                } else {
                    previous.map_or(0.0, |p| p.values[index])
                };
                if y.is_finite() {
                    y
                } else {
                    0.0
                }
            })
            .collect();

        let (min, max) = window_bounds(&values, &properties);
        Self {
            variable: sample.variable(),
            values,
            min,
            max,
            properties,
            sample_range: Some((from, to)),
            resynced: previous.is_none(),
        }
    }

    /// Same values, bounds recomputed for a moved window. `None` on size mismatch.
    pub fn rebound(&self, properties: BufferProperties) -> Option<Self> {
        if properties.size() != self.values.len() {
            return None;
        }
        let (min, max) = window_bounds(&self.values, &properties);
        Some(Self {
            variable: self.variable,
            values: self.values.clone(),
            min,
            max,
            properties,
            sample_range: None,
            resynced: false,
        })
    }

    pub fn variable(&self) -> VarId {
        self.variable
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn properties(&self) -> &BufferProperties {
        &self.properties
    }

    /// Circular range that was freshly sampled, `None` for a rebound
    pub fn sample_range(&self) -> Option<(usize, usize)> {
        self.sample_range
    }

    /// True when no usable previous view existed and the whole array was rebuilt
    pub fn is_resynced(&self) -> bool {
        self.resynced
    }

    /// Whether `index` was covered by the sample that produced this view
    pub fn was_sampled(&self, index: usize) -> bool {
        self.sample_range
            .is_some_and(|(from, to)| is_inside_bounds(index, from, to, self.values.len()))
    }

    /// Active-window values in logical order, in-point first
    pub fn active_values(&self) -> Vec<f64> {
        let size = self.values.len();
        (0..self.properties.active_buffer_length())
            .map(|offset| self.values[(self.properties.in_point() + offset) % size])
            .collect()
    }
}

/// Min/max over `[in_point, in_point + active_length - 1]`, walked circularly.
fn window_bounds(values: &[f64], properties: &BufferProperties) -> (f64, f64) {
    let size = values.len();
    if size == 0 {
        return (0.0, 0.0);
    }
    let mut stats = IncrementalStats::new();
    let mut index = properties.in_point() % size;
    for _ in 0..properties.active_buffer_length().min(size) {
        stats.push(values[index]);
        index = (index + 1) % size;
    }
    stats.bounds()
}
