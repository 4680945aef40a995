//! Request records submitted to the scheduler.
//!
//! Each record lives in a last-write-wins slot until the scheduler drains
//! it inside a tick.

use super::properties::BufferProperties;
use super::tools::compute_sub_length;
use serde::{Deserialize, Serialize};

/// Shrink the buffer to the inclusive circular range `[from, to]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBufferRequest {
    pub from: usize,
    pub to: usize,
}

impl CropBufferRequest {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    /// Crop to the current active window
    pub fn active_window(props: &BufferProperties) -> Self {
        Self::new(props.in_point(), props.out_point())
    }

    /// Size of the buffer after cropping, `None` if a bound is out of range
    pub fn cropped_size(&self, buffer_size: usize) -> Option<usize> {
        compute_sub_length(self.from, self.to, buffer_size)
    }
}

/// Overwrite the inclusive circular range `[from, to]` of every variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillBufferRequest {
    /// Fill with `0.0` instead of each variable's live value
    pub zero_fill: bool,
    pub from: usize,
    pub to: usize,
}

impl FillBufferRequest {
    pub fn new(zero_fill: bool, from: usize, to: usize) -> Self {
        Self { zero_fill, from, to }
    }

    /// Number of samples overwritten, `None` if a bound is out of range
    pub fn filled_size(&self, buffer_size: usize) -> Option<usize> {
        compute_sub_length(self.from, self.to, buffer_size)
    }
}

/// What a linked channel wants copied out of the buffer at the next publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRequest {
    /// Every sample, starting at index 0
    EntireBuffer,
    /// `[in_point, out_point]`
    ActiveWindowOnly,
    /// From the given index through the out-point
    FromIndex(usize),
}

impl SampleRequest {
    /// Resolve into `(from, length)` against the given properties.
    ///
    /// Returns `None` when a `FromIndex` start lies outside the buffer.
    pub fn resolve(&self, props: &BufferProperties) -> Option<(usize, usize)> {
        match *self {
            SampleRequest::EntireBuffer => Some((0, props.size())),
            SampleRequest::ActiveWindowOnly => {
                Some((props.in_point(), props.active_buffer_length()))
            }
            SampleRequest::FromIndex(from) => {
                compute_sub_length(from, props.out_point(), props.size()).map(|len| (from, len))
            }
        }
    }
}
