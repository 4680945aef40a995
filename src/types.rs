//! Core data types for simsession-rs
//!
//! This module contains the value-level types shared by the ring buffer,
//! the scheduler and chart consumers.
//!
//! # Variable Types
//!
//! Every buffered variable is stored as `f64`. The [`VariableType`] records
//! what the domain variable actually is so that values pushed by observers
//! are quantized the same way the domain would store them (an integer
//! variable never holds `2.5`, a boolean is always `0.0` or `1.0`).
//!
//! # Statistics
//!
//! The [`IncrementalStats`] type provides O(1) updates for running statistics
//! including min, max, and average values as data is walked.

use serde::{Deserialize, Serialize};

/// Represents the type of a session variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VariableType {
    /// 64-bit floating point
    #[default]
    Double,
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    Long,
    /// Boolean value
    Boolean,
    /// Enumeration with `variants` ordinals; `-1` is the null ordinal
    Enum { variants: u32 },
}

impl VariableType {
    /// Quantize an incoming value to what this type can represent.
    pub fn quantize(&self, value: f64) -> f64 {
        match self {
            VariableType::Double => value,
            VariableType::Integer => {
                if value.is_nan() {
                    0.0
                } else {
                    value.round().clamp(i32::MIN as f64, i32::MAX as f64)
                }
            }
            VariableType::Long => {
                if value.is_nan() {
                    0.0
                } else {
                    value.round().clamp(i64::MIN as f64, i64::MAX as f64)
                }
            }
            VariableType::Boolean => {
                if value != 0.0 && !value.is_nan() {
                    1.0
                } else {
                    0.0
                }
            }
            VariableType::Enum { variants } => {
                if value.is_nan() {
                    -1.0
                } else {
                    value.round().clamp(-1.0, *variants as f64 - 1.0)
                }
            }
        }
    }

    /// Whether values of this type are whole numbers
    pub fn is_discrete(&self) -> bool {
        !matches!(self, VariableType::Double)
    }
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableType::Double => write!(f, "double"),
            VariableType::Integer => write!(f, "integer"),
            VariableType::Long => write!(f, "long"),
            VariableType::Boolean => write!(f, "boolean"),
            VariableType::Enum { variants } => write!(f, "enum({})", variants),
        }
    }
}

/// Incremental statistics tracker for efficient min/max/avg calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncrementalStats {
    /// Current count of values
    pub count: u64,
    /// Running sum for average calculation
    pub sum: f64,
    /// Current minimum value
    pub min: f64,
    /// Current maximum value
    pub max: f64,
}

impl Default for IncrementalStats {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalStats {
    /// Create a new empty stats tracker
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    /// Add a new value to the statistics
    #[inline]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Get the current average
    #[inline]
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// `(min, max)`, or `(0.0, 0.0)` when nothing was pushed
    pub fn bounds(&self) -> (f64, f64) {
        if self.count == 0 {
            (0.0, 0.0)
        } else {
            (self.min, self.max)
        }
    }

    /// Reset the statistics
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
