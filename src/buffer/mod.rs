//! Shared time-series ring buffer
//!
//! This module provides the storage side of a session:
//!
//! - [`tools`]: inclusive circular range arithmetic
//! - [`properties`]: the index model (current index, in/out points, size)
//! - [`store`]: one history array per variable, moved in lock-step
//! - [`request`]: crop, fill and sample request records
//! - [`sample`]: immutable snapshots handed to consumers

pub mod properties;
pub mod request;
pub mod sample;
pub mod store;
pub mod tools;

pub use properties::BufferProperties;
pub use request::{CropBufferRequest, FillBufferRequest, SampleRequest};
pub use sample::BufferSample;
pub use store::RingBufferStore;
