//! Consumer-side chart pipelines.
//!
//! Samples copied out of the ring buffer are merged into full-length chart
//! views on a dedicated executor thread, never on the scheduler thread.
//!
//! # Architecture
//!
//! ```text
//! [LinkedChannel] ──► [ChartDataPipeline] ──► caller mailboxes
//!        ▲                     │
//!        └── next request ◄────┘
//! ```
//!
//! # Design
//!
//! - **Pull-driven**: a pipeline only requests data while a caller is waiting for it.
//! - **Incremental**: while running only the tail since the last update is copied.
//! - **Shared payloads**: one `Arc<ChartData>` is fanned out to every caller.
//! - **Dedicated thread**: `ChartExecutor` runs pipelines, `ChartBridge` controls it.

pub mod bridge;
pub mod chart_data;
pub mod chart_pipeline;
pub mod executor;

pub use bridge::{ChartBridge, ChartCommand, ChartMessage, ExecutorStats};
pub use chart_data::ChartData;
pub use chart_pipeline::ChartDataPipeline;
pub use executor::ChartExecutor;
