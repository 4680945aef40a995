//! # simsession-rs: Session Scheduler and Shared Time-Series Buffer
//!
//! A simulation session engine. One scheduler thread advances a simulation,
//! records every variable into a fixed-size ring buffer, and replays that
//! history at a chosen rate. Any number of observer threads read recorded
//! data through linked channels and rebuild full chart views from partial
//! samples.
//!
//! ## Architecture
//!
//! - **Session**: Scheduler thread with Running / Playback / Pause tick modes
//! - **Buffer**: Ring buffer of `f64` history per variable with shared index state
//! - **Channel**: Per-variable last-write-wins hand-off between scheduler and observers
//! - **Pipeline**: Consumer-side chart reconstruction on its own executor thread
//! - **Communication**: Lock-light slots plus crossbeam channels for thread control
//!
//! ## Configuration
//!
//! Session settings are read from a TOML file under `dev.simsession` in the
//! platform config directory, then overridden by `SIMSESSION_*` environment
//! variables:
//!
//! - **Linux**: `~/.config/dev.simsession/session.toml`
//! - **macOS**: `~/Library/Application Support/dev.simsession/session.toml`
//! - **Windows**: `%APPDATA%\dev.simsession\session.toml`
//!
//! ## Example
//!
//! ```ignore
//! use simsession_rs::{
//!     config::SessionConfig,
//!     pipeline::{ChartDataPipeline, ChartExecutor},
//!     session::{SessionMode, SessionScheduler},
//! };
//!
//! let config = SessionConfig::load_or_default(None);
//! let scheduler = SessionScheduler::start(&config, Box::new(MyDriver::default()))?;
//! let handle = scheduler.handle();
//!
//! let (charts, _thread) = ChartExecutor::spawn(config.chart.refresh_period())?;
//! let pipeline = ChartDataPipeline::link(&handle, "position")?;
//! let caller = pipeline.register_caller();
//! let channel = pipeline.channel().clone();
//! charts.add_pipeline(pipeline);
//!
//! handle.set_session_mode(SessionMode::Running);
//! if let Some(chart) = channel.poll_chart_data(caller) {
//!     println!("position in [{}, {}]", chart.min(), chart.max());
//! }
//! ```

pub mod buffer;
pub mod channel;
pub mod config;
pub mod error;
pub mod id;
pub mod pipeline;
pub mod session;
pub mod types;
pub mod variables;

// Re-export commonly used types
pub use buffer::{BufferProperties, BufferSample, CropBufferRequest, FillBufferRequest};
pub use channel::LinkedChannel;
pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use id::{CallerId, ListenerId, VarId};
pub use pipeline::{ChartData, ChartDataPipeline, ChartExecutor};
pub use session::{SessionDriver, SessionHandle, SessionMode, SessionProperties, SessionScheduler};
pub use types::VariableType;
pub use variables::{VariableRegistry, TIME_VARIABLE_NAME};
