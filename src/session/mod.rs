//! Session scheduling module
//!
//! A session advances a simulation, records its variables into the shared
//! ring buffer, and replays that history. One scheduler thread owns all
//! mutable state; everything else talks to it through a [`SessionHandle`].
//!
//! # Components
//!
//! - [`SessionScheduler`] - Spawns and owns the scheduler thread
//! - [`SessionHandle`] - Cloneable producer/observer API (requests, listeners, links)
//! - [`SessionDriver`] - Domain step callbacks for each tick mode
//! - [`SharedStatus`] - Latest published mode, properties and revision
//!
//! # Example
//!
//! ```ignore
//! use simsession_rs::config::SessionConfig;
//! use simsession_rs::session::{SessionMode, SessionScheduler};
//!
//! let scheduler = SessionScheduler::start(&SessionConfig::default(), Box::new(driver))?;
//! let handle = scheduler.handle();
//!
//! let position = handle.link_variable("position")?;
//! handle.set_session_mode(SessionMode::Running);
//!
//! // Later, from any thread
//! position.request_active_buffer_only();
//! if let Some(sample) = position.poll_requested_buffer_sample() {
//!     println!("{} samples", sample.len());
//! }
//! ```

pub mod driver;
pub mod handle;
pub mod intent;
pub mod listeners;
pub mod scheduler;
pub mod status;
pub mod types;

pub use driver::SessionDriver;
pub use handle::SessionHandle;
pub use listeners::{Listeners, SessionListeners};
pub use scheduler::SessionScheduler;
pub use status::{SharedStatus, StatusSnapshot};
pub use types::{SessionMode, SessionProperties, SessionTiming, TickPlan};
