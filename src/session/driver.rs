//! Domain step callbacks.
//!
//! A [`SessionDriver`] owns the simulation itself. The scheduler calls it on
//! its own thread with exclusive access to the live variable registry, so an
//! implementation never needs interior locking.

use crate::variables::VariableRegistry;

/// Simulation hooks invoked once per tick of the matching mode
///
/// Every callback may fail. An `Err` (or a panic) is logged, reported to the
/// tick-error listeners, and the session is forced into `Pause`.
#[cfg_attr(test, mockall::automock)]
pub trait SessionDriver: Send {
    /// Register domain variables before the buffer is allocated.
    fn register_variables(&mut self, _registry: &mut VariableRegistry) -> anyhow::Result<()> {
        Ok(())
    }

    /// Set initial values. Called before the first tick and on reinitialization.
    fn initialize(&mut self, _registry: &mut VariableRegistry) -> anyhow::Result<()> {
        Ok(())
    }

    /// Advance the simulation one step and return the new simulation time.
    fn run_tick(&mut self, registry: &mut VariableRegistry) -> anyhow::Result<f64>;

    /// Called after the registry was loaded from the buffer.
    fn playback_tick(&mut self, _registry: &mut VariableRegistry) -> anyhow::Result<()> {
        Ok(())
    }

    /// Return `Ok(true)` if the paused state changed and should be republished.
    fn pause_tick(&mut self, _registry: &mut VariableRegistry) -> anyhow::Result<bool> {
        Ok(false)
    }

    fn shutdown(&mut self) {}
}
