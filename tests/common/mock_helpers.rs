//! Test session drivers

use anyhow::bail;
use simsession_rs::{
    session::SessionDriver, types::VariableType, variables::VariableRegistry, VarId,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Counters shared between a [`CountingDriver`] and the test body
#[derive(Debug, Default)]
pub struct DriverCalls {
    pub initialize: AtomicUsize,
    pub run: AtomicUsize,
    pub playback: AtomicUsize,
    pub pause: AtomicUsize,
    pub shutdown: AtomicBool,
    /// Fail every run tick while set
    pub fail_run: AtomicBool,
}

impl DriverCalls {
    pub fn runs(&self) -> usize {
        self.run.load(Ordering::SeqCst)
    }
}

/// Advances time by one per run tick and mirrors the tick count into `counter`.
pub struct CountingDriver {
    calls: Arc<DriverCalls>,
    counter: VarId,
}

impl CountingDriver {
    pub fn new() -> (Self, Arc<DriverCalls>) {
        let calls = Arc::new(DriverCalls::default());
        let driver = Self {
            calls: calls.clone(),
            counter: VarId(0),
        };
        (driver, calls)
    }
}

impl SessionDriver for CountingDriver {
    fn register_variables(&mut self, registry: &mut VariableRegistry) -> anyhow::Result<()> {
        self.counter = registry.register("counter", VariableType::Long)?;
        Ok(())
    }

    fn initialize(&mut self, registry: &mut VariableRegistry) -> anyhow::Result<()> {
        self.calls.initialize.fetch_add(1, Ordering::SeqCst);
        registry.set(self.counter, 0.0);
        Ok(())
    }

    fn run_tick(&mut self, registry: &mut VariableRegistry) -> anyhow::Result<f64> {
        if self.calls.fail_run.load(Ordering::SeqCst) {
            bail!("run tick rejected");
        }
        let n = self.calls.run.fetch_add(1, Ordering::SeqCst) + 1;
        registry.set(self.counter, n as f64);
        Ok(registry.time() + 1.0)
    }

    fn playback_tick(&mut self, _registry: &mut VariableRegistry) -> anyhow::Result<()> {
        self.calls.playback.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pause_tick(&mut self, _registry: &mut VariableRegistry) -> anyhow::Result<bool> {
        self.calls.pause.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }

    fn shutdown(&mut self) {
        self.calls.shutdown.store(true, Ordering::SeqCst);
    }
}
