//! Thread-safe producer/observer API for a running session.

use super::intent::SessionIntents;
use super::listeners::SessionListeners;
use super::status::{SharedStatus, StatusSnapshot};
use super::types::{SessionMode, SessionProperties};
use crate::buffer::{BufferProperties, CropBufferRequest, FillBufferRequest};
use crate::channel::LinkedChannel;
use crate::error::{Result, SessionError};
use crate::id::ListenerId;
use crate::variables::VariableCatalog;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::time::Duration;

/// Cloneable handle to a session scheduler
///
/// Every `submit_*` call is non-blocking and last-write-wins: a request that
/// has not been consumed yet is replaced by the newer one. Requests are
/// applied at the scheduler's next tick boundary.
///
/// The `*_and_wait` variants submit the same request and then block until the
/// scheduler has drained the buffer requests. They must not be called from a
/// listener or a driver callback, since those run on the scheduler thread.
#[derive(Clone)]
pub struct SessionHandle {
    intents: Arc<SessionIntents>,
    listeners: Arc<SessionListeners>,
    status: Arc<SharedStatus>,
    variables: VariableCatalog,
    link_tx: Sender<Arc<LinkedChannel>>,
}

impl SessionHandle {
    pub(crate) fn new(
        intents: Arc<SessionIntents>,
        listeners: Arc<SessionListeners>,
        status: Arc<SharedStatus>,
        variables: VariableCatalog,
        link_tx: Sender<Arc<LinkedChannel>>,
    ) -> Self {
        Self {
            intents,
            listeners,
            status,
            variables,
            link_tx,
        }
    }

    // ==================== Buffer requests ====================

    pub fn submit_crop_buffer_request(&self, request: CropBufferRequest) {
        self.intents.buffer.crop.submit(request);
    }

    pub fn submit_fill_buffer_request(&self, request: FillBufferRequest) {
        self.intents.buffer.fill.submit(request);
    }

    pub fn submit_buffer_size_request(&self, size: usize) {
        self.intents.buffer.size.submit(size);
    }

    pub fn submit_buffer_index_request(&self, index: usize) {
        self.intents.buffer.index.submit(index);
    }

    pub fn submit_buffer_in_point_index_request(&self, index: usize) {
        self.intents.buffer.in_point.submit(index);
    }

    pub fn submit_buffer_out_point_index_request(&self, index: usize) {
        self.intents.buffer.out_point.submit(index);
    }

    pub fn submit_increment_buffer_index_request(&self, step: usize) {
        self.intents.buffer.increment.submit(step);
    }

    pub fn submit_decrement_buffer_index_request(&self, step: usize) {
        self.intents.buffer.decrement.submit(step);
    }

    pub fn submit_crop_buffer_request_and_wait(&self, request: CropBufferRequest) -> Result<()> {
        self.submit_crop_buffer_request(request);
        self.wait_for_buffer_requests()
    }

    pub fn submit_fill_buffer_request_and_wait(&self, request: FillBufferRequest) -> Result<()> {
        self.submit_fill_buffer_request(request);
        self.wait_for_buffer_requests()
    }

    pub fn submit_buffer_size_request_and_wait(&self, size: usize) -> Result<()> {
        self.submit_buffer_size_request(size);
        self.wait_for_buffer_requests()
    }

    pub fn submit_buffer_index_request_and_wait(&self, index: usize) -> Result<()> {
        self.submit_buffer_index_request(index);
        self.wait_for_buffer_requests()
    }

    pub fn submit_buffer_in_point_index_request_and_wait(&self, index: usize) -> Result<()> {
        self.submit_buffer_in_point_index_request(index);
        self.wait_for_buffer_requests()
    }

    pub fn submit_buffer_out_point_index_request_and_wait(&self, index: usize) -> Result<()> {
        self.submit_buffer_out_point_index_request(index);
        self.wait_for_buffer_requests()
    }

    pub fn submit_increment_buffer_index_request_and_wait(&self, step: usize) -> Result<()> {
        self.submit_increment_buffer_index_request(step);
        self.wait_for_buffer_requests()
    }

    pub fn submit_decrement_buffer_index_request_and_wait(&self, step: usize) -> Result<()> {
        self.submit_decrement_buffer_index_request(step);
        self.wait_for_buffer_requests()
    }

    /// Block until the scheduler has drained every request submitted so far.
    ///
    /// Requests the current mode ignores still count as drained.
    fn wait_for_buffer_requests(&self) -> Result<()> {
        let stopped = || SessionError::Scheduler("scheduler is not running".to_string());
        let ack = self.intents.request_acks.register().ok_or_else(stopped)?;
        self.intents.wake();
        ack.recv().map_err(|_| stopped())
    }

    // ==================== Timing ====================

    pub fn submit_desired_buffer_publish_period(&self, nanos: u64) {
        self.intents.set_publish_period(Duration::from_nanos(nanos));
    }

    /// Rejects non-positive or non-finite rates.
    pub fn submit_playback_real_time_rate(&self, rate: f64) -> Result<()> {
        if self.intents.set_playback_real_time_rate(rate) {
            Ok(())
        } else {
            Err(SessionError::InvalidRequest(format!(
                "playback rate must be positive and finite, got {}",
                rate
            )))
        }
    }

    pub fn submit_run_at_real_time_rate(&self, enabled: bool) {
        self.intents.set_run_at_real_time_rate(enabled);
    }

    /// Simulated time per run tick
    pub fn submit_session_dt(&self, nanos: u64) -> Result<()> {
        if self.intents.set_session_dt(Duration::from_nanos(nanos)) {
            Ok(())
        } else {
            Err(SessionError::InvalidRequest("session dt must be positive".to_string()))
        }
    }

    pub fn submit_buffer_record_tick_period(&self, period: u32) -> Result<()> {
        if self.intents.set_record_tick_period(period) {
            Ok(())
        } else {
            Err(SessionError::InvalidRequest(
                "record tick period must be positive".to_string(),
            ))
        }
    }

    // ==================== Control ====================

    /// Run the driver's `initialize` again on the next tick.
    pub fn reinitialize_session(&self) {
        self.intents.request_reinitialize();
    }

    pub fn set_session_mode(&self, mode: SessionMode) {
        tracing::debug!("Session mode requested: {}", mode);
        self.intents.set_mode(mode);
    }

    // ==================== Observers ====================

    /// Called once per tick with the current buffer properties.
    pub fn add_current_buffer_properties_listener(
        &self,
        listener: impl Fn(&BufferProperties) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.buffer_properties.add(listener)
    }

    /// Called periodically and on every mode transition.
    pub fn add_session_properties_listener(
        &self,
        listener: impl Fn(&SessionProperties) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.session_properties.add(listener)
    }

    /// Called with `(current, requested)` before every mode transition, while
    /// the current mode is still active.
    pub fn add_pre_session_mode_change_listener(
        &self,
        listener: impl Fn(&(SessionMode, SessionMode)) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.pre_mode_change.add(listener)
    }

    /// Called with `(previous, new)` on every mode transition.
    pub fn add_session_mode_change_listener(
        &self,
        listener: impl Fn(&(SessionMode, SessionMode)) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.mode_change.add(listener)
    }

    /// Called once per failed driver callback or panicking listener.
    pub fn add_tick_error_listener(
        &self,
        listener: impl Fn(&SessionError) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.tick_error.add(listener)
    }

    /// Called once on the scheduler thread as it exits, before the driver
    /// shuts down.
    pub fn add_shutdown_listener(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.listeners.shutdown.add(move |_: &()| listener())
    }

    /// Returns false if no listener with `id` is registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn active_mode(&self) -> SessionMode {
        self.status.mode()
    }

    pub fn buffer_properties(&self) -> BufferProperties {
        self.status.buffer_properties()
    }

    pub fn session_properties(&self) -> SessionProperties {
        self.status.session_properties()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub(crate) fn shared_status(&self) -> Arc<SharedStatus> {
        self.status.clone()
    }

    pub fn variables(&self) -> &VariableCatalog {
        &self.variables
    }

    /// Create a channel bound to the variable called `name`.
    ///
    /// The scheduler starts serving it from its next tick.
    pub fn link_variable(&self, name: &str) -> Result<Arc<LinkedChannel>> {
        let descriptor = self
            .variables
            .find(name)
            .ok_or_else(|| SessionError::UnknownVariable(name.to_string()))?;
        let channel = Arc::new(LinkedChannel::new(descriptor.clone()));
        self.link_tx
            .send(channel.clone())
            .map_err(|_| SessionError::Scheduler("scheduler is not running".to_string()))?;
        tracing::debug!("Linked channel for '{}'", name);
        Ok(channel)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("mode", &self.status.mode())
            .field("variables", &self.variables.len())
            .finish()
    }
}
