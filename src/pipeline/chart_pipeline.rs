//! Consumer-side pipeline that keeps a full chart view of one variable.
//!
//! Each [`ChartDataPipeline::update`] call:
//!
//! 1. compares the latest published status with what it saw last time,
//! 2. picks up the sample answering its previous request,
//! 3. issues the next request, but only while some caller is waiting,
//! 4. merges the sample into the last full view and fans it out.
//!
//! Requests follow the session mode. While running only the tail since the
//! last update is fetched; a structural change (resize, crop, fill) fetches
//! everything again.

use super::chart_data::ChartData;
use crate::buffer::{BufferProperties, BufferSample};
use crate::channel::LinkedChannel;
use crate::error::Result;
use crate::id::{CallerId, VarId};
use crate::session::{SessionHandle, SessionMode, SharedStatus, StatusSnapshot};
use std::sync::Arc;

#[derive(Debug)]
pub struct ChartDataPipeline {
    channel: Arc<LinkedChannel>,
    status: Arc<SharedStatus>,
    last_properties: Option<BufferProperties>,
    last_revision: u64,
    /// Out-point of the last sample received
    last_update_end_index: Option<usize>,
    /// Whether the last issued request was made while running
    requested_while_running: bool,
    pending: Option<Arc<BufferSample>>,
    request_entire_buffer: bool,
    request_active_window: bool,
    request_update_bounds: bool,
}

impl ChartDataPipeline {
    pub fn new(channel: Arc<LinkedChannel>, handle: &SessionHandle) -> Self {
        Self::with_status(channel, handle.shared_status())
    }

    pub(crate) fn with_status(channel: Arc<LinkedChannel>, status: Arc<SharedStatus>) -> Self {
        Self {
            channel,
            status,
            last_properties: None,
            last_revision: 0,
            last_update_end_index: None,
            requested_while_running: false,
            pending: None,
            request_entire_buffer: true,
            request_active_window: false,
            request_update_bounds: false,
        }
    }

    /// Link `name` on the session and wrap the channel in a pipeline.
    pub fn link(handle: &SessionHandle, name: &str) -> Result<Self> {
        let channel = handle.link_variable(name)?;
        Ok(Self::new(channel, handle))
    }

    pub fn var_id(&self) -> VarId {
        self.channel.var_id()
    }

    pub fn channel(&self) -> &Arc<LinkedChannel> {
        &self.channel
    }

    /// Register a new observer of this pipeline's chart data.
    pub fn register_caller(&self) -> CallerId {
        let caller = CallerId::next();
        self.channel.register_caller(caller);
        caller
    }

    pub fn remove_caller(&self, caller: CallerId) -> bool {
        self.channel.remove_caller(caller)
    }

    /// Take the newest chart view for `caller`, if it has not seen it yet.
    pub fn poll(&self, caller: CallerId) -> Option<Arc<ChartData>> {
        self.channel.poll_chart_data(caller)
    }

    /// Latest live value published by the scheduler
    pub fn pull_value(&self) -> Option<f64> {
        self.channel.pull()
    }

    /// Run one update step; returns true if new chart data was published.
    pub fn update(&mut self) -> bool {
        let status = self.status.snapshot();
        self.observe(&status);

        if let Some(sample) = self.channel.poll_requested_buffer_sample() {
            self.last_update_end_index = Some(sample.properties().out_point());
            self.pending = Some(sample);
        }

        if self.channel.has_callers_awaiting() {
            self.issue_request(status.mode);
        }

        self.publish()
    }

    fn observe(&mut self, status: &StatusSnapshot) {
        let props = status.buffer;
        match self.last_properties {
            None => self.request_entire_buffer = true,
            Some(last) if last.size() != props.size() || status.data_revision != self.last_revision => {
                self.request_entire_buffer = true;
            }
            Some(last) if !status.mode.is_running() => {
                let window_moved =
                    last.in_point() != props.in_point() || last.out_point() != props.out_point();
                if window_moved {
                    self.request_update_bounds = true;
                }
                if window_moved || last.current_index() != props.current_index() {
                    self.request_active_window = true;
                }
            }
            Some(_) => {}
        }
        self.last_properties = Some(props);
        self.last_revision = status.data_revision;
    }

    fn issue_request(&mut self, mode: SessionMode) {
        let running = mode.is_running();
        if std::mem::take(&mut self.request_entire_buffer) {
            self.channel.request_entire_buffer();
        } else if running && !self.requested_while_running {
            self.channel.request_active_buffer_only();
        } else if running || self.requested_while_running {
            self.request_tail();
        } else if std::mem::take(&mut self.request_active_window) {
            self.channel.request_active_buffer_only();
        } else {
            return;
        }
        self.request_active_window = false;
        self.requested_while_running = running;
    }

    /// Everything recorded since the last sample, or the window if there was none
    fn request_tail(&self) {
        match self.last_update_end_index {
            Some(end) => self.channel.request_buffer_starting_from(end),
            None => self.channel.request_active_buffer_only(),
        }
    }

    fn publish(&mut self) -> bool {
        let previous = self.channel.last_full_array();

        if let Some(sample) = self.pending.take() {
            let data = ChartData::reconstruct(&sample, previous.as_deref());
            if data.is_resynced() {
                tracing::trace!("Chart for '{}' resynced at size {}", self.channel.name(), data.len());
            }
            self.request_update_bounds = false;
            self.channel.publish_chart_data(Arc::new(data));
            return true;
        }

        if std::mem::take(&mut self.request_update_bounds) {
            let rebound = previous
                .zip(self.last_properties)
                .and_then(|(data, props)| data.rebound(props));
            if let Some(data) = rebound {
                self.channel.publish_chart_data(Arc::new(data));
                return true;
            }
        }
        false
    }
}
