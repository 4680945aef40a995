//! Linked channels between the ring buffer and its observers
//!
//! A [`LinkedChannel`] is bound to one variable. It is shared as
//! `Arc<LinkedChannel>` between the scheduler thread and any number of
//! consumer threads; every operation takes `&self` and only ever swaps small
//! values in and out of last-write-wins slots.
//!
//! # Protocol
//!
//! ```text
//! consumer                      scheduler (inside a tick)
//! --------                      -------------------------
//! request_*()        ──▶ slot ──▶ satisfy_request(store)  ─┐
//! poll_requested_buffer_sample() ◀── Arc<BufferSample> ◀───┘
//! publish_chart_data(Arc<ChartData>) ──▶ every caller mailbox
//! poll_chart_data(caller)  ◀── single-slot mailbox
//!
//! push(value)        ──▶ slot ──▶ take_push() on next tick
//! pull()             ◀── slot ◀── prepare_for_pull(value)
//! ```

pub mod mailbox;
pub mod slot;

pub use mailbox::CallerMailboxes;
pub use slot::LatestSlot;

use crate::buffer::{BufferSample, RingBufferStore, SampleRequest};
use crate::id::{CallerId, VarId};
use crate::pipeline::ChartData;
use crate::variables::VariableDescriptor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-variable hand-off point between the scheduler and observers
#[derive(Debug)]
pub struct LinkedChannel {
    variable: VariableDescriptor,
    request: LatestSlot<SampleRequest>,
    sample: LatestSlot<Arc<BufferSample>>,
    pull: LatestSlot<f64>,
    push: LatestSlot<f64>,
    mailboxes: CallerMailboxes<Arc<ChartData>>,
    disposed: AtomicBool,
}

impl LinkedChannel {
    pub fn new(variable: VariableDescriptor) -> Self {
        Self {
            variable,
            request: LatestSlot::new(),
            sample: LatestSlot::new(),
            pull: LatestSlot::new(),
            push: LatestSlot::new(),
            mailboxes: CallerMailboxes::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn variable(&self) -> &VariableDescriptor {
        &self.variable
    }

    #[inline]
    pub fn var_id(&self) -> VarId {
        self.variable.id
    }

    pub fn name(&self) -> &str {
        &self.variable.name
    }

    // --- Consumer side ---

    /// Take the authoritative value published for the latest tick.
    pub fn pull(&self) -> Option<f64> {
        if self.is_disposed() {
            return None;
        }
        self.pull.take()
    }

    /// Ask the scheduler to write `value` into the variable on its next tick.
    pub fn push(&self, value: f64) {
        if self.is_disposed() {
            return;
        }
        self.push.submit(self.variable.var_type.quantize(value));
    }

    pub fn request_entire_buffer(&self) {
        self.submit_request(SampleRequest::EntireBuffer);
    }

    pub fn request_active_buffer_only(&self) {
        self.submit_request(SampleRequest::ActiveWindowOnly);
    }

    pub fn request_buffer_starting_from(&self, index: usize) {
        self.submit_request(SampleRequest::FromIndex(index));
    }

    fn submit_request(&self, request: SampleRequest) {
        if self.is_disposed() {
            return;
        }
        if let Some(previous) = self.request.submit(request) {
            tracing::trace!(variable = %self.variable.name, ?previous, ?request, "sample request superseded");
        }
    }

    /// Take the sample produced for the last satisfied request.
    pub fn poll_requested_buffer_sample(&self) -> Option<Arc<BufferSample>> {
        if self.is_disposed() {
            return None;
        }
        self.sample.take()
    }

    pub fn is_requested_buffer_sample_available(&self) -> bool {
        self.sample.is_pending()
    }

    /// Register an observer. If a reconstructed view already exists the new
    /// caller receives it immediately.
    pub fn register_caller(&self, caller: CallerId) {
        self.mailboxes.register(caller);
    }

    pub fn remove_caller(&self, caller: CallerId) -> bool {
        self.mailboxes.remove(caller)
    }

    /// Take the pending payload for `caller`; `None` if nothing new since the last poll.
    pub fn poll_chart_data(&self, caller: CallerId) -> Option<Arc<ChartData>> {
        self.mailboxes.take(caller)
    }

    /// Store a reconstructed view and fan it out to every caller.
    pub fn publish_chart_data(&self, data: Arc<ChartData>) {
        self.mailboxes.deliver(data);
    }

    /// The previous full reconstruction, if any
    pub fn last_full_array(&self) -> Option<Arc<ChartData>> {
        self.mailboxes.latest()
    }

    /// Whether any caller has consumed its last payload
    pub fn has_callers_awaiting(&self) -> bool {
        self.mailboxes.has_awaiting()
    }

    pub fn caller_count(&self) -> usize {
        self.mailboxes.len()
    }

    /// Stop serving this channel. The scheduler drops it on its next publish.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.request.clear();
        self.sample.clear();
        self.pull.clear();
        self.push.clear();
        self.mailboxes.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    // --- Scheduler side ---

    pub fn has_request_pending(&self) -> bool {
        self.request.is_pending()
    }

    /// Record the authoritative value for this tick.
    pub fn prepare_for_pull(&self, value: f64) {
        if !self.is_disposed() {
            self.pull.submit(value);
        }
    }

    /// Take the pending push, if any.
    pub fn take_push(&self) -> Option<f64> {
        self.push.take()
    }

    /// Drop the pending push.
    pub fn flush_push(&self) {
        self.push.clear();
    }

    /// Consume the pending request and copy the requested range out of `store`.
    ///
    /// Returns true when a new sample was produced. Requests that cannot be
    /// resolved against the current buffer are dropped.
    pub fn satisfy_request(&self, store: &RingBufferStore) -> bool {
        if self.is_disposed() {
            return false;
        }
        let Some(request) = self.request.take() else {
            return false;
        };
        let props = store.properties();
        let sample = request
            .resolve(props)
            .and_then(|(from, length)| store.copy(self.variable.id, from, length));
        match sample {
            Some(sample) => {
                self.sample.submit(Arc::new(sample));
                true
            }
            None => {
                tracing::debug!(
                    variable = %self.variable.name,
                    ?request,
                    size = props.size(),
                    "dropped unsatisfiable sample request"
                );
                false
            }
        }
    }
}
