//! Intents submitted by other threads and drained by the scheduler.
//!
//! Every field is last-write-wins. Submitting never blocks on the scheduler;
//! changes that affect scheduling also post a wake-up so a long sleep is cut
//! short. Callers that need to block until a request has been applied
//! register on an [`AckQueue`] instead.

use super::types::{SessionMode, SessionTiming};
use crate::buffer::{CropBufferRequest, FillBufferRequest};
use crate::channel::LatestSlot;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Index/structure requests drained together inside a tick
#[derive(Debug, Default)]
pub struct BufferRequests {
    pub crop: LatestSlot<CropBufferRequest>,
    pub fill: LatestSlot<FillBufferRequest>,
    pub size: LatestSlot<usize>,
    pub index: LatestSlot<usize>,
    pub in_point: LatestSlot<usize>,
    pub out_point: LatestSlot<usize>,
    pub increment: LatestSlot<usize>,
    pub decrement: LatestSlot<usize>,
}

#[derive(Debug, Default)]
struct AckWaiters {
    waiters: Vec<Sender<()>>,
    closed: bool,
}

/// One-shot acknowledgements for callers blocked on the scheduler
///
/// The scheduler takes the registered waiters before it does the work they
/// wait for and completes them after. A waiter registered in between is
/// completed by the next pass.
#[derive(Debug, Default)]
pub struct AckQueue {
    inner: Mutex<AckWaiters>,
}

impl AckQueue {
    /// Register a waiter. `None` once the queue is closed.
    pub fn register(&self) -> Option<Receiver<()>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return None;
        }
        let (tx, rx) = bounded(1);
        inner.waiters.push(tx);
        Some(rx)
    }

    pub fn take(&self) -> Vec<Sender<()>> {
        std::mem::take(&mut self.inner.lock().waiters)
    }

    pub fn complete(waiters: Vec<Sender<()>>) {
        for waiter in waiters {
            let _ = waiter.try_send(());
        }
    }

    /// Refuse new waiters and disconnect the pending ones.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.waiters.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().waiters.is_empty()
    }
}

/// Cross-thread write side of the scheduler state
#[derive(Debug)]
pub struct SessionIntents {
    pub(crate) mode: LatestSlot<SessionMode>,
    pub(crate) buffer: BufferRequests,
    /// Completed after the buffer requests have been drained
    pub(crate) request_acks: AckQueue,
    /// Completed once the scheduler has stopped ticking
    pub(crate) suspend_acks: AckQueue,
    suspended: AtomicBool,
    run_at_real_time_rate: AtomicBool,
    playback_rate_bits: AtomicU64,
    session_dt_nanos: AtomicU64,
    record_tick_period: AtomicU32,
    publish_period_nanos: AtomicU64,
    timing_dirty: AtomicBool,
    reinitialize: AtomicBool,
    shutdown: AtomicBool,
    wake_tx: Sender<()>,
}

impl SessionIntents {
    /// Create intents seeded with `timing`, plus the scheduler's wake receiver.
    pub fn new(timing: &SessionTiming, publish_period: Duration) -> (Self, Receiver<()>) {
        let (wake_tx, wake_rx) = bounded(1);
        let intents = Self {
            mode: LatestSlot::new(),
            buffer: BufferRequests::default(),
            request_acks: AckQueue::default(),
            suspend_acks: AckQueue::default(),
            suspended: AtomicBool::new(false),
            run_at_real_time_rate: AtomicBool::new(timing.run_at_real_time_rate),
            playback_rate_bits: AtomicU64::new(timing.playback_real_time_rate.to_bits()),
            session_dt_nanos: AtomicU64::new(timing.session_dt.as_nanos() as u64),
            record_tick_period: AtomicU32::new(timing.buffer_record_tick_period),
            publish_period_nanos: AtomicU64::new(publish_period.as_nanos() as u64),
            timing_dirty: AtomicBool::new(false),
            reinitialize: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            wake_tx,
        };
        (intents, wake_rx)
    }

    /// Interrupt the scheduler's sleep. A wake-up already pending is enough.
    pub fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    pub fn set_mode(&self, mode: SessionMode) {
        self.mode.submit(mode);
        self.wake();
    }

    pub fn set_run_at_real_time_rate(&self, enabled: bool) {
        self.run_at_real_time_rate.store(enabled, Ordering::SeqCst);
        self.mark_timing_dirty();
    }

    /// Returns false (and changes nothing) for non-positive or non-finite rates.
    pub fn set_playback_real_time_rate(&self, rate: f64) -> bool {
        if !rate.is_finite() || rate <= 0.0 {
            return false;
        }
        self.playback_rate_bits.store(rate.to_bits(), Ordering::SeqCst);
        self.mark_timing_dirty();
        true
    }

    /// Returns false for a zero increment.
    pub fn set_session_dt(&self, dt: Duration) -> bool {
        let nanos = dt.as_nanos() as u64;
        if nanos == 0 {
            return false;
        }
        self.session_dt_nanos.store(nanos, Ordering::SeqCst);
        self.mark_timing_dirty();
        true
    }

    /// Returns false for a zero period.
    pub fn set_record_tick_period(&self, period: u32) -> bool {
        if period == 0 {
            return false;
        }
        self.record_tick_period.store(period, Ordering::SeqCst);
        self.mark_timing_dirty();
        true
    }

    pub fn set_publish_period(&self, period: Duration) {
        self.publish_period_nanos
            .store(period.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn publish_period(&self) -> Duration {
        Duration::from_nanos(self.publish_period_nanos.load(Ordering::SeqCst))
    }

    fn mark_timing_dirty(&self) {
        self.timing_dirty.store(true, Ordering::SeqCst);
        self.wake();
    }

    /// Timing with the submitted values, if any changed since the last call.
    pub fn take_timing(&self, current: &SessionTiming) -> Option<SessionTiming> {
        if !self.timing_dirty.swap(false, Ordering::SeqCst) {
            return None;
        }
        Some(SessionTiming {
            session_dt: Duration::from_nanos(self.session_dt_nanos.load(Ordering::SeqCst)),
            buffer_record_tick_period: self.record_tick_period.load(Ordering::SeqCst),
            run_at_real_time_rate: self.run_at_real_time_rate.load(Ordering::SeqCst),
            playback_real_time_rate: f64::from_bits(self.playback_rate_bits.load(Ordering::SeqCst)),
            pause_tick_period: current.pause_tick_period,
        })
    }

    pub fn request_reinitialize(&self) {
        self.reinitialize.store(true, Ordering::SeqCst);
        self.wake();
    }

    pub fn take_reinitialize(&self) -> bool {
        self.reinitialize.swap(false, Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Returns false if ticking was already suspended.
    pub fn suspend(&self) -> bool {
        let newly = !self.suspended.swap(true, Ordering::SeqCst);
        self.wake();
        newly
    }

    /// Returns false if ticking was not suspended.
    pub fn resume(&self) -> bool {
        let was = self.suspended.swap(false, Ordering::SeqCst);
        self.wake();
        was
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Disconnect every waiter; called when the scheduler thread goes away.
    pub fn close_acks(&self) {
        self.request_acks.close();
        self.suspend_acks.close();
    }
}
