//! Session Scheduler Thread Implementation
//!
//! This module contains the tick loop that owns the live variable registry,
//! the ring buffer and every linked channel. Other threads only reach it
//! through [`SessionHandle`], whose intents are drained at the start of each
//! tick.
//!
//! # Tick Modes
//!
//! - **Running**: advance the simulation, record every
//!   `buffer_record_tick_period` ticks, publish on the publish gate
//! - **Playback**: load history at the current index, step inside the
//!   active window
//! - **Pause**: apply pushes and requests, republish only when something
//!   changed
//!
//! # Failure Handling
//!
//! Driver callbacks run inside `catch_unwind`. An `Err` or a panic is
//! logged, reported to the tick-error listeners, and forces `Pause` once the
//! tick's bookkeeping is done. The thread itself never dies from a driver
//! failure.
//!
//! Listener callbacks are isolated the same way. A panicking listener is
//! reported to the tick-error listeners and the tick carries on.
//!
//! # Rate Limiting
//!
//! Between ticks the thread waits on a wake channel with a timeout of the
//! remaining tick period, so mode and timing changes cut a long sleep short.
//!
//! # Suspension
//!
//! [`SessionScheduler::stop_session_thread`] parks the thread between ticks
//! without ending it. While parked it only wakes to serve blocking buffer
//! requests, which it applies as in `Pause`.

use super::driver::SessionDriver;
use super::handle::SessionHandle;
use super::intent::{AckQueue, SessionIntents};
use super::listeners::{Listeners, SessionListeners};
use super::status::SharedStatus;
use super::types::{SessionMode, SessionTiming, TickPlan};
use crate::buffer::RingBufferStore;
use crate::channel::LinkedChannel;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::variables::VariableRegistry;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Run a driver callback, folding errors and panics into a tick failure.
fn guarded<T>(
    mode: SessionMode,
    f: impl FnOnce() -> anyhow::Result<T>,
) -> std::result::Result<T, SessionError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(SessionError::tick_failed(mode, &err)),
        Err(payload) => Err(SessionError::from_panic(mode, payload)),
    }
}

/// Everything owned by the scheduler thread
pub(crate) struct SchedulerState {
    name: String,
    driver: Box<dyn SessionDriver>,
    registry: VariableRegistry,
    store: RingBufferStore,
    channels: Vec<Arc<LinkedChannel>>,
    link_rx: Receiver<Arc<LinkedChannel>>,

    intents: Arc<SessionIntents>,
    listeners: Arc<SessionListeners>,
    status: Arc<SharedStatus>,

    mode: SessionMode,
    timing: SessionTiming,
    plan: TickPlan,
    /// Skip the sleep before the next tick
    reschedule: bool,

    first_run_tick: bool,
    first_pause_tick: bool,
    /// Run ticks since the last recorded sample
    record_counter: u32,
    /// The recording index was already advanced for the next sample
    slot_reserved: bool,

    init_attempted: bool,
    initialized: bool,
    last_publish: Option<Instant>,
    last_session_report: Option<Instant>,
    session_report_period: Duration,
    tick_count: u64,
    data_revision: u64,
}

impl SchedulerState {
    /// Register variables, allocate the buffer and build the matching handle.
    pub(crate) fn new(
        config: &SessionConfig,
        mut driver: Box<dyn SessionDriver>,
    ) -> Result<(Self, SessionHandle, Receiver<()>)> {
        config.validate()?;

        let mut registry = VariableRegistry::new();
        driver.register_variables(&mut registry).map_err(|e| {
            SessionError::Scheduler(format!("Failed to register variables: {:#}", e))
        })?;

        let timing = config.timing();
        let store = RingBufferStore::for_registry(&registry, config.initial_buffer_size);
        let (intents, wake_rx) = SessionIntents::new(&timing, config.publish_period());
        let intents = Arc::new(intents);
        let listeners = Arc::new(SessionListeners::default());
        let status = Arc::new(SharedStatus::new(
            SessionMode::Pause,
            *store.properties(),
            &timing,
        ));
        let (link_tx, link_rx) = unbounded();

        let handle = SessionHandle::new(
            intents.clone(),
            listeners.clone(),
            status.clone(),
            registry.catalog(),
            link_tx,
        );
        if config.initial_mode != SessionMode::Pause {
            intents.set_mode(config.initial_mode);
        }

        tracing::debug!(
            "Session '{}': {} variables, buffer size {}",
            config.name,
            store.variable_count(),
            store.properties().size()
        );

        let state = Self {
            name: config.name.clone(),
            driver,
            registry,
            store,
            channels: Vec::new(),
            link_rx,
            intents,
            listeners,
            status,
            mode: SessionMode::Pause,
            timing,
            plan: timing.plan(SessionMode::Pause),
            reschedule: false,
            first_run_tick: true,
            first_pause_tick: true,
            record_counter: 0,
            slot_reserved: false,
            init_attempted: false,
            initialized: false,
            last_publish: None,
            last_session_report: None,
            session_report_period: config.session_properties_period(),
            tick_count: 0,
            data_revision: 0,
        };
        Ok((state, handle, wake_rx))
    }

    /// Run the tick loop until shutdown is requested
    fn run(mut self, wake_rx: Receiver<()>) {
        tracing::info!("Session scheduler '{}' started", self.name);

        while !self.intents.is_shutdown_requested() {
            if self.intents.is_suspended() {
                self.idle();
                if wake_rx.recv().is_err() {
                    break;
                }
                continue;
            }

            let started = Instant::now();
            self.tick();

            if std::mem::take(&mut self.reschedule) {
                continue;
            }

            let remaining = self.plan.period.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                continue;
            }
            match wake_rx.recv_timeout(remaining) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.notify(&self.listeners.shutdown, &());
        self.driver.shutdown();
        tracing::info!(
            "Session scheduler '{}' stopped after {} ticks",
            self.name,
            self.tick_count
        );
    }

    /// Execute one tick of the active mode, including intent draining.
    pub(crate) fn tick(&mut self) {
        self.accept_links();
        self.apply_timing();
        if let Some(mode) = self.intents.mode.take() {
            self.transition(mode);
        }

        let reinitialize = self.intents.take_reinitialize();
        if !self.init_attempted || reinitialize {
            self.initialize();
        }

        let failure = match self.mode {
            SessionMode::Running => self.run_tick(),
            SessionMode::Playback => self.playback_tick(),
            SessionMode::Pause => {
                self.pause_tick();
                None
            }
        };

        self.tick_count += 1;
        self.broadcast_buffer_properties();

        if failure.is_some() {
            self.transition(SessionMode::Pause);
        }

        let report_due = self
            .last_session_report
            .map_or(true, |at| at.elapsed() >= self.session_report_period);
        if report_due {
            self.report_session_properties();
        }
    }

    /// One pass while suspended: acknowledge the suspension and serve any
    /// caller blocked on a buffer request.
    fn idle(&mut self) {
        AckQueue::complete(self.intents.suspend_acks.take());
        if self.intents.request_acks.is_empty() {
            return;
        }

        self.accept_links();
        if self.process_requests(SessionMode::Pause) {
            self.store.read_buffer(&mut self.registry);
            self.publish_snapshots();
        }
        self.broadcast_buffer_properties();
    }

    fn accept_links(&mut self) {
        while let Ok(channel) = self.link_rx.try_recv() {
            tracing::trace!("Serving channel '{}'", channel.name());
            self.channels.push(channel);
            // New channels get their first pull value even while paused
            self.first_pause_tick = true;
        }
    }

    fn apply_timing(&mut self) {
        if let Some(timing) = self.intents.take_timing(&self.timing) {
            tracing::debug!("Session timing updated: {:?}", timing);
            self.timing = timing;
            self.plan = timing.plan(self.mode);
            self.reschedule = true;
            self.report_session_properties();
        }
    }

    fn initialize(&mut self) {
        self.init_attempted = true;
        match guarded(self.mode, || self.driver.initialize(&mut self.registry)) {
            Ok(()) => {
                self.store.write_buffer(&self.registry);
                self.initialized = true;
                self.first_pause_tick = true;
                tracing::info!("Session '{}' initialized", self.name);
            }
            Err(err) => {
                self.initialized = false;
                self.fail(&err);
                self.transition(SessionMode::Pause);
            }
        }
    }

    fn transition(&mut self, mode: SessionMode) {
        self.reschedule = true;
        if mode == self.mode {
            return;
        }

        self.notify(&self.listeners.pre_mode_change, &(self.mode, mode));
        let previous = std::mem::replace(&mut self.mode, mode);
        self.first_run_tick = true;
        self.first_pause_tick = true;
        self.record_counter = 0;
        self.slot_reserved = false;
        self.plan = self.timing.plan(mode);

        tracing::info!("Session mode {} -> {}", previous, mode);
        self.notify(&self.listeners.mode_change, &(previous, mode));
        self.report_session_properties();
    }

    fn fail(&self, err: &SessionError) {
        tracing::error!("{}", err);
        // Panics here are only logged
        self.listeners.tick_error.notify(err);
    }

    /// Notify `listeners`, reporting each panicking callback as a tick error.
    fn notify<T>(&self, listeners: &Listeners<T>, event: &T) {
        for message in listeners.notify(event) {
            self.listeners
                .tick_error
                .notify(&SessionError::ListenerPanicked(message));
        }
    }

    // ==================== Mode ticks ====================

    fn run_tick(&mut self) -> Option<SessionError> {
        if self.first_run_tick {
            self.first_run_tick = false;
            let props = self.store.properties_mut();
            let resume = props.current_index();
            props.advance_recording();
            props.set_in_point(resume);
            self.slot_reserved = true;
            tracing::debug!("Run resumed from index {}", resume);
        }

        self.record_counter += 1;
        let will_record = self.record_counter >= self.timing.buffer_record_tick_period.max(1);
        if will_record && !self.slot_reserved {
            self.store.properties_mut().advance_recording();
        }

        self.apply_pushes(false);

        let failure = match guarded(SessionMode::Running, || {
            self.driver.run_tick(&mut self.registry)
        }) {
            Ok(time) => {
                let time_id = self.registry.time_id();
                self.registry.set(time_id, time);
                None
            }
            Err(err) => Some(err),
        };

        if will_record {
            self.store.write_buffer(&self.registry);
            self.publish_if_due();
            self.process_requests(SessionMode::Running);
            self.record_counter = 0;
            self.slot_reserved = false;
        }

        if let Some(err) = &failure {
            self.fail(err);
        }
        failure
    }

    fn playback_tick(&mut self) -> Option<SessionError> {
        for channel in &self.channels {
            channel.flush_push();
        }
        self.store.read_buffer(&mut self.registry);

        let failure = guarded(SessionMode::Playback, || {
            self.driver.playback_tick(&mut self.registry)
        })
        .err();

        self.publish_if_due();
        self.store
            .properties_mut()
            .step_within_window(self.plan.playback_step);
        self.process_requests(SessionMode::Playback);

        if let Some(err) = &failure {
            self.fail(err);
        }
        failure
    }

    fn pause_tick(&mut self) {
        let mut changed = std::mem::take(&mut self.first_pause_tick);
        changed |= self.apply_pushes(true);
        changed |= self.process_requests(SessionMode::Pause);
        changed |= self.channels.iter().any(|c| c.has_request_pending());

        match guarded(SessionMode::Pause, || {
            self.driver.pause_tick(&mut self.registry)
        }) {
            Ok(true) => {
                self.store.write_buffer(&self.registry);
                changed = true;
            }
            Ok(false) => {}
            Err(err) => self.fail(&err),
        }

        if changed {
            self.store.read_buffer(&mut self.registry);
            self.publish_snapshots();
        }
    }

    // ==================== Requests ====================

    /// Move pending pushes into the registry, and into the buffer at the
    /// current index when `write_through` is set.
    fn apply_pushes(&mut self, write_through: bool) -> bool {
        let mut applied = false;
        for channel in &self.channels {
            let Some(value) = channel.take_push() else {
                continue;
            };
            let id = channel.var_id();
            if !self.registry.set(id, value) {
                continue;
            }
            if write_through {
                let stored = self.registry.get(id).unwrap_or(value);
                self.store.write_value(id, stored);
            }
            applied = true;
        }
        applied
    }

    /// Drain every buffer request slot; returns true if any applied request
    /// changed the buffer.
    ///
    /// Blocked callers registered before the drain are released once the
    /// shared status reflects it.
    fn process_requests(&mut self, mode: SessionMode) -> bool {
        let acks = self.intents.request_acks.take();
        let requests = &self.intents.buffer;
        let mut changed = false;
        let mut rewritten = false;

        let cropped = requests
            .crop
            .take()
            .is_some_and(|crop| self.store.crop(&crop));
        changed |= cropped;
        rewritten |= cropped;

        let fill = requests.fill.take();
        let index = requests.index.take();
        let in_point = requests.in_point.take();
        let out_point = requests.out_point.take();
        let increment = requests.increment.take();
        let decrement = requests.decrement.take();
        let size = requests.size.take();

        if cropped && !mode.is_paused() {
            tracing::debug!("Crop applied in {} mode, remaining index requests dropped", mode);
        } else {
            if let Some(fill) = fill {
                if self.store.fill(&fill, &self.registry) {
                    changed = true;
                    rewritten = true;
                }
            }

            let props = self.store.properties_mut();
            if !mode.is_running() {
                if let Some(index) = index {
                    changed |= props.set_current_index(index);
                }
            }
            if let Some(index) = in_point {
                changed |= props.set_in_point(index);
            }
            if let Some(index) = out_point {
                changed |= props.set_out_point(index);
            }
            if !mode.is_running() {
                if let Some(step) = increment {
                    changed |= props.step_within_window(step);
                }
                if let Some(step) = decrement {
                    changed |= props.step_back_within_window(step);
                }
            }

            if let Some(size) = size {
                if self.store.resize(size) {
                    changed = true;
                    rewritten = true;
                }
            }
        }

        if rewritten {
            self.data_revision += 1;
        }
        if !acks.is_empty() {
            self.update_status();
            AckQueue::complete(acks);
        }
        changed
    }

    // ==================== Publishing ====================

    fn publish_if_due(&mut self) {
        let period = self.intents.publish_period();
        let due = self.last_publish.map_or(true, |at| at.elapsed() >= period);
        if due {
            self.publish_snapshots();
        }
    }

    /// Hand every channel its pull value and the sample it asked for.
    fn publish_snapshots(&mut self) {
        let before = self.channels.len();
        self.channels.retain(|c| !c.is_disposed());
        if self.channels.len() != before {
            tracing::debug!("Dropped {} disposed channels", before - self.channels.len());
        }

        for channel in &self.channels {
            if let Some(value) = self.registry.get(channel.var_id()) {
                channel.prepare_for_pull(value);
            }
            channel.satisfy_request(&self.store);
        }
        self.last_publish = Some(Instant::now());
    }

    fn update_status(&self) {
        let props = *self.store.properties();
        self.status.update(|s| {
            s.buffer = props;
            s.data_revision = self.data_revision;
            s.tick_count = self.tick_count;
            s.initialized = self.initialized;
        });
    }

    fn broadcast_buffer_properties(&self) {
        self.update_status();
        self.notify(&self.listeners.buffer_properties, self.store.properties());
    }

    fn report_session_properties(&mut self) {
        let props = self.timing.session_properties(self.mode);
        self.status.update(|s| {
            s.mode = self.mode;
            s.session = props;
        });
        self.notify(&self.listeners.session_properties, &props);
        self.last_session_report = Some(Instant::now());
    }
}

impl Drop for SchedulerState {
    fn drop(&mut self) {
        self.intents.close_acks();
    }
}

/// Owner of the scheduler thread
///
/// Dropping the scheduler shuts the thread down and joins it.
pub struct SessionScheduler {
    handle: SessionHandle,
    intents: Arc<SessionIntents>,
    thread: Option<JoinHandle<()>>,
}

impl SessionScheduler {
    /// Register the driver's variables and spawn the scheduler thread.
    pub fn start(config: &SessionConfig, driver: Box<dyn SessionDriver>) -> Result<Self> {
        let (state, handle, wake_rx) = SchedulerState::new(config, driver)?;
        let intents = state.intents.clone();

        let thread = std::thread::Builder::new()
            .name("session-scheduler".to_string())
            .spawn(move || state.run(wake_rx))?;

        Ok(Self {
            handle,
            intents,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop ticking without ending the thread.
    ///
    /// Blocks until the tick in progress has finished. Returns false if the
    /// thread is not running or is already stopped.
    pub fn stop_session_thread(&self) -> bool {
        if !self.is_running() || !self.intents.suspend() {
            return false;
        }
        let Some(ack) = self.intents.suspend_acks.register() else {
            return false;
        };
        self.intents.wake();
        let stopped = ack.recv().is_ok();
        if stopped {
            tracing::info!("Session thread stopped");
        }
        stopped
    }

    /// Resume ticking after [`stop_session_thread`](Self::stop_session_thread).
    ///
    /// Returns false if the thread was not stopped.
    pub fn start_session_thread(&self) -> bool {
        if !self.is_running() || !self.intents.resume() {
            return false;
        }
        tracing::info!("Session thread started");
        true
    }

    /// Whether the thread is alive and ticking
    pub fn is_session_thread_active(&self) -> bool {
        self.is_running() && !self.intents.is_suspended()
    }

    /// Stop the tick loop and wait for the thread to exit.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.intents.request_shutdown();
        thread
            .join()
            .map_err(|_| SessionError::Scheduler("Scheduler thread panicked".to_string()))
    }
}

impl Drop for SessionScheduler {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Failed to stop session scheduler: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{CropBufferRequest, FillBufferRequest};
    use crate::id::VarId;
    use crate::session::driver::MockSessionDriver;
    use crate::types::VariableType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn config(size: usize) -> SessionConfig {
        SessionConfig {
            initial_buffer_size: size,
            buffer_publish_period_ns: 0,
            ..Default::default()
        }
    }

    /// Mock with one `x` variable whose run ticks return 1.0, 2.0, ...
    fn counting_driver() -> MockSessionDriver {
        let mut driver = MockSessionDriver::new();
        driver.expect_register_variables().returning(|registry| {
            registry.register("x", VariableType::Double)?;
            Ok(())
        });
        driver.expect_initialize().returning(|_| Ok(()));
        let mut time = 0.0;
        driver.expect_run_tick().returning(move |_| {
            time += 1.0;
            Ok(time)
        });
        driver.expect_playback_tick().returning(|_| Ok(()));
        driver.expect_pause_tick().returning(|_| Ok(false));
        driver
    }

    fn build(driver: MockSessionDriver, size: usize) -> (SchedulerState, SessionHandle) {
        let (state, handle, _wake) = SchedulerState::new(&config(size), Box::new(driver)).unwrap();
        (state, handle)
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (count.clone(), count)
    }

    #[test]
    fn test_failing_run_tick_forces_pause() {
        let mut driver = MockSessionDriver::new();
        driver.expect_register_variables().returning(|_| Ok(()));
        driver.expect_initialize().returning(|_| Ok(()));
        driver
            .expect_run_tick()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("diverged")));
        driver.expect_pause_tick().returning(|_| Ok(false));
        let (mut state, handle) = build(driver, 8);

        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        handle.add_tick_error_listener(move |e| sink.lock().unwrap().push(e.to_string()));
        let (buffer_updates, seen) = counter();
        handle.add_current_buffer_properties_listener(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        handle.set_session_mode(SessionMode::Running);
        state.tick();

        assert_eq!(state.mode, SessionMode::Pause);
        assert_eq!(handle.active_mode(), SessionMode::Pause);
        assert_eq!(
            messages.lock().unwrap().as_slice(),
            ["Tick failed in Running mode: diverged"]
        );
        // Bookkeeping still ran: the failed tick advanced and broadcast
        assert_eq!(buffer_updates.load(Ordering::SeqCst), 1);
        assert_eq!(handle.buffer_properties().current_index(), 1);

        state.tick();
        assert_eq!(buffer_updates.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_driver_is_caught() {
        let mut driver = MockSessionDriver::new();
        driver.expect_register_variables().returning(|_| Ok(()));
        driver.expect_initialize().returning(|_| Ok(()));
        driver
            .expect_run_tick()
            .returning(|_| -> anyhow::Result<f64> { panic!("boom") });
        driver.expect_pause_tick().returning(|_| Ok(false));
        let (mut state, handle) = build(driver, 8);

        let (errors, seen) = counter();
        handle.add_tick_error_listener(move |e| {
            assert!(e.to_string().contains("boom"));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        handle.set_session_mode(SessionMode::Running);
        state.tick();
        assert_eq!(state.mode, SessionMode::Pause);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_initialize_forces_pause() {
        let mut driver = MockSessionDriver::new();
        driver.expect_register_variables().returning(|_| Ok(()));
        driver
            .expect_initialize()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("no initial state")));
        driver.expect_pause_tick().returning(|_| Ok(false));
        let (mut state, handle) = build(driver, 8);

        handle.set_session_mode(SessionMode::Running);
        state.tick();
        assert_eq!(state.mode, SessionMode::Pause);
        assert!(!handle.status().initialized);
    }

    #[test]
    fn test_first_run_tick_sets_in_point_to_resume_index() {
        let (mut state, handle) = build(counting_driver(), 8);

        handle.set_session_mode(SessionMode::Running);
        for _ in 0..3 {
            state.tick();
        }
        let props = handle.buffer_properties();
        assert_eq!((props.current_index(), props.in_point(), props.out_point()), (3, 0, 3));
        assert_eq!(state.store.read_value(VarId(0), 1), Some(1.0));
        assert_eq!(state.store.read_value(VarId(0), 3), Some(3.0));

        handle.set_session_mode(SessionMode::Pause);
        handle.submit_buffer_index_request(1);
        state.tick();
        assert_eq!(handle.buffer_properties().current_index(), 1);

        handle.set_session_mode(SessionMode::Running);
        state.tick();
        let props = handle.buffer_properties();
        assert_eq!(props.in_point(), 1);
        assert_eq!(props.current_index(), 2);
        assert_eq!(props.out_point(), 2);
        assert_eq!(props.active_buffer_length(), 2);
    }

    #[test]
    fn test_record_tick_period() {
        let mut cfg = config(8);
        cfg.buffer_record_tick_period = 2;
        let (mut state, handle, _wake) =
            SchedulerState::new(&cfg, Box::new(counting_driver())).unwrap();

        handle.set_session_mode(SessionMode::Running);
        for _ in 0..4 {
            state.tick();
        }
        let props = handle.buffer_properties();
        assert_eq!(props.current_index(), 2);
        assert_eq!(props.out_point(), 2);
        assert_eq!(state.store.read_value(VarId(0), 1), Some(2.0));
        assert_eq!(state.store.read_value(VarId(0), 2), Some(4.0));
    }

    #[test]
    fn test_pause_publishes_only_on_change() {
        let (mut state, handle) = build(counting_driver(), 8);
        let channel = handle.link_variable("x").unwrap();

        // First pause tick always publishes
        state.tick();
        assert_eq!(channel.pull(), Some(0.0));
        state.tick();
        assert_eq!(channel.pull(), None);

        channel.request_entire_buffer();
        state.tick();
        let sample = channel.poll_requested_buffer_sample().unwrap();
        assert_eq!(sample.len(), 8);

        channel.push(4.0);
        state.tick();
        assert_eq!(channel.pull(), Some(4.0));
        assert_eq!(state.store.read_value(channel.var_id(), 0), Some(4.0));
    }

    #[test]
    fn test_channel_linked_while_paused_gets_value() {
        let (mut state, handle) = build(counting_driver(), 8);
        state.tick();
        state.tick();

        let channel = handle.link_variable("x").unwrap();
        state.tick();
        assert_eq!(channel.pull(), Some(0.0));
    }

    #[test]
    fn test_running_push_skips_buffer_until_record() {
        let (mut state, handle) = build(counting_driver(), 8);
        let channel = handle.link_variable("x").unwrap();

        handle.set_session_mode(SessionMode::Running);
        channel.push(2.5);
        state.tick();
        assert_eq!(state.registry.get(channel.var_id()), Some(2.5));
        // Recorded at the newly advanced index, index 0 holds the initial state
        assert_eq!(state.store.read_value(channel.var_id(), 1), Some(2.5));
        assert_eq!(state.store.read_value(channel.var_id(), 0), Some(0.0));
    }

    #[test]
    fn test_crop_in_running_drops_index_requests() {
        let (mut state, handle) = build(counting_driver(), 8);

        handle.set_session_mode(SessionMode::Running);
        handle.submit_crop_buffer_request(CropBufferRequest::new(2, 5));
        handle.submit_buffer_in_point_index_request(1);
        handle.submit_buffer_size_request(16);
        state.tick();

        let props = handle.buffer_properties();
        assert_eq!(props.size(), 4);
        assert_eq!(props.in_point(), 0);
        assert_eq!(handle.status().data_revision, 1);

        // Dropped requests do not come back on the next tick
        state.tick();
        assert_eq!(handle.buffer_properties().size(), 4);
        assert_eq!(handle.status().data_revision, 1);
    }

    #[test]
    fn test_crop_in_pause_applies_other_requests() {
        let (mut state, handle) = build(counting_driver(), 8);

        handle.submit_crop_buffer_request(CropBufferRequest::new(0, 3));
        handle.submit_buffer_in_point_index_request(1);
        state.tick();

        let props = handle.buffer_properties();
        assert_eq!(props.size(), 4);
        assert_eq!(props.in_point(), 1);
        assert_eq!(props.out_point(), 3);
    }

    #[test]
    fn test_running_ignores_index_moves() {
        let (mut state, handle) = build(counting_driver(), 8);

        handle.set_session_mode(SessionMode::Running);
        state.tick();
        handle.submit_buffer_index_request(0);
        handle.submit_increment_buffer_index_request(3);
        state.tick();
        assert_eq!(handle.buffer_properties().current_index(), 2);

        handle.set_session_mode(SessionMode::Pause);
        state.tick();
        handle.submit_buffer_index_request(0);
        state.tick();
        assert_eq!(handle.buffer_properties().current_index(), 0);
    }

    #[test]
    fn test_fill_and_resize_bump_revision() {
        let (mut state, handle) = build(counting_driver(), 8);
        state.tick();

        handle.submit_fill_buffer_request(FillBufferRequest::new(true, 0, 7));
        state.tick();
        assert_eq!(handle.status().data_revision, 1);

        handle.submit_buffer_size_request(16);
        state.tick();
        assert_eq!(handle.status().data_revision, 2);
        assert_eq!(handle.buffer_properties().size(), 16);

        // Invalid requests change nothing
        handle.submit_fill_buffer_request(FillBufferRequest::new(false, 0, 99));
        state.tick();
        assert_eq!(handle.status().data_revision, 2);
    }

    #[test]
    fn test_playback_wraps_inside_window() {
        let (mut state, handle) = build(counting_driver(), 8);

        handle.set_session_mode(SessionMode::Running);
        for _ in 0..4 {
            state.tick();
        }
        assert_eq!(handle.buffer_properties().current_index(), 4);

        // Rate 1.0 steps two samples per tick over the window [0, 4]
        handle.set_session_mode(SessionMode::Playback);
        let mut visited = Vec::new();
        for _ in 0..4 {
            state.tick();
            visited.push(handle.buffer_properties().current_index());
        }
        assert_eq!(visited, vec![0, 2, 4, 0]);
        assert_eq!(state.plan.playback_step, 2);
    }

    #[test]
    fn test_playback_loads_history() {
        let (mut state, handle) = build(counting_driver(), 8);
        let channel = handle.link_variable(crate::variables::TIME_VARIABLE_NAME).unwrap();

        handle.set_session_mode(SessionMode::Running);
        for _ in 0..3 {
            state.tick();
        }
        handle.set_session_mode(SessionMode::Pause);
        state.tick();
        handle.submit_buffer_index_request(2);
        state.tick();
        channel.pull();

        handle.set_session_mode(SessionMode::Playback);
        state.tick();
        assert_eq!(channel.pull(), Some(2.0));
    }

    #[test]
    fn test_mode_change_listener() {
        let (mut state, handle) = build(counting_driver(), 8);
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let sink = transitions.clone();
        handle.add_session_mode_change_listener(move |t| sink.lock().unwrap().push(*t));

        handle.set_session_mode(SessionMode::Pause);
        state.tick();
        handle.set_session_mode(SessionMode::Running);
        state.tick();
        handle.set_session_mode(SessionMode::Playback);
        state.tick();

        assert_eq!(
            transitions.lock().unwrap().as_slice(),
            [
                (SessionMode::Pause, SessionMode::Running),
                (SessionMode::Running, SessionMode::Playback),
            ]
        );
        assert!(state.reschedule);
    }

    #[test]
    fn test_timing_changes_reported() {
        let (mut state, handle) = build(counting_driver(), 8);
        let rates = Arc::new(Mutex::new(Vec::new()));
        let sink = rates.clone();
        handle.add_session_properties_listener(move |p| {
            sink.lock().unwrap().push(p.playback_real_time_rate)
        });

        state.tick();
        handle.submit_playback_real_time_rate(4.0).unwrap();
        assert!(handle.submit_playback_real_time_rate(-1.0).is_err());
        state.tick();

        assert_eq!(rates.lock().unwrap().last(), Some(&4.0));
        assert_eq!(handle.session_properties().playback_real_time_rate, 4.0);
        assert_eq!(state.timing.plan(SessionMode::Playback).playback_step, 8);
    }

    #[test]
    fn test_reinitialize_runs_initialize_again() {
        let mut driver = MockSessionDriver::new();
        driver.expect_register_variables().returning(|_| Ok(()));
        driver.expect_initialize().times(2).returning(|_| Ok(()));
        driver.expect_pause_tick().returning(|_| Ok(false));
        let (mut state, handle) = build(driver, 8);

        state.tick();
        state.tick();
        handle.reinitialize_session();
        state.tick();
        assert!(handle.status().initialized);
        assert_eq!(handle.status().tick_count, 3);
    }

    #[test]
    fn test_disposed_channel_dropped_on_publish() {
        let (mut state, handle) = build(counting_driver(), 8);
        let channel = handle.link_variable("x").unwrap();
        state.tick();
        assert_eq!(state.channels.len(), 1);

        channel.dispose();
        handle.submit_buffer_index_request(3);
        state.tick();
        assert!(state.channels.is_empty());
    }

    #[test]
    fn test_panicking_listener_reported_as_tick_error() {
        let (mut state, handle) = build(counting_driver(), 8);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        handle.add_tick_error_listener(move |e| sink.lock().unwrap().push(e.to_string()));
        handle.add_session_mode_change_listener(|_| panic!("listener exploded"));
        let (after, seen) = counter();
        handle.add_session_mode_change_listener(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        handle.set_session_mode(SessionMode::Running);
        state.tick();
        state.tick();

        assert_eq!(state.mode, SessionMode::Running);
        assert_eq!(after.load(Ordering::SeqCst), 1);
        assert_eq!(
            errors.lock().unwrap().as_slice(),
            ["Listener panicked: listener exploded"]
        );
        assert_eq!(handle.buffer_properties().current_index(), 2);
    }

    #[test]
    fn test_panicking_tick_error_listener_is_contained() {
        let mut driver = MockSessionDriver::new();
        driver.expect_register_variables().returning(|_| Ok(()));
        driver.expect_initialize().returning(|_| Ok(()));
        driver
            .expect_run_tick()
            .returning(|_| Err(anyhow::anyhow!("diverged")));
        driver.expect_pause_tick().returning(|_| Ok(false));
        let (mut state, handle) = build(driver, 8);
        handle.add_tick_error_listener(|_| panic!("error listener exploded"));

        handle.set_session_mode(SessionMode::Running);
        state.tick();
        assert_eq!(state.mode, SessionMode::Pause);
        state.tick();
        assert_eq!(handle.status().tick_count, 2);
    }

    #[test]
    fn test_pre_mode_change_sees_current_mode() {
        let (mut state, handle) = build(counting_driver(), 8);
        let events = Arc::new(Mutex::new(Vec::new()));

        let sink = events.clone();
        let observer = handle.clone();
        handle.add_pre_session_mode_change_listener(move |(current, requested)| {
            assert_eq!(observer.active_mode(), *current);
            sink.lock().unwrap().push(("pre", *current, *requested));
        });
        let sink = events.clone();
        handle.add_session_mode_change_listener(move |(previous, new)| {
            sink.lock().unwrap().push(("post", *previous, *new));
        });

        handle.set_session_mode(SessionMode::Pause);
        state.tick();
        handle.set_session_mode(SessionMode::Running);
        state.tick();

        use SessionMode::{Pause, Running};
        assert_eq!(
            events.lock().unwrap().as_slice(),
            [("pre", Pause, Running), ("post", Pause, Running)]
        );
        assert_eq!(handle.active_mode(), Running);
    }

    #[test]
    fn test_removed_listener_not_called() {
        let (mut state, handle) = build(counting_driver(), 8);
        let (calls, seen) = counter();
        let id = handle.add_current_buffer_properties_listener(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        state.tick();
        assert!(handle.remove_listener(id));
        assert!(!handle.remove_listener(id));
        state.tick();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_request_ack_released_after_status_update() {
        let (mut state, handle) = build(counting_driver(), 8);
        state.tick();

        handle.submit_buffer_size_request(16);
        let ack = state.intents.request_acks.register().unwrap();
        let observer = handle.clone();
        let size_at_ack = std::thread::spawn(move || {
            ack.recv().unwrap();
            observer.buffer_properties().size()
        });
        state.tick();
        assert_eq!(size_at_ack.join().unwrap(), 16);
        assert!(state.intents.request_acks.is_empty());
    }

    #[test]
    fn test_running_acks_only_on_recorded_ticks() {
        let mut cfg = config(8);
        cfg.buffer_record_tick_period = 2;
        let (mut state, handle, _wake) =
            SchedulerState::new(&cfg, Box::new(counting_driver())).unwrap();
        handle.set_session_mode(SessionMode::Running);

        let ack = state.intents.request_acks.register().unwrap();
        state.tick();
        assert!(ack.try_recv().is_err());
        state.tick();
        assert!(ack.try_recv().is_ok());
    }

    #[test]
    fn test_idle_serves_blocked_requests() {
        let (mut state, handle) = build(counting_driver(), 8);
        let channel = handle.link_variable("x").unwrap();
        state.tick();
        channel.pull();

        // Suspension is acknowledged without touching the buffer
        let suspended = state.intents.suspend_acks.register().unwrap();
        state.idle();
        assert!(suspended.try_recv().is_ok());
        assert_eq!(handle.status().tick_count, 1);

        handle.submit_buffer_index_request(5);
        let ack = state.intents.request_acks.register().unwrap();
        state.idle();
        assert!(ack.try_recv().is_ok());
        assert_eq!(handle.buffer_properties().current_index(), 5);
        assert_eq!(channel.pull(), Some(0.0));
        // Idle passes are not ticks
        assert_eq!(handle.status().tick_count, 1);
    }

    #[test]
    fn test_dropping_state_disconnects_waiters() {
        let (state, _handle) = build(counting_driver(), 8);
        let pending = state.intents.request_acks.register().unwrap();
        let intents = state.intents.clone();
        drop(state);
        assert!(pending.recv().is_err());
        assert!(intents.request_acks.register().is_none());
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let (_state, handle) = build(counting_driver(), 8);
        let err = handle.link_variable("missing").unwrap_err();
        assert!(matches!(err, SessionError::UnknownVariable(_)));
    }
}
