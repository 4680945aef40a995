//! Chart executor: the consumer-side update loop.
//!
//! The executor owns a set of [`ChartDataPipeline`]s and runs them on its own
//! thread, so chart reconstruction never happens on the scheduler thread.
//! It is driven through a [`ChartBridge`].

use super::bridge::{ChartBridge, ChartCommand, ChartMessage, ExecutorStats};
use super::chart_pipeline::ChartDataPipeline;
use crate::error::Result;
use crate::id::VarId;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub struct ChartExecutor {
    pipelines: Vec<ChartDataPipeline>,
    cmd_rx: Receiver<ChartCommand>,
    msg_tx: Sender<ChartMessage>,
    running: bool,
    refresh_period: Duration,
    last_cycle_time: Option<Instant>,
    last_stats_time: Instant,
    stats: ExecutorStats,
    busy_time: Duration,
}

impl ChartExecutor {
    pub fn new(
        cmd_rx: Receiver<ChartCommand>,
        msg_tx: Sender<ChartMessage>,
        refresh_period: Duration,
    ) -> Self {
        Self {
            pipelines: Vec::new(),
            cmd_rx,
            msg_tx,
            running: true,
            refresh_period,
            last_cycle_time: None,
            last_stats_time: Instant::now(),
            stats: ExecutorStats::default(),
            busy_time: Duration::ZERO,
        }
    }

    /// Spawn an executor thread and return the bridge that controls it.
    pub fn spawn(refresh_period: Duration) -> Result<(ChartBridge, JoinHandle<()>)> {
        let (bridge, cmd_rx, msg_tx) = ChartBridge::new();
        let thread = std::thread::Builder::new()
            .name("chart-executor".to_string())
            .spawn(move || ChartExecutor::new(cmd_rx, msg_tx, refresh_period).run())?;
        Ok((bridge, thread))
    }

    /// Run until Shutdown is received or the bridge is dropped.
    pub fn run(&mut self) {
        tracing::info!("Chart executor started");

        while self.running {
            self.process_commands();
            if !self.running {
                break;
            }

            self.last_cycle_time = Some(Instant::now());
            self.cycle();

            // Send stats periodically
            if self.last_stats_time.elapsed() >= Duration::from_millis(500) {
                self.send_stats();
                self.last_stats_time = Instant::now();
            }

            self.rate_limit();
        }

        let _ = self.msg_tx.send(ChartMessage::Shutdown);
        tracing::info!("Chart executor exiting after {} cycles", self.stats.cycles);
    }

    pub(crate) fn process_commands(&mut self) {
        loop {
            match self.cmd_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running = false;
                    break;
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: ChartCommand) {
        match cmd {
            ChartCommand::AddPipeline(pipeline) => {
                tracing::debug!("Chart pipeline added for {}", pipeline.var_id());
                self.pipelines.push(pipeline);
            }
            ChartCommand::RemovePipeline(var_id) => {
                self.pipelines.retain(|p| p.var_id() != var_id);
            }
            ChartCommand::SetRefreshPeriod(period) => {
                self.refresh_period = period;
            }
            ChartCommand::Shutdown => {
                self.running = false;
            }
        }
    }

    /// Update every pipeline once; returns the variables that were refreshed.
    pub fn cycle(&mut self) -> Vec<VarId> {
        let started = Instant::now();
        let refreshed: Vec<VarId> = self
            .pipelines
            .iter_mut()
            .filter_map(|p| p.update().then(|| p.var_id()))
            .collect();

        self.busy_time += started.elapsed();
        self.stats.cycles += 1;
        self.stats.refreshes += refreshed.len() as u64;

        if !refreshed.is_empty() {
            match self.msg_tx.try_send(ChartMessage::Refreshed(refreshed.clone())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => self.stats.dropped_messages += 1,
                Err(TrySendError::Disconnected(_)) => self.running = false,
            }
        }
        refreshed
    }

    pub fn stats(&self) -> ExecutorStats {
        let mut stats = self.stats;
        stats.pipelines = self.pipelines.len();
        if stats.cycles > 0 {
            stats.avg_cycle_us = self.busy_time.as_secs_f64() * 1e6 / stats.cycles as f64;
        }
        stats
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn send_stats(&self) {
        let _ = self.msg_tx.try_send(ChartMessage::Stats(self.stats()));
    }

    fn rate_limit(&self) {
        let Some(last) = self.last_cycle_time else {
            return;
        };
        let elapsed = last.elapsed();
        if elapsed < self.refresh_period {
            let remaining = self.refresh_period - elapsed;
            // Sleep for most of the wait, spin for the rest
            if remaining > Duration::from_millis(2) {
                std::thread::sleep(remaining - Duration::from_millis(1));
            }
            while last.elapsed() < self.refresh_period {
                std::hint::spin_loop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::scheduler::SchedulerState;
    use crate::session::{SessionDriver, SessionMode};
    use crate::variables::{VariableRegistry, TIME_VARIABLE_NAME};

    struct Clock;

    impl SessionDriver for Clock {
        fn run_tick(&mut self, registry: &mut VariableRegistry) -> anyhow::Result<f64> {
            Ok(registry.time() + 0.5)
        }
    }

    fn session() -> (SchedulerState, crate::session::SessionHandle) {
        let config = SessionConfig {
            initial_buffer_size: 16,
            buffer_publish_period_ns: 0,
            ..Default::default()
        };
        let (state, handle, _wake) = SchedulerState::new(&config, Box::new(Clock)).unwrap();
        (state, handle)
    }

    #[test]
    fn test_commands_manage_pipelines() {
        let (_state, handle) = session();
        let (bridge, cmd_rx, msg_tx) = ChartBridge::new();
        let mut executor = ChartExecutor::new(cmd_rx, msg_tx, Duration::from_millis(1));

        let pipeline = ChartDataPipeline::link(&handle, TIME_VARIABLE_NAME).unwrap();
        let var_id = pipeline.var_id();
        assert!(bridge.add_pipeline(pipeline));
        bridge.set_refresh_period(Duration::from_millis(7));
        executor.process_commands();
        assert_eq!(executor.pipeline_count(), 1);
        assert_eq!(executor.refresh_period, Duration::from_millis(7));

        bridge.remove_pipeline(var_id);
        bridge.shutdown();
        executor.process_commands();
        assert_eq!(executor.pipeline_count(), 0);
        assert!(!executor.running);
    }

    #[test]
    fn test_cycle_reports_refreshed_variables() {
        let (mut state, handle) = session();
        let (bridge, cmd_rx, msg_tx) = ChartBridge::new();
        let mut executor = ChartExecutor::new(cmd_rx, msg_tx, Duration::from_millis(1));

        let pipeline = ChartDataPipeline::link(&handle, TIME_VARIABLE_NAME).unwrap();
        let var_id = pipeline.var_id();
        let caller = pipeline.register_caller();
        let observer = pipeline.channel().clone();
        bridge.add_pipeline(pipeline);
        executor.process_commands();

        state.tick();
        assert!(executor.cycle().is_empty());
        state.tick();
        assert_eq!(executor.cycle(), vec![var_id]);

        handle.set_session_mode(SessionMode::Running);
        observer.poll_chart_data(caller).unwrap();
        state.tick();
        executor.cycle();
        state.tick();
        assert_eq!(executor.cycle(), vec![var_id]);

        let msgs = bridge.drain();
        assert_eq!(msgs.len(), 2);
        assert!(matches!(&msgs[0], ChartMessage::Refreshed(ids) if ids == &vec![var_id]));

        let stats = executor.stats();
        assert_eq!(stats.cycles, 4);
        assert_eq!(stats.refreshes, 2);
        assert_eq!(stats.pipelines, 1);
    }

    #[test]
    fn test_spawned_executor_shuts_down() {
        let (bridge, thread) = ChartExecutor::spawn(Duration::from_millis(1)).unwrap();
        bridge.shutdown();
        thread.join().unwrap();
        let msgs = bridge.drain();
        assert!(matches!(msgs.last(), Some(ChartMessage::Shutdown)));
    }
}
