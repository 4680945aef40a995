//! Thread boundary between the chart executor and its owner.
//!
//! `ChartBridge` is the owner-side handle: it sends [`ChartCommand`]s to the
//! executor thread and drains the [`ChartMessage`]s it reports back.

use super::chart_pipeline::ChartDataPipeline;
use crate::id::VarId;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::time::Duration;

/// Executor counters, reported periodically
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExecutorStats {
    /// Update cycles run so far
    pub cycles: u64,
    /// Pipeline updates that published new chart data
    pub refreshes: u64,
    /// `Refreshed` messages dropped because the owner was not draining
    pub dropped_messages: u64,
    /// Mean time spent updating pipelines per cycle
    pub avg_cycle_us: f64,
    pub pipelines: usize,
}

/// Messages sent from the executor thread to its owner.
#[derive(Debug, Clone)]
pub enum ChartMessage {
    /// Variables whose chart data was republished this cycle.
    Refreshed(Vec<VarId>),

    /// Periodic executor statistics.
    Stats(ExecutorStats),

    /// Executor is shutting down.
    Shutdown,
}

/// Commands sent from the owner to the executor thread.
#[derive(Debug)]
pub enum ChartCommand {
    /// Start updating a pipeline.
    AddPipeline(ChartDataPipeline),
    /// Stop updating every pipeline bound to this variable.
    RemovePipeline(VarId),
    /// Change the time between update cycles.
    SetRefreshPeriod(Duration),
    /// Shut down the executor thread.
    Shutdown,
}

/// Channel capacity for commands (owner → executor).
const CMD_CHANNEL_CAPACITY: usize = 256;
/// Channel capacity for messages (executor → owner).
const MSG_CHANNEL_CAPACITY: usize = 1024;

/// Owner-side handle for communicating with the executor thread.
pub struct ChartBridge {
    pub cmd_tx: Sender<ChartCommand>,
    pub msg_rx: Receiver<ChartMessage>,
}

impl ChartBridge {
    /// Create a new bridge pair: `(bridge, cmd_rx, msg_tx)`.
    ///
    /// The executor thread owns `cmd_rx` and `msg_tx`.
    pub fn new() -> (Self, Receiver<ChartCommand>, Sender<ChartMessage>) {
        let (cmd_tx, cmd_rx) = bounded(CMD_CHANNEL_CAPACITY);
        let (msg_tx, msg_rx) = bounded(MSG_CHANNEL_CAPACITY);
        (Self { cmd_tx, msg_rx }, cmd_rx, msg_tx)
    }

    /// Drain all pending messages.
    pub fn drain(&self) -> Vec<ChartMessage> {
        let mut msgs = Vec::new();
        while let Ok(msg) = self.msg_rx.try_recv() {
            msgs.push(msg);
        }
        msgs
    }

    /// Try to receive a single message without blocking.
    pub fn try_recv(&self) -> Option<ChartMessage> {
        self.msg_rx.try_recv().ok()
    }

    pub fn send_command(&self, cmd: ChartCommand) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }

    pub fn add_pipeline(&self, pipeline: ChartDataPipeline) -> bool {
        self.send_command(ChartCommand::AddPipeline(pipeline))
    }

    pub fn remove_pipeline(&self, var_id: VarId) {
        let _ = self.cmd_tx.send(ChartCommand::RemovePipeline(var_id));
    }

    pub fn set_refresh_period(&self, period: Duration) {
        let _ = self.cmd_tx.send(ChartCommand::SetRefreshPeriod(period));
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(ChartCommand::Shutdown);
    }
}
