//! Session data types

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Playback rates at or below this advance one sample per tick.
pub const SLOW_PLAYBACK_RATE_THRESHOLD: f64 = 0.5;

/// Active mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionMode {
    /// Advancing simulated state and recording it
    Running,
    /// Replaying recorded history
    Playback,
    /// Idle; only serves requests and pushes
    #[default]
    Pause,
}

impl SessionMode {
    /// Check if running
    pub fn is_running(&self) -> bool {
        matches!(self, SessionMode::Running)
    }

    /// Check if playing back
    pub fn is_playback(&self) -> bool {
        matches!(self, SessionMode::Playback)
    }

    /// Check if paused
    pub fn is_paused(&self) -> bool {
        matches!(self, SessionMode::Pause)
    }

    /// Display name for the mode
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionMode::Running => "Running",
            SessionMode::Playback => "Playback",
            SessionMode::Pause => "Pause",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "running" | "run" => Ok(SessionMode::Running),
            "playback" | "play" => Ok(SessionMode::Playback),
            "pause" | "paused" => Ok(SessionMode::Pause),
            other => Err(format!("unknown session mode '{}'", other)),
        }
    }
}

/// Session-level settings reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionProperties {
    pub active_mode: SessionMode,
    pub run_at_real_time_rate: bool,
    pub playback_real_time_rate: f64,
    /// Simulated time advanced by one run tick
    pub session_tick_to_time_increment: Duration,
    pub buffer_record_tick_period: u32,
}

/// Everything that determines how fast ticks are scheduled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionTiming {
    pub session_dt: Duration,
    pub buffer_record_tick_period: u32,
    pub run_at_real_time_rate: bool,
    pub playback_real_time_rate: f64,
    pub pause_tick_period: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            session_dt: Duration::from_micros(100),
            buffer_record_tick_period: 1,
            run_at_real_time_rate: false,
            playback_real_time_rate: 1.0,
            pause_tick_period: Duration::from_millis(10),
        }
    }
}

impl SessionTiming {
    /// Simulated time between two recorded samples
    pub fn time_increment(&self) -> Duration {
        self.session_dt * self.buffer_record_tick_period.max(1)
    }

    /// Compute the tick period (and playback step) for `mode`.
    pub fn plan(&self, mode: SessionMode) -> TickPlan {
        match mode {
            SessionMode::Running => TickPlan {
                period: if self.run_at_real_time_rate {
                    self.session_dt
                } else {
                    Duration::from_nanos(1)
                },
                playback_step: 1,
            },
            SessionMode::Playback => {
                let increment = self.time_increment().as_nanos() as f64;
                let rate = self.playback_real_time_rate;
                let (step, period_nanos) = if rate <= SLOW_PLAYBACK_RATE_THRESHOLD {
                    (1, increment / rate)
                } else {
                    let step = 2 * (rate.floor() as usize).max(1);
                    (step, increment * step as f64 / rate)
                };
                TickPlan {
                    period: Duration::from_nanos(period_nanos.round().max(1.0) as u64),
                    playback_step: step,
                }
            }
            SessionMode::Pause => TickPlan {
                period: self.pause_tick_period,
                playback_step: 1,
            },
        }
    }

    pub fn session_properties(&self, mode: SessionMode) -> SessionProperties {
        SessionProperties {
            active_mode: mode,
            run_at_real_time_rate: self.run_at_real_time_rate,
            playback_real_time_rate: self.playback_real_time_rate,
            session_tick_to_time_increment: self.session_dt,
            buffer_record_tick_period: self.buffer_record_tick_period,
        }
    }
}

/// Schedule for the active mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPlan {
    /// Wall-clock time between tick starts
    pub period: Duration,
    /// Samples advanced per playback tick
    pub playback_step: usize,
}
