//! Test data builders for creating test objects

use simsession_rs::{session::SessionMode, SessionConfig};

/// Builder for session configs that tick as fast as possible
pub struct ConfigBuilder {
    config: SessionConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig {
                name: "test".to_string(),
                initial_buffer_size: 64,
                buffer_publish_period_ns: 0,
                pause_tick_period_ms: 1,
                session_properties_period_ms: 10,
                ..Default::default()
            },
        }
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.initial_buffer_size = size;
        self
    }

    pub fn record_tick_period(mut self, period: u32) -> Self {
        self.config.buffer_record_tick_period = period;
        self
    }

    pub fn initial_mode(mut self, mode: SessionMode) -> Self {
        self.config.initial_mode = mode;
        self
    }

    pub fn real_time(mut self, session_dt_ns: u64) -> Self {
        self.config.run_at_real_time_rate = true;
        self.config.session_dt_ns = session_dt_ns;
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .buffer_size(16)
            .record_tick_period(3)
            .initial_mode(SessionMode::Running)
            .build();

        assert_eq!(config.initial_buffer_size, 16);
        assert_eq!(config.buffer_record_tick_period, 3);
        assert_eq!(config.initial_mode, SessionMode::Running);
        assert!(config.validate().is_ok());
    }
}
