//! simsession - headless session runner
//!
//! Records a damped oscillator into the shared ring buffer, keeps one chart
//! pipeline per variable up to date, then replays the recording.

use anyhow::{Context, Result};
use clap::Parser;
use simsession_rs::{
    config::SessionConfig,
    pipeline::{ChartDataPipeline, ChartExecutor, ChartMessage},
    session::{SessionDriver, SessionMode, SessionScheduler},
    types::VariableType,
    variables::VariableRegistry,
    CallerId, LinkedChannel, VarId,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "simsession")]
#[command(about = "Run a simulation session and replay its recording", long_about = None)]
struct Args {
    /// Session config file (TOML). Defaults to the platform config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mode to enter once the session has started
    #[arg(long, default_value = "running")]
    mode: SessionMode,

    /// Seconds to record before switching to playback
    #[arg(long, default_value_t = 2.0)]
    duration_secs: f64,

    /// Override the ring buffer size
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Pace run ticks to wall-clock time
    #[arg(long)]
    realtime: bool,

    /// Playback speed relative to real time
    #[arg(long)]
    playback_rate: Option<f64>,

    /// Print the final session status as JSON on exit
    #[arg(long)]
    status_json: bool,
}

/// Mass on a spring with viscous damping, integrated with semi-implicit Euler
struct Oscillator {
    dt: f64,
    stiffness: f64,
    damping: f64,
    position: VarId,
    velocity: VarId,
    steps: VarId,
}

impl Oscillator {
    fn new(dt: Duration) -> Self {
        Self {
            dt: dt.as_secs_f64(),
            stiffness: 40.0,
            damping: 0.4,
            position: VarId(0),
            velocity: VarId(0),
            steps: VarId(0),
        }
    }
}

impl SessionDriver for Oscillator {
    fn register_variables(&mut self, registry: &mut VariableRegistry) -> Result<()> {
        self.position = registry.register("position", VariableType::Double)?;
        self.velocity = registry.register("velocity", VariableType::Double)?;
        self.steps = registry.register("steps", VariableType::Long)?;
        Ok(())
    }

    fn initialize(&mut self, registry: &mut VariableRegistry) -> Result<()> {
        registry.set(self.position, 1.0);
        registry.set(self.velocity, 0.0);
        registry.set(self.steps, 0.0);
        tracing::info!("Oscillator initialized (k={}, c={})", self.stiffness, self.damping);
        Ok(())
    }

    fn run_tick(&mut self, registry: &mut VariableRegistry) -> Result<f64> {
        let x = registry.get(self.position).context("position not registered")?;
        let v = registry.get(self.velocity).context("velocity not registered")?;
        let steps = registry.get(self.steps).unwrap_or(0.0);

        let a = -self.stiffness * x - self.damping * v;
        let v = v + a * self.dt;
        registry.set(self.velocity, v);
        registry.set(self.position, x + v * self.dt);
        registry.set(self.steps, steps + 1.0);
        Ok(registry.time() + self.dt)
    }

    fn shutdown(&mut self) {
        tracing::debug!("Oscillator stopped");
    }
}

/// Keeps the file writer alive until main returns
fn init_logging(config: &SessionConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter))
    };

    let (file_layer, guard) = match &config.logging.file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path.file_name().unwrap_or_else(|| "simsession.log".as_ref());
            let appender = tracing_appender::rolling::never(dir.unwrap_or(".".as_ref()), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter()))
        .with(file_layer)
        .init();
    guard
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = SessionConfig::load_or_default(args.config.as_deref());
    config.apply_env_overrides();
    if let Some(size) = args.buffer_size {
        config.initial_buffer_size = size;
    }
    if let Some(rate) = args.playback_rate {
        config.playback_real_time_rate = rate;
    }
    config.run_at_real_time_rate |= args.realtime;
    config.initial_mode = args.mode;
    config.validate()?;

    let _log_guard = init_logging(&config);
    tracing::info!("Starting session '{}'", config.name);

    let driver = Oscillator::new(config.timing().session_dt);
    let mut scheduler = SessionScheduler::start(&config, Box::new(driver))?;
    let handle = scheduler.handle();

    handle.add_session_mode_change_listener(|(from, to)| {
        tracing::info!("Session mode {} -> {}", from, to);
    });
    handle.add_tick_error_listener(|err| {
        tracing::error!("Tick failed: {}", err);
    });
    handle.add_shutdown_listener(|| tracing::debug!("Session thread exiting"));

    let (charts, chart_thread) = ChartExecutor::spawn(config.chart.refresh_period())?;
    let mut observers: Vec<(Arc<LinkedChannel>, CallerId)> = Vec::new();
    for variable in handle.variables().iter() {
        let pipeline = ChartDataPipeline::link(&handle, &variable.name)?;
        let caller = pipeline.register_caller();
        observers.push((pipeline.channel().clone(), caller));
        charts.add_pipeline(pipeline);
    }

    let record_until = Instant::now() + Duration::from_secs_f64(args.duration_secs.max(0.0));
    while Instant::now() < record_until {
        std::thread::sleep(Duration::from_millis(250));
        report(&charts.drain(), &observers);
    }

    let status = handle.status();
    tracing::info!(
        "Recorded {} ticks, window [{}, {}] of {}",
        status.tick_count,
        status.buffer.in_point(),
        status.buffer.out_point(),
        status.buffer.size()
    );

    handle.set_session_mode(SessionMode::Playback);
    std::thread::sleep(Duration::from_millis(500));
    tracing::info!("Playback at index {}", handle.buffer_properties().current_index());

    charts.shutdown();
    if chart_thread.join().is_err() {
        tracing::error!("Chart executor panicked");
    }
    for (channel, _) in &observers {
        channel.dispose();
    }
    scheduler.shutdown()?;

    if args.status_json {
        println!("{}", serde_json::to_string_pretty(&handle.status())?);
    }
    Ok(())
}

fn report(messages: &[ChartMessage], observers: &[(Arc<LinkedChannel>, CallerId)]) {
    for message in messages {
        if let ChartMessage::Stats(stats) = message {
            tracing::debug!(
                "Chart executor: {} cycles, {} refreshes, {:.1}us/cycle",
                stats.cycles,
                stats.refreshes,
                stats.avg_cycle_us
            );
        }
    }
    for (channel, caller) in observers {
        if let Some(chart) = channel.poll_chart_data(*caller) {
            tracing::info!(
                "{:>10}: {:>9.4} in [{:.4}, {:.4}]",
                channel.name(),
                channel.pull().unwrap_or(f64::NAN),
                chart.min(),
                chart.max()
            );
        }
    }
}
