use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use nvmon_core::{ConfigError, Monitor, MonitorConfig, ShutdownWindow};

/// Watch one NVIDIA GPU and suspend the machine when it idles through a
/// configured daily window.
#[derive(Parser)]
#[command(name = "nvmon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Refresh interval in seconds
    #[arg(short, long, default_value = "1", value_parser = parse_interval)]
    interval: Duration,

    /// GPU index to watch
    #[arg(short, long, default_value_t = 0)]
    gpu_index: u32,

    /// Produce more logging output
    #[arg(short, long)]
    verbose: bool,

    /// Enable auto-suspend when the GPU is inactive for a longer time.
    /// Format: START-END,MINUTES,PERCENT where START and END are H[H]:MM;
    /// pass an empty string to disable
    #[arg(short, long, default_value = "1:30-9:00,30,10")]
    shutdown: String,

    /// Log to the given file instead of stdout
    #[arg(short, long)]
    log_file: Option<PathBuf>,
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err("interval must be a positive number of seconds".to_string());
    }
    Ok(Duration::from_secs_f64(secs))
}

fn parse_window(arg: &str) -> Result<Option<ShutdownWindow>, ConfigError> {
    if arg.is_empty() {
        return Ok(None);
    }
    arg.parse().map(Some)
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Arc::new(file)).init();
        }
        None => builder.init(),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A bad --shutdown argument is a usage error: report it and exit before any
    // logging or NVML setup happens.
    let window = match parse_window(&cli.shutdown) {
        Ok(window) => window,
        Err(e) => {
            eprintln!("failed to parse --shutdown argument '{}': {}", cli.shutdown, e);
            std::process::exit(2);
        }
    };

    init_logging(cli.verbose, cli.log_file.as_deref())?;
    info!("start logging");
    debug!("suspend window: {:?}", window);

    let config = MonitorConfig {
        gpu_index: cli.gpu_index,
        interval: cli.interval,
        window,
    };

    let mut monitor = Monitor::new(config)?;
    monitor.run().await?;

    debug!("done");
    Ok(())
}
