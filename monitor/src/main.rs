//! Vitals monitor service main entry point
//!
//! Starts the background sample ticker and serves the dashboard and its JSON
//! API until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vitals_monitor::{
    config::MonitorConfig,
    generator::{RandomWalkGenerator, SampleSource},
    ApiServer, AppState, ChartRenderer, MetricsCollector, MonitorController, MonitorError,
};

/// Vitals monitor command line interface
#[derive(Parser)]
#[command(name = "vitals-monitor")]
#[command(about = "Simulated heart rate and SpO2 dashboard")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (overrides the configuration file)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Listener port (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Run the ticker and serve the dashboard
    Serve,

    /// Validate configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,
    },

    /// Print generated samples as JSON lines and exit
    Sample {
        /// Number of samples to print
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };

    // The guard flushes the file writer on drop, so it lives as long as main
    let _log_guard = match initialize_logging(&cli, &config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            process::exit(1);
        }
    };

    let result = match &cli.command {
        Some(Commands::Serve) | None => serve(config).await,
        Some(Commands::Config { show }) => handle_config(&config, *show),
        Some(Commands::Sample { count }) => print_samples(&config, *count),
    };

    if let Err(e) = result {
        let category = e
            .downcast_ref::<MonitorError>()
            .map_or("command", MonitorError::category);
        error!(category, "Command failed: {:#}", e);
        process::exit(1);
    }
}

/// Load configuration from file, environment and command line overrides
fn load_configuration(cli: &Cli) -> anyhow::Result<MonitorConfig> {
    let mut config = MonitorConfig::load_with_fallback(cli.config.as_ref())
        .context("unable to load monitor configuration")?;

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.json_logs {
        config.logging.json = true;
    }

    config.validate().context("invalid command line override")?;
    Ok(config)
}

/// Initialize logging based on configuration
fn initialize_logging(cli: &Cli, config: &MonitorConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("vitals_monitor={}", log_level).parse()?)
        .add_directive(format!("tower_http={}", log_level).parse()?)
        .add_directive("tokio=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("mio=warn".parse()?);

    let json = config.logging.json || cli.json_logs;
    let json_layer = json.then(|| fmt::layer().json());
    let text_layer = (!json).then(|| fmt::layer().with_target(false));

    let (file_layer, guard) = match &config.logging.file_path {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("log file path has no file name: {}", path.display()))?;

            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .context("a global subscriber is already installed")?;

    Ok(guard)
}

/// Start the ticker, serve until a shutdown signal, then stop the ticker
async fn serve(config: MonitorConfig) -> anyhow::Result<()> {
    info!("Starting vitals monitor service");

    let metrics = MetricsCollector::new(config.metrics.clone()).map_err(MonitorError::from)?;
    let metrics = Arc::new(metrics);
    let controller = Arc::new(MonitorController::from_config(&config.sampling, metrics));
    controller.start().await;

    let state = AppState::new(controller.clone(), ChartRenderer::new(config.chart.clone()));
    let server = ApiServer::new(state, config.server.clone());

    let served = server.serve(shutdown_signal()).await;

    info!("Initiating graceful shutdown");
    controller.shutdown().await?;
    served.context("HTTP server failed")?;

    info!("Vitals monitor service stopped");
    Ok(())
}

/// Handle configuration commands
fn handle_config(config: &MonitorConfig, show: bool) -> anyhow::Result<()> {
    if show {
        println!("Effective configuration:");
        println!("{}", config.to_toml()?);
    } else {
        config.validate()?;
        println!("Configuration is valid");
    }

    Ok(())
}

/// Print samples straight from the generator, without the ticker
fn print_samples(config: &MonitorConfig, count: usize) -> anyhow::Result<()> {
    let mut generator = match config.sampling.seed {
        Some(seed) => RandomWalkGenerator::with_seed(seed),
        None => RandomWalkGenerator::new(),
    };

    for _ in 0..count {
        let sample = generator.next_sample();
        println!("{}", serde_json::to_string(&sample)?);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = wait_for_shutdown().await {
        error!("Failed to listen for shutdown signals: {}", e);
    }
}

/// Handle shutdown signals
#[cfg(unix)]
async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, initiating graceful shutdown");
        }
    }

    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, initiating graceful shutdown");
    Ok(())
}
