use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

use garagectl::{GarageConfig, GarageOrchestrator, HardwareBackend};

#[derive(Parser, Debug)]
#[command(name = "garagectl")]
#[command(about = "Garage door controller with debounced limit switches and WebSocket state fan-out")]
#[command(version)]
#[command(long_about = "Reads the open, closed and lock switches of each garage door, derives \
a door status, pulses the door and light relays on request and pushes the combined state \
to every connected WebSocket observer. Runs against sysfs GPIO or a simulated garage.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "garagectl.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the controller")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - initialize but don't start components
    #[arg(long, help = "Perform dry run - initialize components but don't start them")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rotated file in this directory
    #[arg(long, value_name = "DIR", help = "Directory for rotated log files")]
    log_dir: Option<PathBuf>,

    /// Use the simulated garage regardless of the configured backend
    #[arg(long, help = "Run against a simulated garage instead of GPIO hardware")]
    simulate: bool,

    /// Enable the local keyboard console
    #[arg(short, long, help = "Enable keyboard console: 1-9 toggle doors, l+N toggles a light, q quits")]
    keyboard: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let log_guard = init_logging(&args);

    info!("Starting garagectl v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match GarageConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.simulate {
        config.hardware.backend = HardwareBackend::Simulated;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    info!(
        "Controlling {} doors with {:?} hardware",
        config.doors.len(),
        config.hardware.backend
    );

    let mut orchestrator = GarageOrchestrator::new(config).await.map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;
    orchestrator.set_keyboard_enabled(args.keyboard);

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize controller: {}", e);
        e
    })?;

    if args.dry_run {
        info!("Dry run mode - components initialized but not started");
        println!("✓ Dry run completed successfully - all components initialized");
        return Ok(());
    }

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start controller: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("Controller error during execution: {}", e);
        e
    })?;

    info!("garagectl exited with code: {}", exit_code);

    // Flush the file appender before exiting
    drop(log_guard);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Option<WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("garagectl={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "garagectl.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    if let Some(dir) = &args.log_dir {
        info!("Also logging to {}", dir.join("garagectl.log").display());
    }

    guard
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# garagectl configuration file");
    println!("# This is the default configuration with all available options");
    println!("# Environment variables override it, e.g. GARAGECTL_SERVER__HTTP_PORT=9000");
    println!();
    println!("{}", toml::to_string(&GarageConfig::default())?);
    Ok(())
}
