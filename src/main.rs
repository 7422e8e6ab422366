use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use coding_time_tracker::calendar::{GoogleCalendarClient, PendingEventStore};
use coding_time_tracker::config::Config;
use coding_time_tracker::logging::{self, LoggingConfig};
use coding_time_tracker::notifications::NotificationManager;
use coding_time_tracker::service::ProductionTrackerService;
use coding_time_tracker::system::{
    NativeSystemService, StandardFileSystem, SysinfoProcessTable, SystemServiceInterface,
};
use coding_time_tracker::tracker::PresenceProbe;

#[derive(Parser)]
#[command(name = "coding-time-tracker")]
#[command(about = "Records editor sessions as calendar events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Track sessions and record them on the calendar (default)
    Run,
    /// Report whether the target application is running
    Probe {
        /// Keep probing until interrupted
        #[arg(short, long)]
        watch: bool,
        /// Seconds between probes in watch mode
        #[arg(short, long, default_value_t = 5)]
        interval: u64,
    },
    /// Authorize calendar access and cache the token
    Auth,
    /// Retry events whose calendar insert failed earlier
    Resubmit,
    /// Validate configuration file
    CheckConfig,
    /// Send a test desktop notification
    TestNotification,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Commands::Run);

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        logging::parse_level(&config.general.log_level)
    };
    let mut logging_config = LoggingConfig::from_settings(&config.logging, level);
    // Only the long-running tracker writes rotated diagnostic files
    logging_config.file_output &= matches!(command, Commands::Run);
    let (_guard, log_dir) = logging::initialize_logging(logging_config)?;

    if let Some(dir) = &log_dir {
        if let Err(e) = logging::cleanup_old_logs(dir, config.logging.keep_days) {
            warn!("Log cleanup failed: {}", e);
        }
    }

    match command {
        Commands::Run => run_tracker(config),
        Commands::Probe { watch, interval } => probe(&config, watch, interval),
        Commands::Auth => authorize(&config),
        Commands::Resubmit => resubmit(&config),
        Commands::CheckConfig => check_config(&config),
        Commands::TestNotification => NotificationManager::desktop(&config).test_notification(),
    }
}

fn run_tracker(config: Config) -> Result<()> {
    config.validate()?;
    info!("Starting coding time tracker");

    let mut service = ProductionTrackerService::new_production(config)
        .context("Failed to initialise the tracker")?;

    println!("Coding time tracker started");
    println!("  Press Ctrl+C to stop");

    if let Err(e) = service.start() {
        error!("Tracker stopped: {}", e);
        return Err(e.into());
    }

    println!("Tracker stopped");
    Ok(())
}

fn probe(config: &Config, watch: bool, interval: u64) -> Result<()> {
    let mut probe = PresenceProbe::new(SysinfoProcessTable::new(), &config.general.target_process);
    let system = NativeSystemService::new();
    if watch {
        system.register_signal_handlers()?;
    }

    loop {
        let running = probe.is_target_running()?;
        println!(
            "{} {}",
            config.general.app_label,
            if running { "is running" } else { "is not running" }
        );

        if !watch || !system.should_continue_running() {
            return Ok(());
        }
        system.sleep_ms(interval.max(1) * 1000)?;
        if !system.should_continue_running() {
            return Ok(());
        }
    }
}

fn authorize(config: &Config) -> Result<()> {
    let client = GoogleCalendarClient::from_config(config)?;
    client.authorize(true)?;

    println!("✓ Calendar access authorized");
    println!("  Token cached at {}", config.token_path()?.display());
    Ok(())
}

fn resubmit(config: &Config) -> Result<()> {
    let store = PendingEventStore::new(StandardFileSystem, config.pending_events_path()?);
    if store.load()?.is_empty() {
        println!("No pending events");
        return Ok(());
    }

    let client = GoogleCalendarClient::from_config(config)?;
    client.authorize(true)?;

    let report = store.resubmit(&client)?;
    for created in &report.created {
        println!("✓ Created {}", created.reference());
    }
    println!(
        "{} created, {} still pending in {}",
        report.created.len(),
        report.remaining,
        store.path().display()
    );
    if report.unreadable > 0 {
        println!(
            "  {} unreadable lines left in place for manual review",
            report.unreadable
        );
    }

    match report.fatal {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn check_config(config: &Config) -> Result<()> {
    info!("Validating configuration");
    config.validate()?;

    println!("Configuration validation:");
    println!("  ✓ Configuration file parsed successfully");
    println!(
        "  ✓ Tracking '{}' every {}s",
        config.general.target_process, config.general.poll_interval_secs
    );
    println!("  ✓ Calendar: {}", config.calendar.calendar_id);
    println!("  ✓ Activity log: {}", config.activity_log_path()?.display());
    println!(
        "  ✓ Pending events: {}",
        config.pending_events_path()?.display()
    );

    let credentials = config.credentials_path()?;
    if credentials.exists() {
        println!("  ✓ Client secrets: {}", credentials.display());
    } else {
        println!("  ✗ Client secrets missing: {}", credentials.display());
    }

    Ok(())
}
