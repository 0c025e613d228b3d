//! ringside - per-node sidecar for a clustered data store.
//!
//! Usage:
//!   ringside run <CONFIG>                 Run the monitor, audit and API until Ctrl+C
//!   ringside validate <CONFIG>            Validate a configuration file
//!   ringside manifest <CONFIG> [--id ID]  Write a backup manifest and print its path

use clap::{Parser, Subcommand};
use ringside::{
    ApiState, EventBus, EventHandler, HealthMonitor, HealthState, ManifestMaterializer,
    MembershipCoordinator, RingAuditTask, Scheduler, SidecarConfig, YamlLoader,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// ringside - per-node sidecar for a clustered data store
#[derive(Parser)]
#[command(name = "ringside")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sidecar
    Run {
        /// Path to the sidecar YAML file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Validate a configuration file without running
    Validate {
        /// Path to the sidecar YAML file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Write a backup manifest and print its path
    Manifest {
        /// Path to the sidecar YAML file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Backup identifier (default: incremental manifest)
        #[arg(long)]
        id: Option<String>,
    },
}

/// Logs completions and skips at info.
struct LoggingHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &ringside::Event) {
        match event {
            ringside::Event::TaskCompleted { task, duration, .. } => {
                info!("Task '{}' completed in {:?}", task, duration);
            }
            ringside::Event::FireSkipped { task, .. } => {
                info!("Task '{}' fire skipped, previous fire still running", task);
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_sidecar(config).await?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::Manifest { config, id } => {
            write_manifest(config, id)?;
        }
    }

    Ok(())
}

/// Run the scheduler with the health monitor, the optional ring audit and the API.
async fn run_sidecar(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading configuration from: {}", path.display());
    let config = YamlLoader::load(&path)?;

    let health = HealthState::new();
    let monitor = HealthMonitor::new(
        config.process_name.clone(),
        Arc::new(config.probe()),
        health.clone(),
    );
    let coordinator = Arc::new(MembershipCoordinator::new(
        config.membership_settings(),
        config.cloud.provider(),
    ));

    let event_bus = EventBus::new();
    event_bus.register(Arc::new(LoggingHandler)).await;

    let mut scheduler = Scheduler::new()
        .with_event_bus(event_bus)
        .with_overlap_policy(config.scheduler.overlap)
        .with_tick_interval(config.scheduler.tick_interval())
        .with_shutdown_timeout(config.scheduler.shutdown_timeout());

    scheduler.register(Arc::new(monitor), config.health_timer()?)?;
    match config.audit_timer() {
        Some(timer) => {
            let audit = RingAuditTask::new(Arc::clone(&coordinator));
            scheduler.register(Arc::new(audit), timer?)?;
        }
        None => info!("Ring audit disabled"),
    }

    info!("Starting scheduler...");
    info!("Press Ctrl+C to stop");
    let (handle, scheduler_task) = scheduler.start();

    let api_task = if config.api.enabled {
        let state = ApiState {
            handle: handle.clone(),
            health,
            coordinator,
            process_name: Arc::from(config.process_name.as_str()),
        };
        Some(ringside::api::start_server(&config.api, state).await?)
    } else {
        None
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            handle.shutdown().await?;
        }
        _ = scheduler_task => {
            warn!("Scheduler stopped");
        }
    }

    if let Some(api_task) = api_task {
        api_task.abort();
    }

    info!("Goodbye!");
    Ok(())
}

/// Validate a configuration file without running.
fn validate_config(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating configuration: {}", path.display());

    let config = YamlLoader::load(&path)?;
    print_summary(&config);
    Ok(())
}

fn print_summary(config: &SidecarConfig) {
    println!("Configuration OK");
    println!("  Process: {}", config.process_name);
    println!("  Ring: {} ({} rac(s))", config.ring_name, config.racs.len());
    println!("  ACL group: {}", config.acl_group_name);
    println!("  Region: {}", config.dc);
    if let Ok(timer) = config.health_timer() {
        println!("  Health monitor: {}", timer);
    }
    match config.audit_timer() {
        Some(Ok(timer)) => println!("  Ring audit: {}", timer),
        _ => println!("  Ring audit: disabled"),
    }
    if config.api.enabled {
        println!("  API: http://{}", config.api.bind_address());
    }
}

/// Finalize a backup manifest and print its path.
fn write_manifest(path: PathBuf, id: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = YamlLoader::load(&path)?;
    let materializer = ManifestMaterializer::new(config.backup.tmp_dir());

    let manifest = materializer.finalize(id.as_deref())?;
    println!("{}", manifest.display());
    Ok(())
}
