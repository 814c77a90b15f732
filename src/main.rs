/*!
 * Tether CLI - inspect integration health from the attempt log
 *
 * Author: Shane Wall <shaneawall@gmail.com>
 */

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tether::{
    config::TetherConfig,
    error::{Result, TetherError, EXIT_SUCCESS},
    logging,
    monitor::{AggregateHealthSummary, HealthLevel, HealthWatcher},
    output::{OutputWriter, StatusView},
    resilience::CancellationToken,
    IntegrationGuard,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tether")]
#[command(version, about = "Circuit breaking, retries and health reporting for third-party integrations", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// SQLite attempt log (overrides database_path from the config file)
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rolling status (trailing status window) of one integration
    Status {
        /// Integration id
        integration: String,
    },

    /// Per-day metrics (trailing metrics window) of one integration
    Metrics {
        /// Integration id
        integration: String,
    },

    /// Health classification and recommendations for one integration
    Health {
        /// Integration id
        integration: String,
    },

    /// Check every active integration once
    Monitor,

    /// Check every active integration periodically until Ctrl-C
    Watch {
        /// Seconds between sweeps (defaults to monitor.watch_interval_secs)
        #[arg(long, value_name = "SECS")]
        interval_secs: Option<u64>,
    },

    /// Write a default configuration file
    Init {
        /// Where to write the configuration
        #[arg(long, default_value = "tether.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let output = OutputWriter::new(cli.json);

    let code = match run(cli, &output) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            output.error(&e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli, output: &OutputWriter) -> Result<()> {
    if let Commands::Init { path, force } = &cli.command {
        return init_config(path, *force, output);
    }

    let config = load_config(&cli)?;
    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let guard = IntegrationGuard::open(&config).await?;
        let result = dispatch(cli.command, &guard, &config, output).await;
        if let Err(e) = guard.shutdown().await {
            warn!(error = %e, "Attempt writer did not shut down cleanly");
        }
        result
    })
}

fn load_config(cli: &Cli) -> Result<TetherConfig> {
    let mut config = match &cli.config {
        Some(path) => TetherConfig::from_file(path)?,
        None => TetherConfig::default(),
    };

    if let Some(db) = &cli.db {
        config.database_path = Some(db.clone());
    }
    if cli.verbose {
        config.verbose = true;
    }

    config.validate()?;
    Ok(config)
}

fn init_config(path: &PathBuf, force: bool, output: &OutputWriter) -> Result<()> {
    if path.exists() && !force {
        return Err(TetherError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    TetherConfig::default().to_file(path)?;
    output.info(&format!("Wrote default configuration to {}", path.display()));
    Ok(())
}

async fn dispatch(
    command: Commands,
    guard: &IntegrationGuard,
    config: &TetherConfig,
    output: &OutputWriter,
) -> Result<()> {
    match command {
        Commands::Status { integration } => {
            let status = guard.integration_status(&integration).await?;
            let circuit = guard.circuit_status(&integration);
            output.status(&StatusView {
                status: &status,
                circuit: &circuit,
            });
            Ok(())
        }

        Commands::Metrics { integration } => {
            let metrics = guard.integration_metrics(&integration).await?;
            output.metrics(&metrics);
            Ok(())
        }

        Commands::Health { integration } => {
            let report = guard.check_health(&integration).await?;
            output.health(&report);
            match report.health {
                HealthLevel::Healthy => Ok(()),
                HealthLevel::Degraded => Err(TetherError::Unhealthy {
                    degraded: 1,
                    unhealthy: 0,
                }),
                HealthLevel::Unhealthy => Err(TetherError::Unhealthy {
                    degraded: 0,
                    unhealthy: 1,
                }),
            }
        }

        Commands::Monitor => {
            let summary = guard.monitor_all().await?;
            output.summary(&summary);
            summary_result(&summary)
        }

        Commands::Watch { interval_secs } => {
            let interval = interval_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.monitor.watch_interval());
            if interval.is_zero() {
                return Err(TetherError::Config(
                    "--interval-secs must be greater than 0".to_string(),
                ));
            }

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Interrupt received, stopping watcher"),
                    Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C, stopping watcher"),
                }
                trigger.cancel();
            });

            let sweep_output = output.clone();
            let sweeps = HealthWatcher::new(guard.monitor().clone())
                .with_interval(interval)
                .on_sweep(move |summary| sweep_output.sweep(summary))
                .run(cancel)
                .await;

            output.info(&format!("Watcher stopped after {} sweep(s)", sweeps));
            Ok(())
        }

        Commands::Init { .. } => Ok(()),
    }
}

fn summary_result(summary: &AggregateHealthSummary) -> Result<()> {
    if !summary.failed.is_empty() {
        return Err(TetherError::Other(format!(
            "health check failed for {} integration(s)",
            summary.failed.len()
        )));
    }
    if summary.degraded + summary.unhealthy > 0 {
        return Err(TetherError::Unhealthy {
            degraded: summary.degraded,
            unhealthy: summary.unhealthy,
        });
    }
    Ok(())
}
