use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use runewarden_engine::sim::SimulatedClient;
use runewarden_runner::config::{ConfigLoadError, RunewardenConfig};
use runewarden_runner::logging::init_logging;
use runewarden_runner::{
    spawn_consumer, ClientLauncher, CommandError, CommandLauncher, CommandTable, LoggingConsumer,
    SimulatedLauncher, SupervisorManager,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enables debug logging
    #[arg(short, long)]
    debug: bool,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Supervisors to start right away
    #[arg(short, long, num_args = 1..)]
    start: Vec<String>,

    /// Spawn the configured client executable; world reads and input still
    /// go through the simulated adapters
    #[arg(long)]
    launch_client: bool,
}

fn create_example_config(config_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let example_config = r#"# Runewarden Configuration
# Add one [characters.<name>] table per supervisor

[client]
executable = "Game.exe"
ready_timeout_secs = 60
stop_timeout_secs = 30

[engine]
max_iterations = 10000
max_run_duration_secs = 900

[characters.sorc]
auth_method = "username_password"
username = "user"
password = "pass"
realm = "eu.example.net"
difficulty = "hell"
runs = ["countess", "lower_kurast"]
pickit = ["Shako", "Harlequin Crest"]

[characters.sorc.auto_restart]
enabled = true
max_restarts = 3
delay_secs = 10
"#;

    fs::write(config_path, example_config)?;
    eprintln!("Config file created at: {}", config_path.display());
    eprintln!("Please edit it with your character details, then run runewarden again.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => RunewardenConfig::config_path()?,
    };
    let config = match RunewardenConfig::load_from(&config_path) {
        Ok(config) => config,
        Err(ConfigLoadError::NotFound) => return create_example_config(&config_path),
        Err(e) => return Err(e).context("failed to load configuration"),
    };

    let _guard = init_logging(
        "cli",
        config.client.log_dir.as_deref(),
        cli.debug || config.client.debug,
    )
    .context("failed to initialize logging")?;
    info!("Starting runewarden with {} character(s)", config.characters.len());

    let launcher: Arc<dyn ClientLauncher> = if cli.launch_client {
        Arc::new(CommandLauncher::new(config.client.executable.clone(), |_| {
            Ok(SimulatedClient::new().with_default_reactions().backend())
        }))
    } else {
        Arc::new(SimulatedLauncher::new())
    };
    let manager = Arc::new(SupervisorManager::new(config, launcher).with_config_path(config_path));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = spawn_consumer(manager.event_bus(), Box::new(LoggingConsumer), shutdown_rx);

    for name in &cli.start {
        if let Err(e) = manager.start(name).await {
            error!("Failed to start {}: {}", name, e);
        }
    }

    let table = CommandTable::new();
    eprintln!("Available supervisors: {}", manager.available_supervisors().join(", "));
    eprintln!("Commands:\n{}", table.help());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                match line {
                    "" => continue,
                    "quit" | "exit" => break,
                    "help" => {
                        eprintln!("{}", table.help());
                        continue;
                    }
                    _ => {}
                }
                match table.dispatch(&manager, line).await {
                    Ok(reply) => println!("{}", reply),
                    Err(e @ CommandError::Unknown { .. }) => println!("{}", e),
                    Err(e) => println!("Error: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    manager.stop_all().await;
    let _ = shutdown_tx.send(true);
    let _ = consumer.await;
    info!("Goodbye");
    Ok(())
}
