//! Operator console for the rover simulator.
//!
//! Usage: `roversim-ctl <command>`
//!
//! - `send` -- read commands from stdin and drive the motor channels
//!   directly, holding each command for its duration.
//! - `cmd <text>` -- queue one command on the command channel for the
//!   engine to execute, tagged with a correlation id.
//! - `tail <channel>` -- print new events on a channel until Ctrl-C.
//! - `simulate` -- run the world offline from stdin commands in fixed
//!   time steps, persisting to Dragonfly (or memory with `--memory`).

mod console;
mod error;
mod simulate;
mod tail;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roversim_core::config::RoversimConfig;
use roversim_core::shutdown::Shutdown;
use roversim_core::store::{MemoryStore, StateStore};
use roversim_core::world::World;
use roversim_db::DragonflyPool;
use roversim_types::EntityId;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "roversim-ctl")]
#[command(about = "Rover simulator operator console")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "roversim-config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive the motor channels from stdin commands (`quit` to stop)
    Send,

    /// Queue one command for the engine
    Cmd {
        /// Command text, e.g. `fwd 100`
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Correlation id (defaults to a fresh UUID)
        #[arg(long)]
        id: Option<String>,
    },

    /// Print new events on a channel until Ctrl-C
    Tail {
        /// Channel (stream key) to follow
        channel: String,
    },

    /// Run the world offline from stdin commands
    Simulate {
        /// Keep state in memory instead of Dragonfly
        #[arg(long)]
        memory: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = RoversimConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::Send => send(&config).await,
        Command::Cmd { text, id } => queue(&config, &text.join(" "), id).await,
        Command::Tail { channel } => follow(&config, &channel).await,
        Command::Simulate { memory: true } => run_offline(&config, MemoryStore::new()).await,
        Command::Simulate { memory: false } => {
            let store = connect(&config).await?;
            run_offline(&config, store).await
        }
    }
}

async fn connect(config: &RoversimConfig) -> Result<DragonflyPool> {
    let url = &config.infrastructure.dragonfly_url;
    DragonflyPool::connect(url, &config.infrastructure.key_prefix)
        .await
        .with_context(|| format!("connecting to Dragonfly at {url}"))
}

async fn send(config: &RoversimConfig) -> Result<()> {
    let log = connect(config).await?;
    let input = BufReader::new(tokio::io::stdin());
    let summary = console::run_session(&log, &config.streams, input).await?;
    info!(
        executed = summary.executed,
        rejected = summary.rejected,
        "Session complete"
    );
    Ok(())
}

async fn queue(config: &RoversimConfig, text: &str, id: Option<String>) -> Result<()> {
    let id = id.unwrap_or_else(|| Uuid::now_v7().to_string());
    let message = console::command_message(text, id)?;
    let log = connect(config).await?;
    let event = console::send_command(&log, &config.streams, &message).await?;
    println!("{event} {}", message.id.as_deref().unwrap_or_default());
    Ok(())
}

async fn follow(config: &RoversimConfig, channel: &str) -> Result<()> {
    let log = connect(config).await?;
    let shutdown = Arc::new(Shutdown::new());
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.request();
            }
        });
    }
    let printed = tail::follow(&log, channel, &shutdown, |event| {
        println!("{}", tail::format_event(event));
    })
    .await?;
    info!(channel, printed, "Tail stopped");
    Ok(())
}

async fn run_offline<S: StateStore>(config: &RoversimConfig, store: S) -> Result<()> {
    let rover = EntityId::new(config.rover.id.as_str());
    let mut world = World::with_rover(store, rover.clone(), config.drive.params())
        .await
        .context("restoring rover")?;
    let input = BufReader::new(tokio::io::stdin());
    let summary = simulate::run_session(
        &mut world,
        &rover,
        config.pipeline.time_step(),
        input,
    )
    .await?;
    info!(
        executed = summary.executed,
        rejected = summary.rejected,
        simulated_time = world.simulated_time(),
        "Simulation complete"
    );
    Ok(())
}
