//! Engine binary for the rover simulator.
//!
//! Wires configuration, Dragonfly, the world, and the event pipeline
//! together, then runs the pipeline until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `roversim-config.yaml`
//! 3. Connect to Dragonfly (one connection for state, one for streams)
//! 4. Build the world and restore the rover's persisted pose
//! 5. Resolve channel cursors and create the event pipeline
//! 6. Install the Ctrl-C handler
//! 7. Run the pipeline until shutdown
//! 8. Log the result
//!
//! Any failure before step 7 exits non-zero without entering the loop.

mod error;

use std::path::Path;
use std::sync::Arc;

use roversim_core::config::RoversimConfig;
use roversim_core::pipeline::{self, EventPipeline};
use roversim_core::shutdown::Shutdown;
use roversim_core::world::World;
use roversim_db::DragonflyPool;
use roversim_types::EntityId;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "roversim-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the event loop fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("roversim-engine starting");

    // 2. Load configuration.
    let config = RoversimConfig::load_or_default(Path::new(CONFIG_PATH)).map_err(EngineError::from)?;
    info!(
        rover = config.rover.id,
        max_motor_velocity = config.drive.max_motor_velocity,
        wheelbase_length = config.drive.wheelbase_length,
        poll_timeout_ms = config.pipeline.poll_timeout_ms,
        "Configuration loaded"
    );

    // 3. Connect to Dragonfly.
    let state = connect(&config).await?;
    let streams = connect(&config).await?;

    // 4. Build the world.
    let rover = EntityId::new(config.rover.id.as_str());
    let world = World::with_rover(state, rover.clone(), config.drive.params())
        .await
        .map_err(EngineError::from)?;

    // 5. Create the event pipeline.
    let mut pipeline = EventPipeline::new(
        world,
        streams,
        rover,
        config.streams.clone(),
        &config.pipeline,
    )
    .await
    .map_err(EngineError::from)?;

    // 6. Stop cleanly on Ctrl-C.
    let shutdown = Arc::new(Shutdown::new());
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Ctrl-C received, shutting down"),
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
            }
            shutdown.request();
        });
    }

    // 7. Run.
    let stats = pipeline.run(&shutdown).await.map_err(EngineError::from)?;

    // 8. Log results.
    pipeline::log_pipeline_end(&stats);
    info!(
        simulated_time = pipeline.world().simulated_time(),
        "roversim-engine shutdown complete"
    );

    Ok(())
}

/// Open a Dragonfly connection from the infrastructure config.
async fn connect(config: &RoversimConfig) -> Result<DragonflyPool, EngineError> {
    let url = &config.infrastructure.dragonfly_url;
    info!(url = %url, "Connecting to Dragonfly");
    DragonflyPool::connect(url, &config.infrastructure.key_prefix)
        .await
        .map_err(|source| EngineError::Connect {
            url: url.clone(),
            source,
        })
}
