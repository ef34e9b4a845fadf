//! Integration tests for the `roversim-db` data layer.
//!
//! These tests require a live Dragonfly (or Redis) instance. Run with:
//!
//! ```bash
//! docker run -d -p 6379:6379 docker.dragonflydb.io/dragonflydb/dragonfly
//! cargo test -p roversim-db -- --ignored
//! ```
//!
//! All tests are marked `#[ignore]` so they are skipped during normal
//! `cargo test` runs. Every test uses a fresh key prefix and fresh stream
//! names, so they do not interfere with each other or with a running engine.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use std::time::Duration;

use roversim_core::config::{PipelineConfig, StreamsConfig};
use roversim_core::kinematics::DriveParams;
use roversim_core::pipeline::EventPipeline;
use roversim_core::shutdown::Shutdown;
use roversim_core::store::StateStore;
use roversim_core::transport::EventLog;
use roversim_core::world::World;
use roversim_db::DragonflyPool;
use roversim_types::{CommandMessage, EntityId, EventId, Fields, Point, Pose};
use uuid::Uuid;

/// Dragonfly connection URL for the local Docker instance.
const DRAGONFLY_URL: &str = "redis://localhost:6379";

fn unique(name: &str) -> String {
    format!("roversim-test:{}:{name}", Uuid::new_v4())
}

async fn connect(prefix: &str) -> DragonflyPool {
    DragonflyPool::connect(DRAGONFLY_URL, prefix)
        .await
        .expect("Failed to connect to Dragonfly -- is it running?")
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance"]
async fn pose_and_time_roundtrip() {
    let pool = connect(&unique("state")).await;
    let id = EntityId::new("prime");

    assert_eq!(pool.load_pose(&id).await.unwrap(), None);
    assert_eq!(pool.load_simulated_time().await.unwrap(), None);

    let pose = Pose::new(Point::new(0.25, -1.5), 3.0);
    pool.save_pose(&id, pose).await.unwrap();
    pool.save_simulated_time(1_234.5).await.unwrap();

    let restored = pool.load_pose(&id).await.unwrap().unwrap();
    assert!(restored.approx_eq(pose, 1e-12));
    assert_eq!(pool.load_simulated_time().await.unwrap(), Some(1_234.5));

    pool.delete(&pool.pose_key(&id)).await.unwrap();
    pool.delete(&pool.time_key()).await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance"]
async fn corrupt_time_is_reported() {
    let pool = connect(&unique("corrupt")).await;
    pool.set_string(&pool.time_key(), "yesterday").await.unwrap();
    assert!(pool.load_simulated_time().await.is_err());
    pool.delete(&pool.time_key()).await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance"]
async fn cursor_roundtrip() {
    let pool = connect(&unique("cursor")).await;
    assert_eq!(pool.load_cursor("cmd").await.unwrap(), None);
    pool.save_cursor("cmd", EventId::new(1_700_000_000_000, 4))
        .await
        .unwrap();
    assert_eq!(
        pool.load_cursor("cmd").await.unwrap(),
        Some(EventId::new(1_700_000_000_000, 4))
    );
    pool.delete(&pool.cursor_key("cmd")).await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance"]
async fn stream_append_tail_and_read() {
    let pool = connect(&unique("streams")).await;
    let channel = unique("motor_a");

    assert_eq!(pool.tail(&channel).await.unwrap(), EventId::ZERO);

    let fields = Fields::from([("power".to_owned(), "0.5".to_owned())]);
    let first = pool.append(&channel, &fields).await.unwrap();
    let second = pool.append(&channel, &fields).await.unwrap();
    assert!(second > first);
    assert_eq!(pool.tail(&channel).await.unwrap(), second);

    let batch = pool
        .read(&[(channel.clone(), first)], 10, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, second);
    assert_eq!(batch[0].fields["power"], "0.5");

    let empty = pool
        .read(&[(channel.clone(), second)], 10, Duration::from_millis(50))
        .await
        .unwrap();
    assert!(empty.is_empty());

    pool.delete(&channel).await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance"]
async fn pipeline_executes_command_over_dragonfly() {
    let prefix = unique("pipeline");
    let streams = StreamsConfig {
        motor_a: unique("motor_a"),
        motor_b: unique("motor_b"),
        command: unique("cmd"),
        telemetry: unique("telemetry"),
        results: unique("results"),
        ..StreamsConfig::default()
    };
    let state = connect(&prefix).await;
    let log = connect(&prefix).await;
    let rover = EntityId::new("prime");

    let world = World::with_rover(state.clone(), rover.clone(), DriveParams::default())
        .await
        .unwrap();
    let mut pipeline = EventPipeline::new(
        world,
        log.clone(),
        rover.clone(),
        streams.clone(),
        &PipelineConfig::default(),
    )
    .await
    .unwrap();

    let message = CommandMessage {
        id: Some("it-1".to_owned()),
        cmd: "fwd".to_owned(),
        args: "10".to_owned(),
    };
    log.append(&streams.command, &message.to_fields())
        .await
        .unwrap();

    let shutdown = Shutdown::new();
    for _ in 0..20 {
        pipeline.poll_once(&shutdown).await.unwrap();
        if pipeline.hold_deadline().is_none() && pipeline.stats().commands == 1 {
            break;
        }
    }

    let results = log
        .read(&[(streams.results.clone(), EventId::ZERO)], 10, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].fields["id"], "it-1");
    assert_eq!(results[0].fields["result"], "ok");

    let pose = state.load_pose(&rover).await.unwrap().unwrap();
    assert!(pose.point.x > 0.0);

    for key in [
        &streams.motor_a,
        &streams.motor_b,
        &streams.command,
        &streams.telemetry,
        &streams.results,
    ] {
        state.delete(key).await.unwrap();
    }
    state.delete(&state.pose_key(&rover)).await.unwrap();
    state.delete(&state.time_key()).await.unwrap();
    state.delete(&state.cursor_key(&streams.command)).await.unwrap();
    state.delete(&state.cursor_key(&streams.motor_a)).await.unwrap();
    state.delete(&state.cursor_key(&streams.motor_b)).await.unwrap();
}
