//! Offline simulation.
//!
//! Runs the world directly from command lines, without the engine or the
//! event log. Each command sets the motors, the world is stepped in fixed
//! increments of simulated time for the command's hold, and then the
//! motors are stopped. `noop` holds nothing and advances a single step.
//! Poses and simulated time are persisted to the store exactly as the
//! engine would.

use std::time::Duration;

use roversim_core::clock::{self, SimClock};
use roversim_core::command::Command;
use roversim_core::store::StateStore;
use roversim_core::world::World;
use roversim_types::{EntityId, Pose};
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt as _;
use tracing::{info, warn};

use crate::console::{QUIT, SessionSummary};
use crate::error::CtlError;

/// Apply one command to the offline world and return the rover's new pose.
///
/// # Errors
///
/// Returns [`CtlError::World`] if a tick fails.
pub async fn apply<S: StateStore>(
    world: &mut World<S>,
    clock: &mut SimClock,
    rover: &EntityId,
    command: Command,
    step: Duration,
) -> Result<Option<Pose>, CtlError> {
    let intent = command.intent();
    if let Some((power_a, power_b)) = intent.powers {
        world.rover_mut(rover)?.set_powers(power_a, power_b);
        clock::run_for(world, clock, intent.hold, step).await?;
        world.rover_mut(rover)?.stop();
        world.tick(clock.now()).await?;
    } else {
        clock::run_for(world, clock, step, step).await?;
    }
    Ok(world.pose(rover))
}

/// Read commands from `input` until end of input or `quit`, applying each
/// to the offline world.
///
/// # Errors
///
/// Returns [`CtlError::Io`] if reading fails or [`CtlError::World`] if a
/// tick fails. Invalid commands are reported and skipped.
pub async fn run_session<S, R>(
    world: &mut World<S>,
    rover: &EntityId,
    step: Duration,
    input: R,
) -> Result<SessionSummary, CtlError>
where
    S: StateStore,
    R: AsyncBufRead + Unpin,
{
    let mut clock = SimClock::new(world.simulated_time());
    let mut summary = SessionSummary::default();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case(QUIT) {
            break;
        }
        let command = match Command::parse(text) {
            Ok(command) => command,
            Err(err) => {
                summary.rejected = summary.rejected.saturating_add(1);
                warn!(input = text, error = %err, "Invalid command");
                continue;
            }
        };
        if let Some(pose) = apply(world, &mut clock, rover, command, step).await? {
            info!(
                command = %command,
                x = pose.point.x,
                y = pose.point.y,
                heading_deg = pose.heading_degrees(),
                simulated_time = clock.now(),
                "Rover pose"
            );
        }
        summary.executed = summary.executed.saturating_add(1);
    }
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use roversim_core::kinematics::DriveParams;
    use roversim_core::store::MemoryStore;
    use roversim_types::Point;

    use super::*;

    const STEP: Duration = Duration::from_millis(100);

    async fn world(store: MemoryStore) -> World<MemoryStore> {
        World::with_rover(store, EntityId::new("prime"), DriveParams::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn forward_moves_and_stops() {
        let store = MemoryStore::new();
        let mut world = world(store.clone()).await;
        let rover = EntityId::new("prime");
        let input: &[u8] = b"fwd 100\nquit\nfwd 100\n";

        let summary = run_session(&mut world, &rover, STEP, input).await.unwrap();
        assert_eq!(summary.executed, 1);

        let pose = world.pose(&rover).unwrap();
        assert!(pose.approx_eq(Pose::new(Point::new(0.0008, 0.0), 0.0), 1e-9));
        assert!((world.simulated_time() - 1.0).abs() < 1e-9);
        let motors = world.rover(&rover).unwrap().telemetry();
        assert!(motors.motor_a_power.abs() < f64::EPSILON);
        assert!(motors.motor_b_power.abs() < f64::EPSILON);

        let persisted = store.load_pose(&rover).await.unwrap().unwrap();
        assert!(persisted.approx_eq(pose, 1e-12));
    }

    #[tokio::test]
    async fn session_resumes_from_persisted_state() {
        let store = MemoryStore::new();
        let rover = EntityId::new("prime");
        {
            let mut first = world(store.clone()).await;
            run_session(&mut first, &rover, STEP, &b"fwd 100\n"[..])
                .await
                .unwrap();
        }
        let mut second = world(store).await;
        assert!((second.simulated_time() - 1.0).abs() < 1e-9);
        run_session(&mut second, &rover, STEP, &b"fwd 100\n"[..])
            .await
            .unwrap();

        let pose = second.pose(&rover).unwrap();
        assert!((pose.point.x - 0.0016).abs() < 1e-9);
        assert!((second.simulated_time() - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn noop_advances_one_step_in_place() {
        let store = MemoryStore::new();
        let mut world = world(store.clone()).await;
        let rover = EntityId::new("prime");

        let summary = run_session(&mut world, &rover, STEP, &b"noop\nnoop\n"[..])
            .await
            .unwrap();
        assert_eq!(summary.executed, 2);
        assert!((world.simulated_time() - 0.2).abs() < 1e-9);
        assert!(world.pose(&rover).unwrap().approx_eq(Pose::default(), 1e-12));
        let saved = store.load_simulated_time().await.unwrap().unwrap();
        assert!((saved - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn turns_change_heading_and_bad_lines_are_skipped() {
        let mut world = world(MemoryStore::new()).await;
        let rover = EntityId::new("prime");
        let summary = run_session(&mut world, &rover, STEP, &b"lt 90\nspin\nfwd -1\n"[..])
            .await
            .unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(summary.rejected, 2);
        let heading = world.pose(&rover).unwrap().heading;
        // Left turns run motor B faster, so the heading decreases.
        assert!(heading > std::f64::consts::PI);
    }
}
