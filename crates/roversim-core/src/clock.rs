//! Simulated time.
//!
//! [`SimClock`] holds the simulated timestamp (seconds) and the wall-clock
//! instant it was last synchronized at. The event pipeline calls
//! [`SimClock::catch_up`] before every tick so idle wall time between
//! events is folded into the next tick's elapsed interval. The offline
//! driver instead advances the clock in fixed steps with
//! [`SimClock::advance`] and never consults the wall clock.
//!
//! Wall time is read from [`tokio::time::Instant`], which tests can pause
//! and advance deterministically.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::store::StateStore;
use crate::world::{World, WorldError};

/// Simulated timestamp synchronized against the wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    simulated: f64,
    synced_at: Instant,
}

impl SimClock {
    /// Start the clock at `simulated` seconds, synchronized to now.
    pub fn new(simulated: f64) -> Self {
        Self {
            simulated,
            synced_at: Instant::now(),
        }
    }

    /// Current simulated timestamp, without catching up.
    pub const fn now(&self) -> f64 {
        self.simulated
    }

    /// Fold the wall time elapsed since the last synchronization into the
    /// simulated timestamp and return it.
    pub fn catch_up(&mut self) -> f64 {
        let now = Instant::now();
        let idle = now.saturating_duration_since(self.synced_at);
        self.simulated += idle.as_secs_f64();
        self.synced_at = now;
        self.simulated
    }

    /// Advance the simulated timestamp by `step` and return it. The wall
    /// clock is not consulted.
    pub fn advance(&mut self, step: Duration) -> f64 {
        self.simulated += step.as_secs_f64();
        self.simulated
    }
}

/// Tick `world` every `step` of simulated time until `hold` has elapsed.
///
/// The world is ticked once at the current time before stepping, so the
/// first tick after a motor change starts the interval. The last step is
/// shortened so the total never exceeds `hold`. Returns the final
/// simulated timestamp.
///
/// # Errors
///
/// Returns the first [`WorldError`] raised by a tick.
pub async fn run_for<S: StateStore>(
    world: &mut World<S>,
    clock: &mut SimClock,
    hold: Duration,
    step: Duration,
) -> Result<f64, WorldError> {
    world.tick(clock.now()).await?;
    if step.is_zero() {
        return Ok(clock.now());
    }

    let mut remaining = hold;
    let mut steps: u64 = 0;
    while !remaining.is_zero() {
        let this_step = step.min(remaining);
        remaining = remaining.saturating_sub(this_step);
        let ts = clock.advance(this_step);
        world.tick(ts).await?;
        steps = steps.saturating_add(1);
    }

    debug!(steps, simulated_time = clock.now(), "Fixed-step run complete");
    Ok(clock.now())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use roversim_types::{EntityId, Point, Pose};

    use super::*;
    use crate::entity::Rover;
    use crate::kinematics::DriveParams;
    use crate::store::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn catch_up_adds_idle_wall_time() {
        let mut clock = SimClock::new(10.0);
        tokio::time::advance(Duration::from_secs(5)).await;
        let ts = clock.catch_up();
        assert!((ts - 15.0).abs() < 1e-9);

        // A second catch-up without idle time adds nothing.
        let again = clock.catch_up();
        assert!((again - 15.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_ignores_wall_time() {
        let mut clock = SimClock::new(0.0);
        tokio::time::advance(Duration::from_secs(60)).await;
        let ts = clock.advance(Duration::from_millis(100));
        assert!((ts - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn run_for_drives_rover_for_hold() {
        let id = EntityId::new("prime");
        let mut world = World::load(MemoryStore::new()).await.unwrap();
        world
            .add_entity(Rover::new(id.clone(), DriveParams::default()))
            .unwrap();
        world.restore_entity(&id).await.unwrap();
        world.rover_mut(&id).unwrap().set_powers(0.8, 0.8);

        let mut clock = SimClock::new(world.simulated_time());
        let end = run_for(
            &mut world,
            &mut clock,
            Duration::from_millis(1_050),
            Duration::from_millis(100),
        )
        .await
        .unwrap();

        assert!((end - 1.05).abs() < 1e-9);
        assert!((world.simulated_time() - 1.05).abs() < 1e-9);
        let pose = world.pose(&id).unwrap();
        assert!(pose.approx_eq(Pose::new(Point::new(0.0008 * 1.05, 0.0), 0.0), 1e-9));
    }

    #[tokio::test]
    async fn zero_hold_only_ticks_once() {
        let id = EntityId::new("prime");
        let mut world = World::load(MemoryStore::new()).await.unwrap();
        world
            .add_entity(Rover::new(id.clone(), DriveParams::default()))
            .unwrap();
        world.restore_entity(&id).await.unwrap();

        let mut clock = SimClock::new(3.0);
        let end = run_for(&mut world, &mut clock, Duration::ZERO, Duration::from_millis(100))
            .await
            .unwrap();
        assert!((end - 3.0).abs() < 1e-9);
        assert_eq!(world.rover(&id).unwrap().last_tick(), Some(3.0));
    }
}
