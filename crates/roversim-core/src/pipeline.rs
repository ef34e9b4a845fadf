//! Event pipeline: consume motor and command events, drive the world,
//! publish telemetry and command results.
//!
//! [`EventPipeline::run`] is a single sequential loop:
//!
//! 1. **Shutdown check**: return cleanly once a stop has been requested.
//! 2. **Hold expiry**: if a timed command's deadline has passed, catch up,
//!    tick, stop both motors, and publish telemetry.
//! 3. **Wait**: block on the event log for up to the poll timeout,
//!    shortened to the pending hold deadline, racing the shutdown signal.
//! 4. **Apply**: for every event in id order, catch up the clock and tick
//!    the world first, then apply the event and publish telemetry, commit
//!    the channel cursor, and only then publish any command result. A
//!    crash can leave a command executed but unacknowledged, never
//!    acknowledged twice.
//! 5. **Idle tick**: if nothing arrived, catch up and tick anyway.
//!
//! Malformed events and rejected commands are logged and skipped; only
//! world, store, and transport failures end the loop with an error.

use std::collections::BTreeMap;
use std::time::Duration;

use roversim_types::{
    CommandMessage, CommandOutcome, CommandResult, EntityId, EventId, LogEvent, MotorPower,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::SimClock;
use crate::command::Command;
use crate::config::{PipelineConfig, StartPolicy, StreamsConfig};
use crate::entity::MotorSide;
use crate::shutdown::Shutdown;
use crate::store::{PersistError, StateStore};
use crate::transport::{EventLog, TransportError};
use crate::world::{World, WorldError};

/// Errors that end the event pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A world operation failed (including persistence during a tick).
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// The event log failed.
    #[error("transport error: {source}")]
    Transport {
        /// The underlying transport error.
        #[from]
        source: TransportError,
    },

    /// Committing or loading a cursor failed.
    #[error("persistence error: {source}")]
    Persist {
        /// The underlying store error.
        #[from]
        source: PersistError,
    },
}

/// Counters describing what the pipeline has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Events consumed from all channels.
    pub events: u64,
    /// Commands applied successfully.
    pub commands: u64,
    /// Events or commands rejected as malformed or invalid.
    pub rejected: u64,
    /// World ticks performed.
    pub ticks: u64,
}

/// Which subscribed channel an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Motor(MotorSide),
    Command,
}

/// The per-rover event loop.
#[derive(Debug)]
pub struct EventPipeline<S, L> {
    world: World<S>,
    log: L,
    rover: EntityId,
    streams: StreamsConfig,
    poll_timeout: Duration,
    batch_size: u64,
    clock: SimClock,
    cursors: BTreeMap<String, EventId>,
    hold_until: Option<Instant>,
    stats: PipelineStats,
}

impl<S: StateStore, L: EventLog> EventPipeline<S, L> {
    /// Create a pipeline driving `rover` inside `world`.
    ///
    /// Resolves the starting cursor of every subscribed channel from its
    /// [`StartPolicy`]: `tail` starts after the newest event present now,
    /// `committed` resumes after the stored cursor. A `committed` channel
    /// with nothing stored starts at the tail and commits it immediately,
    /// so events arriving from here on survive a restart.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::World`] if `rover` is not a rover in
    /// `world`, [`PipelineError::Transport`] if the log is unreachable,
    /// or [`PipelineError::Persist`] if cursors cannot be loaded or
    /// committed.
    pub async fn new(
        world: World<S>,
        log: L,
        rover: EntityId,
        streams: StreamsConfig,
        settings: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        world.rover(&rover)?;

        let mut cursors = BTreeMap::new();
        for (channel, policy) in [
            (&streams.motor_a, streams.motor_start),
            (&streams.motor_b, streams.motor_start),
            (&streams.command, streams.command_start),
        ] {
            let cursor = match policy {
                StartPolicy::Tail => log.tail(channel).await?,
                StartPolicy::Committed => match world.store().load_cursor(channel).await? {
                    Some(cursor) => cursor,
                    None => {
                        let tail = log.tail(channel).await?;
                        world.store().save_cursor(channel, tail).await?;
                        tail
                    }
                },
            };
            info!(channel = %channel, ?policy, cursor = %cursor, "Channel cursor resolved");
            cursors.insert(channel.clone(), cursor);
        }

        let clock = SimClock::new(world.simulated_time());
        Ok(Self {
            world,
            log,
            rover,
            streams,
            poll_timeout: settings.poll_timeout(),
            batch_size: settings.batch_size,
            clock,
            cursors,
            hold_until: None,
            stats: PipelineStats::default(),
        })
    }

    /// The world being driven.
    pub const fn world(&self) -> &World<S> {
        &self.world
    }

    /// The event log.
    pub const fn log(&self) -> &L {
        &self.log
    }

    /// Counters so far.
    pub const fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Current cursor of a subscribed channel.
    pub fn cursor(&self, channel: &str) -> Option<EventId> {
        self.cursors.get(channel).copied()
    }

    /// Deadline of the pending timed command, if any.
    pub const fn hold_deadline(&self) -> Option<Instant> {
        self.hold_until
    }

    /// Run until `shutdown` is requested.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`]. Shutdown is not an error.
    pub async fn run(&mut self, shutdown: &Shutdown) -> Result<PipelineStats, PipelineError> {
        info!(
            rover = %self.rover,
            simulated_time = self.clock.now(),
            poll_timeout_ms = u64::try_from(self.poll_timeout.as_millis()).unwrap_or(u64::MAX),
            "Event pipeline starting"
        );

        // Establishes the rover's reference time so the first event's
        // tick measures from here.
        self.tick().await?;

        loop {
            if shutdown.is_requested() {
                info!("Shutdown requested, leaving event pipeline");
                return Ok(self.stats);
            }
            self.poll_once(shutdown).await?;
        }
    }

    /// Perform one poll cycle: expire the hold, wait for events, apply
    /// them or tick idle.
    ///
    /// Returns early without ticking if `shutdown` fires during the wait.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`].
    pub async fn poll_once(&mut self, shutdown: &Shutdown) -> Result<(), PipelineError> {
        self.expire_hold().await?;

        let timeout = self.hold_until.map_or(self.poll_timeout, |deadline| {
            self.poll_timeout
                .min(deadline.saturating_duration_since(Instant::now()))
        });
        let cursors: Vec<(String, EventId)> = self
            .cursors
            .iter()
            .map(|(channel, id)| (channel.clone(), *id))
            .collect();

        let mut batch = tokio::select! {
            () = shutdown.wait() => return Ok(()),
            batch = self.log.read(&cursors, self.batch_size, timeout) => batch?,
        };

        if batch.is_empty() {
            self.tick().await?;
            return Ok(());
        }

        batch.sort_by_key(|event| event.id);
        debug!(events = batch.len(), "Processing batch");
        for event in batch {
            self.handle(event).await?;
        }
        Ok(())
    }

    async fn tick(&mut self) -> Result<f64, PipelineError> {
        let ts = self.clock.catch_up();
        self.world.tick(ts).await?;
        self.stats.ticks = self.stats.ticks.saturating_add(1);
        Ok(ts)
    }

    async fn expire_hold(&mut self) -> Result<(), PipelineError> {
        let Some(deadline) = self.hold_until else {
            return Ok(());
        };
        if Instant::now() < deadline {
            return Ok(());
        }
        self.hold_until = None;
        let ts = self.tick().await?;
        self.world.rover_mut(&self.rover)?.stop();
        info!(rover = %self.rover, simulated_time = ts, "Hold elapsed, motors stopped");
        self.publish_telemetry().await
    }

    fn source(&self, channel: &str) -> Option<Source> {
        if channel == self.streams.motor_a {
            Some(Source::Motor(MotorSide::A))
        } else if channel == self.streams.motor_b {
            Some(Source::Motor(MotorSide::B))
        } else if channel == self.streams.command {
            Some(Source::Command)
        } else {
            None
        }
    }

    async fn handle(&mut self, event: LogEvent) -> Result<(), PipelineError> {
        let cursor = self.cursors.get(&event.channel).copied();
        if cursor.is_some_and(|cursor| event.id <= cursor) {
            warn!(channel = %event.channel, id = %event.id, "Skipping already consumed event");
            return Ok(());
        }
        let Some(source) = self.source(&event.channel) else {
            warn!(channel = %event.channel, id = %event.id, "Event from unsubscribed channel");
            return Ok(());
        };

        self.stats.events = self.stats.events.saturating_add(1);
        self.tick().await?;

        let reply = match source {
            Source::Motor(side) => {
                self.apply_motor(side, &event).await?;
                None
            }
            Source::Command => self.apply_command(&event).await?,
        };

        self.world
            .store()
            .save_cursor(&event.channel, event.id)
            .await?;
        self.cursors.insert(event.channel.clone(), event.id);

        if let Some((id, outcome)) = reply {
            self.publish_result(&id, outcome).await?;
        }
        Ok(())
    }

    async fn apply_motor(&mut self, side: MotorSide, event: &LogEvent) -> Result<(), PipelineError> {
        match MotorPower::from_fields(&event.fields) {
            Ok(MotorPower { power }) => {
                self.world.rover_mut(&self.rover)?.set_motor_power(side, power);
                debug!(id = %event.id, ?side, power, "Motor power set");
                self.publish_telemetry().await
            }
            Err(err) => {
                self.stats.rejected = self.stats.rejected.saturating_add(1);
                warn!(channel = %event.channel, id = %event.id, error = %err, "Malformed motor event skipped");
                Ok(())
            }
        }
    }

    /// Apply a command event. Returns the result to publish once the
    /// cursor is committed, if the event carries a correlation id.
    async fn apply_command(
        &mut self,
        event: &LogEvent,
    ) -> Result<Option<(String, CommandOutcome)>, PipelineError> {
        let message = match CommandMessage::from_fields(&event.fields) {
            Ok(message) => message,
            Err(err) => {
                self.stats.rejected = self.stats.rejected.saturating_add(1);
                warn!(id = %event.id, error = %err, "Malformed command event");
                let reply = event
                    .fields
                    .get("id")
                    .filter(|id| !id.trim().is_empty())
                    .map(|id| (id.clone(), CommandOutcome::Error(err.to_string())));
                return Ok(reply);
            }
        };

        let text = message.text();
        let outcome = match Command::parse(&text) {
            Ok(command) => {
                self.execute(command)?;
                self.stats.commands = self.stats.commands.saturating_add(1);
                info!(id = %event.id, command = %command, correlation = ?message.id, "Command applied");
                self.publish_telemetry().await?;
                CommandOutcome::Ok
            }
            Err(err) => {
                self.stats.rejected = self.stats.rejected.saturating_add(1);
                warn!(id = %event.id, command = %text, error = %err, "Command rejected");
                CommandOutcome::Error(err.to_string())
            }
        };

        Ok(message.id.map(|id| (id, outcome)))
    }

    fn execute(&mut self, command: Command) -> Result<(), PipelineError> {
        let intent = command.intent();
        let Some((power_a, power_b)) = intent.powers else {
            return Ok(());
        };
        self.world
            .rover_mut(&self.rover)?
            .set_powers(power_a, power_b);
        let deadline = Instant::now().checked_add(intent.hold);
        if deadline.is_none() {
            warn!(command = %command, "Hold exceeds the clock range, motors run until the next command");
        }
        if let Some(previous) = std::mem::replace(&mut self.hold_until, deadline) {
            debug!(
                remaining_ms = u64::try_from(
                    previous.saturating_duration_since(Instant::now()).as_millis()
                )
                .unwrap_or(u64::MAX),
                "Pending hold replaced"
            );
        }
        Ok(())
    }

    async fn publish_telemetry(&self) -> Result<(), PipelineError> {
        let telemetry = self.world.rover(&self.rover)?.telemetry();
        self.log
            .append(&self.streams.telemetry, &telemetry.to_fields())
            .await?;
        Ok(())
    }

    async fn publish_result(&self, id: &str, outcome: CommandOutcome) -> Result<(), PipelineError> {
        let result = CommandResult {
            id: id.to_owned(),
            outcome,
        };
        self.log
            .append(&self.streams.results, &result.to_fields())
            .await?;
        Ok(())
    }
}

/// Log the pipeline's final counters.
pub fn log_pipeline_end(stats: &PipelineStats) {
    info!(
        events = stats.events,
        commands = stats.commands,
        rejected = stats.rejected,
        ticks = stats.ticks,
        "Event pipeline stopped"
    );
}
