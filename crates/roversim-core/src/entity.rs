//! Simulated entities: motors, compasses, and rovers.
//!
//! Entities hold instantaneous state only. Poses live in the
//! [`World`](crate::world::World), which applies the [`Movement`] an
//! entity reports from [`Entity::tick`] and then feeds the resulting pose
//! back to any sensor through [`Entity::observe`].
//!
//! The set of entity kinds is closed, so they are variants of one enum
//! rather than trait objects.

use roversim_types::{EntityId, Pose, Telemetry};
use tracing::debug;

use crate::kinematics::{self, DriveParams, Movement};

/// A single drive motor.
#[derive(Debug, Clone, PartialEq)]
pub struct Motor {
    id: EntityId,
    power: f64,
}

impl Motor {
    /// Create a stopped motor.
    pub const fn new(id: EntityId) -> Self {
        Self { id, power: 0.0 }
    }

    /// Motor id.
    pub const fn id(&self) -> &EntityId {
        &self.id
    }

    /// Current power.
    pub const fn power(&self) -> f64 {
        self.power
    }

    /// Set the power. Values are stored as given, without clamping.
    pub const fn set_power(&mut self, power: f64) {
        self.power = power;
    }
}

/// Heading sensor reading the pose of the entity it is mounted on.
#[derive(Debug, Clone, PartialEq)]
pub struct Compass {
    id: EntityId,
    mount: EntityId,
    heading_degrees: f64,
}

impl Compass {
    /// Create a compass mounted on `mount`, reading 0° until first observed.
    pub const fn new(id: EntityId, mount: EntityId) -> Self {
        Self {
            id,
            mount,
            heading_degrees: 0.0,
        }
    }

    /// Compass id.
    pub const fn id(&self) -> &EntityId {
        &self.id
    }

    /// Id of the entity whose heading this compass reports.
    pub const fn mount(&self) -> &EntityId {
        &self.mount
    }

    /// Last observed heading in degrees, within `[0, 360)`.
    pub const fn heading_degrees(&self) -> f64 {
        self.heading_degrees
    }

    /// Recompute the reading from the mount's pose.
    pub fn observe(&mut self, pose: &Pose) {
        self.heading_degrees = pose.heading_degrees();
    }
}

/// Which of the rover's two motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorSide {
    /// Motor A.
    A,
    /// Motor B.
    B,
}

/// A two-wheeled differential-drive rover.
#[derive(Debug, Clone, PartialEq)]
pub struct Rover {
    id: EntityId,
    motor_a: Motor,
    motor_b: Motor,
    compass: Compass,
    params: DriveParams,
    last_tick: Option<f64>,
}

impl Rover {
    /// Create a stopped rover. Component ids derive from `id`
    /// (`<id>:motor_a`, `<id>:motor_b`, `<id>:compass`).
    pub fn new(id: EntityId, params: DriveParams) -> Self {
        Self {
            motor_a: Motor::new(id.child("motor_a")),
            motor_b: Motor::new(id.child("motor_b")),
            compass: Compass::new(id.child("compass"), id.clone()),
            id,
            params,
            last_tick: None,
        }
    }

    /// Rover id.
    pub const fn id(&self) -> &EntityId {
        &self.id
    }

    /// Motor A.
    pub const fn motor_a(&self) -> &Motor {
        &self.motor_a
    }

    /// Motor B.
    pub const fn motor_b(&self) -> &Motor {
        &self.motor_b
    }

    /// On-board compass.
    pub const fn compass(&self) -> &Compass {
        &self.compass
    }

    /// Drive-train constants.
    pub const fn params(&self) -> &DriveParams {
        &self.params
    }

    /// Timestamp of the last tick, `None` before the first.
    pub const fn last_tick(&self) -> Option<f64> {
        self.last_tick
    }

    /// Set one motor's power.
    pub const fn set_motor_power(&mut self, side: MotorSide, power: f64) {
        match side {
            MotorSide::A => self.motor_a.set_power(power),
            MotorSide::B => self.motor_b.set_power(power),
        }
    }

    /// Set both motors at once.
    pub const fn set_powers(&mut self, power_a: f64, power_b: f64) {
        self.motor_a.set_power(power_a);
        self.motor_b.set_power(power_b);
    }

    /// Force both motors to zero.
    pub const fn stop(&mut self) {
        self.set_powers(0.0, 0.0);
    }

    /// Advance to `ts` and report how far the rover moved since the last
    /// tick.
    ///
    /// The first tick only records `ts`, so it never moves the rover.
    pub fn tick(&mut self, ts: f64) -> Movement {
        let last = *self.last_tick.get_or_insert(ts);
        let dt = ts - last;
        let movement =
            kinematics::movement(self.motor_a.power, self.motor_b.power, dt, &self.params);
        self.last_tick = Some(ts);
        movement
    }

    /// Refresh sensors from the rover's new pose.
    pub fn observe(&mut self, pose: &Pose) {
        self.compass.observe(pose);
        debug!(
            rover = %self.id,
            heading_deg = pose.heading_degrees(),
            x = pose.point.x,
            y = pose.point.y,
            "Rover pose"
        );
    }

    /// Current motor powers and compass heading.
    pub const fn telemetry(&self) -> Telemetry {
        Telemetry {
            motor_a_power: self.motor_a.power,
            motor_b_power: self.motor_b.power,
            heading: self.compass.heading_degrees,
        }
    }
}

/// Any entity the world can tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// A free-standing motor.
    Motor(Motor),
    /// A free-standing compass.
    Compass(Compass),
    /// A rover with its own motors and compass.
    Rover(Rover),
}

impl Entity {
    /// Entity id.
    pub const fn id(&self) -> &EntityId {
        match self {
            Self::Motor(motor) => motor.id(),
            Self::Compass(compass) => compass.id(),
            Self::Rover(rover) => rover.id(),
        }
    }

    /// Advance to `ts`. Returns the movement to apply to this entity's
    /// pose, or `None` for entities that do not move.
    pub fn tick(&mut self, ts: f64) -> Option<Movement> {
        match self {
            Self::Motor(_) | Self::Compass(_) => None,
            Self::Rover(rover) => Some(rover.tick(ts)),
        }
    }

    /// Id of the entity whose pose this entity observes after a tick.
    pub const fn observes(&self) -> Option<&EntityId> {
        match self {
            Self::Motor(_) => None,
            Self::Compass(compass) => Some(compass.mount()),
            Self::Rover(rover) => Some(rover.id()),
        }
    }

    /// Feed the observed pose back to the entity's sensors.
    pub fn observe(&mut self, pose: &Pose) {
        match self {
            Self::Motor(_) => {}
            Self::Compass(compass) => compass.observe(pose),
            Self::Rover(rover) => rover.observe(pose),
        }
    }

    /// The rover inside this entity, if it is one.
    pub const fn as_rover(&self) -> Option<&Rover> {
        match self {
            Self::Rover(rover) => Some(rover),
            Self::Motor(_) | Self::Compass(_) => None,
        }
    }

    /// Mutable access to the rover inside this entity, if it is one.
    pub const fn as_rover_mut(&mut self) -> Option<&mut Rover> {
        match self {
            Self::Rover(rover) => Some(rover),
            Self::Motor(_) | Self::Compass(_) => None,
        }
    }
}

impl From<Rover> for Entity {
    fn from(rover: Rover) -> Self {
        Self::Rover(rover)
    }
}

impl From<Motor> for Entity {
    fn from(motor: Motor) -> Self {
        Self::Motor(motor)
    }
}

impl From<Compass> for Entity {
    fn from(compass: Compass) -> Self {
        Self::Compass(compass)
    }
}
