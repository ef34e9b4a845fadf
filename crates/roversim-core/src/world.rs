//! The world: entity registry, pose table, and simulated time.
//!
//! The world is the single source of truth for every entity's [`Pose`].
//! Poses change only through [`World::set_entity_position`],
//! [`World::translate`], and [`World::rotate`], and each of those writes
//! the new pose through to the [`StateStore`] before returning. After a
//! tick has advanced every entity, the tick timestamp is persisted as the
//! new simulated time.
//!
//! # Tick order
//!
//! Entities tick in registration order. For a moving entity the world
//! translates, then rotates, then lets the entity observe its new pose.

use std::collections::BTreeMap;

use roversim_types::{EntityId, Pose};
use tracing::{debug, info};

use crate::entity::{Entity, Rover};
use crate::kinematics::{DriveParams, Movement};
use crate::store::{PersistError, StateStore};

/// Errors that can occur during world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// No entity with this id is registered.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity exists but has no pose (never restored or positioned).
    #[error("entity {0} has no pose")]
    NoPose(EntityId),

    /// An entity with this id is already registered.
    #[error("duplicate entity id: {0}")]
    DuplicateEntity(EntityId),

    /// The entity exists but is not a rover.
    #[error("entity {0} is not a rover")]
    NotARover(EntityId),

    /// A tick was requested for a time earlier than the current simulated time.
    #[error("tick at {requested} precedes simulated time {current}")]
    TimeWentBackwards {
        /// Timestamp passed to the tick.
        requested: f64,
        /// Current simulated time.
        current: f64,
    },

    /// Writing state through to the store failed.
    #[error("persistence failure: {source}")]
    Persist {
        /// The underlying store error.
        #[from]
        source: PersistError,
    },
}

/// Pose table with write-through persistence.
#[derive(Debug)]
struct PoseTable<S> {
    store: S,
    poses: BTreeMap<EntityId, Pose>,
}

impl<S: StateStore> PoseTable<S> {
    fn get(&self, id: &EntityId) -> Result<Pose, WorldError> {
        self.poses
            .get(id)
            .copied()
            .ok_or_else(|| WorldError::NoPose(id.clone()))
    }

    async fn set(&mut self, id: &EntityId, pose: Pose) -> Result<Pose, WorldError> {
        self.store.save_pose(id, pose).await?;
        self.poses.insert(id.clone(), pose);
        Ok(pose)
    }

    async fn apply(&mut self, id: &EntityId, movement: Movement) -> Result<Pose, WorldError> {
        let translated = self
            .get(id)?
            .translate(movement.direction, movement.distance);
        self.set(id, translated).await?;
        self.set(id, translated.rotate(movement.rotation)).await
    }
}

/// Registry of simulated entities and their poses.
#[derive(Debug)]
pub struct World<S> {
    entities: Vec<Entity>,
    index: BTreeMap<EntityId, usize>,
    poses: PoseTable<S>,
    simulated_time: f64,
}

impl<S: StateStore> World<S> {
    /// Create a world backed by `store`, resuming from the persisted
    /// simulated time (0 when none has been stored).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Persist`] if the store cannot be read.
    pub async fn load(store: S) -> Result<Self, WorldError> {
        let simulated_time = store.load_simulated_time().await?.unwrap_or(0.0);
        info!(simulated_time, "World loaded");
        Ok(Self {
            entities: Vec::new(),
            index: BTreeMap::new(),
            poses: PoseTable {
                store,
                poses: BTreeMap::new(),
            },
            simulated_time,
        })
    }

    /// Load a world holding a single rover restored from `store`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Persist`] if the store cannot be read.
    pub async fn with_rover(
        store: S,
        id: EntityId,
        params: DriveParams,
    ) -> Result<Self, WorldError> {
        let mut world = Self::load(store).await?;
        let rover = Rover::new(id, params);
        let id = rover.id().clone();
        world.add_entity(rover)?;
        world.restore_entity(&id).await?;
        Ok(world)
    }

    /// The backing store.
    pub const fn store(&self) -> &S {
        &self.poses.store
    }

    /// Current simulated time in seconds.
    pub const fn simulated_time(&self) -> f64 {
        self.simulated_time
    }

    /// Register an entity. It ticks after every previously registered one.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateEntity`] if the id is taken.
    pub fn add_entity(&mut self, entity: impl Into<Entity>) -> Result<(), WorldError> {
        let entity = entity.into();
        let id = entity.id().clone();
        if self.index.contains_key(&id) {
            return Err(WorldError::DuplicateEntity(id));
        }
        self.index.insert(id, self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    /// Registered entities in tick order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Look up an entity by id.
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.index.get(id).and_then(|&i| self.entities.get(i))
    }

    /// Mutable lookup of an entity by id.
    pub fn entity_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.index.get(id).and_then(|&i| self.entities.get_mut(i))
    }

    /// Look up a rover by id.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotFound`] or [`WorldError::NotARover`].
    pub fn rover(&self, id: &EntityId) -> Result<&Rover, WorldError> {
        self.entity(id)
            .ok_or_else(|| WorldError::EntityNotFound(id.clone()))?
            .as_rover()
            .ok_or_else(|| WorldError::NotARover(id.clone()))
    }

    /// Mutable lookup of a rover by id.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotFound`] or [`WorldError::NotARover`].
    pub fn rover_mut(&mut self, id: &EntityId) -> Result<&mut Rover, WorldError> {
        self.entity_mut(id)
            .ok_or_else(|| WorldError::EntityNotFound(id.clone()))?
            .as_rover_mut()
            .ok_or_else(|| WorldError::NotARover(id.clone()))
    }

    /// Current pose of an entity, if it has one.
    pub fn pose(&self, id: &EntityId) -> Option<Pose> {
        self.poses.poses.get(id).copied()
    }

    /// Load an entity's last persisted pose into the world, defaulting to
    /// the origin facing heading 0 when nothing was persisted.
    ///
    /// Sensors observing the entity are refreshed from the restored pose.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotFound`] if the entity is not
    /// registered, or [`WorldError::Persist`] if the store cannot be read.
    pub async fn restore_entity(&mut self, id: &EntityId) -> Result<Pose, WorldError> {
        if !self.index.contains_key(id) {
            return Err(WorldError::EntityNotFound(id.clone()));
        }
        let stored = self.poses.store.load_pose(id).await?;
        let pose = stored.map_or(Pose::ORIGIN, |p| Pose::new(p.point, p.heading));
        if stored.is_none() {
            debug!(entity = %id, "No persisted pose, starting at origin");
        }
        self.poses.poses.insert(id.clone(), pose);
        self.refresh_observers(id, pose);
        info!(
            entity = %id,
            x = pose.point.x,
            y = pose.point.y,
            heading_deg = pose.heading_degrees(),
            "Entity restored"
        );
        Ok(pose)
    }

    /// Place an entity at `pose` and persist it.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotFound`] or [`WorldError::Persist`].
    pub async fn set_entity_position(
        &mut self,
        id: &EntityId,
        pose: Pose,
    ) -> Result<Pose, WorldError> {
        if !self.index.contains_key(id) {
            return Err(WorldError::EntityNotFound(id.clone()));
        }
        let pose = Pose::new(pose.point, pose.heading);
        self.poses.set(id, pose).await
    }

    /// Move an entity `amount` meters along `direction` relative to its
    /// heading, and persist the new pose.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NoPose`] or [`WorldError::Persist`].
    pub async fn translate(
        &mut self,
        id: &EntityId,
        direction: f64,
        amount: f64,
    ) -> Result<Pose, WorldError> {
        let pose = self.poses.get(id)?.translate(direction, amount);
        self.poses.set(id, pose).await
    }

    /// Turn an entity by `angle` radians and persist the new pose.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NoPose`] or [`WorldError::Persist`].
    pub async fn rotate(&mut self, id: &EntityId, angle: f64) -> Result<Pose, WorldError> {
        let pose = self.poses.get(id)?.rotate(angle);
        self.poses.set(id, pose).await
    }

    /// Advance every entity to `ts`, then persist `ts` as the simulated time.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::TimeWentBackwards`] if `ts` precedes the
    /// current simulated time, [`WorldError::NoPose`] if a moving entity
    /// was never restored, or [`WorldError::Persist`] if a write fails. On
    /// error the simulated time is not advanced.
    pub async fn tick(&mut self, ts: f64) -> Result<(), WorldError> {
        if ts < self.simulated_time {
            return Err(WorldError::TimeWentBackwards {
                requested: ts,
                current: self.simulated_time,
            });
        }

        for entity in &mut self.entities {
            if let Some(movement) = entity.tick(ts) {
                let id = entity.id().clone();
                self.poses.apply(&id, movement).await?;
            }
            if let Some(observed) = entity.observes() {
                if let Some(pose) = self.poses.poses.get(observed).copied() {
                    entity.observe(&pose);
                }
            }
        }

        self.poses.store.save_simulated_time(ts).await?;
        self.simulated_time = ts;
        Ok(())
    }

    fn refresh_observers(&mut self, id: &EntityId, pose: Pose) {
        for entity in &mut self.entities {
            if entity.observes() == Some(id) {
                entity.observe(&pose);
            }
        }
    }
}
