//! Per-tick event output.
//!
//! The simulation is headless; presentation and networking layers consume
//! these buffers after each tick. Buffers are cleared at tick start, so a
//! consumer reads exactly one tick's worth of events.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, PlayerId, ProjectileKind};
use crate::math::Vec2;

/// Context captured at the moment an entity dies, for death presentation
/// (debris direction, explosion size).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathContext {
    /// Entity that died.
    pub entity: EntityId,
    /// Definition id of the dead entity.
    pub def_id: String,
    /// Owning player, if any.
    pub owner: Option<PlayerId>,
    /// Position at death.
    pub pos: Vec2,
    /// Direction of the killing blow, unit length. Falls back to the
    /// attacker's travel direction when the hit point coincides with the
    /// victim's center.
    pub penetration_dir: Vec2,
    /// Velocity of whatever delivered the blow.
    pub attacker_velocity: Vec2,
    /// Damage of the killing blow.
    pub magnitude: f32,
    /// Bounding radius of the dead entity.
    pub radius: f32,
    /// Display colour from the definition.
    pub color: u32,
    /// Whether the dead entity was a unit (buildings collapse differently).
    pub is_unit: bool,
}

/// Gameplay events for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A weapon discharged.
    Fire {
        /// Firing entity.
        shooter: EntityId,
        /// Weapon slot on the shooter.
        weapon_index: usize,
        /// Weapon definition id.
        weapon_id: String,
        /// Muzzle position.
        pos: Vec2,
        /// Firing direction, unit length.
        dir: Vec2,
    },
    /// Something took damage.
    Hit {
        /// Damaged entity.
        target: EntityId,
        /// Damage applied, after falloff.
        amount: f32,
        /// World-space hit point.
        pos: Vec2,
    },
    /// A continuous beam switched on.
    BeamStart {
        /// Firing entity.
        shooter: EntityId,
        /// Weapon slot on the shooter.
        weapon_index: usize,
    },
    /// A continuous beam switched off.
    BeamStop {
        /// Firing entity.
        shooter: EntityId,
        /// Weapon slot on the shooter.
        weapon_index: usize,
    },
    /// An area weapon began ramping up.
    AreaWeaponStart {
        /// Firing entity.
        shooter: EntityId,
        /// Weapon slot on the shooter.
        weapon_index: usize,
    },
    /// An area weapon switched off.
    AreaWeaponStop {
        /// Firing entity.
        shooter: EntityId,
        /// Weapon slot on the shooter.
        weapon_index: usize,
    },
    /// A projectile reached end of life without hitting anything it could
    /// damage (expiry splash may still have fired).
    ProjectileExpire {
        /// The projectile.
        projectile: EntityId,
        /// Position at expiry.
        pos: Vec2,
    },
}

/// Projectile lifecycle events for network replication. Clients simulate
/// projectile motion locally between these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetEvent {
    /// A projectile spawned. Carries everything an observer needs to pick a
    /// simulation model and attribute the projectile without querying back
    /// into sim state.
    ProjectileSpawn {
        /// The projectile.
        projectile: EntityId,
        /// Simulation model to run client-side.
        kind: ProjectileKind,
        /// Weapon definition id.
        weapon_id: String,
        /// Owning player, if any.
        owner: Option<PlayerId>,
        /// Entity that fired it.
        source: EntityId,
        /// Weapon slot on the source.
        weapon_index: usize,
        /// Spawn position.
        pos: Vec2,
        /// Initial velocity.
        velocity: Vec2,
        /// Beam endpoints, for beam projectiles only.
        beam: Option<(Vec2, Vec2)>,
    },
    /// A projectile left the world.
    ProjectileDespawn {
        /// The projectile.
        projectile: EntityId,
    },
    /// A homing projectile changed course.
    ProjectileVelocity {
        /// The projectile.
        projectile: EntityId,
        /// Current position.
        pos: Vec2,
        /// New velocity.
        velocity: Vec2,
    },
}

/// All events produced by one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Presentation events.
    pub sim: Vec<SimEvent>,
    /// Replication events.
    pub net: Vec<NetEvent>,
    /// Deaths, with full context.
    pub deaths: Vec<DeathContext>,
}

impl TickEvents {
    /// Clear all buffers, keeping allocations.
    pub fn clear(&mut self) {
        self.sim.clear();
        self.net.clear();
        self.deaths.clear();
    }
}
