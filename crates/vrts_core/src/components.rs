//! Entity data model.
//!
//! Components are pure data with no behavior beyond small accessors. An
//! entity owns at most one of each optional component; every cross-entity
//! reference is a bare [`EntityId`] that must be re-resolved through the
//! world each use. A failed lookup means the entity is gone, which is the
//! normal termination signal, never an error.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::WeaponRanges;
use crate::math::Vec2;
use crate::physics::BodyHandle;

/// Unique identifier for entities. Monotonically increasing, never reused.
pub type EntityId = u64;

/// Player identifier.
pub type PlayerId = u8;

/// Entity type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Mobile combat unit.
    Unit,
    /// Static structure.
    Building,
    /// Projectile or beam.
    Projectile,
}

/// World transform with cached trigonometry.
///
/// `sin`/`cos` are cached for the current `rotation`; always mutate rotation
/// through [`Transform::set_rotation`] so the cache stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World position.
    pub pos: Vec2,
    /// Facing angle in radians, normalized to `[-PI, PI]`.
    pub rotation: f32,
    /// Cached `rotation.sin()`.
    pub sin: f32,
    /// Cached `rotation.cos()`.
    pub cos: f32,
}

impl Transform {
    /// Create a transform at a position facing `rotation`.
    #[must_use]
    pub fn new(pos: Vec2, rotation: f32) -> Self {
        Self {
            pos,
            rotation,
            sin: rotation.sin(),
            cos: rotation.cos(),
        }
    }

    /// Set the rotation and refresh the cached trig values.
    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = crate::math::normalize_angle(rotation);
        self.sin = self.rotation.sin();
        self.cos = self.rotation.cos();
    }

    /// Facing direction as a unit vector.
    #[must_use]
    pub fn facing(&self) -> Vec2 {
        Vec2::new(self.cos, self.sin)
    }
}

/// A queued player intent for a unit.
///
/// The core consumes resolved actions; how they were encoded on the wire is
/// the input layer's concern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UnitCommand {
    /// Move to a point, ignoring enemies.
    MoveTo(Vec2),
    /// Move to a point, stopping to fight anything on the way.
    AttackMove(Vec2),
    /// Chase and fight a specific entity.
    Attack(EntityId),
    /// Clear movement and stop.
    Stop,
}

/// Mutable per-unit stats and motion state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    /// Current health. Death is edge-triggered at the transition through
    /// zero; combat logic never reads a negative value.
    pub hp: f32,
    /// Maximum health.
    pub max_hp: f32,
    /// Top speed in units per second.
    pub move_speed: f32,
    /// Collision radius.
    pub collision_radius: f32,
    /// Mass for physics and force scaling.
    pub mass: f32,
    /// Current velocity, mirrored from the physics body after each step.
    pub velocity: Vec2,
    /// Queued player intents, consumed front-first.
    pub commands: VecDeque<UnitCommand>,
}

impl UnitState {
    /// Current command, if any.
    #[must_use]
    pub fn current_command(&self) -> Option<&UnitCommand> {
        self.commands.front()
    }

    /// Replace the whole queue with a single command.
    pub fn set_command(&mut self, command: UnitCommand) {
        self.commands.clear();
        self.commands.push_back(command);
    }

    /// Append a command to the back of the queue.
    pub fn queue_command(&mut self, command: UnitCommand) {
        self.commands.push_back(command);
    }

    /// Drop the current command.
    pub fn pop_command(&mut self) {
        self.commands.pop_front();
    }
}

/// Mutable structure state (buildings).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureState {
    /// Current health.
    pub hp: f32,
    /// Maximum health.
    pub max_hp: f32,
    /// Half extents of the collision rectangle.
    pub half_w: f32,
    /// Half height.
    pub half_h: f32,
}

/// Second-order turret rotation state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurretState {
    /// Current turret angle in world space, normalized to `[-PI, PI]`.
    pub rotation: f32,
    /// Angular velocity in radians per second.
    pub angular_velocity: f32,
    /// Angular acceleration applied toward the desired angle.
    pub turn_accel: f32,
    /// Multiplicative angular drag per 60 Hz frame.
    pub drag: f32,
}

impl TurretState {
    /// Create a turret at an initial angle with the given tuning.
    #[must_use]
    pub const fn new(rotation: f32, turn_accel: f32, drag: f32) -> Self {
        Self {
            rotation,
            angular_velocity: 0.0,
            turn_accel,
            drag,
        }
    }
}

/// Per-weapon mutable runtime state, embedded in a unit or building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    /// Key into the config registry for the static definition.
    pub def_id: String,
    /// Derived range set. Invariant:
    /// `see >= fire >= release >= lock >= fightstop`.
    pub ranges: WeaponRanges,
    /// Current target, re-resolved through the world each tick.
    pub target: Option<EntityId>,
    /// Committed-target state. Only true while the target is within
    /// `ranges.release`.
    pub is_locked: bool,
    /// True exactly when the resolved target is within `ranges.fire`.
    pub is_firing: bool,
    /// True when the resolved target is within `ranges.fightstop`.
    pub in_fightstop_range: bool,
    /// Remaining main cooldown.
    pub cooldown_remaining_ms: f32,
    /// Shots left in the current burst; zero when not bursting.
    pub burst_shots_left: u32,
    /// Remaining inter-shot delay within a burst.
    pub burst_delay_ms: f32,
    /// Turret rotation state.
    pub turret: TurretState,
    /// Transition progress for area weapons, in `[0, 1]`.
    pub area_progress: f32,
    /// Whether the area effect was active last tick (drives start/stop
    /// events).
    pub area_active: bool,
    /// Cached world position of the weapon, refreshed each tick.
    pub world_pos: Vec2,
}

impl Weapon {
    /// Create a weapon at rest with the given derived ranges and turret
    /// tuning.
    #[must_use]
    pub fn new(def_id: String, ranges: WeaponRanges, turret: TurretState) -> Self {
        Self {
            def_id,
            ranges,
            target: None,
            is_locked: false,
            is_firing: false,
            in_fightstop_range: false,
            cooldown_remaining_ms: 0.0,
            burst_shots_left: 0,
            burst_delay_ms: 0.0,
            turret,
            area_progress: 0.0,
            area_active: false,
            world_pos: Vec2::ZERO,
        }
    }

    /// Drop the current target and any lock.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.is_locked = false;
        self.is_firing = false;
        self.in_fightstop_range = false;
    }
}

/// Delivery mechanism tag for live projectiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectileKind {
    /// Moves through the world with swept-volume collision.
    Traveling,
    /// Anchored line damage recomputed while alive.
    Beam,
    /// Resolved entirely at fire time; exists only as an event.
    Instant,
}

/// Homing steering state for a traveling projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomingState {
    /// Target being chased; a dead target ends the steering.
    pub target: EntityId,
    /// Maximum steering rate in radians per second.
    pub turn_rate: f32,
}

/// Live beam geometry and obstruction cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamState {
    /// Beam origin, follows the owning weapon.
    pub start: Vec2,
    /// Unobstructed beam end.
    pub end: Vec2,
    /// Parametric truncation of the visible beam at the first hit, if the
    /// beam is non-piercing.
    pub truncation_t: Option<f32>,
    /// Time since the obstruction point was last recomputed. The search is
    /// throttled; a few ticks of visual staleness is imperceptible.
    pub since_obstruction_ms: f32,
    /// Damage per second along the beam.
    pub damage_per_sec: f32,
    /// Nominal beam length.
    pub length: f32,
}

/// Projectile payload component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    /// Delivery kind.
    pub kind: ProjectileKind,
    /// Entity that fired this projectile.
    pub source: EntityId,
    /// Index of the firing weapon on the source entity.
    pub weapon_index: usize,
    /// Weapon definition key.
    pub weapon_id: String,
    /// Velocity in units per second.
    pub velocity: Vec2,
    /// Flight time so far.
    pub elapsed_ms: f32,
    /// Maximum flight time.
    pub lifespan_ms: f32,
    /// Collision radius.
    pub radius: f32,
    /// Damage per hit.
    pub damage: f32,
    /// Whether hits pierce through targets.
    pub pierce: bool,
    /// Upper bound on `hit_entities` size.
    pub max_hits: u32,
    /// Entities already hit; prevents repeat damage from the same
    /// projectile. Ordered set keeps hashing and serialization
    /// deterministic.
    pub hit_entities: BTreeSet<EntityId>,
    /// Position at the start of the current tick, for swept collision.
    pub prev_pos: Vec2,
    /// Homing steering, if configured.
    pub homing: Option<HomingState>,
    /// Beam geometry for beam projectiles.
    pub beam: Option<BeamState>,
}

impl ProjectileState {
    /// Whether this projectile may still register new hits.
    #[must_use]
    pub fn can_hit_more(&self) -> bool {
        (self.hit_entities.len() as u32) < self.max_hits
    }

    /// Payload for a traveling projectile.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn traveling(
        source: EntityId,
        weapon_index: usize,
        weapon_id: String,
        pos: Vec2,
        velocity: Vec2,
        radius: f32,
        damage: f32,
        lifespan_ms: f32,
    ) -> Self {
        Self {
            kind: ProjectileKind::Traveling,
            source,
            weapon_index,
            weapon_id,
            velocity,
            elapsed_ms: 0.0,
            lifespan_ms,
            radius,
            damage,
            pierce: false,
            max_hits: 1,
            hit_entities: BTreeSet::new(),
            prev_pos: pos,
            homing: None,
            beam: None,
        }
    }

    /// Payload for a continuous beam.
    #[must_use]
    pub fn beam(
        source: EntityId,
        weapon_index: usize,
        weapon_id: String,
        start: Vec2,
        end: Vec2,
        damage_per_sec: f32,
        length: f32,
    ) -> Self {
        Self {
            kind: ProjectileKind::Beam,
            source,
            weapon_index,
            weapon_id,
            velocity: Vec2::ZERO,
            elapsed_ms: 0.0,
            lifespan_ms: f32::INFINITY,
            radius: 0.0,
            damage: 0.0,
            pierce: false,
            max_hits: u32::MAX,
            hit_entities: BTreeSet::new(),
            prev_pos: start,
            homing: None,
            beam: Some(BeamState {
                start,
                end,
                truncation_t: None,
                since_obstruction_ms: f32::INFINITY,
                damage_per_sec,
                length,
            }),
        }
    }
}

/// A sparse entity record. Exclusively owned by the world state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Type tag.
    pub kind: EntityKind,
    /// Definition key this entity was built from.
    pub def_id: String,
    /// World transform.
    pub transform: Transform,
    /// Owning player, if any.
    pub owner: Option<PlayerId>,
    /// Whether the entity appears in selection queries.
    pub selectable: bool,
    /// Commander flag; at most one per player.
    pub is_commander: bool,
    /// Unit stats for mobile units.
    pub unit: Option<UnitState>,
    /// Structure stats for buildings.
    pub structure: Option<StructureState>,
    /// Weapon hardpoints.
    pub weapons: Vec<Weapon>,
    /// Opaque physics body handle; bodies are owned by the physics world.
    pub body: Option<BodyHandle>,
    /// Projectile payload for projectile entities.
    pub projectile: Option<ProjectileState>,
}

impl Entity {
    /// Create an empty entity of the given kind. The id is assigned by the
    /// world on insert.
    #[must_use]
    pub fn new(kind: EntityKind, def_id: String) -> Self {
        Self {
            id: 0,
            kind,
            def_id,
            transform: Transform::new(Vec2::ZERO, 0.0),
            owner: None,
            selectable: false,
            is_commander: false,
            unit: None,
            structure: None,
            weapons: Vec::new(),
            body: None,
            projectile: None,
        }
    }

    /// Current health, for units and structures alike.
    #[must_use]
    pub fn hp(&self) -> Option<f32> {
        if let Some(unit) = &self.unit {
            Some(unit.hp)
        } else {
            self.structure.map(|s| s.hp)
        }
    }

    /// Whether the entity is alive (has positive health, or is a
    /// projectile).
    #[must_use]
    pub fn is_alive(&self) -> bool {
        match self.hp() {
            Some(hp) => hp > 0.0,
            None => true,
        }
    }

    /// Effective collision radius used by targeting and area checks.
    ///
    /// Buildings report the half-diagonal of their rectangle.
    #[must_use]
    pub fn bounding_radius(&self) -> f32 {
        if let Some(unit) = &self.unit {
            unit.collision_radius
        } else if let Some(s) = &self.structure {
            (s.half_w * s.half_w + s.half_h * s.half_h).sqrt()
        } else if let Some(p) = &self.projectile {
            p.radius
        } else {
            0.0
        }
    }
}
