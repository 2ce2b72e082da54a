//! The simulation driver.
//!
//! Owns the world, the physics bodies, and every per-tick scratch buffer,
//! and advances all systems in a fixed phase order:
//! spatial rebuild, targeting, turret rotation, locomotion, firing,
//! projectile advancement, area weapons, force finalize, physics
//! integration, dead-entity removal. Tick duration is a parameter; every
//! decay and acceleration formula is frame-rate independent, so the same
//! seed and the same sequence of `dt_ms` values reproduce identical state.
//!
//! # Example
//!
//! ```
//! use vrts_core::math::Vec2;
//! use vrts_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(2, 42, 2000.0, 2000.0);
//! let unit = sim.spawn_unit("jackal", 0, Vec2::new(100.0, 100.0), 0.0).unwrap();
//! sim.move_to(unit, Vec2::new(400.0, 100.0)).unwrap();
//! for _ in 0..60 {
//!     sim.tick(16.0).unwrap();
//! }
//! assert!(sim.world().get(unit).unwrap().transform.pos.x > 100.0);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::area_weapons::{self, AreaScratch};
use crate::beam_index::BeamIndex;
use crate::components::{EntityId, PlayerId, UnitCommand};
use crate::config::ConfigRegistry;
use crate::error::{Result, SimError};
use crate::events::TickEvents;
use crate::forces::{FinalForce, ForceAccumulator};
use crate::math::Vec2;
use crate::physics::PhysicsWorld;
use crate::projectiles::{self, ProjectileScratch};
use crate::spatial::{SpatialHit, SpatialIndex};
use crate::targeting;
use crate::weapons::{self, FiringScratch};
use crate::world::World;

/// Arrival distance for move commands, in world units.
const ARRIVAL_THRESHOLD: f32 = 4.0;

/// The authoritative combat-and-movement simulation.
#[derive(Debug, Serialize, Deserialize)]
pub struct Simulation {
    config: ConfigRegistry,
    world: World,
    physics: PhysicsWorld,
    beams: BeamIndex,
    tick: u64,

    // Per-tick scratch, rebuilt or cleared every tick.
    #[serde(skip)]
    spatial: SpatialIndex,
    #[serde(skip)]
    forces: ForceAccumulator,
    #[serde(skip)]
    final_forces: Vec<FinalForce>,
    #[serde(skip)]
    events: TickEvents,
    #[serde(skip)]
    id_scratch: Vec<EntityId>,
    #[serde(skip)]
    firing_scratch: FiringScratch,
    #[serde(skip)]
    projectile_scratch: ProjectileScratch,
    #[serde(skip)]
    area_scratch: AreaScratch,
}

impl Simulation {
    /// Create a simulation with the built-in definition roster.
    #[must_use]
    pub fn new(player_count: u8, seed: u32, map_width: f32, map_height: f32) -> Self {
        Self::with_config(ConfigRegistry::builtin(), player_count, seed, map_width, map_height)
    }

    /// Create a simulation with a custom definition registry.
    #[must_use]
    pub fn with_config(
        config: ConfigRegistry,
        player_count: u8,
        seed: u32,
        map_width: f32,
        map_height: f32,
    ) -> Self {
        Self {
            config,
            world: World::new(player_count, seed),
            physics: PhysicsWorld::new(map_width, map_height),
            beams: BeamIndex::new(),
            tick: 0,
            spatial: SpatialIndex::new(),
            forces: ForceAccumulator::new(),
            final_forces: Vec::new(),
            events: TickEvents::default(),
            id_scratch: Vec::new(),
            firing_scratch: FiringScratch::default(),
            projectile_scratch: ProjectileScratch::default(),
            area_scratch: AreaScratch::default(),
        }
    }

    /// Current tick count.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Read-only world access for presentation and tests.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The definition registry.
    #[must_use]
    pub fn config(&self) -> &ConfigRegistry {
        &self.config
    }

    // ------------------------------------------------------------------
    // Spawning and commands
    // ------------------------------------------------------------------

    /// Spawn a unit.
    ///
    /// # Errors
    ///
    /// Propagates definition-lookup and unit-cap errors from the world.
    pub fn spawn_unit(
        &mut self,
        def_id: &str,
        player: PlayerId,
        pos: Vec2,
        rotation: f32,
    ) -> Result<EntityId> {
        self.world
            .spawn_unit(&self.config, &mut self.physics, def_id, player, pos, rotation)
    }

    /// Spawn a player's commander.
    ///
    /// # Errors
    ///
    /// Propagates world factory errors.
    pub fn spawn_commander(&mut self, player: PlayerId, pos: Vec2) -> Result<EntityId> {
        self.world
            .spawn_commander(&self.config, &mut self.physics, player, pos)
    }

    /// Spawn a building.
    ///
    /// # Errors
    ///
    /// Propagates world factory errors.
    pub fn spawn_building(&mut self, def_id: &str, player: PlayerId, pos: Vec2) -> Result<EntityId> {
        self.world
            .spawn_building(&self.config, &mut self.physics, def_id, player, pos)
    }

    /// Replace a unit's command queue with one command.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EntityNotFound`] for a missing or non-unit id.
    pub fn apply_command(&mut self, id: EntityId, command: UnitCommand) -> Result<()> {
        let unit = self
            .world
            .get_mut(id)
            .and_then(|e| e.unit.as_mut())
            .ok_or(SimError::EntityNotFound(id))?;
        unit.set_command(command);
        Ok(())
    }

    /// Order a unit to move to a point.
    ///
    /// # Errors
    ///
    /// Same as [`apply_command`](Self::apply_command).
    pub fn move_to(&mut self, id: EntityId, target: Vec2) -> Result<()> {
        self.apply_command(id, UnitCommand::MoveTo(target))
    }

    /// Order a unit to attack-move toward a point.
    ///
    /// # Errors
    ///
    /// Same as [`apply_command`](Self::apply_command).
    pub fn attack_move(&mut self, id: EntityId, target: Vec2) -> Result<()> {
        self.apply_command(id, UnitCommand::AttackMove(target))
    }

    /// Order a unit to chase and fight a specific entity.
    ///
    /// # Errors
    ///
    /// Same as [`apply_command`](Self::apply_command).
    pub fn attack(&mut self, id: EntityId, target: EntityId) -> Result<()> {
        self.apply_command(id, UnitCommand::Attack(target))
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by `dt_ms` milliseconds.
    ///
    /// Returns the events produced this tick; the buffer is reused, so
    /// consume it before the next call.
    ///
    /// # Errors
    ///
    /// Fails only on definition keys missing from the registry, which
    /// indicates config data changed underneath a live world.
    pub fn tick(&mut self, dt_ms: f32) -> Result<&TickEvents> {
        let dt = dt_ms / 1000.0;
        self.events.clear();

        // Phase 0: fresh caches and spatial index for this tick's queries.
        self.world.refresh_caches();
        self.rebuild_spatial();

        // Phase 1: targeting and turret rotation.
        targeting::acquire_targets(&mut self.world, &mut self.spatial, &mut self.id_scratch);
        targeting::rotate_turrets(&mut self.world, &self.config.tuning, dt, &mut self.id_scratch);

        // Phase 2: locomotion turns queued commands into steering forces.
        self.run_locomotion();

        // Phase 3: firing.
        weapons::run_firing(
            &mut self.world,
            &self.config,
            &mut self.spatial,
            &mut self.forces,
            &mut self.beams,
            &mut self.events,
            dt_ms,
            &mut self.firing_scratch,
        )?;

        // Phase 4: projectile and beam advancement (new spawns included).
        self.world.refresh_caches();
        projectiles::advance_projectiles(
            &mut self.world,
            &self.config,
            &mut self.spatial,
            &mut self.forces,
            &mut self.beams,
            &mut self.events,
            dt_ms,
            &mut self.projectile_scratch,
        )?;

        // Phase 5: force fields and waves.
        self.world.refresh_caches();
        area_weapons::run_area_weapons(
            &mut self.world,
            &self.config,
            &mut self.spatial,
            &mut self.forces,
            &mut self.events,
            dt_ms,
            &mut self.area_scratch,
        )?;

        // Phase 6: one physics step consumes the force totals.
        self.forces.finalize(&mut self.final_forces);
        for ff in &self.final_forces {
            if let Some(handle) = self.world.get(ff.entity).and_then(|e| e.body) {
                self.physics.apply_force(handle, ff.force);
            }
        }
        self.physics.step(dt);
        self.sync_transforms();

        // Phase 7: the dead leave the store; their beams go with them.
        self.remove_dead();

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "tick complete");
        }

        Ok(&self.events)
    }

    fn rebuild_spatial(&mut self) {
        self.spatial.clear();
        self.id_scratch.clear();
        self.id_scratch.extend_from_slice(self.world.unit_ids());
        self.id_scratch.extend_from_slice(self.world.building_ids());
        for &id in &self.id_scratch {
            if let Some(entity) = self.world.get(id) {
                self.spatial.insert(
                    entity.kind,
                    SpatialHit {
                        id,
                        pos: entity.transform.pos,
                        radius: entity.bounding_radius(),
                        owner: entity.owner,
                    },
                );
            }
        }
    }

    /// Turn the current command of every unit into a steering force, and
    /// face units along their motion.
    fn run_locomotion(&mut self) {
        self.id_scratch.clear();
        self.id_scratch.extend_from_slice(self.world.unit_ids());
        let ids = std::mem::take(&mut self.id_scratch);

        enum Motion {
            Steer(Vec2),
            Hold,
            Arrived,
            DropCommand,
        }

        for &id in &ids {
            let Some(entity) = self.world.get(id) else { continue };
            let Some(unit) = entity.unit.as_ref() else { continue };
            let pos = entity.transform.pos;
            let velocity = unit.velocity;
            let move_speed = unit.move_speed;
            let mass = unit.mass;
            // Stop approaching once any weapon is close enough to fight.
            let in_fightstop = entity.weapons.iter().any(|w| w.in_fightstop_range);

            let motion = match entity.unit.as_ref().and_then(|u| u.current_command()) {
                Some(UnitCommand::MoveTo(target)) => {
                    if pos.distance(*target) <= ARRIVAL_THRESHOLD {
                        Motion::Arrived
                    } else {
                        Motion::Steer((*target - pos).with_length(move_speed))
                    }
                }
                Some(UnitCommand::AttackMove(target)) => {
                    if in_fightstop {
                        Motion::Hold
                    } else if pos.distance(*target) <= ARRIVAL_THRESHOLD {
                        Motion::Arrived
                    } else {
                        Motion::Steer((*target - pos).with_length(move_speed))
                    }
                }
                Some(UnitCommand::Attack(target)) => {
                    match self.world.get(*target).filter(|t| t.is_alive()) {
                        None => Motion::DropCommand,
                        Some(_) if in_fightstop => Motion::Hold,
                        Some(t) => Motion::Steer((t.transform.pos - pos).with_length(move_speed)),
                    }
                }
                Some(UnitCommand::Stop) => Motion::Arrived,
                None => Motion::Hold,
            };

            let target_velocity = match motion {
                Motion::Steer(v) => v,
                Motion::Hold => Vec2::ZERO,
                Motion::Arrived | Motion::DropCommand => {
                    if let Some(unit) = self.world.get_mut(id).and_then(|e| e.unit.as_mut()) {
                        unit.pop_command();
                    }
                    Vec2::ZERO
                }
            };
            self.forces
                .apply_steering(id, velocity, target_velocity, self.config.tuning.steering_strength, mass);

            // Face along motion.
            if velocity.length() > 1.0 {
                if let Some(entity) = self.world.get_mut(id) {
                    entity.transform.set_rotation(velocity.angle());
                }
            }
        }

        self.id_scratch = ids;
    }

    /// Copy physics results back onto entity transforms and unit velocity.
    fn sync_transforms(&mut self) {
        self.id_scratch.clear();
        self.id_scratch.extend_from_slice(self.world.unit_ids());
        let ids = std::mem::take(&mut self.id_scratch);
        for &id in &ids {
            let Some(handle) = self.world.get(id).and_then(|e| e.body) else {
                continue;
            };
            let Some(body) = self.physics.body(handle) else { continue };
            let (pos, vel) = (body.pos, body.vel);
            if let Some(entity) = self.world.get_mut(id) {
                entity.transform.pos = pos;
                if let Some(unit) = entity.unit.as_mut() {
                    unit.velocity = vel;
                }
            }
        }
        self.id_scratch = ids;
    }

    fn remove_dead(&mut self) {
        self.world.refresh_caches();
        self.id_scratch.clear();
        self.id_scratch.extend_from_slice(self.world.unit_ids());
        self.id_scratch.extend_from_slice(self.world.building_ids());
        let ids = std::mem::take(&mut self.id_scratch);

        let mut orphans = Vec::new();
        for &id in &ids {
            let dead = self.world.get(id).map_or(false, |e| !e.is_alive());
            if dead {
                self.world.remove(&mut self.physics, id);
                self.beams.remove_unit(id, &mut orphans);
            }
        }
        for beam in orphans {
            self.world.remove_bodyless(beam);
        }

        self.world.refresh_caches();
        self.id_scratch = ids;
    }

    // ------------------------------------------------------------------
    // Determinism support
    // ------------------------------------------------------------------

    /// Hash of the observable simulation state, for desync detection. Two
    /// simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);

        let mut ids: Vec<EntityId> = self.world.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        ids.len().hash(&mut hasher);

        for id in ids {
            let Some(entity) = self.world.get(id) else { continue };
            id.hash(&mut hasher);
            entity.transform.pos.x.to_bits().hash(&mut hasher);
            entity.transform.pos.y.to_bits().hash(&mut hasher);
            entity.transform.rotation.to_bits().hash(&mut hasher);
            if let Some(hp) = entity.hp() {
                hp.to_bits().hash(&mut hasher);
            }
            if let Some(unit) = &entity.unit {
                unit.velocity.x.to_bits().hash(&mut hasher);
                unit.velocity.y.to_bits().hash(&mut hasher);
            }
            for weapon in &entity.weapons {
                weapon.target.hash(&mut hasher);
                weapon.is_locked.hash(&mut hasher);
                weapon.cooldown_remaining_ms.to_bits().hash(&mut hasher);
                weapon.turret.rotation.to_bits().hash(&mut hasher);
            }
            if let Some(p) = &entity.projectile {
                p.velocity.x.to_bits().hash(&mut hasher);
                p.velocity.y.to_bits().hash(&mut hasher);
                p.elapsed_ms.to_bits().hash(&mut hasher);
                p.hit_entities.len().hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Serialize the full simulation state.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidState`] when encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| SimError::InvalidState(format!("failed to serialize simulation: {e}")))
    }

    /// Restore a simulation from [`serialize`](Self::serialize) output.
    /// Transient indices are rebuilt.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidState`] when decoding fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut sim: Self = bincode::deserialize(data)
            .map_err(|e| SimError::InvalidState(format!("failed to deserialize simulation: {e}")))?;
        sim.world.refresh_caches();
        sim.beams.rebuild(&sim.world);
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_player_sim(seed: u32) -> Simulation {
        Simulation::new(2, seed, 2000.0, 2000.0)
    }

    #[test]
    fn test_move_command_reaches_target() {
        let mut sim = two_player_sim(1);
        let unit = sim
            .spawn_unit("jackal", 0, Vec2::new(100.0, 100.0), 0.0)
            .unwrap();
        sim.move_to(unit, Vec2::new(300.0, 100.0)).unwrap();

        for _ in 0..600 {
            sim.tick(16.0).unwrap();
        }
        let pos = sim.world().get(unit).unwrap().transform.pos;
        assert!(pos.distance(Vec2::new(300.0, 100.0)) < 15.0, "ended at {pos:?}");
        // Command consumed on arrival.
        assert!(sim
            .world()
            .get(unit)
            .unwrap()
            .unit
            .as_ref()
            .unwrap()
            .current_command()
            .is_none());
    }

    #[test]
    fn test_jackal_kills_nothing_without_orders_or_enemies() {
        let mut sim = two_player_sim(2);
        sim.spawn_unit("jackal", 0, Vec2::new(100.0, 100.0), 0.0)
            .unwrap();
        for _ in 0..100 {
            let events = sim.tick(16.0).unwrap();
            assert!(events.deaths.is_empty());
        }
        assert_eq!(sim.world().len(), 1);
    }

    #[test]
    fn test_attack_approach_and_fire() {
        // The end-to-end scenario: jackal vs mammoth, 130 units apart.
        let mut sim = two_player_sim(42);
        let jackal = sim
            .spawn_unit("jackal", 0, Vec2::new(900.0, 1000.0), 0.0)
            .unwrap();
        let mammoth = sim
            .spawn_unit("mammoth", 1, Vec2::new(1030.0, 1000.0), std::f32::consts::PI)
            .unwrap();
        sim.attack(jackal, mammoth).unwrap();

        let mut hp_series = Vec::new();
        let mut saw_preaim = false;
        let mut saw_lock = false;
        for _ in 0..312 {
            sim.tick(16.0).unwrap();
            // The mammoth shoots back; the jackal may not survive all 5 s.
            if let Some(e) = sim.world().get(jackal) {
                let w = &e.weapons[0];
                if w.target.is_some() && !w.is_firing {
                    saw_preaim = true;
                }
                if w.is_locked {
                    saw_lock = true;
                }
            }
            hp_series.push(sim.world().get(mammoth).unwrap().hp().unwrap());
        }

        // Surface distance starts at 116 (130 minus the mammoth's radius):
        // inside see (154) immediately, then closes into fire range.
        assert!(saw_preaim, "weapon pre-aimed before entering fire range");
        assert!(saw_lock, "weapon locked as the gap closed");

        // Monotonically non-increasing hp, with real damage dealt in
        // 1-damage steps ~80 ms apart while in fire range.
        assert!(hp_series.windows(2).all(|w| w[1] <= w[0]));
        let dealt = 1050.0 - hp_series.last().unwrap();
        assert!(dealt >= 20.0, "dealt {dealt}");
    }

    #[test]
    fn test_deterministic_replay_same_seed() {
        let run = |seed| {
            let mut sim = two_player_sim(seed);
            let a = sim.spawn_unit("jackal", 0, Vec2::new(900.0, 1000.0), 0.0).unwrap();
            // The hornet's random rocket spread makes the run seed-sensitive.
            let b = sim
                .spawn_unit("hornet", 1, Vec2::new(1030.0, 1000.0), std::f32::consts::PI)
                .unwrap();
            sim.attack(a, b).unwrap();
            sim.attack(b, a).unwrap();
            // Mixed tick lengths; the same sequence must reproduce.
            for i in 0..200 {
                let dt = if i % 3 == 0 { 16.0 } else { 33.0 };
                sim.tick(dt).unwrap();
            }
            sim.state_hash()
        };
        assert_eq!(run(7), run(7));
        assert_ne!(run(7), run(8), "different seeds diverge");
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_hash() {
        let mut sim = two_player_sim(9);
        let a = sim.spawn_unit("jackal", 0, Vec2::new(500.0, 500.0), 0.0).unwrap();
        let b = sim.spawn_unit("hornet", 1, Vec2::new(620.0, 500.0), 0.0).unwrap();
        sim.attack(a, b).unwrap();
        for _ in 0..50 {
            sim.tick(16.0).unwrap();
        }

        let bytes = sim.serialize().unwrap();
        let mut restored = Simulation::deserialize(&bytes).unwrap();
        assert_eq!(sim.state_hash(), restored.state_hash());

        // Both copies advance identically afterwards.
        for _ in 0..50 {
            sim.tick(16.0).unwrap();
            restored.tick(16.0).unwrap();
        }
        assert_eq!(sim.state_hash(), restored.state_hash());
    }

    #[test]
    fn test_dead_units_removed_with_their_beams() {
        let mut sim = two_player_sim(3);
        let lancer = sim
            .spawn_unit("lancer", 0, Vec2::new(500.0, 500.0), 0.0)
            .unwrap();
        // An unarmed target, so the only projectile in play is the beam.
        let victim = sim
            .spawn_building("factory", 1, Vec2::new(560.0, 500.0))
            .unwrap();
        sim.attack(lancer, victim).unwrap();
        // Let the beam spin up.
        for _ in 0..20 {
            sim.tick(16.0).unwrap();
        }
        sim.world.refresh_caches();
        assert!(!sim.world.projectile_ids().is_empty(), "beam is live");

        // Kill the lancer from outside.
        if let Some(unit) = sim.world.get_mut(lancer).and_then(|e| e.unit.as_mut()) {
            unit.hp = 0.0;
        }
        sim.tick(16.0).unwrap();
        assert!(sim.world().get(lancer).is_none());
        sim.world.refresh_caches();
        assert!(
            sim.world.projectile_ids().is_empty(),
            "orphaned beam removed with its owner"
        );
    }

    #[test]
    fn test_stop_command_halts_unit() {
        let mut sim = two_player_sim(4);
        let unit = sim.spawn_unit("jackal", 0, Vec2::new(100.0, 100.0), 0.0).unwrap();
        sim.move_to(unit, Vec2::new(900.0, 100.0)).unwrap();
        for _ in 0..60 {
            sim.tick(16.0).unwrap();
        }
        let moving_speed = sim
            .world()
            .get(unit)
            .unwrap()
            .unit
            .as_ref()
            .unwrap()
            .velocity
            .length();
        assert!(moving_speed > 10.0);

        sim.apply_command(unit, UnitCommand::Stop).unwrap();
        for _ in 0..120 {
            sim.tick(16.0).unwrap();
        }
        let speed = sim
            .world()
            .get(unit)
            .unwrap()
            .unit
            .as_ref()
            .unwrap()
            .velocity
            .length();
        assert!(speed < 2.0, "still moving at {speed}");
    }
}
