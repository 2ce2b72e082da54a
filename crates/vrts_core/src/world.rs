//! World state: the entity store.
//!
//! Owns every entity, allocates monotonically increasing ids, and keeps
//! cached per-kind id arrays behind a dirty flag so per-tick queries do not
//! allocate. Factory methods build units, commanders, buildings and
//! projectiles from the config registry, deriving weapon ranges from the
//! global multiplier table. The seeded PRNG lives here so re-simulation from
//! the same seed is reproducible.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::components::{
    Entity, EntityId, EntityKind, PlayerId, ProjectileState, StructureState, Transform,
    TurretState, UnitState, Weapon,
};
use crate::config::ConfigRegistry;
use crate::error::{Result, SimError};
use crate::math::Vec2;
use crate::physics::PhysicsWorld;
use crate::rng::SimRng;

/// The entity store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    entities: HashMap<EntityId, Entity>,
    next_id: EntityId,
    /// Number of players in the game; drives the per-player unit cap.
    pub player_count: u8,
    /// Deterministic PRNG for spread and weighted selection.
    pub rng: SimRng,
    /// Currently selected entity ids (UI projection).
    selection: BTreeSet<EntityId>,

    // Cached per-kind id arrays, sorted, rebuilt lazily.
    #[serde(skip)]
    cache_units: Vec<EntityId>,
    #[serde(skip)]
    cache_buildings: Vec<EntityId>,
    #[serde(skip)]
    cache_projectiles: Vec<EntityId>,
    #[serde(skip, default = "dirty_default")]
    cache_dirty: bool,
}

fn dirty_default() -> bool {
    true
}

impl World {
    /// Create an empty world for `player_count` players with the given RNG
    /// seed.
    #[must_use]
    pub fn new(player_count: u8, seed: u32) -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
            player_count: player_count.max(1),
            rng: SimRng::new(seed),
            selection: BTreeSet::new(),
            cache_units: Vec::new(),
            cache_buildings: Vec::new(),
            cache_projectiles: Vec::new(),
            cache_dirty: true,
        }
    }

    // ------------------------------------------------------------------
    // Storage
    // ------------------------------------------------------------------

    /// Insert an entity, assigning its id. Marks caches dirty.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        self.entities.insert(id, entity);
        self.cache_dirty = true;
        id
    }

    /// Remove an entity and its physics body, if any.
    ///
    /// Removing a missing id is a no-op and returns `None`; a system holding
    /// a stale id treats that as the entity being gone.
    pub fn remove(&mut self, physics: &mut PhysicsWorld, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        if let Some(handle) = entity.body {
            physics.remove(handle);
        }
        self.selection.remove(&id);
        self.cache_dirty = true;
        Some(entity)
    }

    /// Remove an entity that never had a physics body (projectiles, beams).
    pub fn remove_bodyless(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        debug_assert!(entity.body.is_none());
        self.selection.remove(&id);
        self.cache_dirty = true;
        Some(entity)
    }

    /// Get an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get an entity mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Whether an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over all entities (arbitrary order; use the id caches for
    /// deterministic passes).
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    // ------------------------------------------------------------------
    // Cached per-kind views
    // ------------------------------------------------------------------

    /// Rebuild the per-kind id caches if anything changed since the last
    /// rebuild. Called once per tick before queries run.
    pub fn refresh_caches(&mut self) {
        if !self.cache_dirty {
            return;
        }
        self.cache_units.clear();
        self.cache_buildings.clear();
        self.cache_projectiles.clear();
        for (id, entity) in &self.entities {
            match entity.kind {
                EntityKind::Unit => self.cache_units.push(*id),
                EntityKind::Building => self.cache_buildings.push(*id),
                EntityKind::Projectile => self.cache_projectiles.push(*id),
            }
        }
        // Sorted ids keep every per-tick pass deterministic.
        self.cache_units.sort_unstable();
        self.cache_buildings.sort_unstable();
        self.cache_projectiles.sort_unstable();
        self.cache_dirty = false;
    }

    /// Sorted unit ids as of the last [`refresh_caches`](Self::refresh_caches).
    #[must_use]
    pub fn unit_ids(&self) -> &[EntityId] {
        debug_assert!(!self.cache_dirty, "caches stale; call refresh_caches");
        &self.cache_units
    }

    /// Sorted building ids.
    #[must_use]
    pub fn building_ids(&self) -> &[EntityId] {
        debug_assert!(!self.cache_dirty, "caches stale; call refresh_caches");
        &self.cache_buildings
    }

    /// Sorted projectile ids.
    #[must_use]
    pub fn projectile_ids(&self) -> &[EntityId] {
        debug_assert!(!self.cache_dirty, "caches stale; call refresh_caches");
        &self.cache_projectiles
    }

    // ------------------------------------------------------------------
    // Ownership and UI projections
    // ------------------------------------------------------------------

    /// Units owned by a player.
    pub fn units_by_player(&self, player: PlayerId) -> impl Iterator<Item = &Entity> {
        self.cache_units
            .iter()
            .filter_map(|id| self.entities.get(id))
            .filter(move |e| e.owner == Some(player))
    }

    /// Units not owned by a player (the player's enemies).
    pub fn enemy_units(&self, player: PlayerId) -> impl Iterator<Item = &Entity> {
        self.cache_units
            .iter()
            .filter_map(|id| self.entities.get(id))
            .filter(move |e| e.owner.is_some() && e.owner != Some(player))
    }

    /// The player's commander, if alive.
    #[must_use]
    pub fn commander_of(&self, player: PlayerId) -> Option<EntityId> {
        self.cache_units
            .iter()
            .filter_map(|id| self.entities.get(id))
            .find(|e| e.is_commander && e.owner == Some(player))
            .map(|e| e.id)
    }

    /// Per-player unit cap: `total_unit_cap / player_count`, floor division.
    #[must_use]
    pub fn per_player_cap(&self, config: &ConfigRegistry) -> u32 {
        config.tuning.total_unit_cap / u32::from(self.player_count)
    }

    /// Whether a player may build another unit.
    #[must_use]
    pub fn can_player_build_unit(&self, config: &ConfigRegistry, player: PlayerId) -> bool {
        let count = self
            .entities
            .values()
            .filter(|e| e.kind == EntityKind::Unit && e.owner == Some(player))
            .count() as u32;
        count < self.per_player_cap(config)
    }

    /// Mark an entity as selected. Non-selectable entities are ignored.
    pub fn select(&mut self, id: EntityId) {
        if self.get(id).is_some_and(|e| e.selectable) {
            self.selection.insert(id);
        }
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Currently selected, still-alive units in id order.
    pub fn selected_units(&self) -> impl Iterator<Item = &Entity> {
        self.selection.iter().filter_map(|id| self.entities.get(id))
    }

    // ------------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------------

    fn build_weapons(
        &self,
        config: &ConfigRegistry,
        weapon_ids: &[String],
        rotation: f32,
    ) -> Result<Vec<Weapon>> {
        let tuning = &config.tuning;
        let mut weapons = Vec::with_capacity(weapon_ids.len());
        for weapon_id in weapon_ids {
            let def = config.weapon(weapon_id)?;
            let ranges = tuning.range_multipliers.derive(def.fire_range);
            let (turn_accel, drag) = match def.turret {
                Some(t) => (t.turn_accel, t.drag),
                None => (tuning.default_turn_accel, tuning.default_turn_drag),
            };
            weapons.push(Weapon::new(
                weapon_id.clone(),
                ranges,
                TurretState::new(rotation, turn_accel, drag),
            ));
        }
        Ok(weapons)
    }

    /// Spawn a unit from its definition.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownUnit`] / [`SimError::UnknownWeapon`] for
    /// bad definition keys and [`SimError::UnitCapReached`] when the player
    /// is at cap.
    pub fn spawn_unit(
        &mut self,
        config: &ConfigRegistry,
        physics: &mut PhysicsWorld,
        def_id: &str,
        player: PlayerId,
        pos: Vec2,
        rotation: f32,
    ) -> Result<EntityId> {
        let def = config.unit(def_id)?.clone();
        if !self.can_player_build_unit(config, player) {
            return Err(SimError::UnitCapReached {
                player,
                cap: self.per_player_cap(config),
            });
        }

        let mut entity = Entity::new(EntityKind::Unit, def.id.clone());
        entity.transform = Transform::new(pos, rotation);
        entity.owner = Some(player);
        entity.selectable = true;
        entity.unit = Some(UnitState {
            hp: def.max_hp,
            max_hp: def.max_hp,
            move_speed: def.move_speed,
            collision_radius: def.collision_radius,
            mass: def.mass,
            velocity: Vec2::ZERO,
            commands: std::collections::VecDeque::new(),
        });
        entity.weapons = self.build_weapons(config, &def.weapons, rotation)?;

        let id = self.insert(entity);
        let handle = physics.create_circle(
            id,
            pos,
            def.collision_radius,
            def.mass,
            def.friction_air,
            def.restitution,
        );
        if let Some(entity) = self.get_mut(id) {
            entity.body = Some(handle);
        }
        Ok(id)
    }

    /// Spawn a player's commander. At most one exists; a second call while
    /// the first lives is an invalid state.
    ///
    /// # Errors
    ///
    /// Same as [`spawn_unit`](Self::spawn_unit), plus
    /// [`SimError::InvalidState`] if the player already has a commander.
    pub fn spawn_commander(
        &mut self,
        config: &ConfigRegistry,
        physics: &mut PhysicsWorld,
        player: PlayerId,
        pos: Vec2,
    ) -> Result<EntityId> {
        self.refresh_caches();
        if self.commander_of(player).is_some() {
            return Err(SimError::InvalidState(format!(
                "player {player} already has a commander"
            )));
        }
        let id = self.spawn_unit(config, physics, "commander", player, pos, 0.0)?;
        if let Some(entity) = self.get_mut(id) {
            entity.is_commander = true;
        }
        Ok(id)
    }

    /// Spawn a building from its definition.
    ///
    /// # Errors
    ///
    /// Returns config lookup errors for bad keys.
    pub fn spawn_building(
        &mut self,
        config: &ConfigRegistry,
        physics: &mut PhysicsWorld,
        def_id: &str,
        player: PlayerId,
        pos: Vec2,
    ) -> Result<EntityId> {
        let def = config.building(def_id)?.clone();

        let mut entity = Entity::new(EntityKind::Building, def.id.clone());
        entity.transform = Transform::new(pos, 0.0);
        entity.owner = Some(player);
        entity.selectable = true;
        entity.structure = Some(StructureState {
            hp: def.max_hp,
            max_hp: def.max_hp,
            half_w: def.half_w,
            half_h: def.half_h,
        });
        entity.weapons = self.build_weapons(config, &def.weapons, 0.0)?;

        let id = self.insert(entity);
        let handle = physics.create_rect_static(id, pos, def.half_w, def.half_h);
        if let Some(entity) = self.get_mut(id) {
            entity.body = Some(handle);
        }
        Ok(id)
    }

    /// Spawn a projectile entity carrying a prepared payload. Projectiles
    /// have no physics body; their motion is integrated by the projectile
    /// system.
    pub fn spawn_projectile(
        &mut self,
        owner: Option<PlayerId>,
        pos: Vec2,
        rotation: f32,
        payload: ProjectileState,
    ) -> EntityId {
        let mut entity = Entity::new(EntityKind::Projectile, payload.weapon_id.clone());
        entity.transform = Transform::new(pos, rotation);
        entity.owner = owner;
        entity.projectile = Some(payload);
        self.insert(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigRegistry;

    fn setup() -> (World, PhysicsWorld, ConfigRegistry) {
        (
            World::new(2, 42),
            PhysicsWorld::new(2000.0, 2000.0),
            ConfigRegistry::builtin(),
        )
    }

    #[test]
    fn test_ids_are_monotonic_and_unique() {
        let (mut world, mut physics, config) = setup();
        let a = world
            .spawn_unit(&config, &mut physics, "jackal", 0, Vec2::ZERO, 0.0)
            .unwrap();
        let b = world
            .spawn_unit(&config, &mut physics, "jackal", 0, Vec2::ZERO, 0.0)
            .unwrap();
        world.remove(&mut physics, a);
        let c = world
            .spawn_unit(&config, &mut physics, "jackal", 0, Vec2::ZERO, 0.0)
            .unwrap();
        assert!(b > a);
        assert!(c > b, "ids are never reused");
    }

    #[test]
    fn test_spawn_unit_wires_ranges_and_body() {
        let (mut world, mut physics, config) = setup();
        let id = world
            .spawn_unit(&config, &mut physics, "jackal", 0, Vec2::new(10.0, 20.0), 0.0)
            .unwrap();
        let entity = world.get(id).unwrap();
        let weapon = &entity.weapons[0];
        assert_eq!(weapon.ranges.fire, 110.0);
        assert!(weapon.ranges.see > weapon.ranges.fire);
        assert!(weapon.ranges.release <= weapon.ranges.fire);
        assert!(weapon.ranges.lock <= weapon.ranges.release);
        assert!(weapon.ranges.fightstop <= weapon.ranges.lock);

        let body = physics.body(entity.body.unwrap()).unwrap();
        assert_eq!(body.pos, Vec2::new(10.0, 20.0));
        assert_eq!(body.entity, id);
    }

    #[test]
    fn test_unknown_def_is_error() {
        let (mut world, mut physics, config) = setup();
        assert!(world
            .spawn_unit(&config, &mut physics, "ghost", 0, Vec2::ZERO, 0.0)
            .is_err());
    }

    #[test]
    fn test_unit_cap_enforced() {
        let (mut world, mut physics, config) = setup();
        let cap = world.per_player_cap(&config);
        for _ in 0..cap {
            world
                .spawn_unit(&config, &mut physics, "jackal", 0, Vec2::ZERO, 0.0)
                .unwrap();
        }
        assert!(!world.can_player_build_unit(&config, 0));
        assert!(matches!(
            world.spawn_unit(&config, &mut physics, "jackal", 0, Vec2::ZERO, 0.0),
            Err(SimError::UnitCapReached { .. })
        ));
        // The other player is unaffected.
        assert!(world.can_player_build_unit(&config, 1));
    }

    #[test]
    fn test_commander_is_unique_per_player() {
        let (mut world, mut physics, config) = setup();
        let id = world
            .spawn_commander(&config, &mut physics, 0, Vec2::ZERO)
            .unwrap();
        world.refresh_caches();
        assert_eq!(world.commander_of(0), Some(id));
        assert!(world.spawn_commander(&config, &mut physics, 0, Vec2::ZERO).is_err());
        assert!(world.spawn_commander(&config, &mut physics, 1, Vec2::ZERO).is_ok());
    }

    #[test]
    fn test_caches_track_kinds() {
        let (mut world, mut physics, config) = setup();
        let u = world
            .spawn_unit(&config, &mut physics, "jackal", 0, Vec2::ZERO, 0.0)
            .unwrap();
        let b = world
            .spawn_building(&config, &mut physics, "factory", 0, Vec2::new(100.0, 100.0))
            .unwrap();
        world.refresh_caches();
        assert_eq!(world.unit_ids(), &[u]);
        assert_eq!(world.building_ids(), &[b]);
        assert!(world.projectile_ids().is_empty());

        world.remove(&mut physics, u);
        world.refresh_caches();
        assert!(world.unit_ids().is_empty());
    }

    #[test]
    fn test_ownership_queries() {
        let (mut world, mut physics, config) = setup();
        let mine = world
            .spawn_unit(&config, &mut physics, "jackal", 0, Vec2::ZERO, 0.0)
            .unwrap();
        let theirs = world
            .spawn_unit(&config, &mut physics, "mammoth", 1, Vec2::new(50.0, 0.0), 0.0)
            .unwrap();
        world.refresh_caches();

        let my_ids: Vec<_> = world.units_by_player(0).map(|e| e.id).collect();
        assert_eq!(my_ids, vec![mine]);
        let enemy_ids: Vec<_> = world.enemy_units(0).map(|e| e.id).collect();
        assert_eq!(enemy_ids, vec![theirs]);
    }

    #[test]
    fn test_selection_projection() {
        let (mut world, mut physics, config) = setup();
        let u = world
            .spawn_unit(&config, &mut physics, "jackal", 0, Vec2::ZERO, 0.0)
            .unwrap();
        world.select(u);
        world.select(9999); // missing: ignored
        let ids: Vec<_> = world.selected_units().map(|e| e.id).collect();
        assert_eq!(ids, vec![u]);

        world.remove(&mut physics, u);
        assert_eq!(world.selected_units().count(), 0);
    }

    #[test]
    fn test_removing_entity_removes_body() {
        let (mut world, mut physics, config) = setup();
        let id = world
            .spawn_unit(&config, &mut physics, "jackal", 0, Vec2::ZERO, 0.0)
            .unwrap();
        let handle = world.get(id).unwrap().body.unwrap();
        world.remove(&mut physics, id);
        assert!(physics.body(handle).is_none());
    }
}
