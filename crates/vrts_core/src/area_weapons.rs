//! Continuous area weapons: force fields and waves.
//!
//! Both are pie-slice effects driven by a transition progress animated
//! toward 1 while the weapon fires and back toward 0 when it stops. Force
//! fields run an inner push annulus and an outer pull annulus; waves widen
//! their slice while attacking and scale damage and pull with proximity.
//! Enemy projectiles caught in a slice have their velocity nudged directly,
//! since projectiles do not go through the force accumulator.

use crate::components::{EntityId, EntityKind, PlayerId};
use crate::config::{AreaWeaponDef, ConfigRegistry, ForceFieldZoneDef};
use crate::damage;
use crate::error::Result;
use crate::events::{NetEvent, SimEvent, TickEvents};
use crate::forces::{ForceAccumulator, ForceSource};
use crate::math::{normalize_angle, Vec2};
use crate::spatial::SpatialIndex;
use crate::world::World;

/// Driver-owned scratch for the area-weapon pass.
#[derive(Debug, Default)]
pub struct AreaScratch {
    ids: Vec<EntityId>,
    targets: Vec<(EntityId, Vec2, f32, f32)>,
    projectiles: Vec<EntityId>,
}

#[derive(Debug, Clone, Copy)]
struct Emitter {
    source: EntityId,
    owner: PlayerId,
    origin: Vec2,
    direction: f32,
    progress: f32,
}

/// Run force-field and wave effects for every armed entity.
///
/// # Errors
///
/// Fails on a weapon definition key missing from the registry.
pub fn run_area_weapons(
    world: &mut World,
    config: &ConfigRegistry,
    spatial: &mut SpatialIndex,
    forces: &mut ForceAccumulator,
    events: &mut TickEvents,
    dt_ms: f32,
    scratch: &mut AreaScratch,
) -> Result<()> {
    scratch.ids.clear();
    scratch.ids.extend_from_slice(world.unit_ids());
    scratch.ids.extend_from_slice(world.building_ids());
    let ids = std::mem::take(&mut scratch.ids);

    for &id in &ids {
        let Some(entity) = world.get(id) else { continue };
        let Some(owner) = entity.owner else { continue };
        let weapon_count = entity.weapons.len();

        for weapon_index in 0..weapon_count {
            let (def_id, firing, was_active, mut progress, origin, direction) = {
                let Some(entity) = world.get(id) else { break };
                let w = &entity.weapons[weapon_index];
                (
                    w.def_id.clone(),
                    w.is_firing,
                    w.area_active,
                    w.area_progress,
                    w.world_pos,
                    w.turret.rotation,
                )
            };
            let def = config.weapon(&def_id)?;
            let Some(area) = def.area else { continue };

            let transition_ms = match area {
                AreaWeaponDef::ForceField(ff) => ff.transition_ms,
                AreaWeaponDef::Wave(w) => w.transition_ms,
            };
            let step = if transition_ms > 0.0 {
                dt_ms / transition_ms
            } else {
                1.0
            };
            progress = if firing {
                (progress + step).min(1.0)
            } else {
                (progress - step).max(0.0)
            };

            if firing != was_active {
                events.sim.push(if firing {
                    SimEvent::AreaWeaponStart {
                        shooter: id,
                        weapon_index,
                    }
                } else {
                    SimEvent::AreaWeaponStop {
                        shooter: id,
                        weapon_index,
                    }
                });
            }
            if let Some(entity) = world.get_mut(id) {
                let w = &mut entity.weapons[weapon_index];
                w.area_progress = progress;
                w.area_active = firing;
            }

            if progress <= 0.0 {
                continue;
            }
            let emitter = Emitter {
                source: id,
                owner,
                origin,
                direction,
                progress,
            };
            match area {
                AreaWeaponDef::ForceField(ff) => {
                    apply_force_field(
                        world, config, spatial, forces, events, &ff, emitter, dt_ms, scratch,
                    );
                }
                AreaWeaponDef::Wave(w) => {
                    apply_wave(world, config, spatial, forces, events, &w, emitter, dt_ms, scratch);
                }
            }
        }
    }

    scratch.ids = ids;
    Ok(())
}

/// Collect enemy units and buildings inside a slice, with their distance
/// from the origin, into `scratch.targets`.
fn collect_slice_targets(
    world: &World,
    spatial: &mut SpatialIndex,
    scratch: &mut AreaScratch,
    emitter: Emitter,
    radius: f32,
    half_angle: f32,
) {
    scratch.targets.clear();
    for kind in [EntityKind::Unit, EntityKind::Building] {
        for hit in spatial.query_enemies_in_radius(kind, emitter.owner, emitter.origin, radius) {
            let offset = hit.pos - emitter.origin;
            let dist = offset.length();
            if dist > radius {
                continue;
            }
            if !in_slice(offset, dist, hit.radius, emitter.direction, half_angle) {
                continue;
            }
            let mass = world
                .get(hit.id)
                .and_then(|e| e.unit.as_ref())
                .map_or(f32::INFINITY, |u| u.mass);
            scratch.targets.push((hit.id, hit.pos, dist, mass));
        }
    }
}

fn in_slice(offset: Vec2, dist: f32, target_radius: f32, direction: f32, half_angle: f32) -> bool {
    if dist <= f32::EPSILON {
        return true;
    }
    let angular_size = (target_radius / dist).atan();
    normalize_angle(offset.angle() - direction).abs() <= half_angle + angular_size
}

#[allow(clippy::too_many_arguments)]
fn apply_force_field(
    world: &mut World,
    config: &ConfigRegistry,
    spatial: &mut SpatialIndex,
    forces: &mut ForceAccumulator,
    events: &mut TickEvents,
    ff: &crate::config::ForceFieldDef,
    emitter: Emitter,
    dt_ms: f32,
    scratch: &mut AreaScratch,
) {
    let zones = [(ff.push, true), (ff.pull, false)];
    for (zone, outward) in zones {
        if zone.power <= 0.0 && zone.damage_per_sec <= 0.0 {
            // Visual-only zone.
            continue;
        }
        apply_zone(
            world, config, spatial, forces, events, emitter, ff.half_angle, zone, outward, dt_ms,
            scratch,
        );
    }
    nudge_projectiles(
        world,
        events,
        emitter,
        ff.pull.outer_radius * emitter.progress,
        ff.half_angle,
        ff.push.power,
        dt_ms,
        scratch,
    );
}

#[allow(clippy::too_many_arguments)]
fn apply_zone(
    world: &mut World,
    config: &ConfigRegistry,
    spatial: &mut SpatialIndex,
    forces: &mut ForceAccumulator,
    events: &mut TickEvents,
    emitter: Emitter,
    half_angle: f32,
    zone: ForceFieldZoneDef,
    outward: bool,
    dt_ms: f32,
    scratch: &mut AreaScratch,
) {
    // Zone boundaries breathe with the transition progress.
    let inner = zone.inner_radius * emitter.progress;
    let outer = zone.outer_radius * emitter.progress;
    collect_slice_targets(world, spatial, scratch, emitter, outer, half_angle);
    let targets = std::mem::take(&mut scratch.targets);

    for &(target, pos, dist, mass) in &targets {
        if dist < inner {
            continue;
        }
        if zone.damage_per_sec > 0.0 {
            let amount = zone.damage_per_sec * dt_ms / 1000.0 * emitter.progress;
            let radial = (pos - emitter.origin).normalize_or_zero();
            damage::damage_entity(
                world,
                config,
                events,
                target,
                amount,
                pos,
                radial,
                radial * zone.power,
            );
            events.sim.push(SimEvent::Hit {
                target,
                amount,
                pos,
            });
        }
        if zone.power > 0.0 && mass.is_finite() {
            let radial = (pos - emitter.origin).normalize_or_zero();
            let dir = if outward { radial } else { -radial };
            forces.apply_directional(
                target,
                dir * zone.power * emitter.progress,
                ForceSource::Pull,
                true,
                mass,
            );
        }
    }
    scratch.targets = targets;
}

#[allow(clippy::too_many_arguments)]
fn apply_wave(
    world: &mut World,
    config: &ConfigRegistry,
    spatial: &mut SpatialIndex,
    forces: &mut ForceAccumulator,
    events: &mut TickEvents,
    wave: &crate::config::WaveDef,
    emitter: Emitter,
    dt_ms: f32,
    scratch: &mut AreaScratch,
) {
    let half_angle = wave.idle_half_angle
        + (wave.attack_half_angle - wave.idle_half_angle) * emitter.progress;
    collect_slice_targets(world, spatial, scratch, emitter, wave.radius, half_angle);
    let targets = std::mem::take(&mut scratch.targets);

    for &(target, pos, dist, mass) in &targets {
        // Proximity scaling with a hard distance floor.
        let scale = wave.reference_distance / dist.max(wave.min_distance);
        let radial = (pos - emitter.origin).normalize_or_zero();

        if wave.damage_per_sec > 0.0 {
            let amount = wave.damage_per_sec * scale * dt_ms / 1000.0 * emitter.progress;
            damage::damage_entity(
                world,
                config,
                events,
                target,
                amount,
                pos,
                radial,
                radial * wave.pull_power,
            );
            events.sim.push(SimEvent::Hit {
                target,
                amount,
                pos,
            });
        }
        if wave.pull_power > 0.0 && mass.is_finite() {
            forces.apply_directional(
                target,
                -radial * wave.pull_power * scale * emitter.progress,
                ForceSource::Pull,
                true,
                mass,
            );
        }
    }
    scratch.targets = targets;

    nudge_projectiles(
        world,
        events,
        emitter,
        wave.radius,
        half_angle,
        wave.pull_power,
        dt_ms,
        scratch,
    );
}

/// Deflect enemy projectiles caught in the slice by writing their velocity
/// directly; projectiles are not driven by the accumulator or the physics
/// body layer.
#[allow(clippy::too_many_arguments)]
fn nudge_projectiles(
    world: &mut World,
    events: &mut TickEvents,
    emitter: Emitter,
    radius: f32,
    half_angle: f32,
    power: f32,
    dt_ms: f32,
    scratch: &mut AreaScratch,
) {
    if power <= 0.0 {
        return;
    }
    scratch.projectiles.clear();
    scratch.projectiles.extend_from_slice(world.projectile_ids());
    let ids = std::mem::take(&mut scratch.projectiles);

    for &id in &ids {
        let Some(entity) = world.get_mut(id) else { continue };
        if entity.owner == Some(emitter.owner) {
            continue;
        }
        let offset = entity.transform.pos - emitter.origin;
        let dist = offset.length();
        if dist > radius || dist <= f32::EPSILON {
            continue;
        }
        let Some(p) = entity.projectile.as_mut() else { continue };
        if p.beam.is_some() {
            continue;
        }
        if !in_slice(offset, dist, p.radius, emitter.direction, half_angle) {
            continue;
        }
        let radial = offset * (1.0 / dist);
        p.velocity = p.velocity + radial * power * emitter.progress * (dt_ms / 1000.0);
        let (pos, velocity) = (entity.transform.pos, p.velocity);
        events.net.push(NetEvent::ProjectileVelocity {
            projectile: id,
            pos,
            velocity,
        });
    }
    scratch.projectiles = ids;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ProjectileState;
    use crate::physics::PhysicsWorld;
    use crate::spatial::SpatialHit;

    struct Fixture {
        world: World,
        physics: PhysicsWorld,
        config: ConfigRegistry,
        spatial: SpatialIndex,
        forces: ForceAccumulator,
        events: TickEvents,
        scratch: AreaScratch,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                world: World::new(2, 5),
                physics: PhysicsWorld::new(2000.0, 2000.0),
                config: ConfigRegistry::builtin(),
                spatial: SpatialIndex::new(),
                forces: ForceAccumulator::new(),
                events: TickEvents::default(),
                scratch: AreaScratch::default(),
            }
        }

        fn spawn_emitter(&mut self, weapon: &str) -> EntityId {
            // A jackal chassis with the area weapon swapped in.
            let id = self
                .world
                .spawn_unit(&self.config, &mut self.physics, "jackal", 0, Vec2::ZERO, 0.0)
                .unwrap();
            let ranges = {
                let def = self.config.weapon(weapon).unwrap();
                self.config.tuning.range_multipliers.derive(def.fire_range)
            };
            let e = self.world.get_mut(id).unwrap();
            let w = &mut e.weapons[0];
            w.def_id = weapon.to_string();
            w.ranges = ranges;
            w.is_firing = true;
            w.world_pos = Vec2::ZERO;
            w.turret.rotation = 0.0;
            self.world.refresh_caches();
            id
        }

        fn spawn(&mut self, def: &str, player: u8, x: f32, y: f32) -> EntityId {
            let id = self
                .world
                .spawn_unit(&self.config, &mut self.physics, def, player, Vec2::new(x, y), 0.0)
                .unwrap();
            self.world.refresh_caches();
            id
        }

        fn index(&mut self) {
            self.spatial.clear();
            for entity in self.world.iter() {
                if matches!(entity.kind, EntityKind::Projectile) {
                    continue;
                }
                self.spatial.insert(
                    entity.kind,
                    SpatialHit {
                        id: entity.id,
                        pos: entity.transform.pos,
                        radius: entity.bounding_radius(),
                        owner: entity.owner,
                    },
                );
            }
        }

        fn tick(&mut self, dt_ms: f32) {
            self.world.refresh_caches();
            self.index();
            run_area_weapons(
                &mut self.world,
                &self.config,
                &mut self.spatial,
                &mut self.forces,
                &mut self.events,
                dt_ms,
                &mut self.scratch,
            )
            .unwrap();
        }

        fn finalized(&mut self) -> Vec<crate::forces::FinalForce> {
            let mut out = Vec::new();
            self.forces.finalize(&mut out);
            out
        }
    }

    #[test]
    fn test_progress_ramps_and_emits_events() {
        let mut fx = Fixture::new();
        let emitter = fx.spawn_emitter("repulsor_field");

        // transition_ms 400: four 100 ms ticks to saturate.
        fx.tick(100.0);
        let p1 = fx.world.get(emitter).unwrap().weapons[0].area_progress;
        assert!((p1 - 0.25).abs() < 1e-3);
        for _ in 0..5 {
            fx.tick(100.0);
        }
        assert_eq!(fx.world.get(emitter).unwrap().weapons[0].area_progress, 1.0);
        assert!(fx
            .events
            .sim
            .iter()
            .any(|e| matches!(e, SimEvent::AreaWeaponStart { .. })));

        fx.world.get_mut(emitter).unwrap().weapons[0].is_firing = false;
        fx.tick(100.0);
        assert!(fx
            .events
            .sim
            .iter()
            .any(|e| matches!(e, SimEvent::AreaWeaponStop { .. })));
        let p = fx.world.get(emitter).unwrap().weapons[0].area_progress;
        assert!((p - 0.75).abs() < 1e-3, "ramping back down, got {p}");
    }

    #[test]
    fn test_force_field_pushes_inner_pulls_outer() {
        let mut fx = Fixture::new();
        fx.spawn_emitter("repulsor_field");
        // Inner push zone reaches 60, pull annulus 60..120; slice faces +x
        // with half-angle 0.9.
        let near = fx.spawn("jackal", 1, 40.0, 0.0);
        let far = fx.spawn("jackal", 1, 100.0, 0.0);
        let outside = fx.spawn("jackal", 1, 0.0, -100.0);

        // Saturate progress, then measure one tick of forces.
        for _ in 0..5 {
            fx.tick(100.0);
            fx.finalized();
        }
        fx.tick(16.0);
        let out = fx.finalized();

        let near_force = out.iter().find(|f| f.entity == near).unwrap();
        assert!(near_force.force.x > 0.0, "inner zone pushes outward");
        let far_force = out.iter().find(|f| f.entity == far).unwrap();
        assert!(far_force.force.x < 0.0, "outer zone pulls inward");
        assert!(out.iter().all(|f| f.entity != outside), "behind the slice");
    }

    #[test]
    fn test_force_field_inner_zone_damages() {
        let mut fx = Fixture::new();
        fx.spawn_emitter("repulsor_field");
        let near = fx.spawn("jackal", 1, 40.0, 0.0);

        for _ in 0..5 {
            fx.tick(100.0);
        }
        let hp = fx.world.get(near).unwrap().hp().unwrap();
        assert!(hp < 40.0, "push zone deals 4 dps, hp {hp}");
    }

    #[test]
    fn test_wave_scales_with_proximity() {
        let mut fx = Fixture::new();
        fx.spawn_emitter("wave_projector");
        let close = fx.spawn("mammoth", 1, 35.0, 0.0);
        let far = fx.spawn("mammoth", 1, 135.0, 0.0);

        for _ in 0..6 {
            fx.tick(100.0);
            fx.finalized();
        }
        fx.tick(16.0);
        let out = fx.finalized();

        let close_force = out.iter().find(|f| f.entity == close).unwrap().force;
        let far_force = out.iter().find(|f| f.entity == far).unwrap().force;
        assert!(close_force.x < 0.0 && far_force.x < 0.0, "wave pulls inward");
        assert!(
            close_force.x.abs() > far_force.x.abs(),
            "closer targets feel more pull"
        );

        let close_hp = fx.world.get(close).unwrap().hp().unwrap();
        let far_hp = fx.world.get(far).unwrap().hp().unwrap();
        assert!(close_hp < far_hp, "closer targets take more damage");
    }

    #[test]
    fn test_wave_idle_slice_is_narrow() {
        let mut fx = Fixture::new();
        let emitter = fx.spawn_emitter("wave_projector");
        // Just off-axis: inside the attack half-angle (0.7) but outside the
        // idle one (0.2).
        let off_axis = fx.spawn("mammoth", 1, 60.0, 35.0);

        // Barely ramped: slice still near idle width.
        fx.world.get_mut(emitter).unwrap().weapons[0].is_firing = true;
        fx.tick(16.0);
        let out = fx.finalized();
        assert!(out.iter().all(|f| f.entity != off_axis));

        // Fully ramped: slice widens and catches it.
        for _ in 0..40 {
            fx.tick(100.0);
            fx.finalized();
        }
        fx.tick(16.0);
        let out = fx.finalized();
        assert!(out.iter().any(|f| f.entity == off_axis));
    }

    #[test]
    fn test_enemy_projectiles_get_deflected() {
        let mut fx = Fixture::new();
        fx.spawn_emitter("repulsor_field");
        let incoming = fx.world.spawn_projectile(
            Some(1),
            Vec2::new(50.0, 0.0),
            std::f32::consts::PI,
            ProjectileState::traveling(
                9999,
                0,
                "autocannon".to_string(),
                Vec2::new(50.0, 0.0),
                Vec2::new(-420.0, 0.0),
                2.0,
                1.0,
                900.0,
            ),
        );
        fx.world.refresh_caches();

        for _ in 0..5 {
            fx.tick(100.0);
        }
        let velocity = fx
            .world
            .get(incoming)
            .unwrap()
            .projectile
            .as_ref()
            .unwrap()
            .velocity;
        assert!(velocity.x > -420.0, "pushed back along +x");
        assert!(fx
            .events
            .net
            .iter()
            .any(|e| matches!(e, NetEvent::ProjectileVelocity { .. })));
    }
}
