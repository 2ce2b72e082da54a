//! Weapon firing.
//!
//! Runs after targeting and turret rotation. Ticks cooldown and burst
//! timers, spawns traveling projectiles and beams, resolves hitscan weapons
//! on the spot, and applies fire-time recoil. Continuous beams keep at most
//! one live beam per weapon slot, checked through the beam index.

use std::collections::BTreeSet;

use crate::beam_index::BeamIndex;
use crate::components::{EntityId, HomingState, ProjectileKind, ProjectileState};
use crate::config::{ConfigRegistry, WeaponDef, WeaponKindDef};
use crate::damage::{self, DamageHit, DamageRequest, DamageShape};
use crate::error::Result;
use crate::events::{NetEvent, SimEvent, TickEvents};
use crate::forces::{ForceAccumulator, ForceSource};
use crate::math::Vec2;
use crate::spatial::SpatialIndex;
use crate::world::World;

/// Driver-owned scratch for the firing pass.
#[derive(Debug, Default)]
pub struct FiringScratch {
    ids: Vec<EntityId>,
    hits: Vec<DamageHit>,
}

#[derive(Debug, Clone, Copy)]
struct WeaponSnapshot {
    firing: bool,
    target: Option<EntityId>,
    aim: f32,
    pos: Vec2,
    cooldown_remaining_ms: f32,
    burst_shots_left: u32,
    burst_delay_ms: f32,
}

/// Run the firing pass for every armed entity.
///
/// # Errors
///
/// Fails on a weapon definition key missing from the registry; factories
/// validate keys at spawn, so this indicates config data changed underneath
/// a live world.
pub fn run_firing(
    world: &mut World,
    config: &ConfigRegistry,
    spatial: &mut SpatialIndex,
    forces: &mut ForceAccumulator,
    beams: &mut BeamIndex,
    events: &mut TickEvents,
    dt_ms: f32,
    scratch: &mut FiringScratch,
) -> Result<()> {
    scratch.ids.clear();
    scratch.ids.extend_from_slice(world.unit_ids());
    scratch.ids.extend_from_slice(world.building_ids());
    let ids = std::mem::take(&mut scratch.ids);

    for &id in &ids {
        let Some(entity) = world.get(id) else { continue };
        let weapon_count = entity.weapons.len();
        for weapon_index in 0..weapon_count {
            let (def_id, snap) = {
                let Some(entity) = world.get(id) else { break };
                let w = &entity.weapons[weapon_index];
                (
                    w.def_id.clone(),
                    WeaponSnapshot {
                        firing: w.is_firing,
                        target: w.target,
                        aim: w.turret.rotation,
                        pos: w.world_pos,
                        cooldown_remaining_ms: w.cooldown_remaining_ms,
                        burst_shots_left: w.burst_shots_left,
                        burst_delay_ms: w.burst_delay_ms,
                    },
                )
            };
            let def = config.weapon(&def_id)?;
            // Area weapons run in their own subsystem pass.
            if def.area.is_some() {
                continue;
            }
            if def.is_continuous_beam() {
                upkeep_beam(world, beams, events, def, id, weapon_index, &snap);
            } else {
                step_cooldowns(
                    world,
                    config,
                    spatial,
                    forces,
                    events,
                    def,
                    id,
                    weapon_index,
                    snap,
                    dt_ms,
                    &mut scratch.hits,
                );
            }
        }
    }

    scratch.ids = ids;
    Ok(())
}

/// Spawn or remove the weapon's continuous beam to match `is_firing`.
fn upkeep_beam(
    world: &mut World,
    beams: &mut BeamIndex,
    events: &mut TickEvents,
    def: &WeaponDef,
    id: EntityId,
    weapon_index: usize,
    snap: &WeaponSnapshot,
) {
    let WeaponKindDef::Beam {
        length,
        damage_per_sec,
    } = def.kind
    else {
        return;
    };
    let live = beams.beam_for(id, weapon_index);
    match (snap.firing, live) {
        (true, None) => {
            let dir = Vec2::from_angle(snap.aim);
            let start = snap.pos;
            let end = start + dir * length;
            let owner = world.get(id).and_then(|e| e.owner);
            let beam = world.spawn_projectile(
                owner,
                start,
                snap.aim,
                ProjectileState::beam(
                    id,
                    weapon_index,
                    def.id.clone(),
                    start,
                    end,
                    damage_per_sec,
                    length,
                ),
            );
            beams.insert(id, weapon_index, beam);
            events.sim.push(SimEvent::BeamStart {
                shooter: id,
                weapon_index,
            });
            events.net.push(NetEvent::ProjectileSpawn {
                projectile: beam,
                kind: ProjectileKind::Beam,
                weapon_id: def.id.clone(),
                owner,
                source: id,
                weapon_index,
                pos: start,
                velocity: Vec2::ZERO,
                beam: Some((start, end)),
            });
        }
        (false, Some(beam)) => {
            world.remove_bodyless(beam);
            beams.remove(id, weapon_index);
            events.sim.push(SimEvent::BeamStop {
                shooter: id,
                weapon_index,
            });
            events.net.push(NetEvent::ProjectileDespawn { projectile: beam });
        }
        _ => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn step_cooldowns(
    world: &mut World,
    config: &ConfigRegistry,
    spatial: &mut SpatialIndex,
    forces: &mut ForceAccumulator,
    events: &mut TickEvents,
    def: &WeaponDef,
    id: EntityId,
    weapon_index: usize,
    mut snap: WeaponSnapshot,
    dt_ms: f32,
    hits: &mut Vec<DamageHit>,
) {
    snap.cooldown_remaining_ms -= dt_ms;
    snap.burst_delay_ms -= dt_ms;

    let mut fire_now = false;
    if snap.burst_shots_left > 0 {
        // A started burst completes even if the target slipped out of range.
        if snap.burst_delay_ms <= 0.0 {
            fire_now = true;
            snap.burst_shots_left -= 1;
            match def.burst {
                Some(burst) if snap.burst_shots_left > 0 => {
                    snap.burst_delay_ms += burst.interval_ms;
                }
                _ => snap.cooldown_remaining_ms = def.cooldown_ms,
            }
        }
    } else if snap.firing && snap.cooldown_remaining_ms <= 0.0 {
        fire_now = true;
        match def.burst {
            Some(burst) if burst.shots > 1 => {
                snap.burst_shots_left = burst.shots - 1;
                snap.burst_delay_ms = burst.interval_ms;
            }
            // Carry the overshoot so the cadence averages exactly
            // cooldown_ms regardless of tick length.
            _ => snap.cooldown_remaining_ms += def.cooldown_ms,
        }
    }
    if snap.cooldown_remaining_ms < 0.0 {
        snap.cooldown_remaining_ms = 0.0;
    }

    if fire_now {
        fire_shot(
            world, config, spatial, forces, events, def, id, weapon_index, &snap, hits,
        );
    }

    if let Some(entity) = world.get_mut(id) {
        let w = &mut entity.weapons[weapon_index];
        w.cooldown_remaining_ms = snap.cooldown_remaining_ms;
        w.burst_shots_left = snap.burst_shots_left;
        w.burst_delay_ms = snap.burst_delay_ms;
    }
}

#[allow(clippy::too_many_arguments)]
fn fire_shot(
    world: &mut World,
    config: &ConfigRegistry,
    spatial: &mut SpatialIndex,
    forces: &mut ForceAccumulator,
    events: &mut TickEvents,
    def: &WeaponDef,
    id: EntityId,
    weapon_index: usize,
    snap: &WeaponSnapshot,
    hits: &mut Vec<DamageHit>,
) {
    let aim_dir = Vec2::from_angle(snap.aim);
    events.sim.push(SimEvent::Fire {
        shooter: id,
        weapon_index,
        weapon_id: def.id.clone(),
        pos: snap.pos,
        dir: aim_dir,
    });

    let owner = world.get(id).and_then(|e| e.owner);
    let pellets = def.spread.map_or(1, |s| s.pellets.max(1));
    for pellet in 0..pellets {
        let angle = snap.aim + pellet_offset(world, def, pellet, pellets);
        let dir = Vec2::from_angle(angle);
        match def.kind {
            WeaponKindDef::Traveling {
                speed,
                radius,
                lifespan_ms,
            } => {
                let mut payload = ProjectileState::traveling(
                    id,
                    weapon_index,
                    def.id.clone(),
                    snap.pos,
                    dir * speed,
                    radius,
                    def.damage,
                    lifespan_ms,
                );
                payload.pierce = def.pierce;
                payload.max_hits = def.max_hits;
                if let (Some(homing), Some(target)) = (def.homing, snap.target) {
                    payload.homing = Some(HomingState {
                        target,
                        turn_rate: homing.turn_rate,
                    });
                }
                let projectile = world.spawn_projectile(owner, snap.pos, angle, payload);
                events.net.push(NetEvent::ProjectileSpawn {
                    projectile,
                    kind: ProjectileKind::Traveling,
                    weapon_id: def.id.clone(),
                    owner,
                    source: id,
                    weapon_index,
                    pos: snap.pos,
                    velocity: dir * speed,
                    beam: None,
                });
            }
            WeaponKindDef::Instant { length } => {
                let mut exclude = BTreeSet::new();
                exclude.insert(id);
                let req = DamageRequest {
                    shape: DamageShape::Line {
                        start: snap.pos,
                        end: snap.pos + dir * length,
                    },
                    damage: def.damage,
                    attacker: owner,
                    pierce: def.pierce,
                    max_hits: def.max_hits as usize,
                    exclude: &exclude,
                    knockback: def.knockback,
                    knockback_affected_by_mass: def.knockback_affected_by_mass,
                    attacker_velocity: dir * length,
                };
                damage::apply_damage(world, spatial, config, forces, events, &req, hits);
                if let (Some(splash), Some(first)) = (def.splash, hits.first().copied()) {
                    let mut splash_exclude = exclude;
                    splash_exclude.extend(hits.iter().map(|h| h.target));
                    damage::apply_splash(
                        world,
                        spatial,
                        config,
                        forces,
                        events,
                        &splash,
                        first.point,
                        def.damage,
                        owner,
                        def.knockback,
                        def.knockback_affected_by_mass,
                        dir * length,
                        &splash_exclude,
                        hits,
                    );
                }
            }
            WeaponKindDef::Beam { .. } => {
                // Pulsed beams (cooldown > 0) are not in the roster; a
                // continuous beam never reaches fire_shot.
            }
        }
    }

    // Fire-time recoil, opposite the aim direction. Beam recoil is applied
    // per damaging tick instead.
    if def.recoil > 0.0 {
        if let Some(mass) = world.get(id).and_then(|e| e.unit.as_ref()).map(|u| u.mass) {
            forces.apply_directional(id, -aim_dir * def.recoil, ForceSource::Recoil, false, mass);
        }
    }
}

/// Angular offset for one pellet of a spread shot.
fn pellet_offset(world: &mut World, def: &WeaponDef, pellet: u32, pellets: u32) -> f32 {
    let Some(spread) = def.spread else { return 0.0 };
    if spread.angle <= 0.0 {
        return 0.0;
    }
    if spread.random {
        world.rng.range_f32(-spread.angle / 2.0, spread.angle / 2.0)
    } else if pellets > 1 {
        // Even fan across the arc, endpoints included.
        let step = spread.angle / (pellets - 1) as f32;
        -spread.angle / 2.0 + step * pellet as f32
    } else {
        0.0
    }
}
