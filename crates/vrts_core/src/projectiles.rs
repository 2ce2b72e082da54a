//! Projectile and beam advancement.
//!
//! Traveling projectiles integrate straight-line (or homing) motion and
//! collide with a swept volume from their previous position, so one tick of
//! travel cannot tunnel through a thin target. Beams re-anchor to their
//! owning weapon every tick, deal time-scaled line damage, and throttle the
//! obstruction recompute that clips their visible length.

use std::collections::BTreeSet;

use crate::beam_index::BeamIndex;
use crate::components::{EntityId, ProjectileKind, ProjectileState};
use crate::config::ConfigRegistry;
use crate::damage::{self, DamageHit, DamageRequest, DamageShape};
use crate::error::Result;
use crate::events::{NetEvent, SimEvent, TickEvents};
use crate::forces::{ForceAccumulator, ForceSource};
use crate::math::{normalize_angle, Vec2};
use crate::spatial::SpatialIndex;
use crate::world::World;

/// Driver-owned scratch for the projectile pass.
#[derive(Debug, Default)]
pub struct ProjectileScratch {
    ids: Vec<EntityId>,
    hits: Vec<DamageHit>,
    exclude: BTreeSet<EntityId>,
    removals: Vec<EntityId>,
}

/// Advance every projectile and beam by one tick.
///
/// # Errors
///
/// Fails on a weapon definition key missing from the registry.
pub fn advance_projectiles(
    world: &mut World,
    config: &ConfigRegistry,
    spatial: &mut SpatialIndex,
    forces: &mut ForceAccumulator,
    beams: &mut BeamIndex,
    events: &mut TickEvents,
    dt_ms: f32,
    scratch: &mut ProjectileScratch,
) -> Result<()> {
    scratch.ids.clear();
    scratch.ids.extend_from_slice(world.projectile_ids());
    scratch.removals.clear();
    let ids = std::mem::take(&mut scratch.ids);

    for &id in &ids {
        let Some(kind) = world
            .get(id)
            .and_then(|e| e.projectile.as_ref())
            .map(|p| p.kind)
        else {
            continue;
        };
        match kind {
            ProjectileKind::Traveling => {
                advance_traveling(world, config, spatial, forces, events, id, dt_ms, scratch)?;
            }
            ProjectileKind::Beam => {
                advance_beam(world, config, spatial, forces, beams, events, id, dt_ms, scratch)?;
            }
            // Instant projectiles resolve at fire time and never persist.
            ProjectileKind::Instant => scratch.removals.push(id),
        }
    }

    for &id in &scratch.removals {
        world.remove_bodyless(id);
    }
    scratch.ids = ids;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn advance_traveling(
    world: &mut World,
    config: &ConfigRegistry,
    spatial: &mut SpatialIndex,
    forces: &mut ForceAccumulator,
    events: &mut TickEvents,
    id: EntityId,
    dt_ms: f32,
    scratch: &mut ProjectileScratch,
) -> Result<()> {
    let dt = dt_ms / 1000.0;

    // Homing steers velocity before integration; a dead target simply ends
    // the steering.
    let steer = {
        let Some(entity) = world.get(id) else { return Ok(()) };
        let Some(p) = entity.projectile.as_ref() else { return Ok(()) };
        p.homing.and_then(|homing| {
            let target = world.get(homing.target).filter(|t| t.is_alive())?;
            let pos = entity.transform.pos;
            let current = p.velocity.angle();
            let desired = (target.transform.pos - pos).angle();
            let delta = normalize_angle(desired - current);
            let limit = homing.turn_rate * dt;
            let turn = delta.clamp(-limit, limit);
            (turn.abs() > f32::EPSILON).then(|| {
                Vec2::from_angle(current + turn) * p.velocity.length()
            })
        })
    };

    let (prev, pos, owner, snapshot) = {
        let Some(entity) = world.get_mut(id) else { return Ok(()) };
        let pos = entity.transform.pos;
        let owner = entity.owner;
        let Some(p) = entity.projectile.as_mut() else { return Ok(()) };
        if let Some(velocity) = steer {
            p.velocity = velocity;
            events.net.push(NetEvent::ProjectileVelocity {
                projectile: id,
                pos,
                velocity,
            });
        }
        p.prev_pos = pos;
        p.elapsed_ms += dt_ms;
        let next = pos + p.velocity * dt;
        entity.transform.pos = next;
        (pos, next, owner, entity.projectile.clone())
    };
    let Some(p) = snapshot else { return Ok(()) };
    let def = config.weapon(&p.weapon_id)?;

    // Swept collision from the pre-integration position.
    scratch.exclude.clear();
    scratch.exclude.insert(p.source);
    scratch.exclude.extend(p.hit_entities.iter().copied());
    let remaining = (p.max_hits as usize).saturating_sub(p.hit_entities.len());
    let req = DamageRequest {
        shape: DamageShape::Swept {
            start: prev,
            end: pos,
            radius: p.radius,
        },
        damage: p.damage,
        attacker: owner,
        pierce: p.pierce,
        max_hits: remaining,
        exclude: &scratch.exclude,
        knockback: def.knockback,
        knockback_affected_by_mass: def.knockback_affected_by_mass,
        attacker_velocity: p.velocity,
    };
    damage::apply_damage(world, spatial, config, forces, events, &req, &mut scratch.hits);

    let hit_something = !scratch.hits.is_empty();
    if hit_something {
        if let Some(splash) = def.splash {
            let center = scratch.hits[0].point;
            scratch.exclude.extend(scratch.hits.iter().map(|h| h.target));
            let mut splash_hits = Vec::new();
            damage::apply_splash(
                world,
                spatial,
                config,
                forces,
                events,
                &splash,
                center,
                p.damage,
                owner,
                def.knockback,
                def.knockback_affected_by_mass,
                p.velocity,
                &scratch.exclude,
                &mut splash_hits,
            );
        }
        if let Some(payload) = world.get_mut(id).and_then(|e| e.projectile.as_mut()) {
            for hit in &scratch.hits {
                payload.hit_entities.insert(hit.target);
            }
        }
    }

    let exhausted = hit_something
        && (!p.pierce
            || world
                .get(id)
                .and_then(|e| e.projectile.as_ref())
                .map_or(true, |p| !p.can_hit_more()));
    // elapsed_ms already includes this tick.
    let expired = !exhausted && p.elapsed_ms >= p.lifespan_ms;

    if exhausted || expired {
        if expired {
            if let Some(splash) = def.splash.filter(|s| s.on_expiry) {
                scratch.exclude.clear();
                scratch.exclude.insert(p.source);
                let mut splash_hits = Vec::new();
                damage::apply_splash(
                    world,
                    spatial,
                    config,
                    forces,
                    events,
                    &splash,
                    pos,
                    p.damage,
                    owner,
                    def.knockback,
                    def.knockback_affected_by_mass,
                    p.velocity,
                    &scratch.exclude,
                    &mut splash_hits,
                );
            }
            events.sim.push(SimEvent::ProjectileExpire {
                projectile: id,
                pos,
            });
        }
        events.net.push(NetEvent::ProjectileDespawn { projectile: id });
        scratch.removals.push(id);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn advance_beam(
    world: &mut World,
    config: &ConfigRegistry,
    spatial: &mut SpatialIndex,
    forces: &mut ForceAccumulator,
    beams: &mut BeamIndex,
    events: &mut TickEvents,
    id: EntityId,
    dt_ms: f32,
    scratch: &mut ProjectileScratch,
) -> Result<()> {
    let dt = dt_ms / 1000.0;

    // Re-anchor to the owning weapon. A missing owner or weapon slot means
    // the beam is orphaned and goes away.
    let anchor = {
        let source = world
            .get(id)
            .and_then(|e| e.projectile.as_ref())
            .map(|p| (p.source, p.weapon_index));
        source.and_then(|(source, weapon_index)| {
            let owner = world.get(source).filter(|e| e.is_alive())?;
            let weapon = owner.weapons.get(weapon_index)?;
            Some((source, weapon_index, weapon.world_pos, weapon.turret.rotation))
        })
    };
    let Some((source, weapon_index, start, aim)) = anchor else {
        let slot = world
            .get(id)
            .and_then(|e| e.projectile.as_ref())
            .map(|p| (p.source, p.weapon_index));
        if let Some((source, weapon_index)) = slot {
            beams.remove(source, weapon_index);
        }
        events.net.push(NetEvent::ProjectileDespawn { projectile: id });
        scratch.removals.push(id);
        return Ok(());
    };

    let (owner, length, damage_per_sec, recompute) = {
        let Some(entity) = world.get_mut(id) else { return Ok(()) };
        entity.transform.pos = start;
        entity.transform.set_rotation(aim);
        let owner = entity.owner;
        let Some(p) = entity.projectile.as_mut() else { return Ok(()) };
        let Some(beam) = p.beam.as_mut() else { return Ok(()) };
        beam.start = start;
        beam.end = start + Vec2::from_angle(aim) * beam.length;
        beam.since_obstruction_ms += dt_ms;
        let recompute =
            beam.since_obstruction_ms >= config.tuning.beam_obstruction_interval_ms;
        if recompute {
            beam.since_obstruction_ms = 0.0;
        }
        (owner, beam.length, beam.damage_per_sec, recompute)
    };

    let def = config.weapon(
        &world
            .get(id)
            .and_then(|e| e.projectile.as_ref())
            .map(|p| p.weapon_id.clone())
            .unwrap_or_default(),
    )?;

    // Tick damage along the beam line. The damage search doubles as the
    // obstruction search; the cached visual truncation only refreshes at
    // the throttled interval.
    scratch.exclude.clear();
    scratch.exclude.insert(source);
    let end = start + Vec2::from_angle(aim) * length;
    let req = DamageRequest {
        shape: DamageShape::Line { start, end },
        damage: damage_per_sec * dt,
        attacker: owner,
        pierce: def.pierce,
        max_hits: def.max_hits as usize,
        exclude: &scratch.exclude,
        knockback: def.knockback,
        knockback_affected_by_mass: def.knockback_affected_by_mass,
        attacker_velocity: Vec2::from_angle(aim) * config.tuning.beam_death_velocity,
    };
    let truncation =
        damage::apply_damage(world, spatial, config, forces, events, &req, &mut scratch.hits);

    if recompute {
        if let Some(beam) = world
            .get_mut(id)
            .and_then(|e| e.projectile.as_mut())
            .and_then(|p| p.beam.as_mut())
        {
            beam.truncation_t = truncation;
        }
    }

    // Beam recoil accrues every damaging tick.
    if !scratch.hits.is_empty() && def.recoil > 0.0 {
        if let Some(mass) = world.get(source).and_then(|e| e.unit.as_ref()).map(|u| u.mass) {
            forces.apply_directional(
                source,
                -Vec2::from_angle(aim) * def.recoil,
                ForceSource::Recoil,
                false,
                mass,
            );
        }
    }
    Ok(())
}
