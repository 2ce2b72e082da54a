//! Target acquisition and turret rotation.
//!
//! Each weapon resolves a target once per tick against the spatial index,
//! with hysteresis: a lock acquired inside `lock` range survives until the
//! target leaves the wider `release` range, so units do not flicker between
//! targets at a range boundary. Turrets chase the resolved aim angle with a
//! second-order model (acceleration plus multiplicative drag) instead of
//! snapping.

use crate::components::{EntityId, EntityKind, PlayerId};
use crate::config::GlobalTuning;
use crate::math::{frame_decay, normalize_angle, Vec2};
use crate::spatial::SpatialIndex;
use crate::world::World;

/// Minimum speed at which a unit counts as moving for idle turret aim.
const IDLE_AIM_SPEED: f32 = 1.0;

#[derive(Debug, Clone, Copy)]
struct Resolution {
    target: Option<EntityId>,
    locked: bool,
    firing: bool,
    fightstop: bool,
}

/// Distance from a weapon to a target's surface.
fn surface_distance(from: Vec2, target_pos: Vec2, target_radius: f32) -> f32 {
    from.distance(target_pos) - target_radius
}

/// Run target acquisition for every armed unit and building.
///
/// `ids` is a caller-owned scratch buffer for the entity pass order.
pub fn acquire_targets(world: &mut World, spatial: &mut SpatialIndex, ids: &mut Vec<EntityId>) {
    ids.clear();
    ids.extend_from_slice(world.unit_ids());
    ids.extend_from_slice(world.building_ids());

    for &id in ids.iter() {
        let Some(entity) = world.get(id) else { continue };
        let Some(owner) = entity.owner else { continue };
        if entity.weapons.is_empty() {
            continue;
        }
        let pos = entity.transform.pos;
        let weapon_count = entity.weapons.len();

        for weapon_index in 0..weapon_count {
            let (ranges, carried, was_locked) = {
                let Some(entity) = world.get(id) else { break };
                let w = &entity.weapons[weapon_index];
                (w.ranges, w.target, w.is_locked)
            };
            let resolution =
                resolve_weapon(world, spatial, id, ranges, carried, was_locked, pos, owner);
            let Some(entity) = world.get_mut(id) else { break };
            let weapon = &mut entity.weapons[weapon_index];
            weapon.world_pos = pos;
            weapon.target = resolution.target;
            weapon.is_locked = resolution.locked;
            weapon.is_firing = resolution.firing;
            weapon.in_fightstop_range = resolution.fightstop;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_weapon(
    world: &World,
    spatial: &mut SpatialIndex,
    id: EntityId,
    ranges: crate::config::WeaponRanges,
    carried: Option<EntityId>,
    was_locked: bool,
    pos: Vec2,
    owner: PlayerId,
) -> Resolution {
    // Validate the carried target. A missing or dead entity is "no target",
    // not an error.
    let mut target = None;
    let mut locked = was_locked;
    if let Some(tid) = carried {
        if let Some(t) = world.get(tid).filter(|t| t.is_alive()) {
            let dist = surface_distance(pos, t.transform.pos, t.bounding_radius());
            let keep_range = if locked { ranges.release } else { ranges.see };
            if dist <= keep_range {
                target = Some(tid);
            }
        }
    }
    if target.is_none() {
        locked = false;
    }

    // Fresh nearest-enemy search when nothing carried over.
    if target.is_none() {
        target = nearest_enemy(spatial, owner, pos, ranges.see, id);
    }

    let Some(tid) = target else {
        return Resolution {
            target: None,
            locked: false,
            firing: false,
            fightstop: false,
        };
    };
    let Some(t) = world.get(tid) else {
        return Resolution {
            target: None,
            locked: false,
            firing: false,
            fightstop: false,
        };
    };

    let dist = surface_distance(pos, t.transform.pos, t.bounding_radius());
    if dist <= ranges.lock {
        locked = true;
    }
    Resolution {
        target: Some(tid),
        locked,
        firing: dist <= ranges.fire,
        fightstop: dist <= ranges.fightstop,
    }
}

fn nearest_enemy(
    spatial: &mut SpatialIndex,
    player: PlayerId,
    pos: Vec2,
    range: f32,
    exclude: EntityId,
) -> Option<EntityId> {
    let mut best: Option<(EntityId, f32)> = None;
    for kind in [EntityKind::Unit, EntityKind::Building] {
        for hit in spatial.query_enemies_in_radius(kind, player, pos, range) {
            if hit.id == exclude {
                continue;
            }
            let dist = surface_distance(pos, hit.pos, hit.radius);
            if dist > range {
                continue;
            }
            // Ties break toward the lower id; hits arrive sorted by id.
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((hit.id, dist));
            }
        }
    }
    best.map(|(id, _)| id)
}

/// Rotate every turret toward its resolved aim angle.
pub fn rotate_turrets(
    world: &mut World,
    tuning: &GlobalTuning,
    dt_seconds: f32,
    ids: &mut Vec<EntityId>,
) {
    ids.clear();
    ids.extend_from_slice(world.unit_ids());
    ids.extend_from_slice(world.building_ids());

    for &id in ids.iter() {
        let Some(entity) = world.get(id) else { continue };
        let pos = entity.transform.pos;
        let body_rotation = entity.transform.rotation;
        let velocity = entity.unit.as_ref().map_or(Vec2::ZERO, |u| u.velocity);
        let weapon_count = entity.weapons.len();

        for weapon_index in 0..weapon_count {
            let target_pos = world
                .get(id)
                .and_then(|e| e.weapons[weapon_index].target)
                .and_then(|tid| world.get(tid))
                .map(|t| t.transform.pos);

            let Some(entity) = world.get_mut(id) else { break };
            let turret = &mut entity.weapons[weapon_index].turret;

            let desired = match target_pos {
                Some(tp) => Some((tp - pos).angle()),
                None if velocity.length() > IDLE_AIM_SPEED => Some(velocity.angle()),
                None if tuning.turret_returns_forward => Some(body_rotation),
                None => None,
            };

            if let Some(desired) = desired {
                let delta = normalize_angle(desired - turret.rotation);
                turret.angular_velocity += delta.signum() * turret.turn_accel * dt_seconds;
            }
            turret.angular_velocity *= frame_decay(turret.drag, dt_seconds);
            turret.rotation =
                normalize_angle(turret.rotation + turret.angular_velocity * dt_seconds);
        }
    }
}
