//! Geometric damage resolution.
//!
//! One entry point for the three source shapes: a line (beams and hitscan),
//! a swept volume (traveling projectiles, checked from previous to current
//! position so fast shots cannot tunnel), and an area (splash, optionally
//! restricted to a pie slice). Hits are collected, sorted by parametric `t`
//! (or distance ratio for areas), damage is applied in order, and deaths are
//! recorded with directional context for the presentation layer.

use std::collections::BTreeSet;

use crate::components::{EntityId, EntityKind, PlayerId};
use crate::config::ConfigRegistry;
use crate::events::{DeathContext, SimEvent, TickEvents};
use crate::forces::{ForceAccumulator, ForceSource};
use crate::math::{line_circle_t, line_rect_t, normalize_angle, Vec2};
use crate::spatial::SpatialIndex;
use crate::world::World;

/// Pie-slice restriction for area damage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slice {
    /// Direction the slice faces, radians.
    pub direction: f32,
    /// Half the slice's angular width, radians.
    pub half_angle: f32,
}

/// Geometry of a damage source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageShape {
    /// An infinitely thin segment.
    Line {
        /// Segment start.
        start: Vec2,
        /// Segment end.
        end: Vec2,
    },
    /// A circle swept along a segment.
    Swept {
        /// Previous position.
        start: Vec2,
        /// Current position.
        end: Vec2,
        /// Radius of the moving circle.
        radius: f32,
    },
    /// A circular area, optionally cut to a slice.
    Area {
        /// Center of the effect.
        center: Vec2,
        /// Outer radius.
        radius: f32,
        /// Damage multiplier at the rim: 1.0 keeps full damage everywhere,
        /// 0.0 fades to nothing.
        falloff: f32,
        /// Optional angular restriction.
        slice: Option<Slice>,
    },
}

/// One damage application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageHit {
    /// Damaged entity.
    pub target: EntityId,
    /// Parametric position along the source (distance ratio for areas).
    pub t: f32,
    /// World-space hit point.
    pub point: Vec2,
    /// Damage applied after falloff.
    pub amount: f32,
    /// Whether this hit crossed the target through zero hp.
    pub killed: bool,
}

/// A damage source, fully described.
#[derive(Debug, Clone)]
pub struct DamageRequest<'a> {
    /// Source geometry.
    pub shape: DamageShape,
    /// Base damage before falloff.
    pub damage: f32,
    /// Attacking player; their own entities are never hit.
    pub attacker: Option<PlayerId>,
    /// Whether the source continues past its first hit.
    pub pierce: bool,
    /// How many new hits the source may still make.
    pub max_hits: usize,
    /// Entities that must not be hit (the source itself, prior hits).
    pub exclude: &'a BTreeSet<EntityId>,
    /// Knockback force magnitude; zero disables.
    pub knockback: f32,
    /// Whether knockback scales by inverse mass.
    pub knockback_affected_by_mass: bool,
    /// Velocity of the attacking object, carried into death context.
    pub attacker_velocity: Vec2,
}

struct Candidate {
    target: EntityId,
    t: f32,
    point: Vec2,
    center: Vec2,
    scale: f32,
}

/// Resolve and apply a damage source.
///
/// Hits are appended to `out_hits` (cleared first) in application order.
/// Returns the truncation `t` for non-piercing line sources that hit
/// something, used to clip the beam visually.
///
/// Dead entities are left in the world with zero hp; the driver removes
/// them after the damage pass.
pub fn apply_damage(
    world: &mut World,
    spatial: &mut SpatialIndex,
    config: &ConfigRegistry,
    forces: &mut ForceAccumulator,
    events: &mut TickEvents,
    req: &DamageRequest<'_>,
    out_hits: &mut Vec<DamageHit>,
) -> Option<f32> {
    out_hits.clear();
    if req.max_hits == 0 || req.damage <= 0.0 {
        return None;
    }

    let mut candidates = collect_candidates(world, spatial, req);
    // Ascending t: nearest hit first. Ties break by id for determinism.
    candidates.sort_by(|a, b| {
        a.t.partial_cmp(&b.t)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.target.cmp(&b.target))
    });

    let travel_dir = match req.shape {
        DamageShape::Line { start, end } | DamageShape::Swept { start, end, .. } => {
            (end - start).normalize_or_zero()
        }
        DamageShape::Area { .. } => Vec2::ZERO,
    };
    let is_line = matches!(req.shape, DamageShape::Line { .. });
    let area_center = match req.shape {
        DamageShape::Area { center, .. } => Some(center),
        _ => None,
    };

    let mut truncation = None;
    for candidate in candidates {
        if out_hits.len() >= req.max_hits {
            break;
        }
        let amount = req.damage * candidate.scale;
        let killed = damage_entity(
            world,
            config,
            events,
            candidate.target,
            amount,
            candidate.point,
            travel_dir,
            req.attacker_velocity,
        );
        events.sim.push(SimEvent::Hit {
            target: candidate.target,
            amount,
            pos: candidate.point,
        });

        if req.knockback > 0.0 {
            push_knockback(world, forces, req, &candidate, travel_dir, area_center);
        }

        out_hits.push(DamageHit {
            target: candidate.target,
            t: candidate.t,
            point: candidate.point,
            amount,
            killed,
        });

        if !req.pierce {
            if is_line {
                truncation = Some(candidate.t);
            }
            break;
        }
    }
    truncation
}

/// Two-zone splash cascade: the primary zone at full damage, then the
/// secondary zone at a reduced fraction, excluding everything the primary
/// zone already hit. Entities in `exclude` are skipped by both zones.
#[allow(clippy::too_many_arguments)]
pub fn apply_splash(
    world: &mut World,
    spatial: &mut SpatialIndex,
    config: &ConfigRegistry,
    forces: &mut ForceAccumulator,
    events: &mut TickEvents,
    splash: &crate::config::SplashDef,
    center: Vec2,
    damage: f32,
    attacker: Option<PlayerId>,
    knockback: f32,
    knockback_affected_by_mass: bool,
    attacker_velocity: Vec2,
    exclude: &BTreeSet<EntityId>,
    out_hits: &mut Vec<DamageHit>,
) {
    let primary = DamageRequest {
        shape: DamageShape::Area {
            center,
            radius: splash.radius,
            falloff: splash.falloff,
            slice: None,
        },
        damage,
        attacker,
        pierce: true,
        max_hits: usize::MAX,
        exclude,
        knockback,
        knockback_affected_by_mass,
        attacker_velocity,
    };
    apply_damage(world, spatial, config, forces, events, &primary, out_hits);

    if splash.secondary_radius <= splash.radius || splash.secondary_fraction <= 0.0 {
        return;
    }
    let mut secondary_exclude = exclude.clone();
    secondary_exclude.extend(out_hits.iter().map(|h| h.target));
    let secondary = DamageRequest {
        shape: DamageShape::Area {
            center,
            radius: splash.secondary_radius,
            falloff: splash.falloff,
            slice: None,
        },
        damage: damage * splash.secondary_fraction,
        attacker,
        pierce: true,
        max_hits: usize::MAX,
        exclude: &secondary_exclude,
        knockback: knockback * splash.secondary_fraction,
        knockback_affected_by_mass,
        attacker_velocity,
    };
    let mut secondary_hits = Vec::new();
    apply_damage(
        world, spatial, config, forces, events, &secondary, &mut secondary_hits,
    );
    out_hits.append(&mut secondary_hits);
}

fn collect_candidates(
    world: &World,
    spatial: &mut SpatialIndex,
    req: &DamageRequest<'_>,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for kind in [EntityKind::Unit, EntityKind::Building] {
        match req.shape {
            DamageShape::Line { start, end } => {
                for hit in spatial.query_along_line(kind, start, end, 0.0) {
                    if !eligible(world, req, hit.id, hit.owner) {
                        continue;
                    }
                    if let Some((t, point)) = intersect(world, kind, hit.id, start, end, 0.0) {
                        candidates.push(Candidate {
                            target: hit.id,
                            t,
                            point,
                            center: hit.pos,
                            scale: 1.0,
                        });
                    }
                }
            }
            DamageShape::Swept { start, end, radius } => {
                for hit in spatial.query_along_line(kind, start, end, radius) {
                    if !eligible(world, req, hit.id, hit.owner) {
                        continue;
                    }
                    if let Some((t, point)) = intersect(world, kind, hit.id, start, end, radius) {
                        candidates.push(Candidate {
                            target: hit.id,
                            t,
                            point,
                            center: hit.pos,
                            scale: 1.0,
                        });
                    }
                }
            }
            DamageShape::Area {
                center,
                radius,
                falloff,
                slice,
            } => {
                for hit in spatial.query_in_radius(kind, center, radius) {
                    if !eligible(world, req, hit.id, hit.owner) {
                        continue;
                    }
                    // Zone membership is by center distance, so the primary
                    // and secondary splash zones partition cleanly.
                    let dist = center.distance(hit.pos);
                    if dist > radius {
                        continue;
                    }
                    if let Some(slice) = slice {
                        let to_target = (hit.pos - center).angle();
                        let angular_size = if dist > f32::EPSILON {
                            (hit.radius / dist).atan()
                        } else {
                            std::f32::consts::PI
                        };
                        let off = normalize_angle(to_target - slice.direction).abs();
                        if off > slice.half_angle + angular_size {
                            continue;
                        }
                    }
                    let dist_ratio = (dist / radius).clamp(0.0, 1.0);
                    let scale = 1.0 - dist_ratio * (1.0 - falloff);
                    candidates.push(Candidate {
                        target: hit.id,
                        t: dist_ratio,
                        point: hit.pos,
                        center: hit.pos,
                        scale,
                    });
                }
            }
        }
    }
    candidates
}

fn eligible(world: &World, req: &DamageRequest<'_>, id: EntityId, owner: Option<PlayerId>) -> bool {
    if req.exclude.contains(&id) {
        return false;
    }
    if req.attacker.is_some() && owner == req.attacker {
        return false;
    }
    world.get(id).map_or(false, crate::components::Entity::is_alive)
}

/// Exact intersection of a (possibly padded) segment with an entity's
/// collision shape. Returns `t` and the world-space hit point.
fn intersect(
    world: &World,
    kind: EntityKind,
    id: EntityId,
    start: Vec2,
    end: Vec2,
    padding: f32,
) -> Option<(f32, Vec2)> {
    let entity = world.get(id)?;
    let t = match kind {
        EntityKind::Unit => {
            let radius = entity.unit.as_ref().map_or(0.0, |u| u.collision_radius);
            line_circle_t(start, end, entity.transform.pos, radius + padding)?
        }
        EntityKind::Building => {
            let s = entity.structure.as_ref()?;
            line_rect_t(
                start,
                end,
                entity.transform.pos,
                s.half_w + padding,
                s.half_h + padding,
            )?
        }
        EntityKind::Projectile => return None,
    };
    Some((t, start.lerp(end, t)))
}

/// Apply a raw damage amount to one entity, recording death context on a
/// kill. Shared with the area-weapon subsystems, which resolve their own
/// geometry.
#[allow(clippy::too_many_arguments)]
pub(crate) fn damage_entity(
    world: &mut World,
    config: &ConfigRegistry,
    events: &mut TickEvents,
    id: EntityId,
    amount: f32,
    hit_point: Vec2,
    travel_dir: Vec2,
    attacker_velocity: Vec2,
) -> bool {
    let Some(entity) = world.get_mut(id) else {
        return false;
    };
    let was_alive = entity.is_alive();
    let pos = entity.transform.pos;

    if let Some(unit) = entity.unit.as_mut() {
        unit.hp = (unit.hp - amount).max(0.0);
    } else if let Some(structure) = entity.structure.as_mut() {
        structure.hp = (structure.hp - amount).max(0.0);
    } else {
        return false;
    }

    let killed = was_alive && !entity.is_alive();
    if killed {
        // Hit point coincident with the center gives no direction; fall
        // back to the attacker's travel direction.
        let penetration = pos - hit_point;
        let penetration_dir = if penetration.length_squared() > f32::EPSILON {
            penetration.normalize_or_zero()
        } else {
            travel_dir
        };
        let is_unit = entity.kind == EntityKind::Unit;
        let def_id = entity.def_id.clone();
        let owner = entity.owner;
        let radius = entity.bounding_radius();
        let color = lookup_color(config, is_unit, &def_id);
        events.deaths.push(DeathContext {
            entity: id,
            def_id,
            owner,
            pos,
            penetration_dir,
            attacker_velocity,
            magnitude: amount,
            radius,
            color,
            is_unit,
        });
    }
    killed
}

/// Packed RGB display colour from the definition tables. Unknown keys get
/// white; colour is presentation-only and never worth failing a tick over.
fn lookup_color(config: &ConfigRegistry, is_unit: bool, def_id: &str) -> u32 {
    let rgb = if is_unit {
        config.unit(def_id).ok().map(|d| d.color)
    } else {
        config.building(def_id).ok().map(|d| d.color)
    };
    let [r, g, b] = rgb.unwrap_or([255, 255, 255]);
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

fn push_knockback(
    world: &World,
    forces: &mut ForceAccumulator,
    req: &DamageRequest<'_>,
    candidate: &Candidate,
    travel_dir: Vec2,
    area_center: Option<Vec2>,
) {
    // Buildings never receive knockback.
    let Some(unit) = world.get(candidate.target).and_then(|e| e.unit.as_ref()) else {
        return;
    };
    let dir = match area_center {
        Some(center) => (candidate.center - center).normalize_or_zero(),
        None => travel_dir,
    };
    forces.apply_directional(
        candidate.target,
        dir * req.knockback,
        ForceSource::Knockback,
        req.knockback_affected_by_mass,
        unit.mass,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::PhysicsWorld;
    use crate::spatial::SpatialHit;

    struct Fixture {
        world: World,
        physics: PhysicsWorld,
        config: ConfigRegistry,
        spatial: SpatialIndex,
        forces: ForceAccumulator,
        events: TickEvents,
        hits: Vec<DamageHit>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                world: World::new(2, 1),
                physics: PhysicsWorld::new(2000.0, 2000.0),
                config: ConfigRegistry::builtin(),
                spatial: SpatialIndex::new(),
                forces: ForceAccumulator::new(),
                events: TickEvents::default(),
                hits: Vec::new(),
            }
        }

        fn spawn(&mut self, def: &str, player: PlayerId, x: f32, y: f32) -> EntityId {
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

        fn apply(&mut self, req: &DamageRequest<'_>) -> Option<f32> {
            apply_damage(
                &mut self.world,
                &mut self.spatial,
                &self.config,
                &mut self.forces,
                &mut self.events,
                req,
                &mut self.hits,
            )
        }

        fn hp(&self, id: EntityId) -> f32 {
            self.world.get(id).unwrap().hp().unwrap()
        }
    }

    fn line_req(start: Vec2, end: Vec2, damage: f32, pierce: bool, exclude: &BTreeSet<EntityId>) -> DamageRequest<'_> {
        DamageRequest {
            shape: DamageShape::Line { start, end },
            damage,
            attacker: Some(0),
            pierce,
            max_hits: if pierce { 8 } else { 1 },
            exclude,
            knockback: 0.0,
            knockback_affected_by_mass: false,
            attacker_velocity: Vec2::ZERO,
        }
    }

    #[test]
    fn test_non_piercing_line_stops_at_first_hit() {
        let mut fx = Fixture::new();
        // Colinear targets at t = 0.2, 0.5, 0.8 along a 500-unit line.
        let a = fx.spawn("jackal", 1, 100.0, 0.0);
        let b = fx.spawn("jackal", 1, 250.0, 0.0);
        let c = fx.spawn("jackal", 1, 400.0, 0.0);
        fx.index();

        let exclude = BTreeSet::new();
        let req = line_req(Vec2::ZERO, Vec2::new(500.0, 0.0), 5.0, false, &exclude);
        let truncation = fx.apply(&req);

        assert_eq!(fx.hits.len(), 1);
        assert_eq!(fx.hits[0].target, a);
        let t = truncation.unwrap();
        // First contact is the near edge of the 6-radius circle at x=100.
        assert!((t - 94.0 / 500.0).abs() < 1e-3, "truncation t {t}");
        assert_eq!(fx.hp(a), 35.0);
        assert_eq!(fx.hp(b), 40.0);
        assert_eq!(fx.hp(c), 40.0);
    }

    #[test]
    fn test_piercing_line_hits_in_t_order() {
        let mut fx = Fixture::new();
        let a = fx.spawn("jackal", 1, 100.0, 0.0);
        let b = fx.spawn("jackal", 1, 250.0, 0.0);
        let c = fx.spawn("jackal", 1, 400.0, 0.0);
        fx.index();

        let exclude = BTreeSet::new();
        let req = line_req(Vec2::ZERO, Vec2::new(500.0, 0.0), 5.0, true, &exclude);
        let truncation = fx.apply(&req);

        assert_eq!(truncation, None);
        let order: Vec<_> = fx.hits.iter().map(|h| h.target).collect();
        assert_eq!(order, vec![a, b, c]);
        assert!(fx.hits.windows(2).all(|w| w[0].t <= w[1].t));
    }

    #[test]
    fn test_swept_no_tunneling() {
        let mut fx = Fixture::new();
        // Stationary jackal between the endpoints; projectile radius 5
        // plus unit radius 6 make the swept corridor wide enough.
        let target = fx.spawn("jackal", 1, 50.0, 0.0);
        fx.index();

        let exclude = BTreeSet::new();
        let req = DamageRequest {
            shape: DamageShape::Swept {
                start: Vec2::ZERO,
                end: Vec2::new(100.0, 0.0),
                radius: 5.0,
            },
            damage: 3.0,
            attacker: Some(0),
            pierce: false,
            max_hits: 1,
            exclude: &exclude,
            knockback: 0.0,
            knockback_affected_by_mass: false,
            attacker_velocity: Vec2::new(400.0, 0.0),
        };
        fx.apply(&req);

        assert_eq!(fx.hits.len(), 1);
        assert_eq!(fx.hits[0].target, target);
        assert_eq!(fx.hp(target), 37.0);
    }

    #[test]
    fn test_area_falloff_monotonic() {
        let mut fx = Fixture::new();
        let near = fx.spawn("mammoth", 1, 0.0, 0.0);
        let mid = fx.spawn("mammoth", 1, 50.0, 0.0);
        let far = fx.spawn("mammoth", 1, 100.0, 0.0);
        fx.index();

        let exclude = BTreeSet::new();
        let req = DamageRequest {
            shape: DamageShape::Area {
                center: Vec2::ZERO,
                radius: 100.0,
                falloff: 0.5,
                slice: None,
            },
            damage: 20.0,
            attacker: Some(0),
            pierce: true,
            max_hits: 16,
            exclude: &exclude,
            knockback: 0.0,
            knockback_affected_by_mass: false,
            attacker_velocity: Vec2::ZERO,
        };
        fx.apply(&req);

        let d_near = 1050.0 - fx.hp(near);
        let d_mid = 1050.0 - fx.hp(mid);
        let d_far = 1050.0 - fx.hp(far);
        assert_eq!(d_near, 20.0);
        assert_eq!(d_far, 10.0, "rim damage is exactly half at falloff 0.5");
        assert!(d_near >= d_mid && d_mid >= d_far);
    }

    #[test]
    fn test_slice_restricts_area() {
        let mut fx = Fixture::new();
        let inside = fx.spawn("jackal", 1, 60.0, 0.0);
        let outside = fx.spawn("jackal", 1, 0.0, 60.0);
        fx.index();

        let exclude = BTreeSet::new();
        let req = DamageRequest {
            shape: DamageShape::Area {
                center: Vec2::ZERO,
                radius: 100.0,
                falloff: 1.0,
                slice: Some(Slice {
                    direction: 0.0,
                    half_angle: 0.5,
                }),
            },
            damage: 5.0,
            attacker: Some(0),
            pierce: true,
            max_hits: 16,
            exclude: &exclude,
            knockback: 0.0,
            knockback_affected_by_mass: false,
            attacker_velocity: Vec2::ZERO,
        };
        fx.apply(&req);

        assert_eq!(fx.hp(inside), 35.0);
        assert_eq!(fx.hp(outside), 40.0);
    }

    #[test]
    fn test_friendly_fire_and_exclusion() {
        let mut fx = Fixture::new();
        let friend = fx.spawn("jackal", 0, 100.0, 0.0);
        let excluded = fx.spawn("jackal", 1, 200.0, 0.0);
        let enemy = fx.spawn("jackal", 1, 300.0, 0.0);
        fx.index();

        let mut exclude = BTreeSet::new();
        exclude.insert(excluded);
        let req = line_req(Vec2::ZERO, Vec2::new(500.0, 0.0), 5.0, false, &exclude);
        fx.apply(&req);

        assert_eq!(fx.hp(friend), 40.0);
        assert_eq!(fx.hp(excluded), 40.0);
        assert_eq!(fx.hp(enemy), 35.0);
    }

    #[test]
    fn test_kill_records_death_context() {
        let mut fx = Fixture::new();
        let victim = fx.spawn("jackal", 1, 100.0, 0.0);
        fx.index();

        let exclude = BTreeSet::new();
        let req = line_req(Vec2::ZERO, Vec2::new(200.0, 0.0), 100.0, false, &exclude);
        fx.apply(&req);

        assert!(fx.hits[0].killed);
        assert_eq!(fx.events.deaths.len(), 1);
        let death = &fx.events.deaths[0];
        assert_eq!(death.entity, victim);
        assert!(death.is_unit);
        // Hit on the near edge: penetration points from edge toward center,
        // along +x.
        assert!(death.penetration_dir.x > 0.9);
        assert_eq!(fx.hp(victim), 0.0, "hp clamps at zero");
    }

    #[test]
    fn test_knockback_only_on_units() {
        let mut fx = Fixture::new();
        let unit = fx.spawn("jackal", 1, 100.0, 0.0);
        fx.world
            .spawn_building(&fx.config, &mut fx.physics, "factory", 1, Vec2::new(300.0, 0.0))
            .unwrap();
        fx.world.refresh_caches();
        fx.index();

        let exclude = BTreeSet::new();
        let mut req = line_req(Vec2::ZERO, Vec2::new(500.0, 0.0), 1.0, true, &exclude);
        req.knockback = 50.0;
        fx.apply(&req);

        let mut out = Vec::new();
        fx.forces.finalize(&mut out);
        assert_eq!(out.len(), 1, "only the unit gets a knockback record");
        assert_eq!(out[0].entity, unit);
        assert!(out[0].force.x > 0.0);
    }

    #[test]
    fn test_splash_secondary_excludes_primary_hits() {
        let mut fx = Fixture::new();
        let close = fx.spawn("mammoth", 1, 10.0, 0.0);
        let fringe = fx.spawn("mammoth", 1, 40.0, 0.0);
        fx.index();

        let splash = crate::config::SplashDef {
            radius: 28.0,
            secondary_radius: 52.0,
            secondary_fraction: 0.5,
            falloff: 1.0,
            on_expiry: false,
        };
        let exclude = BTreeSet::new();
        let mut hits = Vec::new();
        apply_splash(
            &mut fx.world,
            &mut fx.spatial,
            &fx.config,
            &mut fx.forces,
            &mut fx.events,
            &splash,
            Vec2::ZERO,
            20.0,
            Some(0),
            0.0,
            false,
            Vec2::ZERO,
            &exclude,
            &mut hits,
        );

        assert_eq!(1050.0 - fx.hp(close), 20.0, "primary zone, full damage, hit once");
        assert_eq!(1050.0 - fx.hp(fringe), 10.0, "secondary zone, half damage");
    }

    #[test]
    fn test_max_hits_caps_piercing() {
        let mut fx = Fixture::new();
        fx.spawn("jackal", 1, 100.0, 0.0);
        fx.spawn("jackal", 1, 200.0, 0.0);
        fx.spawn("jackal", 1, 300.0, 0.0);
        fx.index();

        let exclude = BTreeSet::new();
        let mut req = line_req(Vec2::ZERO, Vec2::new(500.0, 0.0), 1.0, true, &exclude);
        req.max_hits = 2;
        fx.apply(&req);
        assert_eq!(fx.hits.len(), 2);
    }
}
