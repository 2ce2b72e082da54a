//! Embedded physics integrator.
//!
//! Bodies are owned here; entities hold only an opaque [`BodyHandle`]. Each
//! tick runs a fixed-order pipeline so force balance behaves identically at
//! any timestep:
//!
//! 1. frame-rate-independent air friction
//! 2. acceleration -> velocity -> position integration
//! 3. map boundary clamping, zeroing outward velocity on contact
//! 4. circle-circle resolution (positional correction + impulse)
//! 5. circle vs static rectangle resolution
//!
//! Static bodies have zero inverse mass and never move. Non-finite forces
//! are dropped before they can corrupt a body.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::math::{frame_decay, nearest_point_on_rect, Vec2};

/// Fraction of the penetration corrected positionally per step.
const CORRECTION_PERCENT: f32 = 0.8;

/// Penetration below this is ignored to avoid jitter.
const CORRECTION_SLOP: f32 = 0.01;

/// Opaque handle to a physics body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub(crate) u32);

/// Collision shape of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BodyShape {
    /// Dynamic circle.
    Circle {
        /// Radius in world units.
        radius: f32,
    },
    /// Axis-aligned rectangle; always static here.
    Rect {
        /// Half width.
        half_w: f32,
        /// Half height.
        half_h: f32,
    },
}

/// A rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Entity this body belongs to, for post-step transform sync.
    pub entity: EntityId,
    /// Collision shape.
    pub shape: BodyShape,
    /// Position.
    pub pos: Vec2,
    /// Velocity in units per second.
    pub vel: Vec2,
    /// Mass.
    pub mass: f32,
    /// Cached inverse mass; zero for static bodies.
    pub inv_mass: f32,
    /// Air friction coefficient per 60 Hz frame.
    pub friction_air: f32,
    /// Collision restitution.
    pub restitution: f32,
    /// Static bodies never move.
    pub is_static: bool,
    /// Force accumulated for the next step; cleared after integration.
    pub force: Vec2,
}

/// Body store plus the integration pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsWorld {
    bodies: Vec<Option<Body>>,
    free: Vec<u32>,
    /// Map extent; positions are clamped into `[0, w] x [0, h]`.
    pub bounds: Vec2,
}

impl PhysicsWorld {
    /// Create a physics world for a map of the given size.
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            bodies: Vec::new(),
            free: Vec::new(),
            bounds: Vec2::new(width, height),
        }
    }

    /// Create a dynamic circle body.
    pub fn create_circle(
        &mut self,
        entity: EntityId,
        pos: Vec2,
        radius: f32,
        mass: f32,
        friction_air: f32,
        restitution: f32,
    ) -> BodyHandle {
        self.insert(Body {
            entity,
            shape: BodyShape::Circle { radius },
            pos,
            vel: Vec2::ZERO,
            mass,
            inv_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
            friction_air,
            restitution,
            is_static: false,
            force: Vec2::ZERO,
        })
    }

    /// Create a static rectangle body.
    pub fn create_rect_static(
        &mut self,
        entity: EntityId,
        pos: Vec2,
        half_w: f32,
        half_h: f32,
    ) -> BodyHandle {
        self.insert(Body {
            entity,
            shape: BodyShape::Rect { half_w, half_h },
            pos,
            vel: Vec2::ZERO,
            mass: 0.0,
            inv_mass: 0.0,
            friction_air: 0.0,
            restitution: 0.0,
            is_static: true,
            force: Vec2::ZERO,
        })
    }

    fn insert(&mut self, body: Body) -> BodyHandle {
        if let Some(index) = self.free.pop() {
            self.bodies[index as usize] = Some(body);
            BodyHandle(index)
        } else {
            self.bodies.push(Some(body));
            BodyHandle((self.bodies.len() - 1) as u32)
        }
    }

    /// Remove a body. Removing an already-removed handle is a no-op.
    pub fn remove(&mut self, handle: BodyHandle) {
        let index = handle.0 as usize;
        if index < self.bodies.len() && self.bodies[index].take().is_some() {
            self.free.push(handle.0);
        }
    }

    /// Get a body.
    #[must_use]
    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle.0 as usize).and_then(Option::as_ref)
    }

    /// Get a body mutably.
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle.0 as usize).and_then(Option::as_mut)
    }

    /// Accumulate a force on a body for the next step.
    ///
    /// Non-finite forces (degenerate math upstream) are dropped for the tick
    /// rather than corrupting the body.
    pub fn apply_force(&mut self, handle: BodyHandle, force: Vec2) {
        if !force.is_finite() {
            tracing::warn!(handle = handle.0, "dropping non-finite force");
            return;
        }
        if let Some(body) = self.body_mut(handle) {
            body.force = body.force + force;
        }
    }

    /// Directly set a body's velocity (teleports and scripted motion).
    pub fn set_velocity(&mut self, handle: BodyHandle, vel: Vec2) {
        if !vel.is_finite() {
            return;
        }
        if let Some(body) = self.body_mut(handle) {
            body.vel = vel;
        }
    }

    /// Advance all bodies by `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.integrate(dt);
        self.clamp_bounds();
        self.resolve_circle_circle();
        self.resolve_circle_rect();
    }

    fn integrate(&mut self, dt: f32) {
        for body in self.bodies.iter_mut().flatten() {
            if body.is_static {
                body.force = Vec2::ZERO;
                continue;
            }
            let decay = frame_decay(body.friction_air, dt);
            body.vel = body.vel * decay;

            let accel = body.force * body.inv_mass;
            body.vel = body.vel + accel * dt;
            body.pos = body.pos + body.vel * dt;
            body.force = Vec2::ZERO;
        }
    }

    fn clamp_bounds(&mut self) {
        let bounds = self.bounds;
        for body in self.bodies.iter_mut().flatten() {
            if body.is_static {
                continue;
            }
            let r = match body.shape {
                BodyShape::Circle { radius } => radius,
                BodyShape::Rect { half_w, half_h } => half_w.max(half_h),
            };
            if body.pos.x < r {
                body.pos.x = r;
                body.vel.x = body.vel.x.max(0.0);
            } else if body.pos.x > bounds.x - r {
                body.pos.x = bounds.x - r;
                body.vel.x = body.vel.x.min(0.0);
            }
            if body.pos.y < r {
                body.pos.y = r;
                body.vel.y = body.vel.y.max(0.0);
            } else if body.pos.y > bounds.y - r {
                body.pos.y = bounds.y - r;
                body.vel.y = body.vel.y.min(0.0);
            }
        }
    }

    fn resolve_circle_circle(&mut self) {
        let len = self.bodies.len();
        for i in 0..len {
            for j in (i + 1)..len {
                let (Some(a), Some(b)) = (self.bodies[i], self.bodies[j]) else {
                    continue;
                };
                let (BodyShape::Circle { radius: ra }, BodyShape::Circle { radius: rb }) =
                    (a.shape, b.shape)
                else {
                    continue;
                };
                if a.is_static && b.is_static {
                    continue;
                }

                let delta = b.pos - a.pos;
                let dist_sq = delta.length_squared();
                let min_dist = ra + rb;
                if dist_sq >= min_dist * min_dist {
                    continue;
                }

                let dist = dist_sq.sqrt();
                // Coincident centers: pick a fixed axis.
                let normal = if dist > f32::EPSILON {
                    delta * (1.0 / dist)
                } else {
                    Vec2::new(1.0, 0.0)
                };
                let penetration = min_dist - dist;
                let inv_sum = a.inv_mass + b.inv_mass;
                if inv_sum <= 0.0 {
                    continue;
                }

                // Positional correction proportional to inverse mass.
                let correction = ((penetration - CORRECTION_SLOP).max(0.0) / inv_sum)
                    * CORRECTION_PERCENT;
                let mut a = a;
                let mut b = b;
                a.pos = a.pos - normal * (correction * a.inv_mass);
                b.pos = b.pos + normal * (correction * b.inv_mass);

                // Impulse along the contact normal, lesser restitution.
                let rel_vel = b.vel - a.vel;
                let vel_along = rel_vel.dot(normal);
                if vel_along < 0.0 {
                    let e = a.restitution.min(b.restitution);
                    let impulse = -(1.0 + e) * vel_along / inv_sum;
                    a.vel = a.vel - normal * (impulse * a.inv_mass);
                    b.vel = b.vel + normal * (impulse * b.inv_mass);
                }

                self.bodies[i] = Some(a);
                self.bodies[j] = Some(b);
            }
        }
    }

    fn resolve_circle_rect(&mut self) {
        let len = self.bodies.len();
        for i in 0..len {
            let Some(circle) = self.bodies[i] else {
                continue;
            };
            let BodyShape::Circle { radius } = circle.shape else {
                continue;
            };
            if circle.is_static {
                continue;
            }

            let mut circle = circle;
            let mut moved = false;
            for j in 0..len {
                let Some(rect) = self.bodies[j] else { continue };
                let BodyShape::Rect { half_w, half_h } = rect.shape else {
                    continue;
                };

                let nearest = nearest_point_on_rect(circle.pos, rect.pos, half_w, half_h);
                let delta = circle.pos - nearest;
                let dist_sq = delta.length_squared();

                if dist_sq > f32::EPSILON {
                    // Center outside the rectangle.
                    if dist_sq >= radius * radius {
                        continue;
                    }
                    let dist = dist_sq.sqrt();
                    let normal = delta * (1.0 / dist);
                    circle.pos = circle.pos + normal * (radius - dist);
                    let vel_along = circle.vel.dot(normal);
                    if vel_along < 0.0 {
                        let e = circle.restitution.min(rect.restitution);
                        circle.vel = circle.vel - normal * ((1.0 + e) * vel_along);
                    }
                    moved = true;
                } else {
                    // Center fully inside: push out along the smallest
                    // penetration axis.
                    let dx = circle.pos.x - rect.pos.x;
                    let dy = circle.pos.y - rect.pos.y;
                    let pen_x = half_w - dx.abs() + radius;
                    let pen_y = half_h - dy.abs() + radius;
                    if pen_x < pen_y {
                        let sign = if dx >= 0.0 { 1.0 } else { -1.0 };
                        circle.pos.x = rect.pos.x + sign * (half_w + radius);
                        circle.vel.x = 0.0;
                    } else {
                        let sign = if dy >= 0.0 { 1.0 } else { -1.0 };
                        circle.pos.y = rect.pos.y + sign * (half_h + radius);
                        circle.vel.y = 0.0;
                    }
                    moved = true;
                }
            }
            if moved {
                self.bodies[i] = Some(circle);
            }
        }
    }

    /// Iterate live bodies in stable index order.
    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.bodies.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(1000.0, 1000.0)
    }

    #[test]
    fn test_force_accelerates_by_inverse_mass() {
        let mut pw = world();
        let light = pw.create_circle(1, Vec2::new(100.0, 100.0), 5.0, 1.0, 0.0, 0.0);
        let heavy = pw.create_circle(2, Vec2::new(500.0, 500.0), 5.0, 4.0, 0.0, 0.0);
        pw.apply_force(light, Vec2::new(10.0, 0.0));
        pw.apply_force(heavy, Vec2::new(10.0, 0.0));
        pw.step(1.0);
        let v_light = pw.body(light).unwrap().vel.x;
        let v_heavy = pw.body(heavy).unwrap().vel.x;
        assert!((v_light - 4.0 * v_heavy).abs() < 1e-4);
    }

    #[test]
    fn test_air_friction_is_rate_independent() {
        let run = |steps: u32| {
            let mut pw = world();
            let h = pw.create_circle(1, Vec2::new(500.0, 500.0), 5.0, 1.0, 0.1, 0.0);
            pw.set_velocity(h, Vec2::new(100.0, 0.0));
            let dt = 1.0 / steps as f32;
            for _ in 0..steps {
                pw.step(dt);
            }
            pw.body(h).unwrap().vel.x
        };
        let coarse = run(10);
        let fine = run(100);
        // Equal net decay; positions differ slightly from integration order.
        assert!((coarse - fine).abs() / fine < 0.01);
    }

    #[test]
    fn test_boundary_clamp_zeroes_outward_velocity() {
        let mut pw = world();
        let h = pw.create_circle(1, Vec2::new(3.0, 500.0), 5.0, 1.0, 0.0, 0.5);
        pw.set_velocity(h, Vec2::new(-50.0, 10.0));
        pw.step(0.016);
        let body = pw.body(h).unwrap();
        assert_eq!(body.pos.x, 5.0);
        assert!(body.vel.x >= 0.0);
        assert!(body.vel.y > 0.0);
    }

    #[test]
    fn test_circle_circle_separation() {
        let mut pw = world();
        let a = pw.create_circle(1, Vec2::new(100.0, 100.0), 10.0, 1.0, 0.0, 0.0);
        let b = pw.create_circle(2, Vec2::new(112.0, 100.0), 10.0, 1.0, 0.0, 0.0);
        for _ in 0..20 {
            pw.step(0.016);
        }
        let pa = pw.body(a).unwrap().pos;
        let pb = pw.body(b).unwrap().pos;
        assert!(pa.distance(pb) >= 19.5);
    }

    #[test]
    fn test_heavier_body_moves_less_in_correction() {
        let mut pw = world();
        let light = pw.create_circle(1, Vec2::new(100.0, 100.0), 10.0, 1.0, 0.0, 0.0);
        let heavy = pw.create_circle(2, Vec2::new(110.0, 100.0), 10.0, 10.0, 0.0, 0.0);
        pw.step(0.016);
        let moved_light = (pw.body(light).unwrap().pos.x - 100.0).abs();
        let moved_heavy = (pw.body(heavy).unwrap().pos.x - 110.0).abs();
        assert!(moved_light > moved_heavy);
    }

    #[test]
    fn test_restitution_uses_lesser_coefficient() {
        let mut pw = world();
        let a = pw.create_circle(1, Vec2::new(100.0, 100.0), 5.0, 1.0, 0.0, 1.0);
        let b = pw.create_circle(2, Vec2::new(120.0, 100.0), 5.0, 1.0, 0.0, 0.0);
        pw.set_velocity(a, Vec2::new(100.0, 0.0));
        for _ in 0..30 {
            pw.step(0.016);
        }
        // With e = min(1, 0) = 0 the collision is fully inelastic: a should
        // not bounce backwards.
        assert!(pw.body(a).unwrap().vel.x >= -1.0);
    }

    #[test]
    fn test_circle_pushed_out_of_rect() {
        let mut pw = world();
        pw.create_rect_static(1, Vec2::new(500.0, 500.0), 20.0, 20.0);
        let c = pw.create_circle(2, Vec2::new(525.0, 500.0), 10.0, 1.0, 0.0, 0.0);
        pw.set_velocity(c, Vec2::new(-100.0, 0.0));
        for _ in 0..10 {
            pw.step(0.016);
        }
        let pos = pw.body(c).unwrap().pos;
        assert!(pos.x >= 529.9, "circle should rest outside the rect, x={}", pos.x);
    }

    #[test]
    fn test_circle_inside_rect_smallest_axis() {
        let mut pw = world();
        pw.create_rect_static(1, Vec2::new(500.0, 500.0), 40.0, 10.0);
        let c = pw.create_circle(2, Vec2::new(505.0, 503.0), 4.0, 1.0, 0.0, 0.0);
        pw.step(0.016);
        let pos = pw.body(c).unwrap().pos;
        // Pushed out through the nearer (y) face.
        assert!((pos.y - 514.0).abs() < 1e-3, "y={}", pos.y);
        assert!((pos.x - 505.0).abs() < 1.0);
    }

    #[test]
    fn test_static_bodies_never_move() {
        let mut pw = world();
        let r = pw.create_rect_static(1, Vec2::new(500.0, 500.0), 20.0, 20.0);
        let c = pw.create_circle(2, Vec2::new(470.0, 500.0), 15.0, 5.0, 0.0, 0.5);
        pw.set_velocity(c, Vec2::new(200.0, 0.0));
        for _ in 0..60 {
            pw.step(0.016);
        }
        assert_eq!(pw.body(r).unwrap().pos, Vec2::new(500.0, 500.0));
    }

    #[test]
    fn test_non_finite_force_dropped() {
        let mut pw = world();
        let h = pw.create_circle(1, Vec2::new(100.0, 100.0), 5.0, 1.0, 0.0, 0.0);
        pw.apply_force(h, Vec2::new(f32::NAN, 0.0));
        pw.step(0.016);
        assert!(pw.body(h).unwrap().pos.is_finite());
    }

    #[test]
    fn test_handle_reuse_after_remove() {
        let mut pw = world();
        let a = pw.create_circle(1, Vec2::new(10.0, 10.0), 5.0, 1.0, 0.0, 0.0);
        pw.remove(a);
        assert!(pw.body(a).is_none());
        let b = pw.create_circle(2, Vec2::new(20.0, 20.0), 5.0, 1.0, 0.0, 0.0);
        assert_eq!(a.0, b.0);
        assert_eq!(pw.body(b).unwrap().entity, 2);
    }
}
