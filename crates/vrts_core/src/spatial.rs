//! Spatial index over units and buildings.
//!
//! A uniform grid rebuilt from scratch every tick. Entries are bucketed by
//! cell; radius and line queries visit only the cells their footprint
//! overlaps, then filter candidates exactly. Results come back sorted by
//! entity id so downstream passes stay deterministic, and query buffers are
//! owned by the index and reused between calls.

use std::collections::HashMap;

use crate::components::{EntityId, EntityKind, PlayerId};
use crate::math::Vec2;

/// Grid cell edge length, in world units. Comfortably above the largest
/// collision radius in the builtin roster so a radius query rarely visits
/// more than a 3x3 neighbourhood.
const CELL_SIZE: f32 = 64.0;

/// One indexed entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialHit {
    /// Entity id.
    pub id: EntityId,
    /// Position at index time.
    pub pos: Vec2,
    /// Bounding radius (half-diagonal for buildings).
    pub radius: f32,
    /// Owning player, if any.
    pub owner: Option<PlayerId>,
}

#[derive(Debug, Default)]
struct Layer {
    cells: HashMap<(i32, i32), Vec<SpatialHit>>,
}

impl Layer {
    fn clear(&mut self) {
        // Keep the buckets; entities mostly stay in the same cells between
        // ticks, so the allocations get reused.
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
    }

    fn insert(&mut self, hit: SpatialHit) {
        let min = cell_of(hit.pos - Vec2::new(hit.radius, hit.radius));
        let max = cell_of(hit.pos + Vec2::new(hit.radius, hit.radius));
        for cx in min.0..=max.0 {
            for cy in min.1..=max.1 {
                self.cells.entry((cx, cy)).or_default().push(hit);
            }
        }
    }
}

fn cell_of(pos: Vec2) -> (i32, i32) {
    (
        (pos.x / CELL_SIZE).floor() as i32,
        (pos.y / CELL_SIZE).floor() as i32,
    )
}

/// Per-tick spatial index, layered by entity kind.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    units: Layer,
    buildings: Layer,
    scratch: Vec<SpatialHit>,
}

impl SpatialIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all entries, keeping bucket allocations.
    pub fn clear(&mut self) {
        self.units.clear();
        self.buildings.clear();
    }

    /// Insert an entity into the layer for its kind. Projectiles are not
    /// indexed; they query, they are never queried.
    pub fn insert(&mut self, kind: EntityKind, hit: SpatialHit) {
        match kind {
            EntityKind::Unit => self.units.insert(hit),
            EntityKind::Building => self.buildings.insert(hit),
            // Projectiles collide through swept damage shapes instead.
            EntityKind::Projectile => {
                debug_assert!(false, "projectiles are not spatially indexed");
            }
        }
    }

    fn layer(&self, kind: EntityKind) -> &Layer {
        debug_assert!(
            !matches!(kind, EntityKind::Projectile),
            "projectiles are not spatially indexed"
        );
        match kind {
            EntityKind::Unit => &self.units,
            EntityKind::Building | EntityKind::Projectile => &self.buildings,
        }
    }

    /// Entities of `kind` whose bounding circle overlaps the query circle.
    /// Sorted by id. The returned slice borrows the index's scratch buffer
    /// and is valid until the next query.
    pub fn query_in_radius(
        &mut self,
        kind: EntityKind,
        center: Vec2,
        radius: f32,
    ) -> &[SpatialHit] {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();

        let layer = self.layer(kind);
        let min = cell_of(center - Vec2::new(radius, radius));
        let max = cell_of(center + Vec2::new(radius, radius));
        for cx in min.0..=max.0 {
            for cy in min.1..=max.1 {
                let Some(bucket) = layer.cells.get(&(cx, cy)) else {
                    continue;
                };
                for hit in bucket {
                    let reach = radius + hit.radius;
                    if center.distance_squared(hit.pos) <= reach * reach {
                        scratch.push(*hit);
                    }
                }
            }
        }

        finish(&mut scratch);
        self.scratch = scratch;
        &self.scratch
    }

    /// Like [`query_in_radius`](Self::query_in_radius), restricted to
    /// entities not owned by `player`.
    pub fn query_enemies_in_radius(
        &mut self,
        kind: EntityKind,
        player: PlayerId,
        center: Vec2,
        radius: f32,
    ) -> &[SpatialHit] {
        self.query_in_radius(kind, center, radius);
        self.scratch
            .retain(|h| h.owner.is_some() && h.owner != Some(player));
        &self.scratch
    }

    /// Entities of `kind` within `padding` of the segment `a..b`. Sorted by
    /// id. Walks the cells the padded segment's bounding box covers, then
    /// filters by exact point-to-segment distance.
    pub fn query_along_line(
        &mut self,
        kind: EntityKind,
        a: Vec2,
        b: Vec2,
        padding: f32,
    ) -> &[SpatialHit] {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();

        let layer = self.layer(kind);
        let lo = Vec2::new(a.x.min(b.x) - padding, a.y.min(b.y) - padding);
        let hi = Vec2::new(a.x.max(b.x) + padding, a.y.max(b.y) + padding);
        let min = cell_of(lo);
        let max = cell_of(hi);
        for cx in min.0..=max.0 {
            for cy in min.1..=max.1 {
                let Some(bucket) = layer.cells.get(&(cx, cy)) else {
                    continue;
                };
                for hit in bucket {
                    let reach = padding + hit.radius;
                    if segment_distance_squared(a, b, hit.pos) <= reach * reach {
                        scratch.push(*hit);
                    }
                }
            }
        }

        finish(&mut scratch);
        self.scratch = scratch;
        &self.scratch
    }
}

/// Sort by id and drop duplicates (large entities straddle cell borders and
/// get inserted into several buckets).
fn finish(hits: &mut Vec<SpatialHit>) {
    hits.sort_unstable_by_key(|h| h.id);
    hits.dedup_by_key(|h| h.id);
}

fn segment_distance_squared(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq <= f32::EPSILON {
        return a.distance_squared(p);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    let closest = a + ab * t;
    closest.distance_squared(p)
}
