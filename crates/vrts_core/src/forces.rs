//! Per-tick force accumulation.
//!
//! Independent subsystems (steering, knockback, recoil, pulls) contribute
//! forces to the same entity without clobbering each other; a single
//! `finalize` pass sums them before physics integration consumes the total.
//! The entry buffer is length-tracked and reused between ticks - cleared,
//! never reallocated.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::math::Vec2;

/// Which subsystem contributed a force. Kept on the entry for debugging and
/// tests; summation ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceSource {
    /// Locomotion steering toward a desired velocity.
    Steering,
    /// Impact knockback on a damaged unit.
    Knockback,
    /// Recoil on the firing unit.
    Recoil,
    /// Directional pull from an area weapon.
    Pull,
}

/// One force contribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceEntry {
    /// Entity receiving the force.
    pub entity: EntityId,
    /// Force vector.
    pub force: Vec2,
    /// Contributing subsystem.
    pub source: ForceSource,
}

/// Summed force for one entity, produced by finalize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalForce {
    /// Entity receiving the force.
    pub entity: EntityId,
    /// Total force for the tick.
    pub force: Vec2,
}

/// Per-tick force accumulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForceAccumulator {
    entries: Vec<ForceEntry>,
}

impl ForceAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no forces are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all entries, keeping the allocation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append a raw force entry. Non-finite forces are dropped here so a
    /// single degenerate computation cannot poison the finalize sum.
    pub fn push(&mut self, entity: EntityId, force: Vec2, source: ForceSource) {
        if !force.is_finite() {
            tracing::warn!(entity, ?source, "dropping non-finite force contribution");
            return;
        }
        self.entries.push(ForceEntry {
            entity,
            force,
            source,
        });
    }

    /// Steering force toward a target velocity.
    ///
    /// `(target_velocity - current_velocity) * strength * mass`: the mass
    /// factor cancels in the integrator's `a = F / m`, so every unit reaches
    /// steady-state acceleration at the same rate regardless of mass, while
    /// heavier units still resist external (non-mass-scaled) forces more.
    pub fn apply_steering(
        &mut self,
        entity: EntityId,
        current_velocity: Vec2,
        target_velocity: Vec2,
        strength: f32,
        mass: f32,
    ) {
        let force = (target_velocity - current_velocity) * (strength * mass);
        self.push(entity, force, ForceSource::Steering);
    }

    /// Directional force (knockback, pull, recoil). With
    /// `affected_by_mass`, the force scales by `1 / mass` so light units are
    /// flung farther than heavy ones under the same nominal force.
    pub fn apply_directional(
        &mut self,
        entity: EntityId,
        force: Vec2,
        source: ForceSource,
        affected_by_mass: bool,
        mass: f32,
    ) {
        let scaled = if affected_by_mass && mass > 0.0 {
            force * (1.0 / mass)
        } else {
            force
        };
        self.push(entity, scaled, source);
    }

    /// Sum all contributions per entity into `out`, ordered by entity id,
    /// then clear the entry buffer.
    ///
    /// `out` is a caller-owned scratch buffer; it is cleared first.
    pub fn finalize(&mut self, out: &mut Vec<FinalForce>) {
        out.clear();
        if self.entries.is_empty() {
            return;
        }

        // Sort by entity id: deterministic output order and contiguous runs
        // to sum. Order within a run does not affect the sum.
        self.entries.sort_by_key(|e| e.entity);

        let mut current = self.entries[0].entity;
        let mut sum = Vec2::ZERO;
        for entry in &self.entries {
            if entry.entity != current {
                out.push(FinalForce {
                    entity: current,
                    force: sum,
                });
                current = entry.entity;
                sum = Vec2::ZERO;
            }
            sum = sum + entry.force;
        }
        out.push(FinalForce {
            entity: current,
            force: sum,
        });

        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulation_is_commutative() {
        let mut acc = ForceAccumulator::new();
        let mut out = Vec::new();

        acc.push(5, Vec2::new(10.0, 0.0), ForceSource::Steering);
        acc.push(5, Vec2::new(-3.0, 0.0), ForceSource::Knockback);
        acc.finalize(&mut out);
        let first = out[0].force;

        acc.push(5, Vec2::new(-3.0, 0.0), ForceSource::Knockback);
        acc.push(5, Vec2::new(10.0, 0.0), ForceSource::Steering);
        acc.finalize(&mut out);

        assert_eq!(out[0].force, first);
        assert_eq!(first, Vec2::new(7.0, 0.0));
    }

    #[test]
    fn test_finalize_groups_by_entity_sorted() {
        let mut acc = ForceAccumulator::new();
        let mut out = Vec::new();
        acc.push(9, Vec2::new(1.0, 0.0), ForceSource::Pull);
        acc.push(2, Vec2::new(0.0, 1.0), ForceSource::Pull);
        acc.push(9, Vec2::new(1.0, 0.0), ForceSource::Recoil);
        acc.finalize(&mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].entity, 2);
        assert_eq!(out[0].force, Vec2::new(0.0, 1.0));
        assert_eq!(out[1].entity, 9);
        assert_eq!(out[1].force, Vec2::new(2.0, 0.0));
    }

    #[test]
    fn test_steering_scales_by_mass() {
        let mut acc = ForceAccumulator::new();
        let mut out = Vec::new();
        acc.apply_steering(1, Vec2::ZERO, Vec2::new(10.0, 0.0), 2.0, 4.0);
        acc.finalize(&mut out);
        assert_eq!(out[0].force, Vec2::new(80.0, 0.0));
    }

    #[test]
    fn test_directional_inverse_mass_scaling() {
        let mut acc = ForceAccumulator::new();
        let mut out = Vec::new();
        acc.apply_directional(1, Vec2::new(100.0, 0.0), ForceSource::Knockback, true, 4.0);
        acc.apply_directional(2, Vec2::new(100.0, 0.0), ForceSource::Knockback, false, 4.0);
        acc.finalize(&mut out);
        assert_eq!(out[0].force, Vec2::new(25.0, 0.0));
        assert_eq!(out[1].force, Vec2::new(100.0, 0.0));
    }

    #[test]
    fn test_non_finite_contribution_dropped() {
        let mut acc = ForceAccumulator::new();
        let mut out = Vec::new();
        acc.push(1, Vec2::new(f32::INFINITY, 0.0), ForceSource::Pull);
        acc.push(1, Vec2::new(1.0, 0.0), ForceSource::Pull);
        acc.finalize(&mut out);
        assert_eq!(out[0].force, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut acc = ForceAccumulator::new();
        for i in 0..100 {
            acc.push(i, Vec2::new(1.0, 1.0), ForceSource::Steering);
        }
        let cap = acc.entries.capacity();
        acc.clear();
        assert!(acc.is_empty());
        assert_eq!(acc.entries.capacity(), cap);
    }
}
