//! Live-beam bookkeeping.
//!
//! Continuous beams allow at most one live beam entity per (unit, weapon
//! slot). This index answers that check in O(1) instead of scanning the
//! projectile list. Entries are added when a beam spawns and dropped when
//! the beam expires or its owner dies; a full rebuild from the projectile
//! set recovers from any drift.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, ProjectileKind};
use crate::world::World;

/// Map from unit id to weapon slot to live beam entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeamIndex {
    beams: HashMap<EntityId, HashMap<usize, EntityId>>,
}

impl BeamIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Live beam for a weapon slot, if any.
    #[must_use]
    pub fn beam_for(&self, unit: EntityId, weapon_index: usize) -> Option<EntityId> {
        self.beams.get(&unit)?.get(&weapon_index).copied()
    }

    /// Record a newly spawned beam.
    pub fn insert(&mut self, unit: EntityId, weapon_index: usize, beam: EntityId) {
        self.beams.entry(unit).or_default().insert(weapon_index, beam);
    }

    /// Drop one weapon slot's beam entry.
    pub fn remove(&mut self, unit: EntityId, weapon_index: usize) {
        if let Some(slots) = self.beams.get_mut(&unit) {
            slots.remove(&weapon_index);
            if slots.is_empty() {
                self.beams.remove(&unit);
            }
        }
    }

    /// Drop every beam entry for a unit (it died or despawned). Returns the
    /// orphaned beam entity ids so the caller can remove them from the
    /// world.
    pub fn remove_unit(&mut self, unit: EntityId, orphans: &mut Vec<EntityId>) {
        if let Some(slots) = self.beams.remove(&unit) {
            orphans.extend(slots.into_values());
        }
    }

    /// Number of live beams tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.beams.values().map(HashMap::len).sum()
    }

    /// Whether no beams are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    /// Rebuild from the world's current projectile set. Recovery path after
    /// a snapshot restore.
    pub fn rebuild(&mut self, world: &World) {
        self.beams.clear();
        for entity in world.iter() {
            let Some(projectile) = entity.projectile.as_ref() else {
                continue;
            };
            if projectile.kind == ProjectileKind::Beam {
                self.insert(projectile.source, projectile.weapon_index, entity.id);
            }
        }
    }
}
