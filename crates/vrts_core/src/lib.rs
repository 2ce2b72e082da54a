//! # VRTS Core
//!
//! Deterministic combat and movement simulation core.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO in the tick path
//! - No system randomness (seeded [`rng::SimRng`] only)
//!
//! This separation enables:
//! - Lockstep multiplayer (identical simulation across clients)
//! - Headless server builds
//! - Replay recording and verification
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`components`] - entity, weapon and projectile state definitions
//! - [`config`] - weapon/unit/building definitions and global tuning
//! - [`simulation`] - the tick driver that sequences all phases
//! - [`spatial`] - per-tick spatial hash over units and buildings
//! - [`targeting`] - target acquisition, lock hysteresis, turret rotation
//! - [`damage`] - line, swept and area damage resolution
//! - [`weapons`] - cooldowns, bursts, spread and shot spawning
//! - [`projectiles`] - traveling projectile and continuous beam advancement
//! - [`area_weapons`] - force fields and wave projectors
//! - [`physics`] - force accumulation and rigid body integration
//! - [`replay`] - command recording and verified playback
//! - [`math`] - deterministic 2D vector and intersection helpers

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod area_weapons;
pub mod beam_index;
pub mod components;
pub mod config;
pub mod damage;
pub mod error;
pub mod events;
pub mod forces;
pub mod math;
pub mod physics;
pub mod projectiles;
pub mod replay;
pub mod rng;
pub mod simulation;
pub mod spatial;
pub mod targeting;
pub mod weapons;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::components::{
        Entity, EntityId, EntityKind, PlayerId, ProjectileKind, ProjectileState, TurretState,
        UnitCommand, Weapon,
    };
    pub use crate::config::{
        BuildingDef, ConfigRegistry, GlobalTuning, SplashDef, UnitDef, WeaponDef, WeaponKindDef,
        WeaponRanges,
    };
    pub use crate::error::{Result, SimError};
    pub use crate::events::{DeathContext, NetEvent, SimEvent, TickEvents};
    pub use crate::math::Vec2;
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::simulation::Simulation;
}
