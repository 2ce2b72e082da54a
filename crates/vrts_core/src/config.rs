//! Data-driven weapon and unit definitions.
//!
//! The registry is built once at startup (from the built-in roster, RON
//! files, or both) and is read-only afterwards. Factories resolve
//! definitions by string key; an unrecognized key is a hard error because it
//! indicates a data bug, not a runtime race.
//!
//! # Example RON
//!
//! ```ron
//! WeaponDef(
//!     id: "autocannon",
//!     damage: 1.0,
//!     fire_range: 110.0,
//!     cooldown_ms: 80.0,
//!     kind: Traveling(speed: 420.0, radius: 2.0, lifespan_ms: 900.0),
//! )
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Multipliers deriving the five weapon ranges from a base `fire_range`.
///
/// The table is fixed so the ordering invariant
/// `see >= fire >= release >= lock >= fightstop` holds for any positive base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeMultipliers {
    /// Targets become visible (pre-aim) at `fire_range * see`.
    pub see: f32,
    /// A lock is dropped when the target leaves `fire_range * release`.
    pub release: f32,
    /// A lock is acquired inside `fire_range * lock`.
    pub lock: f32,
    /// Movement AI stops approaching inside `fire_range * fightstop`.
    pub fightstop: f32,
}

impl Default for RangeMultipliers {
    fn default() -> Self {
        Self {
            see: 1.4,
            release: 0.95,
            lock: 0.8,
            fightstop: 0.6,
        }
    }
}

/// The five derived ranges of a weapon, in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponRanges {
    /// Enemies inside this range are visible to the weapon.
    pub see: f32,
    /// Enemies inside this range can be fired at.
    pub fire: f32,
    /// A locked target is released when it leaves this range.
    pub release: f32,
    /// A target inside this range acquires a lock.
    pub lock: f32,
    /// Movement AI considers the fight "close enough" inside this range.
    pub fightstop: f32,
}

impl RangeMultipliers {
    /// Derive the full range set from a base fire range.
    #[must_use]
    pub fn derive(&self, fire_range: f32) -> WeaponRanges {
        WeaponRanges {
            see: fire_range * self.see,
            fire: fire_range,
            release: fire_range * self.release,
            lock: fire_range * self.lock,
            fightstop: fire_range * self.fightstop,
        }
    }
}

/// How a weapon delivers damage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeaponKindDef {
    /// A traveling projectile with swept-volume collision.
    Traveling {
        /// Muzzle speed in units per second.
        speed: f32,
        /// Projectile collision radius.
        radius: f32,
        /// Maximum flight time before expiry.
        lifespan_ms: f32,
    },
    /// A continuous or pulsed beam along the aim line.
    Beam {
        /// Beam length in world units.
        length: f32,
        /// Damage applied per second while the beam touches a target.
        damage_per_sec: f32,
    },
    /// Damage applied instantaneously along the aim line at fire time.
    Instant {
        /// Hitscan length in world units.
        length: f32,
    },
}

/// Burst fire configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurstDef {
    /// Shots per burst.
    pub shots: u32,
    /// Delay between shots within a burst.
    pub interval_ms: f32,
}

/// Pellet spread configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadDef {
    /// Pellets per shot.
    pub pellets: u32,
    /// Total spread arc in radians.
    pub angle: f32,
    /// Random per-pellet angles instead of an even fan.
    pub random: bool,
}

/// Splash (area) damage configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplashDef {
    /// Primary zone radius, full damage.
    pub radius: f32,
    /// Secondary zone radius; hits here take `secondary_fraction` damage and
    /// exclude entities already hit by the primary zone.
    pub secondary_radius: f32,
    /// Damage fraction for the secondary zone.
    pub secondary_fraction: f32,
    /// Linear falloff floor: damage at the zone edge is `damage * falloff`.
    pub falloff: f32,
    /// Also splash when the projectile expires without hitting anything.
    pub on_expiry: bool,
}

/// Homing configuration for traveling projectiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomingDef {
    /// Maximum steering rate in radians per second.
    pub turn_rate: f32,
}

/// Turret rotation tuning; weapons without one use the global defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurretDef {
    /// Angular acceleration in radians per second squared.
    pub turn_accel: f32,
    /// Multiplicative angular drag per 60 Hz frame, in `[0, 1)`.
    pub drag: f32,
}

/// One annulus zone of a force field.
///
/// Zones with zero `power` and zero `damage_per_sec` are visual-only and
/// skipped by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceFieldZoneDef {
    /// Inner radius at full transition progress.
    pub inner_radius: f32,
    /// Outer radius at full transition progress.
    pub outer_radius: f32,
    /// Damage applied per second inside the zone.
    pub damage_per_sec: f32,
    /// Force magnitude; the zone decides the direction.
    pub power: f32,
}

/// Continuous pie-slice force-field weapon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceFieldDef {
    /// Slice half-angle in radians.
    pub half_angle: f32,
    /// Time to animate the transition progress from 0 to 1.
    pub transition_ms: f32,
    /// Inner zone, pushes targets outward.
    pub push: ForceFieldZoneDef,
    /// Outer zone, pulls targets inward.
    pub pull: ForceFieldZoneDef,
}

/// Continuous pie-slice wave weapon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveDef {
    /// Effect radius in world units.
    pub radius: f32,
    /// Slice half-angle while idle.
    pub idle_half_angle: f32,
    /// Slice half-angle while attacking.
    pub attack_half_angle: f32,
    /// Time to animate between idle and attack angles.
    pub transition_ms: f32,
    /// Damage per second at `reference_distance`.
    pub damage_per_sec: f32,
    /// Pull force at `reference_distance`.
    pub pull_power: f32,
    /// Distance at which damage and pull equal their nominal values.
    pub reference_distance: f32,
    /// Distance floor; closer targets are treated as being here.
    pub min_distance: f32,
}

/// Area weapon subsystem attached to a weapon, if any.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AreaWeaponDef {
    /// Inner-push / outer-pull annuli.
    ForceField(ForceFieldDef),
    /// Distance-scaled pie-slice damage and pull.
    Wave(WaveDef),
}

/// Static weapon definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponDef {
    /// Unique string identifier.
    pub id: String,

    /// Damage per hit (per pellet for spread weapons).
    pub damage: f32,

    /// Base fire range; all other ranges derive from it.
    pub fire_range: f32,

    /// Cooldown between shots. Zero means a continuous beam.
    pub cooldown_ms: f32,

    /// Delivery mechanism.
    pub kind: WeaponKindDef,

    /// Whether line/swept damage pierces through hits.
    #[serde(default)]
    pub pierce: bool,

    /// Maximum entities a single projectile or beam tick may hit.
    #[serde(default = "default_max_hits")]
    pub max_hits: u32,

    /// Burst fire, if any.
    #[serde(default)]
    pub burst: Option<BurstDef>,

    /// Pellet spread, if any.
    #[serde(default)]
    pub spread: Option<SpreadDef>,

    /// Splash damage, if any.
    #[serde(default)]
    pub splash: Option<SplashDef>,

    /// Homing behavior, if any.
    #[serde(default)]
    pub homing: Option<HomingDef>,

    /// Turret override; `None` uses global defaults.
    #[serde(default)]
    pub turret: Option<TurretDef>,

    /// Area weapon subsystem, if any.
    #[serde(default)]
    pub area: Option<AreaWeaponDef>,

    /// Recoil momentum applied to the firing unit. For beams this is applied
    /// every damaging tick, for projectiles once at fire time.
    #[serde(default)]
    pub recoil: f32,

    /// Knockback force applied to hit units.
    #[serde(default)]
    pub knockback: f32,

    /// Whether knockback scales by the target's inverse mass.
    #[serde(default)]
    pub knockback_affected_by_mass: bool,
}

const fn default_max_hits() -> u32 {
    1
}

impl WeaponDef {
    /// Whether this weapon fires a continuous beam (no cooldown).
    #[must_use]
    pub fn is_continuous_beam(&self) -> bool {
        matches!(self.kind, WeaponKindDef::Beam { .. }) && self.cooldown_ms == 0.0
    }
}

/// Static unit definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDef {
    /// Unique string identifier.
    pub id: String,
    /// Maximum health.
    pub max_hp: f32,
    /// Top speed in units per second.
    pub move_speed: f32,
    /// Collision radius in world units.
    pub collision_radius: f32,
    /// Mass for physics and force scaling.
    pub mass: f32,
    /// Air friction coefficient per 60 Hz frame.
    #[serde(default = "default_friction_air")]
    pub friction_air: f32,
    /// Collision restitution.
    #[serde(default = "default_restitution")]
    pub restitution: f32,
    /// Weapon definition keys, one per hardpoint.
    #[serde(default)]
    pub weapons: Vec<String>,
    /// Display color, forwarded into death events.
    #[serde(default)]
    pub color: [u8; 3],
}

const fn default_friction_air() -> f32 {
    0.05
}

const fn default_restitution() -> f32 {
    0.3
}

/// Static building definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingDef {
    /// Unique string identifier.
    pub id: String,
    /// Maximum health.
    pub max_hp: f32,
    /// Half extents of the static collision rectangle.
    pub half_w: f32,
    /// Half height.
    pub half_h: f32,
    /// Weapon definition keys (turret buildings).
    #[serde(default)]
    pub weapons: Vec<String>,
    /// Display color, forwarded into death events.
    #[serde(default)]
    pub color: [u8; 3],
}

/// Global simulation tuning shared by all entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalTuning {
    /// Total unit cap divided evenly among players (floor division).
    pub total_unit_cap: u32,
    /// Default turret angular acceleration (radians/s^2).
    pub default_turn_accel: f32,
    /// Default turret angular drag per 60 Hz frame.
    pub default_turn_drag: f32,
    /// Idle turrets rotate back to the unit's facing when true.
    pub turret_returns_forward: bool,
    /// Steering force strength multiplier.
    pub steering_strength: f32,
    /// Minimum interval between beam obstruction recomputes.
    pub beam_obstruction_interval_ms: f32,
    /// Attacker-velocity magnitude reported in beam death contexts.
    pub beam_death_velocity: f32,
    /// Range derivation table.
    pub range_multipliers: RangeMultipliers,
}

impl Default for GlobalTuning {
    fn default() -> Self {
        Self {
            total_unit_cap: 120,
            default_turn_accel: 24.0,
            default_turn_drag: 0.15,
            turret_returns_forward: true,
            steering_strength: 6.0,
            beam_obstruction_interval_ms: 100.0,
            beam_death_velocity: 300.0,
            range_multipliers: RangeMultipliers::default(),
        }
    }
}

/// Immutable registry of all weapon, unit and building definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigRegistry {
    weapons: HashMap<String, WeaponDef>,
    units: HashMap<String, UnitDef>,
    buildings: HashMap<String, BuildingDef>,
    /// Global tuning values.
    pub tuning: GlobalTuning,
}

impl ConfigRegistry {
    /// Empty registry with default tuning.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in roster used by tests and the default game setup.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for weapon in builtin_weapons() {
            registry.insert_weapon(weapon);
        }
        for unit in builtin_units() {
            registry.insert_unit(unit);
        }
        for building in builtin_buildings() {
            registry.insert_building(building);
        }
        registry
    }

    /// Add a weapon definition, replacing any existing one with the same id.
    pub fn insert_weapon(&mut self, def: WeaponDef) {
        self.weapons.insert(def.id.clone(), def);
    }

    /// Add a unit definition, replacing any existing one with the same id.
    pub fn insert_unit(&mut self, def: UnitDef) {
        self.units.insert(def.id.clone(), def);
    }

    /// Add a building definition, replacing any existing one with the same id.
    pub fn insert_building(&mut self, def: BuildingDef) {
        self.buildings.insert(def.id.clone(), def);
    }

    /// Look up a weapon definition.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownWeapon`] for an unrecognized key.
    pub fn weapon(&self, id: &str) -> Result<&WeaponDef> {
        self.weapons
            .get(id)
            .ok_or_else(|| SimError::UnknownWeapon(id.to_string()))
    }

    /// Look up a unit definition.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownUnit`] for an unrecognized key.
    pub fn unit(&self, id: &str) -> Result<&UnitDef> {
        self.units
            .get(id)
            .ok_or_else(|| SimError::UnknownUnit(id.to_string()))
    }

    /// Look up a building definition.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownUnit`] for an unrecognized key.
    pub fn building(&self, id: &str) -> Result<&BuildingDef> {
        self.buildings
            .get(id)
            .ok_or_else(|| SimError::UnknownUnit(id.to_string()))
    }

    /// Non-failing existence check for defensive iteration.
    #[must_use]
    pub fn has_unit(&self, id: &str) -> bool {
        self.units.contains_key(id)
    }

    /// Parse additional weapon definitions from a RON document containing a
    /// list of [`WeaponDef`].
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ConfigParse`] on malformed input.
    pub fn load_weapons_ron(&mut self, path: &str, source: &str) -> Result<()> {
        let defs: Vec<WeaponDef> = ron::from_str(source).map_err(|e| SimError::ConfigParse {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        for def in defs {
            self.insert_weapon(def);
        }
        Ok(())
    }

    /// Parse additional unit definitions from a RON document containing a
    /// list of [`UnitDef`].
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ConfigParse`] on malformed input.
    pub fn load_units_ron(&mut self, path: &str, source: &str) -> Result<()> {
        let defs: Vec<UnitDef> = ron::from_str(source).map_err(|e| SimError::ConfigParse {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        for def in defs {
            self.insert_unit(def);
        }
        Ok(())
    }
}

fn builtin_weapons() -> Vec<WeaponDef> {
    vec![
        // Light autocannon: the jackal's weapon.
        WeaponDef {
            id: "autocannon".to_string(),
            damage: 1.0,
            fire_range: 110.0,
            cooldown_ms: 80.0,
            kind: WeaponKindDef::Traveling {
                speed: 420.0,
                radius: 2.0,
                lifespan_ms: 900.0,
            },
            pierce: false,
            max_hits: 1,
            burst: None,
            spread: None,
            splash: None,
            homing: None,
            turret: None,
            area: None,
            recoil: 0.0,
            knockback: 0.0,
            knockback_affected_by_mass: false,
        },
        // Heavy cannon: slow, splashing shell.
        WeaponDef {
            id: "heavy_cannon".to_string(),
            damage: 24.0,
            fire_range: 160.0,
            cooldown_ms: 2200.0,
            kind: WeaponKindDef::Traveling {
                speed: 260.0,
                radius: 4.0,
                lifespan_ms: 1400.0,
            },
            pierce: false,
            max_hits: 1,
            burst: None,
            spread: None,
            splash: Some(SplashDef {
                radius: 28.0,
                secondary_radius: 52.0,
                secondary_fraction: 0.4,
                falloff: 0.5,
                on_expiry: true,
            }),
            homing: None,
            turret: Some(TurretDef {
                turn_accel: 10.0,
                drag: 0.2,
            }),
            area: None,
            recoil: 90.0,
            knockback: 140.0,
            knockback_affected_by_mass: true,
        },
        // Continuous cutting beam.
        WeaponDef {
            id: "cutting_beam".to_string(),
            damage: 0.0,
            fire_range: 130.0,
            cooldown_ms: 0.0,
            kind: WeaponKindDef::Beam {
                length: 130.0,
                damage_per_sec: 14.0,
            },
            pierce: false,
            max_hits: 1,
            burst: None,
            spread: None,
            splash: None,
            homing: None,
            turret: None,
            area: None,
            recoil: 12.0,
            knockback: 0.0,
            knockback_affected_by_mass: false,
        },
        // Burst rocket pod with homing.
        WeaponDef {
            id: "rocket_pod".to_string(),
            damage: 6.0,
            fire_range: 180.0,
            cooldown_ms: 2600.0,
            kind: WeaponKindDef::Traveling {
                speed: 200.0,
                radius: 3.0,
                lifespan_ms: 2000.0,
            },
            pierce: false,
            max_hits: 1,
            burst: Some(BurstDef {
                shots: 4,
                interval_ms: 120.0,
            }),
            spread: Some(SpreadDef {
                pellets: 1,
                angle: 0.25,
                random: true,
            }),
            splash: Some(SplashDef {
                radius: 16.0,
                secondary_radius: 30.0,
                secondary_fraction: 0.3,
                falloff: 0.4,
                on_expiry: false,
            }),
            homing: Some(HomingDef { turn_rate: 2.4 }),
            turret: None,
            area: None,
            recoil: 0.0,
            knockback: 60.0,
            knockback_affected_by_mass: true,
        },
        // Scattergun: even pellet fan.
        WeaponDef {
            id: "scattergun".to_string(),
            damage: 2.0,
            fire_range: 70.0,
            cooldown_ms: 900.0,
            kind: WeaponKindDef::Traveling {
                speed: 340.0,
                radius: 1.5,
                lifespan_ms: 260.0,
            },
            pierce: false,
            max_hits: 1,
            burst: None,
            spread: Some(SpreadDef {
                pellets: 6,
                angle: 0.5,
                random: false,
            }),
            splash: None,
            homing: None,
            turret: None,
            area: None,
            recoil: 40.0,
            knockback: 80.0,
            knockback_affected_by_mass: true,
        },
        // Repulsor force field.
        WeaponDef {
            id: "repulsor_field".to_string(),
            damage: 0.0,
            fire_range: 120.0,
            cooldown_ms: 0.0,
            kind: WeaponKindDef::Instant { length: 0.0 },
            pierce: false,
            max_hits: 16,
            burst: None,
            spread: None,
            splash: None,
            homing: None,
            turret: None,
            area: Some(AreaWeaponDef::ForceField(ForceFieldDef {
                half_angle: 0.9,
                transition_ms: 400.0,
                push: ForceFieldZoneDef {
                    inner_radius: 0.0,
                    outer_radius: 60.0,
                    damage_per_sec: 4.0,
                    power: 900.0,
                },
                pull: ForceFieldZoneDef {
                    inner_radius: 60.0,
                    outer_radius: 120.0,
                    damage_per_sec: 0.0,
                    power: 500.0,
                },
            })),
            recoil: 0.0,
            knockback: 0.0,
            knockback_affected_by_mass: false,
        },
        // Gravity wave projector.
        WeaponDef {
            id: "wave_projector".to_string(),
            damage: 0.0,
            fire_range: 140.0,
            cooldown_ms: 0.0,
            kind: WeaponKindDef::Instant { length: 0.0 },
            pierce: false,
            max_hits: 16,
            burst: None,
            spread: None,
            splash: None,
            homing: None,
            turret: None,
            area: Some(AreaWeaponDef::Wave(WaveDef {
                radius: 140.0,
                idle_half_angle: 0.2,
                attack_half_angle: 0.7,
                transition_ms: 600.0,
                damage_per_sec: 10.0,
                pull_power: 700.0,
                reference_distance: 70.0,
                min_distance: 12.0,
            })),
            recoil: 0.0,
            knockback: 0.0,
            knockback_affected_by_mass: false,
        },
    ]
}

fn builtin_units() -> Vec<UnitDef> {
    vec![
        UnitDef {
            id: "jackal".to_string(),
            max_hp: 40.0,
            move_speed: 60.0,
            collision_radius: 6.0,
            mass: 1.0,
            friction_air: 0.05,
            restitution: 0.3,
            weapons: vec!["autocannon".to_string()],
            color: [212, 180, 60],
        },
        UnitDef {
            id: "mammoth".to_string(),
            max_hp: 1050.0,
            move_speed: 22.0,
            collision_radius: 14.0,
            mass: 8.0,
            friction_air: 0.08,
            restitution: 0.1,
            weapons: vec!["heavy_cannon".to_string()],
            color: [120, 130, 140],
        },
        UnitDef {
            id: "lancer".to_string(),
            max_hp: 120.0,
            move_speed: 44.0,
            collision_radius: 8.0,
            mass: 2.0,
            friction_air: 0.05,
            restitution: 0.2,
            weapons: vec!["cutting_beam".to_string()],
            color: [90, 200, 220],
        },
        UnitDef {
            id: "hornet".to_string(),
            max_hp: 80.0,
            move_speed: 52.0,
            collision_radius: 7.0,
            mass: 1.5,
            friction_air: 0.05,
            restitution: 0.25,
            weapons: vec!["rocket_pod".to_string()],
            color: [220, 140, 40],
        },
        UnitDef {
            id: "commander".to_string(),
            max_hp: 600.0,
            move_speed: 36.0,
            collision_radius: 12.0,
            mass: 5.0,
            friction_air: 0.06,
            restitution: 0.15,
            weapons: vec!["scattergun".to_string()],
            color: [240, 240, 250],
        },
    ]
}

fn builtin_buildings() -> Vec<BuildingDef> {
    vec![
        BuildingDef {
            id: "factory".to_string(),
            max_hp: 1500.0,
            half_w: 28.0,
            half_h: 22.0,
            weapons: Vec::new(),
            color: [100, 100, 110],
        },
        BuildingDef {
            id: "gun_turret".to_string(),
            max_hp: 400.0,
            half_w: 10.0,
            half_h: 10.0,
            weapons: vec!["autocannon".to_string()],
            color: [150, 120, 90],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_ordering_invariant() {
        let table = RangeMultipliers::default();
        for base in [1.0_f32, 42.5, 110.0, 5000.0] {
            let r = table.derive(base);
            assert!(r.see >= r.fire);
            assert!(r.fire >= r.release);
            assert!(r.release >= r.lock);
            assert!(r.lock >= r.fightstop);
        }
    }

    #[test]
    fn test_builtin_roster_is_consistent() {
        let registry = ConfigRegistry::builtin();
        // Every weapon referenced by a unit or building must resolve.
        for unit in builtin_units() {
            for weapon in &unit.weapons {
                registry.weapon(weapon).unwrap();
            }
        }
        for building in builtin_buildings() {
            for weapon in &building.weapons {
                registry.weapon(weapon).unwrap();
            }
        }
    }

    #[test]
    fn test_unknown_key_is_hard_error() {
        let registry = ConfigRegistry::builtin();
        assert!(matches!(
            registry.weapon("no_such_weapon"),
            Err(SimError::UnknownWeapon(_))
        ));
        assert!(matches!(
            registry.unit("no_such_unit"),
            Err(SimError::UnknownUnit(_))
        ));
    }

    #[test]
    fn test_jackal_scenario_stats() {
        let registry = ConfigRegistry::builtin();
        let jackal = registry.unit("jackal").unwrap();
        assert_eq!(jackal.max_hp, 40.0);
        let weapon = registry.weapon("autocannon").unwrap();
        assert_eq!(weapon.fire_range, 110.0);
        assert_eq!(weapon.cooldown_ms, 80.0);
        assert_eq!(weapon.damage, 1.0);
        let mammoth = registry.unit("mammoth").unwrap();
        assert_eq!(mammoth.max_hp, 1050.0);
    }

    #[test]
    fn test_load_weapons_ron() {
        let mut registry = ConfigRegistry::new();
        let source = r#"[
            WeaponDef(
                id: "test_gun",
                damage: 3.0,
                fire_range: 90.0,
                cooldown_ms: 500.0,
                kind: Traveling(speed: 300.0, radius: 2.0, lifespan_ms: 600.0),
            ),
        ]"#;
        registry.load_weapons_ron("test.ron", source).unwrap();
        let def = registry.weapon("test_gun").unwrap();
        assert_eq!(def.damage, 3.0);
        assert_eq!(def.max_hits, 1);
        assert!(!def.pierce);
    }

    #[test]
    fn test_load_ron_parse_error() {
        let mut registry = ConfigRegistry::new();
        let err = registry.load_weapons_ron("bad.ron", "not ron at all {");
        assert!(matches!(err, Err(SimError::ConfigParse { .. })));
    }

    #[test]
    fn test_continuous_beam_detection() {
        let registry = ConfigRegistry::builtin();
        assert!(registry.weapon("cutting_beam").unwrap().is_continuous_beam());
        assert!(!registry.weapon("autocannon").unwrap().is_continuous_beam());
    }

    #[test]
    fn test_data_dir_roster_loads() {
        let mut registry = ConfigRegistry::builtin();
        registry
            .load_weapons_ron("data/weapons.ron", include_str!("../data/weapons.ron"))
            .unwrap();
        registry
            .load_units_ron("data/units.ron", include_str!("../data/units.ron"))
            .unwrap();

        let railgun = registry.weapon("railgun").unwrap();
        assert!(railgun.pierce);
        assert_eq!(railgun.max_hits, 4);
        assert!(matches!(railgun.kind, WeaponKindDef::Instant { .. }));

        let mortar = registry.weapon("mortar").unwrap();
        assert!(mortar.splash.map_or(false, |s| s.on_expiry));

        let viper = registry.unit("viper").unwrap();
        assert_eq!(viper.weapons, vec!["railgun".to_string()]);
        // Defaulted fields come from serde defaults, not zeros.
        assert!(viper.friction_air > 0.0);
    }
}
