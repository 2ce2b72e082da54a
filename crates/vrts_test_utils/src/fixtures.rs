//! Scenario fixtures and proptest strategies.
//!
//! Pre-built battle setups for consistent testing across crates, plus
//! strategies for property-based tests over positions, rosters and commands.

use proptest::prelude::*;

use vrts_core::components::{EntityId, PlayerId, UnitCommand};
use vrts_core::error::Result;
use vrts_core::math::Vec2;
use vrts_core::simulation::Simulation;

/// Default map size used by fixtures.
pub const MAP_SIZE: f32 = 2000.0;

/// Builtin unit definition ids, for roster sampling.
pub const UNIT_DEFS: &[&str] = &["jackal", "mammoth", "lancer", "hornet", "commander"];

/// Create a two-player simulation on the default map.
#[must_use]
pub fn empty_sim(seed: u32) -> Simulation {
    Simulation::new(2, seed, MAP_SIZE, MAP_SIZE)
}

/// One attacker ordered to attack one defender, `distance` apart on the
/// horizontal axis. The defender idles and fights back only when the
/// attacker enters its engagement ranges.
///
/// Returns the simulation and the (attacker, defender) ids.
///
/// # Errors
/// Returns an error if either definition id is unknown.
pub fn duel(
    attacker_def: &str,
    defender_def: &str,
    distance: f32,
    seed: u32,
) -> Result<(Simulation, EntityId, EntityId)> {
    let mut sim = empty_sim(seed);
    let a = sim.spawn_unit(attacker_def, 0, Vec2::new(500.0, 500.0), 0.0)?;
    let b = sim.spawn_unit(
        defender_def,
        1,
        Vec2::new(500.0 + distance, 500.0),
        std::f32::consts::PI,
    )?;
    sim.attack(a, b)?;
    Ok((sim, a, b))
}

/// Two opposing lines of units, `per_side` each, attack-moving into each
/// other. Useful for load, determinism and balance runs.
///
/// # Errors
/// Returns an error if a definition id is unknown or a side exceeds the
/// unit cap.
pub fn line_battle(def_a: &str, def_b: &str, per_side: u32, seed: u32) -> Result<Simulation> {
    let mut sim = empty_sim(seed);
    let spacing = 40.0;

    for i in 0..per_side {
        let y = 500.0 + i as f32 * spacing;
        let a = sim.spawn_unit(def_a, 0, Vec2::new(600.0, y), 0.0)?;
        sim.attack_move(a, Vec2::new(1400.0, y))?;

        let b = sim.spawn_unit(def_b, 1, Vec2::new(1400.0, y), std::f32::consts::PI)?;
        sim.attack_move(b, Vec2::new(600.0, y))?;
    }

    Ok(sim)
}

/// A static gun turret defending against `attackers` jackals ordered to
/// attack it. Exercises building targeting from both sides.
///
/// Returns the simulation and the turret id.
///
/// # Errors
/// Returns an error if the builtin definitions are missing.
pub fn turret_defense(attackers: u32, seed: u32) -> Result<(Simulation, EntityId)> {
    let mut sim = empty_sim(seed);
    let turret = sim.spawn_building("gun_turret", 0, Vec2::new(1000.0, 1000.0))?;

    for i in 0..attackers {
        let angle = i as f32 / attackers.max(1) as f32 * std::f32::consts::TAU;
        let pos = Vec2::new(1000.0, 1000.0) + Vec2::from_angle(angle).with_length(250.0);
        let id = sim.spawn_unit("jackal", 1, pos, angle + std::f32::consts::PI)?;
        sim.attack(id, turret)?;
    }

    Ok((sim, turret))
}

/// Total remaining unit hit points for a player. Zero means the side is
/// wiped out.
#[must_use]
pub fn remaining_hp(sim: &Simulation, player: PlayerId) -> f32 {
    sim.world()
        .units_by_player(player)
        .filter_map(vrts_core::components::Entity::hp)
        .sum()
}

/// Strategy producing positions within the given map bounds, away from the
/// edges so spawned bodies are fully inside.
pub fn arb_position(width: f32, height: f32) -> impl Strategy<Value = Vec2> {
    (50.0f32..width - 50.0, 50.0f32..height - 50.0).prop_map(|(x, y)| Vec2::new(x, y))
}

/// Strategy producing a builtin unit definition id.
pub fn arb_unit_def() -> impl Strategy<Value = &'static str> {
    prop::sample::select(UNIT_DEFS)
}

/// Strategy producing a movement-style command targeting a point on the map.
pub fn arb_move_command(width: f32, height: f32) -> impl Strategy<Value = UnitCommand> {
    prop_oneof![
        arb_position(width, height).prop_map(UnitCommand::MoveTo),
        arb_position(width, height).prop_map(UnitCommand::AttackMove),
        Just(UnitCommand::Stop),
    ]
}
