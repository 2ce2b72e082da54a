//! Headless skirmish runner for balance testing.
//!
//! Runs batches of simulated battles to completion and aggregates win rates,
//! so unit stat changes can be checked against expected matchup outcomes.

use vrts_core::components::PlayerId;
use vrts_core::error::Result;

use crate::fixtures::{line_battle, remaining_hp};

/// Result of a single simulated battle.
#[derive(Debug, Clone)]
pub struct BattleResult {
    /// The winning player, `None` on draw or timeout.
    pub winner: Option<PlayerId>,
    /// Simulation ticks elapsed.
    pub ticks: u64,
    /// Remaining unit hit points for player 0.
    pub remaining_hp_a: f32,
    /// Remaining unit hit points for player 1.
    pub remaining_hp_b: f32,
}

/// Aggregated statistics for a batch of battles.
#[derive(Debug, Clone, Default)]
pub struct BattleStats {
    /// Total battles run.
    pub total_battles: u32,
    /// Wins for player 0.
    pub wins_a: u32,
    /// Wins for player 1.
    pub wins_b: u32,
    /// Draws and timeouts.
    pub draws: u32,
    /// Average ticks to resolution.
    pub avg_ticks: f64,
}

impl BattleStats {
    /// Win rate for player 0 (0.0 to 1.0). An empty batch reads as even.
    #[must_use]
    pub fn win_rate_a(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        f64::from(self.wins_a) / f64::from(self.total_battles)
    }

    /// Win rate for player 1 (0.0 to 1.0).
    #[must_use]
    pub fn win_rate_b(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        f64::from(self.wins_b) / f64::from(self.total_battles)
    }

    /// Whether player 0's win rate falls inside the acceptable band.
    #[must_use]
    pub fn is_balanced(&self, min_rate: f64, max_rate: f64) -> bool {
        let rate = self.win_rate_a();
        rate >= min_rate && rate <= max_rate
    }
}

/// Run one line battle to elimination or timeout.
///
/// # Errors
/// Returns an error if a definition id is unknown or a tick fails.
pub fn run_battle(
    def_a: &str,
    def_b: &str,
    per_side: u32,
    seed: u32,
    max_ticks: u64,
) -> Result<BattleResult> {
    let mut sim = line_battle(def_a, def_b, per_side, seed)?;

    let mut ticks = 0;
    while ticks < max_ticks {
        sim.tick(16.0)?;
        ticks += 1;
        if remaining_hp(&sim, 0) <= 0.0 || remaining_hp(&sim, 1) <= 0.0 {
            break;
        }
    }

    let remaining_hp_a = remaining_hp(&sim, 0);
    let remaining_hp_b = remaining_hp(&sim, 1);
    let winner = if remaining_hp_a > 0.0 && remaining_hp_b <= 0.0 {
        Some(0)
    } else if remaining_hp_b > 0.0 && remaining_hp_a <= 0.0 {
        Some(1)
    } else {
        None
    };

    Ok(BattleResult {
        winner,
        ticks,
        remaining_hp_a,
        remaining_hp_b,
    })
}

/// Run `battles` line battles with distinct seeds and aggregate the results.
///
/// # Errors
/// Returns an error if any battle fails to set up or tick.
pub fn run_matchup(
    def_a: &str,
    def_b: &str,
    per_side: u32,
    battles: u32,
    max_ticks: u64,
) -> Result<BattleStats> {
    let mut stats = BattleStats::default();
    let mut total_ticks = 0u64;

    for seed in 0..battles {
        let result = run_battle(def_a, def_b, per_side, seed + 1, max_ticks)?;
        stats.total_battles += 1;
        total_ticks += result.ticks;
        match result.winner {
            Some(0) => stats.wins_a += 1,
            Some(_) => stats.wins_b += 1,
            None => stats.draws += 1,
        }
    }

    if stats.total_battles > 0 {
        stats.avg_ticks = total_ticks as f64 / f64::from(stats.total_battles);
    }
    Ok(stats)
}
