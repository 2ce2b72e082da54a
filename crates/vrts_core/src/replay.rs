//! Replay recording and playback.
//!
//! A replay stores the serialized initial simulation state, the per-tick
//! timestep stream, and every command issued during the session. Because the
//! simulation is deterministic, replaying the same commands over the same
//! timesteps from the same initial state reproduces the game exactly; the
//! recorded final hash lets playback verify that.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::components::{EntityId, UnitCommand};
use crate::error::{Result, SimError};
use crate::simulation::Simulation;

/// A single command record for replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayCommand {
    /// Simulation tick when the command was issued.
    pub tick: u64,
    /// Target entity for the command.
    pub entity: EntityId,
    /// The command that was issued.
    pub command: UnitCommand,
}

impl ReplayCommand {
    /// Create a new replay command record.
    #[must_use]
    pub const fn new(tick: u64, entity: EntityId, command: UnitCommand) -> Self {
        Self {
            tick,
            entity,
            command,
        }
    }
}

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Random seed used for the session.
    pub seed: u64,
    /// Serialized initial simulation state.
    pub initial_state: Vec<u8>,
    /// Timestep in milliseconds for each recorded tick. Ticks are replayed
    /// with exactly these steps, so variable-rate sessions reproduce bit-for-bit.
    pub timesteps_ms: Vec<f32>,
    /// Stream of commands in tick order.
    pub commands: Vec<ReplayCommand>,
    /// Final state hash for verification.
    pub final_hash: u64,
}

impl Replay {
    /// Create a new replay from a simulation's initial state.
    ///
    /// # Errors
    /// Returns an error if the initial state cannot be serialized.
    pub fn new(scenario_id: impl Into<String>, seed: u64, initial_state: &Simulation) -> Result<Self> {
        let state_bytes = initial_state.serialize()?;
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            seed,
            initial_state: state_bytes,
            timesteps_ms: Vec::new(),
            commands: Vec::new(),
            final_hash: 0,
        })
    }

    /// Record a command for replay.
    pub fn record_command(&mut self, tick: u64, entity: EntityId, command: UnitCommand) {
        self.commands.push(ReplayCommand::new(tick, entity, command));
    }

    /// Record that a tick was advanced with the given timestep.
    pub fn record_tick(&mut self, dt_ms: f32) {
        self.timesteps_ms.push(dt_ms);
    }

    /// Finalize the replay with the end-of-session state hash.
    pub fn finalize(&mut self, final_hash: u64) {
        self.final_hash = final_hash;
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| SimError::InvalidState(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| SimError::InvalidState(format!("Failed to write replay file: {e}")))?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails, or if the
    /// file was written by an incompatible format version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| SimError::InvalidState(format!("Failed to read replay file: {e}")))?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| SimError::InvalidState(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(SimError::InvalidState(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }

        Ok(replay)
    }

    /// Get the initial simulation state for playback.
    ///
    /// # Errors
    /// Returns an error if state deserialization fails.
    pub fn restore_initial_state(&self) -> Result<Simulation> {
        Simulation::deserialize(&self.initial_state)
    }

    /// Get commands for a specific tick.
    #[must_use]
    pub fn commands_at_tick(&self, tick: u64) -> Vec<&ReplayCommand> {
        self.commands.iter().filter(|cmd| cmd.tick == tick).collect()
    }

    /// Total duration of the replay in ticks.
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.timesteps_ms.len() as u64
    }

    /// Total number of commands in the replay.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    /// The replay being played.
    replay: Replay,
    /// Current simulation state.
    simulation: Simulation,
    /// Current playback tick.
    current_tick: u64,
    /// Index into the command stream.
    command_index: usize,
    /// Playback speed multiplier (1.0 = normal, 2.0 = 2x, 0.5 = half).
    pub playback_speed: f64,
    /// Whether playback is paused.
    pub paused: bool,
}

impl ReplayPlayer {
    /// Create a new replay player from a replay.
    ///
    /// # Errors
    /// Returns an error if the initial state cannot be restored.
    pub fn new(replay: Replay) -> Result<Self> {
        let simulation = replay.restore_initial_state()?;
        Ok(Self {
            replay,
            simulation,
            current_tick: 0,
            command_index: 0,
            playback_speed: 1.0,
            paused: false,
        })
    }

    /// Advance the replay by one tick.
    ///
    /// Returns true if there are more ticks to play.
    ///
    /// # Errors
    /// Returns an error if the underlying simulation tick fails.
    pub fn advance(&mut self) -> Result<bool> {
        if self.paused || self.is_finished() {
            return Ok(!self.is_finished());
        }

        self.step()?;
        Ok(!self.is_finished())
    }

    fn step(&mut self) -> Result<()> {
        // Commands recorded at tick N were issued before tick N ran.
        while self.command_index < self.replay.commands.len() {
            let cmd = &self.replay.commands[self.command_index];
            if cmd.tick > self.current_tick {
                break;
            }
            // A command targeting an entity that has since died is a no-op,
            // same as it was during recording.
            let _ = self.simulation.apply_command(cmd.entity, cmd.command);
            self.command_index += 1;
        }

        let dt_ms = self.replay.timesteps_ms[self.current_tick as usize];
        self.simulation.tick(dt_ms)?;
        self.current_tick += 1;
        Ok(())
    }

    /// Seek to a specific tick.
    ///
    /// Rewinds to the initial state and re-simulates forward, so seeking is
    /// linear in the target tick.
    ///
    /// # Errors
    /// Returns an error if state restoration or simulation fails.
    pub fn seek(&mut self, target_tick: u64) -> Result<()> {
        self.simulation = self.replay.restore_initial_state()?;
        self.current_tick = 0;
        self.command_index = 0;

        while self.current_tick < target_tick && !self.is_finished() {
            self.step()?;
        }

        Ok(())
    }

    /// Get the current tick.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Get a reference to the current simulation state.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Get the replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Check if the replay has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.current_tick >= self.replay.duration()
    }

    /// Verify that playback reproduces the recorded final hash.
    ///
    /// # Errors
    /// Returns an error if state restoration or simulation fails.
    pub fn verify(&mut self) -> Result<bool> {
        self.seek(self.replay.duration())?;
        Ok(self.simulation.state_hash() == self.replay.final_hash)
    }

    /// Toggle pause state.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Set playback speed.
    pub fn set_speed(&mut self, speed: f64) {
        self.playback_speed = speed.clamp(0.1, 10.0);
    }

    /// Get progress as a percentage (0-100).
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.replay.duration() == 0 {
            100.0
        } else {
            (self.current_tick as f64 / self.replay.duration() as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;

    fn recorded_session() -> Result<(Replay, u64)> {
        let mut sim = Simulation::new(2, 99, 2000.0, 2000.0);
        let jackal = sim.spawn_unit("jackal", 0, Vec2::new(500.0, 500.0), 0.0)?;
        let mammoth = sim.spawn_unit("mammoth", 1, Vec2::new(650.0, 500.0), 0.0)?;

        let mut replay = Replay::new("skirmish", 99, &sim)?;

        for tick in 0..120u64 {
            if tick == 5 {
                replay.record_command(tick, jackal, UnitCommand::Attack(mammoth));
                sim.attack(jackal, mammoth)?;
            }
            let dt = if tick % 3 == 0 { 33.0 } else { 16.0 };
            replay.record_tick(dt);
            sim.tick(dt)?;
        }

        let hash = sim.state_hash();
        replay.finalize(hash);
        Ok((replay, hash))
    }

    #[test]
    fn record_and_verify() {
        let (replay, hash) = recorded_session().unwrap();
        assert_eq!(replay.duration(), 120);
        assert_eq!(replay.command_count(), 1);
        assert_eq!(replay.final_hash, hash);

        let mut player = ReplayPlayer::new(replay).unwrap();
        assert!(player.verify().unwrap());
    }

    #[test]
    fn playback_applies_commands_at_recorded_ticks() {
        let (replay, _) = recorded_session().unwrap();
        let mut player = ReplayPlayer::new(replay).unwrap();

        // Run past the command tick and check the attacker closed distance.
        for _ in 0..40 {
            player.advance().unwrap();
        }
        assert_eq!(player.current_tick(), 40);
        let world = player.simulation().world();
        let jackal = world.unit_ids()[0];
        let pos = world.get(jackal).unwrap().transform.pos;
        assert!(pos.x > 500.0, "attacker should have advanced, x = {}", pos.x);
    }

    #[test]
    fn seek_rewinds_deterministically() {
        let (replay, _) = recorded_session().unwrap();
        let mut player = ReplayPlayer::new(replay).unwrap();

        player.seek(60).unwrap();
        let hash_at_60 = player.simulation().state_hash();

        player.seek(120).unwrap();
        assert!(player.is_finished());

        player.seek(60).unwrap();
        assert_eq!(player.simulation().state_hash(), hash_at_60);
    }

    #[test]
    fn pause_blocks_advance() {
        let (replay, _) = recorded_session().unwrap();
        let mut player = ReplayPlayer::new(replay).unwrap();

        player.toggle_pause();
        assert!(player.advance().unwrap());
        assert_eq!(player.current_tick(), 0);

        player.toggle_pause();
        assert!(player.advance().unwrap());
        assert_eq!(player.current_tick(), 1);
    }

    #[test]
    fn version_mismatch_rejected() {
        let (mut replay, _) = recorded_session().unwrap();
        replay.version = REPLAY_VERSION + 1;

        let dir = std::env::temp_dir().join("vrts_replay_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad_version.vrp");
        replay.save(&path).unwrap();

        assert!(Replay::load(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn save_load_roundtrip() {
        let (replay, hash) = recorded_session().unwrap();

        let dir = std::env::temp_dir().join("vrts_replay_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("roundtrip.vrp");
        replay.save(&path).unwrap();

        let loaded = Replay::load(&path).unwrap();
        assert_eq!(loaded.final_hash, hash);
        assert_eq!(loaded.duration(), replay.duration());
        assert_eq!(loaded.command_count(), replay.command_count());
        let _ = std::fs::remove_file(&path);
    }
}
