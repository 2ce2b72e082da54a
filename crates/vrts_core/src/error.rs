//! Error types for the simulation core.
//!
//! Most runtime "failures" inside a tick are not errors: a target id that no
//! longer resolves is treated as "no target", an orphaned beam is removed.
//! Errors are reserved for data/config bugs (unknown definition keys) and
//! API misuse (commanding an entity that cannot accept commands).

use thiserror::Error;

use crate::components::EntityId;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// Weapon definition lookup by an unrecognized key.
    #[error("Unknown weapon definition: {0}")]
    UnknownWeapon(String),

    /// Unit definition lookup by an unrecognized key.
    #[error("Unknown unit definition: {0}")]
    UnknownUnit(String),

    /// Entity reference that does not resolve in the world.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Player is at their unit cap.
    #[error("Player {player} is at unit cap ({cap})")]
    UnitCapReached {
        /// The player that tried to build.
        player: u8,
        /// Their per-player cap.
        cap: u32,
    },

    /// Config file parsing error.
    #[error("Failed to parse config '{path}': {message}")]
    ConfigParse {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid simulation state (serialization, API misuse).
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}
