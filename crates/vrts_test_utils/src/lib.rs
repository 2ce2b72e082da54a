//! # VRTS Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Scenario fixtures and spawning helpers
//! - Headless skirmish runner for balance checks
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod skirmish;

/// Re-export proptest for convenience.
pub use proptest;
