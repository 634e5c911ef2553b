//! Blobberman Core - Deterministic Lockstep Simulation
//!
//! A pure state transition: the previous world plus one tick's worth of
//! player inputs yields the next world. Every client that applies the same
//! tick stream from the same seed reaches the same state, bit for bit.
//!
//! - **Engine**: `WorldState::apply_tick` / [`advance`]
//! - **Randomness**: a seeded ChaCha8 stream owned by the state, plus a
//!   positional hash for power-up spawns
//! - **Client**: [`LockstepClient`] feeds relay messages into a local world

pub mod bomb;
pub mod client;
pub mod collision;
pub mod config;
pub mod engine;
mod error;
pub mod grid;
pub mod player;
pub mod powerup;
pub mod rng;
pub mod spawn;

// Re-export key types for convenience
pub use client::{ClientUpdate, LockstepClient};
pub use config::EngineConfig;
pub use engine::{advance, TickOutcome, WorldEvent, WorldState};
pub use error::CoreError;
pub use grid::{CellContent, CellPos, Grid, PlayerIndex};
pub use player::PlayerState;
pub use powerup::{PowerUp, PowerUpKind};
pub use rng::SeededRng;
