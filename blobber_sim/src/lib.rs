//! Blobberman Deterministic Simulation Testing (DST) Harness
//!
//! Runs the real relay hub and real lockstep clients against a virtual
//! clock, so that whole sessions (joins, late joins, game over, reset
//! countdowns, slow readers) replay identically from a single seed.
//!
//! # Core Principle: The Reactor Pattern
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: a virtual clock the harness advances one tick interval at a time
//! - **Network**: bounded in-memory queues in place of sockets
//! - **Randomness**: every player's inputs come from a stream derived from
//!   one 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Harness                           │
//! │  ┌─────────────┐   tick / countdown   ┌───────────────┐  │
//! │  │ SimContext  │ ───────────────────► │    HubCore    │  │
//! │  │ (clock)     │                      └───────┬───────┘  │
//! │  └─────────────┘                 queues       │          │
//! │       ┌──────────────────────────┬────────────┤          │
//! │  ┌────▼─────┐              ┌─────▼────┐  ┌────▼─────┐    │
//! │  │ SimClient│              │ SimClient│  │  Oracle  │    │
//! │  └──────────┘              └──────────┘  └──────────┘    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use blobber_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_ticks(600).run(ScenarioId::LateJoin);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod network;
mod oracle;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use network::{InputProfile, SimClient, SimNetwork, StreamStats};
pub use oracle::{check_conservation, Oracle, OracleStats};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
