//! Blobberman Relay - Lockstep Input Hub
//!
//! The relay never simulates anything. It collects player inputs, seals
//! them into numbered ticks at a fixed rate, broadcasts every tick to every
//! client, replays the session history to late joiners, and restarts the
//! session after a countdown once the tick limit is reached.
//!
//! # Architecture
//!
//! ```text
//!   socket --read pump--> HubEvent ---> Hub (event loop + tick deadline)
//!                                        |  HubCore state machine
//!   socket <--write pump-- queue <-------+  (one bounded queue per client)
//! ```

pub mod config;
pub mod connection;
mod error;
pub mod history;
pub mod hub;
pub mod server;

pub use config::{ConnectionSettings, HubConfig};
pub use error::RelayError;
pub use history::TickHistory;
pub use hub::{ConnId, Hub, HubCore, HubEvent, HubHandle, HubPhase};
pub use server::serve;
