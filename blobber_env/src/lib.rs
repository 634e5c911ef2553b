//! Blobberman Environment Abstraction Layer
//!
//! Shared vocabulary for the lockstep relay, the simulation engine and every
//! client, plus the "Sans-IO" seams that let the relay run in both
//! **Production** (tokio) and **Simulation** (virtual clock) environments.
//!
//! # Contents
//!
//! - Ids, input records and tick records (`types`)
//! - The tagged JSON wire protocol (`protocol`)
//! - Time and task spawning (`RelayContext`)
//! - Non-blocking outbound delivery (`ClientSink`)
//!
//! # Example
//!
//! ```ignore
//! use blobber_env::{ClientMessage, RelayContext};
//!
//! async fn pump<Ctx: RelayContext>(ctx: &Ctx, frame: &str) {
//!     match ClientMessage::decode(frame) {
//!         Ok(msg) => forward(msg),
//!         Err(e) => tracing::warn!("dropping frame: {}", e),
//!     }
//!     ctx.sleep(Duration::from_millis(50)).await;
//! }
//! ```

mod context;
mod error;
mod network;
pub mod protocol;
mod tokio_impl;
mod types;

pub use context::RelayContext;
pub use error::EnvError;
pub use network::{outbound_channel, ClientSink, Outbound};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};
pub use tokio_impl::TokioContext;
pub use types::{Direction, Movement, PlayerId, PlayerInput, TickRecord};
