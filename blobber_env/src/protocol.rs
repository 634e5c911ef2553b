//! Wire protocol between the relay and its clients.
//!
//! Every message is a JSON object discriminated by its `type` field. The two
//! directions are modelled as separate enums so that `displayName` can carry a
//! different payload each way.
//!
//! ```text
//! client                              relay
//!   |<------------ connect ---------------|   (ephemeral id)
//!   |------------- clientId ------------->|
//!   |<------------ connect ---------------|   (persistent id)
//!   |<------------ historySync -----------|   ticks 0..N-1
//!   |<------------ displayName -----------|
//!   |------------- input ---------------->|
//!   |<------------ tick ------------------|   tick N, N+1, ...
//! ```

use crate::types::{PlayerId, PlayerInput, TickRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Messages sent by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Connect(ConnectMessage),
    Tick(TickMessage),
    HistorySync(HistorySyncMessage),
    Reset(ResetMessage),
    DisplayName(DisplayNamesMessage),
}

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Input(InputMessage),
    DisplayName(SetDisplayNameMessage),
    ClientId(ClientIdMessage),
}

/// Session information, sent on connect, after identity changes and on reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectMessage {
    pub player_id: PlayerId,
    pub max_ticks: u64,
    /// Milliseconds between ticks
    pub tick_interval: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickMessage {
    pub tick: TickRecord,
}

/// Catch-up replay. `to_tick - from_tick + 1 == history.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySyncMessage {
    pub history: Vec<TickRecord>,
    pub from_tick: u64,
    pub to_tick: u64,
}

impl HistorySyncMessage {
    /// Builds a sync message from a contiguous run of records.
    ///
    /// Returns `None` for an empty history, which is never sent.
    pub fn from_records(history: Vec<TickRecord>) -> Option<Self> {
        let from_tick = history.first()?.tick;
        let to_tick = history.last()?.tick;
        Some(Self {
            history,
            from_tick,
            to_tick,
        })
    }
}

/// Countdown to the next session, broadcast once per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetMessage {
    pub reset_time_sec: u64,
    pub countdown_sec: u64,
}

/// Full `player id -> display name` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNamesMessage {
    pub display_names: BTreeMap<PlayerId, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMessage {
    pub input: PlayerInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDisplayNameMessage {
    pub player_id: PlayerId,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdMessage {
    pub player_id: PlayerId,
}

/// Decode failures. Both are logged and the message dropped; the
/// connection stays open.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not JSON, no `type`, or a known type with a bad payload
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Well-formed JSON with an unrecognised `type`
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

const CLIENT_TYPES: [&str; 3] = ["input", "displayName", "clientId"];
const SERVER_TYPES: [&str; 5] = ["connect", "tick", "historySync", "reset", "displayName"];

fn check_type(text: &str, known: &[&str]) -> Result<(), ProtocolError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    if known.contains(&envelope.kind.as_str()) {
        Ok(())
    } else {
        Err(ProtocolError::UnknownType(envelope.kind))
    }
}

impl ClientMessage {
    /// Decodes a client frame, dispatching on the `type` tag.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        check_type(text, &CLIENT_TYPES)?;
        Ok(serde_json::from_str(text)?)
    }

    /// Encodes to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The wire tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Input(_) => "input",
            ClientMessage::DisplayName(_) => "displayName",
            ClientMessage::ClientId(_) => "clientId",
        }
    }
}

impl ServerMessage {
    /// Decodes a relay frame, dispatching on the `type` tag.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        check_type(text, &SERVER_TYPES)?;
        Ok(serde_json::from_str(text)?)
    }

    /// Encodes to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The wire tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connect(_) => "connect",
            ServerMessage::Tick(_) => "tick",
            ServerMessage::HistorySync(_) => "historySync",
            ServerMessage::Reset(_) => "reset",
            ServerMessage::DisplayName(_) => "displayName",
        }
    }
}
