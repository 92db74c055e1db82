//! Wire types for the tickwire session protocol.
//!
//! Every payload is a JSON object carrying a `kind` discriminator. Outbound
//! payloads are the closed set in [`ClientMessage`]; inbound payloads are
//! decoded into the open [`ServerMessage`] record and their `kind` mapped to
//! an [`InputSymbol`] for the state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

// ── Session states and inputs ───────────────────────────────────────

/// Connection lifecycle state of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session established with the server (initial state).
    #[default]
    Disconnected,
    /// The server acknowledged the connect request.
    Connected,
    /// The server started the game; input is being exchanged.
    Playing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// Input symbol extracted from the `kind` field of a decoded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSymbol {
    /// Server accepted the connect request.
    Init,
    /// Server started the game.
    Start,
    /// Server acknowledged input and expects more.
    Update,
    /// Server ended the session.
    Stop,
}

impl InputSymbol {
    /// Wire value of this symbol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Start => "start",
            Self::Update => "update",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for InputSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputSymbol {
    type Err = ClientError;

    /// Unrecognized values are a lookup fault, never a default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "start" => Ok(Self::Start),
            "update" => Ok(Self::Update),
            "stop" => Ok(Self::Stop),
            other => Err(ClientError::UnknownKind(other.to_string())),
        }
    }
}

// ── Client → Server ─────────────────────────────────────────────────

/// Messages sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Announce the player to the server.
    Connect {
        /// Player identity.
        player: String,
    },
    /// Tell the server the client is ready to start.
    Ready,
    /// Ordered list of input command tokens.
    Input {
        /// Command tokens, in the order they were issued.
        commands: Vec<String>,
    },
}

impl ClientMessage {
    /// Wire value of this message's `kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Ready => "ready",
            Self::Input { .. } => "input",
        }
    }
}

// ── Server → Client ─────────────────────────────────────────────────

/// A decoded server response.
///
/// Only `kind` is interpreted by the client; every other field is kept
/// verbatim in `fields` for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Discriminator mapped to an [`InputSymbol`].
    pub kind: String,
    /// Remaining payload fields.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ServerMessage {
    /// Build a response with the given kind and no extra fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Map `kind` to an input symbol.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownKind`] when `kind` is not a known symbol.
    pub fn symbol(&self) -> Result<InputSymbol, ClientError> {
        self.kind.parse()
    }
}
