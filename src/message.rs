//! Outbound message construction and the single in-flight slot.

use tracing::{debug, warn};

use crate::error::Result;
use crate::framing::encode_frame;
use crate::protocol::ClientMessage;

/// Commands carried by `input` messages unless the caller sets others.
pub const DEFAULT_COMMANDS: [&str; 3] = ["FORWARD", "LEFT", "FIRE"];

/// An outbound payload together with its encoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: ClientMessage,
    buffer: Vec<u8>,
}

impl Message {
    /// Encode `payload` into a frame ready for the writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn new(payload: ClientMessage) -> Result<Self> {
        let buffer = encode_frame(&payload)?;
        Ok(Self { payload, buffer })
    }

    /// `connect` message announcing `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn connect(identity: impl Into<String>) -> Result<Self> {
        Self::new(ClientMessage::Connect {
            player: identity.into(),
        })
    }

    /// `ready` message.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn ready() -> Result<Self> {
        Self::new(ClientMessage::Ready)
    }

    /// `input` message carrying `commands` in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn input(commands: Vec<String>) -> Result<Self> {
        Self::new(ClientMessage::Input { commands })
    }

    /// Wire value of the message kind.
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    pub fn payload(&self) -> &ClientMessage {
        &self.payload
    }

    /// The encoded frame, header included.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }
}

/// Holds the one message in flight and the commands for the next `input`.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Option<Message>,
    commands: Vec<String>,
}

impl Outbox {
    /// Create an empty outbox whose `input` messages carry `commands`.
    ///
    /// An empty list falls back to [`DEFAULT_COMMANDS`].
    pub fn new(commands: Vec<String>) -> Self {
        let commands = if commands.is_empty() {
            default_commands()
        } else {
            commands
        };
        Self {
            pending: None,
            commands,
        }
    }

    /// The message in flight, if any.
    pub fn pending(&self) -> Option<&Message> {
        self.pending.as_ref()
    }

    /// Put `message` in flight. Refused while another one is.
    pub fn stage(&mut self, message: Message) -> bool {
        if let Some(current) = &self.pending {
            warn!(
                "cannot stage {} while {} is in flight",
                message.kind(),
                current.kind()
            );
            return false;
        }
        debug!("staged {} message", message.kind());
        self.pending = Some(message);
        true
    }

    /// Stage the result of a builder call; a build failure is refused.
    pub fn stage_built(&mut self, built: Result<Message>) -> bool {
        match built {
            Ok(message) => self.stage(message),
            Err(e) => {
                warn!("failed to build outbound message: {e}");
                false
            }
        }
    }

    /// Clear the in-flight slot, returning what it held.
    pub fn reset(&mut self) -> Option<Message> {
        self.pending.take()
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Replace the commands used by subsequent `input` messages.
    ///
    /// An empty list is ignored; `input` always carries at least one command.
    pub fn set_commands(&mut self, commands: Vec<String>) {
        if commands.is_empty() {
            warn!("ignoring empty command list; keeping {:?}", self.commands);
            return;
        }
        self.commands = commands;
    }
}

/// [`DEFAULT_COMMANDS`] as owned strings.
pub fn default_commands() -> Vec<String> {
    DEFAULT_COMMANDS.iter().map(|c| c.to_string()).collect()
}
