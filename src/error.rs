//! Error types for the tickwire client.

use std::io;

use thiserror::Error;

/// Transport-level failure reported by a non-blocking receive or send.
///
/// These are recoverable at the session level: the controller stops the
/// session and keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionFault {
    /// The peer refused the connection.
    #[error("connection refused")]
    Refused,

    /// The connection was reset or aborted by the peer.
    #[error("connection reset")]
    Reset,

    /// A receive returned zero bytes: the peer closed its end.
    #[error("connection closed by peer")]
    PeerClosed,

    /// Any other transport failure.
    #[error("transport failure ({kind:?}): {message}")]
    Other {
        /// Kind of the underlying I/O error.
        kind: io::ErrorKind,
        /// Display text of the underlying I/O error.
        message: String,
    },
}

impl From<io::Error> for ConnectionFault {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::Reset,
            io::ErrorKind::UnexpectedEof => Self::PeerClosed,
            kind => Self::Other {
                kind,
                message: err.to_string(),
            },
        }
    }
}

/// Errors raised while building or driving a [`StateMachine`](crate::fsm::StateMachine).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsmError {
    /// No transition is declared for the current state and input.
    #[error("no transition declared for input {input} in state {state}")]
    UndefinedTransition {
        /// Debug rendering of the current state.
        state: String,
        /// Debug rendering of the input symbol.
        input: String,
    },

    /// The same (state, input) pair was declared twice.
    #[error("transition for input {input} in state {state} declared more than once")]
    DuplicateTransition {
        /// Debug rendering of the source state.
        state: String,
        /// Debug rendering of the input symbol.
        input: String,
    },

    /// The initial state has no outgoing transition.
    #[error("initial state {0} has no outgoing transitions")]
    DeadInitialState(String),
}

/// Errors that can occur when using the tickwire client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport failed; the session cannot continue.
    #[error("connection fault: {0}")]
    Connection(#[from] ConnectionFault),

    /// State machine lookup or construction failure.
    #[error(transparent)]
    Fsm(#[from] FsmError),

    /// A decoded response carried a `kind` that maps to no input symbol.
    #[error("unrecognized message kind: {0:?}")]
    UnknownKind(String),

    /// A frame header declared a payload larger than the configured limit.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Declared payload length.
        len: usize,
        /// Configured maximum payload length.
        max: usize,
    },

    /// `consume()` was called on a reader holding a decoded frame.
    #[error("frame reader holds a decoded frame; reset it before reading again")]
    FrameAlreadyDecoded,

    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires a live session.
    #[error("not connected to server")]
    NotConnected,

    /// `connect()` was called while a session is live.
    #[error("already connected")]
    AlreadyConnected,

    /// The operation is not valid in the current connection state.
    #[error("operation not valid in state {0}")]
    InvalidState(String),

    /// The multiplexer already holds a registration.
    #[error("socket already registered with the multiplexer")]
    AlreadyRegistered,

    /// The multiplexer holds no registration.
    #[error("no socket registered with the multiplexer")]
    NotRegistered,

    /// The configured host/port resolved to no socket address.
    #[error("could not resolve {0}")]
    AddressResolution(String),

    /// An I/O error outside the read/write path (polling, registration).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Returns `true` for transport failures that end the session quietly.
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` for protocol-contract violations: an undeclared
    /// transition or an unrecognized message kind.
    pub fn is_lookup_fault(&self) -> bool {
        matches!(
            self,
            Self::UnknownKind(_) | Self::Fsm(FsmError::UndefinedTransition { .. })
        )
    }
}

/// A specialized [`Result`] type for tickwire client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
