//! # tickwire
//!
//! Single-threaded, non-blocking game client for a length-prefixed JSON
//! session protocol.
//!
//! One socket is multiplexed for readiness with `mio`, responses are
//! reassembled incrementally from partial receives, and a table-driven
//! state machine decides what to send next.
//!
//! ## Features
//!
//! - **Cooperative**: no threads or async runtime; call [`GameClient::tick`] in your loop
//! - **Incremental framing**: [`FrameReader`] and [`FrameWriter`] survive any fragmentation
//! - **Declarative FSM**: [`fsm::TransitionTable`] validated once at construction
//! - **Faults as values**: transport failures are [`ConnectionFault`]s, not panics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tickwire::{ClientConfig, GameClient};
//!
//! # fn main() -> tickwire::Result<()> {
//! let mut client = GameClient::new(ClientConfig::new("localhost", 54879))?;
//! client.connect("Player2")?;
//! while client.is_connected() {
//!     client.tick()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod framing;
pub mod fsm;
pub mod message;
pub mod multiplexer;
pub mod protocol;
pub mod transport;

// Re-export primary types for ergonomic imports.
pub use client::{ClientConfig, GameClient};
pub use error::{ClientError, ConnectionFault, FsmError, Result};
pub use framing::{encode_frame, FrameReader, FrameWriter, Progress};
pub use message::{Message, Outbox};
pub use multiplexer::{Interest, Multiplexer, Readiness};
pub use protocol::{ClientMessage, ConnectionState, InputSymbol, ServerMessage};
pub use transport::Transport;
