//! Single-threaded, non-blocking game client.
//!
//! [`GameClient`] owns one TCP socket, one [`Multiplexer`] registration, a
//! [`FrameReader`]/[`FrameWriter`] pair and the connection [`StateMachine`].
//! It has no thread of its own: the caller drives it by calling
//! [`GameClient::tick`] in a loop.
//!
//! The session alternates strictly between a write phase and a read phase.
//! The in-flight message is flushed with write interest; once sent, the
//! socket switches to read interest until one response frame is decoded and
//! fed to the state machine, whose guards stage the next message.
//!
//! # Example
//!
//! ```rust,no_run
//! use tickwire::{ClientConfig, GameClient};
//!
//! # fn main() -> tickwire::Result<()> {
//! let mut client = GameClient::new(ClientConfig::new("localhost", 54879))?;
//! client.connect("Player2")?;
//! while client.is_connected() {
//!     client.tick()?;
//!     std::thread::sleep(std::time::Duration::from_millis(20));
//! }
//! # Ok(())
//! # }
//! ```

use std::net::{Shutdown, SocketAddr, ToSocketAddrs};

use mio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, ConnectionFault, FsmError, Result};
use crate::framing::{
    FrameReader, FrameWriter, Progress, DEFAULT_MAX_FRAME_LEN, DEFAULT_READ_CHUNK_SIZE,
};
use crate::fsm::{StateMachine, TransitionTable};
use crate::message::{default_commands, Message, Outbox};
use crate::multiplexer::{Interest, Multiplexer};
use crate::protocol::{ConnectionState, InputSymbol, ServerMessage};

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`GameClient`].
///
/// # Example
///
/// ```
/// use tickwire::ClientConfig;
///
/// let config = ClientConfig::new("localhost", 54879)
///     .with_commands(vec!["JUMP".into()])
///     .with_max_frame_len(64 * 1024);
/// assert_eq!(config.port, 54879);
/// assert_eq!(config.commands, ["JUMP"]);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Commands carried by each `input` message.
    /// Defaults to `FORWARD`, `LEFT`, `FIRE`.
    pub commands: Vec<String>,
    /// Largest accepted response payload, in bytes.
    ///
    /// Defaults to **1 MiB**. Values below 1 are clamped to 1.
    pub max_frame_len: usize,
    /// Largest number of bytes requested by one receive.
    ///
    /// Defaults to **4096**. Values below 1 are clamped to 1.
    pub read_chunk_size: usize,
}

impl ClientConfig {
    /// Create a configuration for `host:port` with default values.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            commands: default_commands(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }

    /// Set the commands carried by `input` messages. An empty list is ignored.
    #[must_use]
    pub fn with_commands(mut self, commands: Vec<String>) -> Self {
        if !commands.is_empty() {
            self.commands = commands;
        }
        self
    }

    /// Set the largest accepted response payload.
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len.max(1);
        self
    }

    /// Set the largest number of bytes requested by one receive.
    #[must_use]
    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.read_chunk_size = read_chunk_size.max(1);
        self
    }

    /// Resolve `host:port`, preferring an IPv4 address.
    fn resolve(&self) -> Result<SocketAddr> {
        let target = format!("{}:{}", self.host, self.port);
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ClientError::AddressResolution(format!("{target}: {e}")))?
            .collect();
        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or(ClientError::AddressResolution(target))
    }
}

// ── Transition table ────────────────────────────────────────────────

/// Connection state machine driven by decoded responses.
pub type ConnectionMachine = StateMachine<ConnectionState, InputSymbol, Outbox>;

/// The connection lifecycle table.
///
/// | from         | input    | to           | guard stages |
/// |--------------|----------|--------------|--------------|
/// | Disconnected | `init`   | Connected    | `ready`      |
/// | Connected    | `start`  | Playing      | `input`      |
/// | Playing      | `update` | Playing      | `input`      |
/// | Playing      | `stop`   | Disconnected | nothing      |
///
/// # Errors
///
/// Fails only if the table declares a pair twice.
pub fn transition_table(
) -> std::result::Result<TransitionTable<ConnectionState, InputSymbol, Outbox>, FsmError> {
    use ConnectionState::{Connected, Disconnected, Playing};
    use InputSymbol::{Init, Start, Stop, Update};

    TransitionTable::builder()
        .guarded(Disconnected, Init, Connected, enter_connected)
        .guarded(Connected, Start, Playing, enter_playing)
        .guarded(Playing, Update, Playing, enter_playing)
        .on(Playing, Stop, Disconnected)
        .build()
}

fn enter_connected(outbox: &mut Outbox) -> bool {
    debug!("transition to connected");
    outbox.stage_built(Message::ready())
}

fn enter_playing(outbox: &mut Outbox) -> bool {
    debug!("transition to playing");
    let commands = outbox.commands().to_vec();
    outbox.stage_built(Message::input(commands))
}

// ── Session ─────────────────────────────────────────────────────────

/// Resources that exist only between `connect()` and `stop()`.
struct Session {
    addr: SocketAddr,
    socket: TcpStream,
    mux: Multiplexer,
    reader: FrameReader<ServerMessage>,
    writer: FrameWriter,
}

// ── Client ──────────────────────────────────────────────────────────

/// Cooperative, single-socket game client.
pub struct GameClient {
    config: ClientConfig,
    fsm: ConnectionMachine,
    outbox: Outbox,
    session: Option<Session>,
    responses_processed: u64,
    last_response: Option<ServerMessage>,
}

impl GameClient {
    /// Create a disconnected client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Fsm`] if the transition table is invalid.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let fsm = StateMachine::new(ConnectionState::Disconnected, transition_table()?)?;
        let outbox = Outbox::new(config.commands.clone());
        Ok(Self {
            config,
            fsm,
            outbox,
            session: None,
            responses_processed: 0,
            last_response: None,
        })
    }

    /// Start a non-blocking connect and stage the `connect` message.
    ///
    /// The connection state does not change until the first response is
    /// decoded.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AlreadyConnected`] if a session is live
    /// - [`ClientError::InvalidState`] unless the state is `Disconnected`
    /// - [`ClientError::AddressResolution`] if the address does not resolve
    /// - [`ClientError::Connection`] if the connect is rejected immediately
    pub fn connect(&mut self, identity: &str) -> Result<()> {
        if self.session.is_some() {
            return Err(ClientError::AlreadyConnected);
        }
        let state = self.fsm.state();
        if state != ConnectionState::Disconnected {
            return Err(ClientError::InvalidState(state.to_string()));
        }

        let addr = self.config.resolve()?;
        info!("connecting to {addr} as {identity}");
        let mut socket = TcpStream::connect(addr).map_err(ConnectionFault::from)?;
        let message = Message::connect(identity)?;
        let mut mux = Multiplexer::new()?;
        mux.register(&mut socket, Interest::Writable)?;

        self.outbox.reset();
        self.outbox.stage(message);
        self.session = Some(Session {
            addr,
            socket,
            mux,
            reader: FrameReader::with_limits(
                self.config.max_frame_len,
                self.config.read_chunk_size,
            ),
            writer: FrameWriter::new(),
        });
        Ok(())
    }

    /// Wait for readiness once and service it.
    ///
    /// Blocks until the socket is ready for the current phase. Connection
    /// faults stop the session and return `Ok(())`.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if there is no live session
    /// - lookup faults ([`ClientError::is_lookup_fault`]) for an unknown
    ///   response kind or an undeclared transition; the state is unchanged
    /// - [`ClientError::FrameTooLarge`] / [`ClientError::Serialization`] for
    ///   malformed responses
    /// - [`ClientError::Io`] if polling fails
    pub fn tick(&mut self) -> Result<()> {
        if self.session.is_none() {
            error!("tick() called without a live session");
            return Err(ClientError::NotConnected);
        }

        match self.service() {
            Err(ClientError::Connection(fault)) => {
                debug!("client disconnected: {fault}");
                self.stop();
                Ok(())
            }
            other => other,
        }
    }

    /// Release the socket and multiplexer. Safe to call repeatedly.
    ///
    /// Any partially read or partially sent message is discarded. Each
    /// release step is attempted even if an earlier one fails.
    pub fn stop(&mut self) {
        self.outbox.reset();
        let Some(session) = self.session.take() else {
            debug!("stop(): client already stopped");
            return;
        };
        debug!("stopping client");

        let Session {
            addr,
            mut socket,
            mut mux,
            ..
        } = session;
        if let Err(e) = mux.unregister(&mut socket) {
            debug!("multiplexer unregister failed for {addr}: {e}");
        }
        if let Err(e) = socket.shutdown(Shutdown::Both) {
            debug!("socket close failed for {addr}: {e}");
        }
        drop(socket);
        drop(mux);
    }

    // ── State accessors ─────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.fsm.state()
    }

    /// Returns `true` while a socket and registration are held.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// The message currently in flight, if any.
    pub fn pending_message(&self) -> Option<&Message> {
        self.outbox.pending()
    }

    /// The most recently decoded response.
    pub fn last_response(&self) -> Option<&ServerMessage> {
        self.last_response.as_ref()
    }

    /// Number of responses that drove a transition.
    pub fn responses_processed(&self) -> u64 {
        self.responses_processed
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replace the commands carried by subsequent `input` messages.
    /// An empty list is ignored.
    pub fn set_commands(&mut self, commands: Vec<String>) {
        self.outbox.set_commands(commands);
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn service(&mut self) -> Result<()> {
        let readiness = match self.session.as_mut() {
            // A faulted reader has unread bytes behind it and no further
            // readiness event will arrive; report the fault without waiting.
            Some(session) if session.reader.is_faulted() => {
                session.reader.consume(&mut session.socket)?;
                return Ok(());
            }
            Some(session) => session.mux.wait()?,
            None => return Err(ClientError::NotConnected),
        };
        if readiness.readable {
            self.on_readable()?;
        }
        if readiness.writable {
            self.on_writable()?;
        }
        Ok(())
    }

    fn on_readable(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        loop {
            match session.reader.consume(&mut session.socket)? {
                Progress::Complete => break,
                Progress::Partial => continue,
                Progress::WouldBlock => return Ok(()),
            }
        }
        let Some(response) = session.reader.take_message() else {
            return Ok(());
        };

        let symbol = self.dispatch(response)?;

        if symbol == InputSymbol::Stop && self.fsm.state() == ConnectionState::Disconnected {
            info!("server ended the session");
            self.stop();
            return Ok(());
        }

        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if self.outbox.pending().is_some() {
            session.mux.modify(&mut session.socket, Interest::Writable)?;
        } else {
            debug!("no outbound message staged; staying in read mode");
        }
        Ok(())
    }

    fn on_writable(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let Some(message) = self.outbox.pending() else {
            warn!("socket writable with no message in flight; switching to read mode");
            session.mux.modify(&mut session.socket, Interest::Readable)?;
            return Ok(());
        };

        loop {
            match session.writer.flush(&mut session.socket, message.buffer())? {
                Progress::Complete => break,
                Progress::Partial => continue,
                Progress::WouldBlock => return Ok(()),
            }
        }
        debug!("sent {:?}", message.payload());

        session.writer.reset();
        self.outbox.reset();
        session.mux.modify(&mut session.socket, Interest::Readable)?;
        Ok(())
    }

    /// Feed one decoded response to the state machine.
    fn dispatch(&mut self, response: ServerMessage) -> Result<InputSymbol> {
        debug!("received response: {response:?}");
        let symbol = response.symbol();
        self.last_response = Some(response);
        let symbol = symbol?;
        self.fsm.transition(symbol, &mut self.outbox)?;
        self.responses_processed += 1;
        Ok(symbol)
    }
}

impl std::fmt::Debug for GameClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClient")
            .field("state", &self.state())
            .field("connected", &self.is_connected())
            .field("pending", &self.outbox.pending().map(Message::kind))
            .field("responses_processed", &self.responses_processed)
            .finish()
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ───────────────────────────────────────────────────────────
