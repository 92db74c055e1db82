#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for tickwire integration tests.
//!
//! Provides a blocking [`FakeServer`] that runs a scripted conversation on a
//! loopback socket in its own thread, plus frame helpers speaking the same
//! length-prefixed JSON format as the client.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::JoinHandle;

use serde_json::{json, Value};
use tickwire::framing::FRAME_HEADER_LEN;
use tickwire::{encode_frame, ClientConfig, GameClient};

// ── FakeServer ──────────────────────────────────────────────────────

/// A one-connection loopback server driven by a script closure.
///
/// The closure receives the accepted stream and returns every client frame
/// it read, so the test can inspect them after [`FakeServer::join`].
pub struct FakeServer {
    pub addr: SocketAddr,
    handle: JoinHandle<Vec<Value>>,
}

impl FakeServer {
    pub fn spawn<F>(script: F) -> Self
    where
        F: FnOnce(TcpStream) -> Vec<Value> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
        let addr = listener.local_addr().expect("fake server addr");
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept client");
            script(stream)
        });
        Self { addr, handle }
    }

    /// Reply to each client frame with the next scripted response, in order.
    pub fn replying(responses: Vec<Value>) -> Self {
        Self::spawn(move |mut stream| {
            let mut received = Vec::new();
            for response in responses {
                received.push(read_frame(&mut stream));
                write_frame(&mut stream, &response);
            }
            received
        })
    }

    /// Like [`replying`](Self::replying), then read one more client frame.
    pub fn replying_then_read(responses: Vec<Value>) -> Self {
        Self::spawn(move |mut stream| {
            let mut received = Vec::new();
            for response in responses {
                received.push(read_frame(&mut stream));
                write_frame(&mut stream, &response);
            }
            received.push(read_frame(&mut stream));
            received
        })
    }

    /// Client configuration pointing at this server.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.addr.ip().to_string(), self.addr.port())
    }

    /// Wait for the script to finish and return the client frames it read.
    pub fn join(self) -> Vec<Value> {
        self.handle.join().expect("fake server panicked")
    }
}

// ── Frame helpers ───────────────────────────────────────────────────

/// Blocking read of one length-prefixed JSON frame.
pub fn read_frame(stream: &mut TcpStream) -> Value {
    let mut header = [0u8; FRAME_HEADER_LEN];
    stream.read_exact(&mut header).expect("read frame header");
    let mut payload = vec![0u8; u32::from_be_bytes(header) as usize];
    stream.read_exact(&mut payload).expect("read frame payload");
    serde_json::from_slice(&payload).expect("frame payload is JSON")
}

/// Blocking write of one length-prefixed JSON frame.
pub fn write_frame(stream: &mut TcpStream, value: &Value) {
    let frame = encode_frame(value).expect("encode frame");
    stream.write_all(&frame).expect("write frame");
}

/// Response payload with just a `kind`.
pub fn response(kind: &str) -> Value {
    json!({ "kind": kind })
}

// ── Client helpers ──────────────────────────────────────────────────

/// Tick `client` until `done` holds, failing after `max_ticks`.
pub fn tick_until(
    client: &mut GameClient,
    max_ticks: usize,
    done: impl Fn(&GameClient) -> bool,
) -> tickwire::Result<()> {
    for _ in 0..max_ticks {
        if done(client) {
            return Ok(());
        }
        client.tick()?;
    }
    assert!(done(client), "condition not reached after {max_ticks} ticks");
    Ok(())
}

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
