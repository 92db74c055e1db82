//! Non-blocking byte transport for the tickwire framing layer.
//!
//! The [`Transport`] trait is the single seam between the framing code and
//! the socket. Each call performs exactly one non-blocking receive or send
//! and reports the outcome as a value:
//!
//! - `Ok(Some(n))`: `n` bytes were moved
//! - `Ok(None)`: the operation would block; try again on the next readiness event
//! - `Err(fault)`: a [`ConnectionFault`] that ends the session
//!
//! A receive of zero bytes is reported by the transport as `Ok(Some(0))`; the
//! [`FrameReader`](crate::framing::FrameReader) turns that into
//! [`ConnectionFault::PeerClosed`].

use std::io::{self, ErrorKind, Read, Write};

use crate::error::ConnectionFault;

/// One non-blocking receive or send per call, with faults as values.
pub trait Transport {
    /// Receive up to `buf.len()` bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectionFault`] when the connection is unusable.
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, ConnectionFault>;

    /// Send up to `buf.len()` bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectionFault`] when the connection is unusable.
    fn try_send(&mut self, buf: &[u8]) -> Result<Option<usize>, ConnectionFault>;
}

/// Fold `WouldBlock` and `Interrupted` into `Ok(None)`.
fn nonblocking(result: io::Result<usize>) -> Result<Option<usize>, ConnectionFault> {
    match result {
        Ok(n) => Ok(Some(n)),
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Transport for mio::net::TcpStream {
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, ConnectionFault> {
        if let Some(err) = self.take_error()? {
            return Err(err.into());
        }
        nonblocking(self.read(buf))
    }

    fn try_send(&mut self, buf: &[u8]) -> Result<Option<usize>, ConnectionFault> {
        // A failed non-blocking connect surfaces here as SO_ERROR.
        if let Some(err) = self.take_error()? {
            return Err(err.into());
        }
        match self.write(buf) {
            // The connect has not completed yet.
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(None),
            other => nonblocking(other),
        }
    }
}
