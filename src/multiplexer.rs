//! Readiness multiplexer for the session socket.
//!
//! Thin wrapper around [`mio::Poll`] that holds at most one registration and
//! exactly one [`Interest`] for it: readable or writable, never both.

use std::io::ErrorKind;

use mio::event::Source;
use mio::{Events, Poll, Token};

use crate::error::{ClientError, Result};

/// Token under which the session socket is registered.
pub const SOCKET_TOKEN: Token = Token(0);

const EVENT_CAPACITY: usize = 8;

/// The single readiness condition a registration waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Wake when the socket can be read.
    Readable,
    /// Wake when the socket can be written.
    Writable,
}

impl From<Interest> for mio::Interest {
    fn from(interest: Interest) -> Self {
        match interest {
            Interest::Readable => mio::Interest::READABLE,
            Interest::Writable => mio::Interest::WRITABLE,
        }
    }
}

/// Which operations [`Multiplexer::wait`] found ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// A receive can be attempted without blocking.
    pub readable: bool,
    /// A send can be attempted without blocking.
    pub writable: bool,
}

/// Polls one socket for a single readiness interest.
pub struct Multiplexer {
    poll: Poll,
    events: Events,
    interest: Option<Interest>,
}

impl Multiplexer {
    /// Create an empty multiplexer.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the OS poller cannot be created.
    pub fn new() -> Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENT_CAPACITY),
            interest: None,
        })
    }

    /// The active interest, if a socket is registered.
    pub fn interest(&self) -> Option<Interest> {
        self.interest
    }

    /// Register `source` for `interest`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyRegistered`] if a socket is already
    /// registered, or [`ClientError::Io`] if the OS rejects the registration.
    pub fn register<S: Source + ?Sized>(&mut self, source: &mut S, interest: Interest) -> Result<()> {
        if self.interest.is_some() {
            return Err(ClientError::AlreadyRegistered);
        }
        self.poll
            .registry()
            .register(source, SOCKET_TOKEN, interest.into())?;
        self.interest = Some(interest);
        Ok(())
    }

    /// Replace the interest of the registered `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotRegistered`] if nothing is registered, or
    /// [`ClientError::Io`] if the OS rejects the change.
    pub fn modify<S: Source + ?Sized>(&mut self, source: &mut S, interest: Interest) -> Result<()> {
        if self.interest.is_none() {
            return Err(ClientError::NotRegistered);
        }
        self.poll
            .registry()
            .reregister(source, SOCKET_TOKEN, interest.into())?;
        self.interest = Some(interest);
        Ok(())
    }

    /// Remove the registration of `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotRegistered`] if nothing is registered, or
    /// [`ClientError::Io`] if the OS rejects the removal.
    pub fn unregister<S: Source + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        if self.interest.is_none() {
            return Err(ClientError::NotRegistered);
        }
        self.interest = None;
        self.poll.registry().deregister(source)?;
        Ok(())
    }

    /// Block until the registered interest is ready.
    ///
    /// There is no timeout; callers that need bounded latency pace their own
    /// loop around this call.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotRegistered`] when called with nothing
    /// registered, or [`ClientError::Io`] if polling fails.
    pub fn wait(&mut self) -> Result<Readiness> {
        let Some(interest) = self.interest else {
            return Err(ClientError::NotRegistered);
        };

        loop {
            match self.poll.poll(&mut self.events, None) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            // Error and hang-up events arrive for the registered interest
            // too; the following receive or send reports the fault.
            if self.events.iter().any(|event| event.token() == SOCKET_TOKEN) {
                return Ok(match interest {
                    Interest::Readable => Readiness {
                        readable: true,
                        writable: false,
                    },
                    Interest::Writable => Readiness {
                        readable: false,
                        writable: true,
                    },
                });
            }
        }
    }
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("interest", &self.interest)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::io::Write;

    fn connected_pair() -> (mio::net::TcpStream, std::net::TcpStream) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (peer, _) = listener.accept().unwrap();
        stream.set_nonblocking(true).unwrap();
        (mio::net::TcpStream::from_std(stream), peer)
    }

    #[test]
    fn wait_without_registration_is_an_error() {
        let mut mux = Multiplexer::new().unwrap();
        assert!(matches!(mux.wait(), Err(ClientError::NotRegistered)));
    }

    #[test]
    fn registration_is_exclusive() {
        let (mut stream, _peer) = connected_pair();
        let mut mux = Multiplexer::new().unwrap();
        assert!(matches!(
            mux.modify(&mut stream, Interest::Readable),
            Err(ClientError::NotRegistered)
        ));
        mux.register(&mut stream, Interest::Writable).unwrap();
        assert!(matches!(
            mux.register(&mut stream, Interest::Readable),
            Err(ClientError::AlreadyRegistered)
        ));
        assert_eq!(mux.interest(), Some(Interest::Writable));
    }

    #[test]
    fn reports_writable_then_readable() {
        let (mut stream, mut peer) = connected_pair();
        let mut mux = Multiplexer::new().unwrap();

        mux.register(&mut stream, Interest::Writable).unwrap();
        assert_eq!(
            mux.wait().unwrap(),
            Readiness {
                readable: false,
                writable: true
            }
        );

        mux.modify(&mut stream, Interest::Readable).unwrap();
        peer.write_all(b"x").unwrap();
        assert_eq!(
            mux.wait().unwrap(),
            Readiness {
                readable: true,
                writable: false
            }
        );
    }

    #[test]
    fn unregister_clears_interest() {
        let (mut stream, _peer) = connected_pair();
        let mut mux = Multiplexer::new().unwrap();
        mux.register(&mut stream, Interest::Readable).unwrap();
        mux.unregister(&mut stream).unwrap();
        assert_eq!(mux.interest(), None);
        assert!(matches!(
            mux.unregister(&mut stream),
            Err(ClientError::NotRegistered)
        ));
        assert!(matches!(mux.wait(), Err(ClientError::NotRegistered)));
    }
}
