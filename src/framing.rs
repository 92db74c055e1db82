//! Length-prefixed framing over a non-blocking [`Transport`].
//!
//! A frame is a 4-byte big-endian payload length followed by that many bytes
//! of JSON. [`FrameReader`] rebuilds one frame from arbitrarily fragmented
//! receives; [`FrameWriter`] pushes a pre-encoded frame out across as many
//! partial sends as the socket needs.
//!
//! Both perform exactly one receive or send per call and report
//! [`Progress`]. Readiness from `mio` is edge-triggered, so a caller keeps
//! calling while the result is [`Progress::Partial`] and only goes back to
//! waiting on [`Progress::WouldBlock`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ClientError, ConnectionFault, Result};
use crate::transport::Transport;

/// Size of the length header preceding every payload.
pub const FRAME_HEADER_LEN: usize = 4;

/// Default upper bound on a single payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Default upper bound on the bytes requested by one receive.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Serialize `payload` to JSON and prepend its length header.
///
/// # Errors
///
/// Returns [`ClientError::Serialization`] if the payload cannot be encoded,
/// or [`ClientError::FrameTooLarge`] if it does not fit a 32-bit length.
pub fn encode_frame<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(payload)?;
    let len = u32::try_from(body.len()).map_err(|_| ClientError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Outcome of one [`FrameReader::consume`] or [`FrameWriter::flush`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The whole frame has been received or sent.
    Complete,
    /// Bytes moved but the frame is not finished; more may be ready now.
    Partial,
    /// Nothing moved; wait for the next readiness event.
    WouldBlock,
}

impl Progress {
    /// Returns `true` for [`Progress::Complete`].
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}

// ── Reader ──────────────────────────────────────────────────────────

/// Incremental decoder for one length-prefixed JSON frame.
///
/// State survives across receives, including a header split over several
/// of them. The reader never asks for more than the current frame still
/// needs, so bytes of a following frame stay in the socket.
#[derive(Debug)]
pub struct FrameReader<T> {
    header: [u8; FRAME_HEADER_LEN],
    header_filled: usize,
    target: Option<usize>,
    payload: Vec<u8>,
    decoded: Option<T>,
    max_frame_len: usize,
    chunk_size: usize,
}

impl<T: DeserializeOwned> Default for FrameReader<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> FrameReader<T> {
    /// Create a reader with the default frame limit and chunk size.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_FRAME_LEN, DEFAULT_READ_CHUNK_SIZE)
    }

    /// Create a reader with explicit limits. Both are clamped to at least 1.
    pub fn with_limits(max_frame_len: usize, chunk_size: usize) -> Self {
        Self {
            header: [0; FRAME_HEADER_LEN],
            header_filled: 0,
            target: None,
            payload: Vec::new(),
            decoded: None,
            max_frame_len: max_frame_len.max(1),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Perform one non-blocking receive and advance the decode.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Connection`] on a transport fault, including
    ///   [`ConnectionFault::PeerClosed`] for a zero-byte receive
    /// - [`ClientError::FrameTooLarge`] when the header exceeds the limit
    /// - [`ClientError::Serialization`] when the payload is not valid JSON for `T`
    /// - [`ClientError::FrameAlreadyDecoded`] if the previous frame was not reset
    pub fn consume<R: Transport + ?Sized>(&mut self, transport: &mut R) -> Result<Progress> {
        if self.decoded.is_some() {
            return Err(ClientError::FrameAlreadyDecoded);
        }
        if self.is_faulted() {
            // Report the same fault again without touching the transport.
            return match self.target {
                None => self.check_header().map(|_| Progress::Partial),
                Some(_) => self.decode_if_complete(),
            };
        }

        match self.target {
            None => {
                let dst = self
                    .header
                    .get_mut(self.header_filled..)
                    .unwrap_or_default();
                let Some(n) = transport.try_recv(dst)? else {
                    return Ok(Progress::WouldBlock);
                };
                if n == 0 {
                    return Err(ConnectionFault::PeerClosed.into());
                }
                self.header_filled += n;
                if self.header_filled < FRAME_HEADER_LEN {
                    return Ok(Progress::Partial);
                }
                let len = self.check_header()?;
                self.target = Some(len);
                self.payload.reserve_exact(len);
            }
            Some(target) => {
                let start = self.payload.len();
                let want = target.saturating_sub(start).min(self.chunk_size);
                self.payload.resize(start + want, 0);
                let dst = self.payload.get_mut(start..).unwrap_or_default();
                let received = transport.try_recv(dst);
                let n = match received {
                    Ok(Some(n)) if n > 0 => n,
                    other => {
                        self.payload.truncate(start);
                        return match other {
                            Ok(None) => Ok(Progress::WouldBlock),
                            Err(fault) => Err(fault.into()),
                            _ => Err(ConnectionFault::PeerClosed.into()),
                        };
                    }
                };
                self.payload.truncate(start + n);
            }
        }

        self.decode_if_complete()
    }

    fn check_header(&self) -> Result<usize> {
        let len = u32::from_be_bytes(self.header) as usize;
        if len > self.max_frame_len {
            return Err(ClientError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        Ok(len)
    }

    fn decode_if_complete(&mut self) -> Result<Progress> {
        match self.target {
            Some(target) if self.payload.len() == target => {
                self.decoded = Some(serde_json::from_slice(&self.payload)?);
                Ok(Progress::Complete)
            }
            _ => Ok(Progress::Partial),
        }
    }

    /// Returns `true` once a whole frame has been decoded.
    pub fn is_complete(&self) -> bool {
        self.decoded.is_some()
    }

    /// Returns `true` after an oversized header or an undecodable payload.
    ///
    /// A faulted reader performs no further receives; every `consume()`
    /// returns the original error until [`reset`](Self::reset).
    pub fn is_faulted(&self) -> bool {
        if self.decoded.is_some() {
            return false;
        }
        match self.target {
            None => self.header_filled == FRAME_HEADER_LEN,
            Some(target) => self.payload.len() == target,
        }
    }

    /// The decoded frame, if complete.
    pub fn message(&self) -> Option<&T> {
        self.decoded.as_ref()
    }

    /// Take the decoded frame and reset for the next one.
    pub fn take_message(&mut self) -> Option<T> {
        let decoded = self.decoded.take();
        self.reset();
        decoded
    }

    /// Bytes of the current frame received so far, header included.
    pub fn buffered_len(&self) -> usize {
        self.header_filled + self.payload.len()
    }

    /// Payload length announced by the header, once fully received.
    pub fn target_len(&self) -> Option<usize> {
        self.target
    }

    /// Discard all decode state, partial or complete.
    pub fn reset(&mut self) {
        self.header = [0; FRAME_HEADER_LEN];
        self.header_filled = 0;
        self.target = None;
        self.payload.clear();
        self.decoded = None;
    }
}

// ── Writer ──────────────────────────────────────────────────────────

/// Incremental sender for a pre-encoded frame buffer.
#[derive(Debug, Default)]
pub struct FrameWriter {
    offset: usize,
}

impl FrameWriter {
    /// Create a writer positioned at the start of a buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Perform one non-blocking send of the unflushed tail of `buffer`.
    ///
    /// A send that accepts zero bytes keeps the position and reports
    /// [`Progress::WouldBlock`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connection`] on a transport fault.
    pub fn flush<W: Transport + ?Sized>(
        &mut self,
        transport: &mut W,
        buffer: &[u8],
    ) -> Result<Progress> {
        let rest = buffer.get(self.offset..).unwrap_or_default();
        if rest.is_empty() {
            return Ok(Progress::Complete);
        }
        match transport.try_send(rest)? {
            None | Some(0) => Ok(Progress::WouldBlock),
            Some(n) => {
                self.offset += n;
                if self.offset >= buffer.len() {
                    Ok(Progress::Complete)
                } else {
                    Ok(Progress::Partial)
                }
            }
        }
    }

    /// Bytes of the current buffer already sent.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Rewind for the next buffer.
    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::VecDeque;

    /// In-memory transport delivering and accepting bytes in fixed chunks.
    struct ChunkedTransport {
        inbound: VecDeque<u8>,
        recv_chunk: usize,
        peer_closed: bool,
        fault: Option<ConnectionFault>,
        sent: Vec<u8>,
        send_limit: usize,
        send_calls: usize,
    }

    impl ChunkedTransport {
        fn new(inbound: Vec<u8>, recv_chunk: usize) -> Self {
            Self {
                inbound: inbound.into(),
                recv_chunk,
                peer_closed: false,
                fault: None,
                sent: Vec::new(),
                send_limit: usize::MAX,
                send_calls: 0,
            }
        }

        fn sink(send_limit: usize) -> Self {
            Self {
                send_limit,
                ..Self::new(Vec::new(), 1)
            }
        }
    }

    impl Transport for ChunkedTransport {
        fn try_recv(&mut self, buf: &mut [u8]) -> std::result::Result<Option<usize>, ConnectionFault> {
            if self.inbound.is_empty() {
                if let Some(fault) = self.fault.take() {
                    return Err(fault);
                }
                return Ok(if self.peer_closed { Some(0) } else { None });
            }
            let n = self.recv_chunk.min(buf.len()).min(self.inbound.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.inbound.pop_front().unwrap();
            }
            Ok(Some(n))
        }

        fn try_send(&mut self, buf: &[u8]) -> std::result::Result<Option<usize>, ConnectionFault> {
            self.send_calls += 1;
            let n = buf.len().min(self.send_limit);
            self.sent.extend_from_slice(&buf[..n]);
            Ok(Some(n))
        }
    }

    /// Drive `reader` until the transport blocks; return decoded frames.
    fn drain(reader: &mut FrameReader<Value>, transport: &mut ChunkedTransport) -> Vec<Value> {
        let mut frames = Vec::new();
        loop {
            match reader.consume(transport).unwrap() {
                Progress::Complete => frames.push(reader.take_message().unwrap()),
                Progress::Partial => {}
                Progress::WouldBlock => return frames,
            }
        }
    }

    fn payloads() -> Vec<Value> {
        vec![
            json!({"kind": "init"}),
            json!({}),
            json!({"kind": "update", "players": [{"id": 1, "pos": [0.5, -2.0]}], "note": "héllo ✓"}),
            json!({"kind": "start", "blob": "x".repeat(5000)}),
        ]
    }

    #[test]
    fn reassembles_across_chunk_sizes() {
        for payload in payloads() {
            let frame = encode_frame(&payload).unwrap();
            for chunk in [1, 3, frame.len()] {
                let mut transport = ChunkedTransport::new(frame.clone(), chunk);
                let mut reader = FrameReader::<Value>::new();
                let frames = drain(&mut reader, &mut transport);
                assert_eq!(frames, vec![payload.clone()], "chunk size {chunk}");
            }
        }
    }

    #[test]
    fn partial_header_is_resumed() {
        let frame = encode_frame(&json!({"kind": "init"})).unwrap();
        let mut transport = ChunkedTransport::new(frame[..2].to_vec(), 64);
        let mut reader = FrameReader::<Value>::new();

        assert_eq!(reader.consume(&mut transport).unwrap(), Progress::Partial);
        assert_eq!(reader.consume(&mut transport).unwrap(), Progress::WouldBlock);
        assert_eq!(reader.buffered_len(), 2);
        assert_eq!(reader.target_len(), None);

        transport.inbound.extend(&frame[2..]);
        assert_eq!(reader.consume(&mut transport).unwrap(), Progress::Partial);
        assert_eq!(reader.target_len(), Some(frame.len() - FRAME_HEADER_LEN));
        assert_eq!(reader.consume(&mut transport).unwrap(), Progress::Complete);
        assert_eq!(reader.message(), Some(&json!({"kind": "init"})));
    }

    #[test]
    fn never_reads_past_the_current_frame() {
        let first = encode_frame(&json!({"kind": "init"})).unwrap();
        let second = encode_frame(&json!({"kind": "start"})).unwrap();
        let mut bytes = first.clone();
        bytes.extend_from_slice(&second);
        let mut transport = ChunkedTransport::new(bytes, 4096);
        let mut reader = FrameReader::<Value>::new();

        while !reader.consume(&mut transport).unwrap().is_complete() {}
        assert_eq!(transport.inbound.len(), second.len());

        reader.reset();
        while !reader.consume(&mut transport).unwrap().is_complete() {}
        assert_eq!(reader.message(), Some(&json!({"kind": "start"})));
    }

    #[test]
    fn reset_matches_fresh_reader() {
        let frame = encode_frame(&json!({"kind": "update", "n": 1})).unwrap();
        let mut used = FrameReader::<Value>::new();
        let mut transport = ChunkedTransport::new(frame.clone(), 3);
        while !used.consume(&mut transport).unwrap().is_complete() {}
        used.reset();

        let fresh = FrameReader::<Value>::new();
        assert_eq!(used.is_complete(), fresh.is_complete());
        assert_eq!(used.buffered_len(), fresh.buffered_len());
        assert_eq!(used.target_len(), fresh.target_len());
        assert_eq!(used.message(), fresh.message());

        // Same input, same observable outcome.
        let mut fresh = fresh;
        let mut a = ChunkedTransport::new(frame.clone(), 3);
        let mut b = ChunkedTransport::new(frame, 3);
        loop {
            let pa = used.consume(&mut a).unwrap();
            let pb = fresh.consume(&mut b).unwrap();
            assert_eq!(pa, pb);
            if pa.is_complete() {
                break;
            }
        }
        assert_eq!(used.message(), fresh.message());
    }

    #[test]
    fn reset_mid_frame_discards_partial_state() {
        let frame = encode_frame(&json!({"kind": "init"})).unwrap();
        let mut transport = ChunkedTransport::new(frame[..6].to_vec(), 6);
        let mut reader = FrameReader::<Value>::new();
        reader.consume(&mut transport).unwrap();
        reader.consume(&mut transport).unwrap();
        assert!(reader.buffered_len() > 0);
        reader.reset();
        assert_eq!(reader.buffered_len(), 0);
        assert_eq!(reader.target_len(), None);
    }

    #[test]
    fn zero_byte_receive_is_peer_closed() {
        let mut transport = ChunkedTransport::new(Vec::new(), 1);
        transport.peer_closed = true;
        let mut reader = FrameReader::<Value>::new();
        let err = reader.consume(&mut transport).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Connection(ConnectionFault::PeerClosed)
        ));
    }

    #[test]
    fn peer_close_mid_payload_is_peer_closed() {
        let frame = encode_frame(&json!({"kind": "init"})).unwrap();
        let mut transport = ChunkedTransport::new(frame[..7].to_vec(), 16);
        transport.peer_closed = true;
        let mut reader = FrameReader::<Value>::new();
        assert_eq!(reader.consume(&mut transport).unwrap(), Progress::Partial);
        assert_eq!(reader.consume(&mut transport).unwrap(), Progress::Partial);
        let err = reader.consume(&mut transport).unwrap_err();
        assert!(err.is_connection_fault());
        assert_eq!(reader.buffered_len(), 7);
    }

    #[test]
    fn transport_fault_propagates() {
        let mut transport = ChunkedTransport::new(Vec::new(), 1);
        transport.fault = Some(ConnectionFault::Reset);
        let mut reader = FrameReader::<Value>::new();
        assert!(matches!(
            reader.consume(&mut transport),
            Err(ClientError::Connection(ConnectionFault::Reset))
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut transport = ChunkedTransport::new(vec![0, 0, 1, 0], 4);
        let mut reader = FrameReader::<Value>::with_limits(64, 16);
        assert!(matches!(
            reader.consume(&mut transport),
            Err(ClientError::FrameTooLarge { len: 256, max: 64 })
        ));
    }

    #[test]
    fn malformed_payload_is_a_serialization_error() {
        let mut bytes = 3u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"{no");
        let mut transport = ChunkedTransport::new(bytes, 64);
        let mut reader = FrameReader::<Value>::new();
        reader.consume(&mut transport).unwrap();
        assert!(matches!(
            reader.consume(&mut transport),
            Err(ClientError::Serialization(_))
        ));
    }

    #[test]
    fn oversized_frame_keeps_failing_without_receiving() {
        let mut bytes = vec![0, 0, 1, 0];
        bytes.extend_from_slice(&[b'x'; 8]);
        let mut transport = ChunkedTransport::new(bytes, 4);
        transport.peer_closed = true;
        let mut reader = FrameReader::<Value>::with_limits(64, 16);

        for _ in 0..3 {
            assert!(matches!(
                reader.consume(&mut transport),
                Err(ClientError::FrameTooLarge { len: 256, max: 64 })
            ));
            assert!(reader.is_faulted());
        }
        assert_eq!(transport.inbound.len(), 8);

        reader.reset();
        assert!(!reader.is_faulted());
        assert_eq!(reader.buffered_len(), 0);
    }

    #[test]
    fn malformed_payload_keeps_failing_without_receiving() {
        let mut bytes = 3u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"{no");
        let mut transport = ChunkedTransport::new(bytes, 64);
        transport.peer_closed = true;
        let mut reader = FrameReader::<Value>::new();
        reader.consume(&mut transport).unwrap();
        assert!(!reader.is_faulted());

        for _ in 0..3 {
            assert!(matches!(
                reader.consume(&mut transport),
                Err(ClientError::Serialization(_))
            ));
            assert!(reader.is_faulted());
        }
        assert!(reader.message().is_none());
    }

    #[test]
    fn consume_after_complete_requires_reset() {
        let frame = encode_frame(&json!({"kind": "init"})).unwrap();
        let mut transport = ChunkedTransport::new(frame, 4096);
        let mut reader = FrameReader::<Value>::new();
        while !reader.consume(&mut transport).unwrap().is_complete() {}
        assert!(matches!(
            reader.consume(&mut transport),
            Err(ClientError::FrameAlreadyDecoded)
        ));
    }

    #[test]
    fn header_is_big_endian_length() {
        let frame = encode_frame(&json!({"kind": "ready"})).unwrap();
        let body = br#"{"kind":"ready"}"#;
        assert_eq!(&frame[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&frame[4..], body);
    }

    #[test]
    fn large_buffer_takes_seven_flushes_at_1500_bytes() {
        let buffer = vec![0xAB; 10_000];
        let mut transport = ChunkedTransport::sink(1500);
        let mut writer = FrameWriter::new();

        let mut calls = 0;
        loop {
            calls += 1;
            if writer.flush(&mut transport, &buffer).unwrap().is_complete() {
                break;
            }
            assert_eq!(writer.offset(), calls * 1500);
        }
        assert_eq!(calls, 7);
        assert_eq!(transport.send_calls, 7);
        assert_eq!(transport.sent, buffer);
    }

    #[test]
    fn zero_byte_send_keeps_position() {
        let buffer = b"abcdef".to_vec();
        let mut transport = ChunkedTransport::sink(4);
        let mut writer = FrameWriter::new();
        assert_eq!(writer.flush(&mut transport, &buffer).unwrap(), Progress::Partial);

        transport.send_limit = 0;
        assert_eq!(
            writer.flush(&mut transport, &buffer).unwrap(),
            Progress::WouldBlock
        );
        assert_eq!(writer.offset(), 4);

        transport.send_limit = 4;
        assert_eq!(writer.flush(&mut transport, &buffer).unwrap(), Progress::Complete);
        assert_eq!(transport.sent, buffer);

        writer.reset();
        assert_eq!(writer.offset(), 0);
    }
}
