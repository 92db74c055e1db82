#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the tickwire framing layer.
//!
//! Drives `FrameReader` and `FrameWriter` through the public [`Transport`]
//! trait with an in-memory pipe, and pins the exact bytes of each outbound
//! message kind.

use std::collections::VecDeque;

use serde_json::{json, Value};
use tickwire::{
    encode_frame, ClientError, ClientMessage, ConnectionFault, FrameReader, FrameWriter, Message,
    Progress, ServerMessage, Transport,
};

// ════════════════════════════════════════════════════════════════════
// Helper: in-memory pipe
// ════════════════════════════════════════════════════════════════════

/// Bytes written on one end come out the other in `chunk`-sized pieces.
struct Pipe {
    buffered: VecDeque<u8>,
    chunk: usize,
}

impl Pipe {
    fn new(chunk: usize) -> Self {
        Self {
            buffered: VecDeque::new(),
            chunk,
        }
    }
}

impl Transport for Pipe {
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, ConnectionFault> {
        if self.buffered.is_empty() {
            return Ok(None);
        }
        let n = self.chunk.min(buf.len()).min(self.buffered.len());
        for (slot, byte) in buf.iter_mut().zip(self.buffered.drain(..n)) {
            *slot = byte;
        }
        Ok(Some(n))
    }

    fn try_send(&mut self, buf: &[u8]) -> Result<Option<usize>, ConnectionFault> {
        let n = self.chunk.min(buf.len());
        self.buffered.extend(&buf[..n]);
        Ok(Some(n))
    }
}

/// Write `frame` through a writer and read it back through a reader, both
/// sharing one pipe. Returns the decoded value and the completion count.
fn through_pipe(frame: &[u8], chunk: usize) -> (Value, usize) {
    let mut pipe = Pipe::new(chunk);
    let mut writer = FrameWriter::new();
    while !writer.flush(&mut pipe, frame).unwrap().is_complete() {}

    let mut reader = FrameReader::<Value>::new();
    let mut completions = 0;
    let mut decoded = None;
    loop {
        match reader.consume(&mut pipe).unwrap() {
            Progress::Complete => {
                completions += 1;
                decoded = reader.take_message();
            }
            Progress::Partial => {}
            Progress::WouldBlock => break,
        }
    }
    (decoded.expect("frame decoded"), completions)
}

// ════════════════════════════════════════════════════════════════════
// Round trips
// ════════════════════════════════════════════════════════════════════

#[test]
fn payloads_survive_any_chunking() {
    let payloads = [
        json!({"kind": "init"}),
        json!({"kind": "update", "entities": [{"id": 9, "hp": 100}], "tick": 123_456}),
        json!({"kind": "start", "map": "dm_arena", "seed": -1, "ok": true, "none": null}),
        json!({"kind": "update", "chat": "gl hf 🎮", "padding": "p".repeat(3000)}),
    ];
    for payload in payloads {
        let frame = encode_frame(&payload).unwrap();
        for chunk in [1, 3, frame.len()] {
            let (decoded, completions) = through_pipe(&frame, chunk);
            assert_eq!(decoded, payload, "chunk size {chunk}");
            assert_eq!(completions, 1, "chunk size {chunk}");
        }
    }
}

#[test]
fn server_messages_decode_with_extra_fields() {
    let frame = encode_frame(&json!({"kind": "update", "score": [3, 1]})).unwrap();
    let mut pipe = Pipe::new(5);
    pipe.buffered.extend(&frame);

    let mut reader = FrameReader::<ServerMessage>::new();
    while !reader.consume(&mut pipe).unwrap().is_complete() {}
    let msg = reader.take_message().unwrap();
    assert_eq!(msg.kind, "update");
    assert_eq!(msg.fields["score"], json!([3, 1]));
    assert!(!reader.is_complete());
}

#[test]
fn reader_rejects_frames_missing_kind() {
    let frame = encode_frame(&json!({"tick": 1})).unwrap();
    let mut pipe = Pipe::new(frame.len());
    pipe.buffered.extend(&frame);

    let mut reader = FrameReader::<ServerMessage>::new();
    let mut outcome = reader.consume(&mut pipe);
    while let Ok(Progress::Partial) = outcome {
        outcome = reader.consume(&mut pipe);
    }
    assert!(matches!(outcome, Err(ClientError::Serialization(_))));
}

// ════════════════════════════════════════════════════════════════════
// Exact wire bytes
// ════════════════════════════════════════════════════════════════════

fn expected_frame(body: &str) -> Vec<u8> {
    let mut frame = (body.len() as u32).to_be_bytes().to_vec();
    frame.extend_from_slice(body.as_bytes());
    frame
}

#[test]
fn connect_message_bytes() {
    let msg = Message::connect("Player2").unwrap();
    assert_eq!(
        msg.buffer(),
        expected_frame(r#"{"kind":"connect","player":"Player2"}"#)
    );
}

#[test]
fn ready_message_bytes() {
    let msg = Message::ready().unwrap();
    assert_eq!(msg.buffer(), expected_frame(r#"{"kind":"ready"}"#));
}

#[test]
fn input_message_bytes() {
    let msg = Message::input(vec!["FORWARD".into(), "LEFT".into(), "FIRE".into()]).unwrap();
    assert_eq!(
        msg.buffer(),
        expected_frame(r#"{"kind":"input","commands":["FORWARD","LEFT","FIRE"]}"#)
    );
    assert!(matches!(msg.payload(), ClientMessage::Input { commands } if commands.len() == 3));
}
