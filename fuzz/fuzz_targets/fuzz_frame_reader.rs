#![no_main]

use libfuzzer_sys::fuzz_target;
use tickwire::{ConnectionFault, FrameReader, Progress, ServerMessage, Transport};

/// Replays the fuzz input, split into chunks sized by its first byte.
struct Replay<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl Transport for Replay<'_> {
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, ConnectionFault> {
        if self.data.is_empty() {
            return Ok(Some(0));
        }
        let n = self.chunk.min(buf.len()).min(self.data.len());
        let (head, tail) = self.data.split_at(n);
        buf[..n].copy_from_slice(head);
        self.data = tail;
        Ok(Some(n))
    }

    fn try_send(&mut self, buf: &[u8]) -> Result<Option<usize>, ConnectionFault> {
        Ok(Some(buf.len()))
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };
    let mut transport = Replay {
        data: rest,
        chunk: usize::from(first).max(1),
    };
    let mut reader = FrameReader::<ServerMessage>::with_limits(64 * 1024, 512);

    // Every input must end in a decoded frame or an error, never a panic.
    loop {
        match reader.consume(&mut transport) {
            Ok(Progress::Complete) => {
                if let Some(msg) = reader.take_message() {
                    let _ = msg.symbol();
                }
            }
            Ok(Progress::Partial) | Ok(Progress::WouldBlock) => {}
            Err(_) => break,
        }
    }
});
