//! Line splitting for ffmpeg stderr.
//!
//! ffmpeg rewrites its stats line in place using `\r`, so a plain
//! newline-delimited reader would see one ever-growing line for the whole
//! encode. [`StatsLineCodec`] treats both `\r` and `\n` as terminators.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Lines longer than this are discarded rather than buffered without bound.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Decoder yielding trimmed, non-empty lines split on `\r` or `\n`.
#[derive(Debug, Default)]
pub struct StatsLineCodec {
    /// Set while skipping the remainder of an overlong line.
    discarding: bool,
}

impl StatsLineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_terminator(b: &u8) -> bool {
    *b == b'\n' || *b == b'\r'
}

impl Decoder for StatsLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let Some(pos) = buf.iter().position(is_terminator) else {
                if buf.len() > MAX_LINE_LENGTH {
                    buf.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };

            let line = buf.split_to(pos + 1);
            if self.discarding {
                self.discarding = false;
                continue;
            }

            let text = String::from_utf8_lossy(&line[..pos]).trim().to_string();
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }

        let rest = buf.split();
        if std::mem::take(&mut self.discarding) {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        Ok((!text.is_empty()).then_some(text))
    }
}
