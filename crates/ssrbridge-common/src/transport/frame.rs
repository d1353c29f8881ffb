use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::protocol::error::{BridgeError, Result};

/// Literal prefix of every protocol line.
pub const FRAME_TAG: &str = "ISSR";

/// Maximum frame length in bytes: tag plus JSON, newline excluded.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Serializes `message` into a complete framed line, trailing newline included.
///
/// Fails with [`BridgeError::FrameTooLarge`] when the frame would exceed
/// [`MAX_FRAME_BYTES`].
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    encode_frame_with_limit(message, MAX_FRAME_BYTES)
}

pub(crate) fn encode_frame_with_limit<T: Serialize>(message: &T, max_len: usize) -> Result<Vec<u8>> {
    let mut line = Vec::with_capacity(FRAME_TAG.len() + 128);
    line.extend_from_slice(FRAME_TAG.as_bytes());
    // serde_json escapes control characters, so the document is a single line.
    serde_json::to_writer(&mut line, message)?;

    if line.len() > max_len {
        return Err(BridgeError::FrameTooLarge {
            len: line.len(),
            max: max_len,
        });
    }

    line.push(b'\n');
    Ok(line)
}

/// One tagged line read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// JSON payload with the tag stripped
    Message(Vec<u8>),
    /// A tagged line longer than the limit; its content has been discarded
    Oversized { len: usize },
}

/// Reads tagged frames from a buffered stream, skipping untagged lines.
pub struct FrameReader<R> {
    inner: R,
    max_len: usize,
    line: Vec<u8>,
}

enum Line {
    Complete,
    Oversized { len: usize },
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_len(inner, MAX_FRAME_BYTES)
    }

    pub fn with_max_len(inner: R, max_len: usize) -> Self {
        Self {
            inner,
            max_len,
            line: Vec::new(),
        }
    }

    /// Returns the next tagged frame, or `None` at end of stream.
    pub async fn next_frame(&mut self) -> std::io::Result<Option<Frame>> {
        loop {
            let line = match self.read_line().await? {
                Some(line) => line,
                None => return Ok(None),
            };

            let tagged = self.line.starts_with(FRAME_TAG.as_bytes());
            match line {
                Line::Complete if tagged => {
                    let payload = self.line[FRAME_TAG.len()..].to_vec();
                    return Ok(Some(Frame::Message(payload)));
                }
                Line::Oversized { len } if tagged => {
                    return Ok(Some(Frame::Oversized { len }));
                }
                _ => {
                    tracing::trace!(
                        "Ignoring untagged line: {}",
                        String::from_utf8_lossy(&self.line[..self.line.len().min(80)])
                    );
                }
            }
        }
    }

    /// Reads one line into `self.line`, keeping at most `max_len` bytes of it.
    ///
    /// The newline is stripped, and a preceding `\r` on lines within the
    /// limit. An unterminated final line counts as a line.
    async fn read_line(&mut self) -> std::io::Result<Option<Line>> {
        self.line.clear();
        let mut total = 0usize;
        let mut saw_bytes = false;

        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                if !saw_bytes {
                    return Ok(None);
                }
                break;
            }
            saw_bytes = true;

            let (chunk_len, consumed, done) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos, pos + 1, true),
                None => (available.len(), available.len(), false),
            };

            let room = self.max_len.saturating_sub(self.line.len());
            let keep = chunk_len.min(room);
            self.line.extend_from_slice(&available[..keep]);
            total += chunk_len;

            self.inner.consume(consumed);
            if done {
                break;
            }
        }

        if total > self.max_len {
            return Ok(Some(Line::Oversized { len: total }));
        }

        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        Ok(Some(Line::Complete))
    }
}
