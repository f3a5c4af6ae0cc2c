//! Newline framing for relay connections.
//!
//! Wraps [`tokio_util::codec::AnyDelimiterCodec`] split on `\n` with a
//! bounded chunk length. Unlike a bare [`tokio_util::codec::LinesCodec`],
//! [`FrameCodec`] never fails on content:
//!
//! - a line longer than the limit is logged at `WARN` and skipped; the inner
//!   codec keeps discarding up to the next newline and decoding resumes;
//! - invalid UTF-8 is decoded lossily, so the frame later falls through to
//!   an unknown tag instead of tearing down the connection.
//!
//! `FramedRead` stops yielding after any decoder error, so only I/O errors
//! are allowed to surface.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};
use tracing::warn;

use crate::{AppError, Result};

/// Maximum line length accepted by the relay codec: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited text codec for relay streams.
#[derive(Debug)]
pub struct FrameCodec(AnyDelimiterCodec);

impl FrameCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line limit (in bytes, excluding `\n`).
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self(AnyDelimiterCodec::new_with_max_length(
            b"\n".to_vec(),
            b"\n".to_vec(),
            max_length,
        ))
    }

    /// The configured line limit.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.0.max_length()
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next line, skipping over-long ones.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.0.decode(src) {
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                    warn!(
                        max_length = self.max_length(),
                        "frame codec: discarding over-long line"
                    );
                }
                other => {
                    return other
                        .map(|chunk| chunk.map(chunk_to_line))
                        .map_err(map_codec_error)
                }
            }
        }
    }

    /// Decode the final line at EOF; an unterminated line is still yielded.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.0.decode_eof(src) {
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                    warn!(
                        max_length = self.max_length(),
                        "frame codec: discarding over-long line"
                    );
                }
                other => {
                    return other
                        .map(|chunk| chunk.map(chunk_to_line))
                        .map_err(map_codec_error)
                }
            }
        }
    }
}

impl Encoder<String> for FrameCodec {
    type Error = AppError;

    /// Encode `item` as a `\n`-terminated line.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if `item` contains a raw newline,
    /// which would split it into two frames on the wire.
    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        if item.contains('\n') {
            return Err(AppError::Protocol("frame contains a raw newline".into()));
        }
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn chunk_to_line(chunk: Bytes) -> String {
    let bytes = chunk.strip_suffix(b"\r").unwrap_or(&chunk[..]);
    String::from_utf8_lossy(bytes).into_owned()
}

fn map_codec_error(e: AnyDelimiterCodecError) -> AppError {
    match e {
        AnyDelimiterCodecError::MaxChunkLengthExceeded => {
            AppError::Protocol("line too long".into())
        }
        AnyDelimiterCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
