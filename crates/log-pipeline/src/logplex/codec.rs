// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Length-prefixed framing: `<decimal length> <payload of exactly length bytes>`,
//! repeated back to back. Payloads may contain line breaks; only the declared
//! length delimits a frame.

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};

use super::error::DecodeError;
use super::message::PositionalMessage;

const FRAME_SEPARATOR: u8 = b' ';
const MAX_LENGTH_DIGITS: usize = 9;

/// Largest frame accepted unless a decoder is built with its own limit.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 5 * 1024 * 1024;

/// Splits a byte stream into raw frame payloads.
#[derive(Debug)]
pub struct FrameDecoder {
    // Declared length of the frame whose prefix has been consumed.
    pending: Option<usize>,
    max_frame_length: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_frame_length(DEFAULT_MAX_FRAME_LENGTH)
    }
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared lengths above `max_frame_length` fail before any buffer is
    /// reserved for the payload.
    #[must_use]
    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            pending: None,
            max_frame_length,
        }
    }

    #[must_use]
    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    fn decode_length(&mut self, src: &mut BytesMut) -> Result<Option<usize>, DecodeError> {
        // Line breaks between frames are tolerated.
        let skip = src
            .iter()
            .take_while(|b| matches!(b, b'\r' | b'\n'))
            .count();
        src.advance(skip);

        let digits = src.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits > MAX_LENGTH_DIGITS {
            return Err(DecodeError::MalformedFrame(format!(
                "length prefix longer than {MAX_LENGTH_DIGITS} digits"
            )));
        }
        match src.get(digits) {
            None => Ok(None),
            Some(&FRAME_SEPARATOR) if digits > 0 => {
                let length = std::str::from_utf8(&src[..digits])
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .ok_or_else(|| DecodeError::MalformedFrame("invalid length prefix".into()))?;
                if length > self.max_frame_length {
                    return Err(DecodeError::MalformedFrame(format!(
                        "frame length {length} exceeds maximum {}",
                        self.max_frame_length
                    )));
                }
                src.advance(digits + 1);
                Ok(Some(length))
            }
            Some(&FRAME_SEPARATOR) => Err(DecodeError::MalformedFrame(
                "missing length prefix".to_string(),
            )),
            Some(other) => Err(DecodeError::MalformedFrame(format!(
                "unexpected byte {:?} in length prefix",
                char::from(*other)
            ))),
        }
    }
}

impl Decoder for FrameDecoder {
    type Item = Bytes;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let length = match self.pending {
            Some(length) => length,
            None => match self.decode_length(src)? {
                Some(length) => {
                    self.pending = Some(length);
                    length
                }
                None => return Ok(None),
            },
        };

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }
        self.pending = None;
        Ok(Some(src.split_to(length).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        let remaining = src.len();
        src.clear();
        match self.pending.take() {
            Some(expected) => Err(DecodeError::TruncatedFrame {
                expected,
                remaining,
            }),
            None if remaining == 0 => Ok(None),
            None => Err(DecodeError::MalformedFrame(
                "stream ended inside length prefix".to_string(),
            )),
        }
    }
}

/// Splits a byte stream into frames and parses each one.
#[derive(Debug, Default)]
pub struct LogplexDecoder {
    frames: FrameDecoder,
}

impl LogplexDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            frames: FrameDecoder::with_max_frame_length(max_frame_length),
        }
    }
}

impl Decoder for LogplexDecoder {
    type Item = PositionalMessage;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.frames
            .decode(src)?
            .map(|frame| PositionalMessage::parse(&frame))
            .transpose()
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.frames
            .decode_eof(src)?
            .map(|frame| PositionalMessage::parse(&frame))
            .transpose()
    }
}

/// Lazily decodes messages from an async reader, one per frame. Frames
/// declaring more than `max_frame_length` bytes end the stream with an error.
pub fn scan_stream<R: AsyncRead>(
    reader: R,
    max_frame_length: usize,
) -> FramedRead<R, LogplexDecoder> {
    FramedRead::new(reader, LogplexDecoder::with_max_frame_length(max_frame_length))
}

/// Decodes messages from an in-memory buffer, stopping after the first error.
#[derive(Debug)]
pub struct FrameScanner {
    buf: BytesMut,
    decoder: LogplexDecoder,
    done: bool,
}

impl FrameScanner {
    #[must_use]
    pub fn new(input: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(input),
            decoder: LogplexDecoder::new(),
            done: false,
        }
    }
}

impl Iterator for FrameScanner {
    type Item = Result<PositionalMessage, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.decode_eof(&mut self.buf) {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
