// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;

use thiserror::Error;

/// Failure while splitting a byte stream into frames or parsing a frame payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("truncated frame: expected {expected} bytes, {remaining} remaining")]
    TruncatedFrame { expected: usize, remaining: usize },
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("bad timestamp: {0}")]
    BadTimestamp(#[from] chrono::ParseError),
    #[error("read error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// The length prefix or payload span could not be read.
    #[must_use]
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            DecodeError::MalformedFrame(_) | DecodeError::TruncatedFrame { .. }
        )
    }

    /// The frame was intact but its payload is not a valid positional message.
    #[must_use]
    pub fn is_message_error(&self) -> bool {
        matches!(
            self,
            DecodeError::MalformedMessage(_) | DecodeError::BadTimestamp(_)
        )
    }
}
