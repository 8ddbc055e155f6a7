// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Logplex framing and message decoding.
//!
//! Decoded fields are exposed under the reserved keys below. These are the
//! only definitions of those names; stages and endpoints import them from here.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{
    scan_stream, FrameDecoder, FrameScanner, LogplexDecoder, DEFAULT_MAX_FRAME_LENGTH,
};
pub use error::DecodeError;
pub use message::PositionalMessage;

pub const LOGPLEX_TIMESTAMP_FIELD: &str = "__logplex_ts";
pub const LOGPLEX_HOST_FIELD: &str = "__logplex_host";
pub const LOGPLEX_APP_FIELD: &str = "__logplex_app";
pub const LOGPLEX_PROC_FIELD: &str = "__logplex_proc";
pub const LOGPLEX_LOG_ID_FIELD: &str = "__logplex_log_id";
pub const LOGPLEX_MSG_FIELD: &str = "__logplex_msg";

pub const RESERVED_KEYS: [&str; 6] = [
    LOGPLEX_TIMESTAMP_FIELD,
    LOGPLEX_HOST_FIELD,
    LOGPLEX_APP_FIELD,
    LOGPLEX_PROC_FIELD,
    LOGPLEX_LOG_ID_FIELD,
    LOGPLEX_MSG_FIELD,
];

/// Whether `name` is one of the keys written by logplex decoding.
#[must_use]
pub fn is_reserved_key(name: &str) -> bool {
    RESERVED_KEYS.contains(&name)
}
