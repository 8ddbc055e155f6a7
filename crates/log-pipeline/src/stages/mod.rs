// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Built-in stage implementations.
//!
//! Each module pairs a deserializable option struct with the stage it
//! configures. Options are validated and compiled once, when the stage is
//! built; `apply` never re-parses configuration.

pub mod drop;
pub mod json;
pub mod labels;
pub mod logplex;
pub mod output;
pub mod regex;
pub mod timestamp;

pub use self::drop::{DropConfig, DropStage};
pub use self::json::{JsonConfig, JsonStage};
pub use self::labels::{LabelsConfig, LabelsStage};
pub use self::logplex::{LogplexConfig, LogplexStage};
pub use self::output::{OutputConfig, OutputStage};
pub use self::regex::{RegexConfig, RegexStage};
pub use self::timestamp::{ActionOnFailure, TimestampConfig, TimestampFormat, TimestampStage};

pub const STAGE_TYPE_REGEX: &str = "regex";
pub const STAGE_TYPE_JSON: &str = "json";
pub const STAGE_TYPE_LABELS: &str = "labels";
pub const STAGE_TYPE_TIMESTAMP: &str = "timestamp";
pub const STAGE_TYPE_OUTPUT: &str = "output";
pub const STAGE_TYPE_LOGPLEX: &str = "logplex";
pub const STAGE_TYPE_DROP: &str = "drop";
pub const STAGE_TYPE_DOCKER: &str = "docker";
pub const STAGE_TYPE_CRI: &str = "cri";
pub const STAGE_TYPE_HEROKU_DRAIN: &str = "heroku_drain";
