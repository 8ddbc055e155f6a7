// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod handler;
pub mod logplex;
pub mod pipeline;
pub mod presets;
pub mod record;
pub mod stage;
pub mod stages;

pub use config::{ConfigError, StageConfig, StageRegistry};
pub use handler::{EntryHandler, HandlerStats, RecordSink};
pub use pipeline::{Entry, Pipeline, Results, SubmissionError};
pub use record::{Extracted, LabelSet, Record};
pub use stage::{DropReason, Stage, StageError, StageOutcome};
