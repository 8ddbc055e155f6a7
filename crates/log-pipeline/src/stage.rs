// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The contract every transform step implements.
//!
//! A [`Stage`] receives a [`Record`] by value and either hands it back or
//! drops it with a [`DropReason`]. Stages never see a record they did not
//! receive, and never produce more than one record per input. A stage that
//! fails must not return a half-modified record: it returns
//! [`StageOutcome::Dropped`] instead, and the pipeline keeps running.

use thiserror::Error;
use tracing::{debug, trace};

use crate::logplex::DecodeError;
use crate::record::Record;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("field {0} not found")]
    MissingField(String),
    #[error("field {field} is not {expected}")]
    InvalidType {
        field: String,
        expected: &'static str,
    },
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("{0}")]
    Custom(String),
}

/// Why a stage did not emit a record.
#[derive(Debug)]
pub enum DropReason {
    /// The stage intentionally filtered the record out.
    Filtered { stage: String, detail: String },
    /// The stage could not process the record.
    Failed { stage: String, error: StageError },
}

impl DropReason {
    #[must_use]
    pub fn stage(&self) -> &str {
        match self {
            DropReason::Filtered { stage, .. } | DropReason::Failed { stage, .. } => stage,
        }
    }

    /// Emits the diagnostic for this drop.
    pub fn report(&self) {
        match self {
            DropReason::Filtered { stage, detail } => {
                trace!(stage = %stage, detail = %detail, "record filtered");
            }
            DropReason::Failed { stage, error } => {
                debug!(stage = %stage, error = %error, "dropping record: stage failed");
            }
        }
    }
}

#[derive(Debug)]
pub enum StageOutcome {
    Emitted(Record),
    Dropped(DropReason),
}

impl StageOutcome {
    pub fn failed(stage: &str, error: impl Into<StageError>) -> Self {
        StageOutcome::Dropped(DropReason::Failed {
            stage: stage.to_string(),
            error: error.into(),
        })
    }

    pub fn filtered(stage: &str, detail: impl Into<String>) -> Self {
        StageOutcome::Dropped(DropReason::Filtered {
            stage: stage.to_string(),
            detail: detail.into(),
        })
    }

    #[must_use]
    pub fn into_record(self) -> Option<Record> {
        match self {
            StageOutcome::Emitted(record) => Some(record),
            StageOutcome::Dropped(_) => None,
        }
    }

    #[must_use]
    pub fn is_dropped(&self) -> bool {
        matches!(self, StageOutcome::Dropped(_))
    }
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, record: Record) -> StageOutcome;
}
