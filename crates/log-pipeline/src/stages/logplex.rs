// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;

use super::STAGE_TYPE_LOGPLEX;
use crate::logplex::FrameScanner;
use crate::record::Record;
use crate::stage::{Stage, StageOutcome};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogplexConfig {}

/// Decodes a line holding logplex frames into the reserved extracted fields.
///
/// When a line holds several frames the last one wins. An empty line is
/// passed through untouched; any decode error drops the record.
#[derive(Debug, Default)]
pub struct LogplexStage;

impl LogplexStage {
    #[must_use]
    pub fn new(_config: &LogplexConfig) -> Self {
        Self
    }
}

impl Stage for LogplexStage {
    fn name(&self) -> &str {
        STAGE_TYPE_LOGPLEX
    }

    fn apply(&self, mut record: Record) -> StageOutcome {
        let mut last = None;
        for message in FrameScanner::new(record.line.as_bytes()) {
            match message {
                Ok(message) => last = Some(message),
                Err(e) => return StageOutcome::failed(self.name(), e),
            }
        }
        if let Some(message) = last {
            message.write_extracted(&mut record.extracted);
        }
        StageOutcome::Emitted(record)
    }
}
