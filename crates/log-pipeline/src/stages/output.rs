// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;

use super::STAGE_TYPE_OUTPUT;
use crate::config::ConfigError;
use crate::record::Record;
use crate::stage::{Stage, StageError, StageOutcome};

/// Replaces the line with an extracted field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub source: String,
}

#[derive(Debug)]
pub struct OutputStage {
    source: String,
}

impl OutputStage {
    pub fn new(config: &OutputConfig) -> Result<Self, ConfigError> {
        if config.source.is_empty() {
            return Err(ConfigError::InvalidOption {
                stage: STAGE_TYPE_OUTPUT,
                message: "source is required".to_string(),
            });
        }
        Ok(Self {
            source: config.source.clone(),
        })
    }
}

impl Stage for OutputStage {
    fn name(&self) -> &str {
        STAGE_TYPE_OUTPUT
    }

    fn apply(&self, mut record: Record) -> StageOutcome {
        match record.extracted_string(&self.source) {
            Some(line) => {
                record.line = line;
                StageOutcome::Emitted(record)
            }
            None => StageOutcome::failed(self.name(), StageError::MissingField(self.source.clone())),
        }
    }
}
