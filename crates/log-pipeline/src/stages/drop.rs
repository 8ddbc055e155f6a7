// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use regex::Regex;
use serde::Deserialize;

use super::STAGE_TYPE_DROP;
use crate::config::ConfigError;
use crate::record::Record;
use crate::stage::{Stage, StageOutcome};

/// Filters out records whose source matches `expression`.
/// Without an expression every record is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DropConfig {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
}

#[derive(Debug)]
pub struct DropStage {
    source: Option<String>,
    expression: Option<Regex>,
}

impl DropStage {
    pub fn new(config: &DropConfig) -> Result<Self, ConfigError> {
        let expression = config
            .expression
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|source| ConfigError::InvalidRegex {
                stage: STAGE_TYPE_DROP,
                source,
            })?;
        Ok(Self {
            source: config.source.clone(),
            expression,
        })
    }
}

impl Stage for DropStage {
    fn name(&self) -> &str {
        STAGE_TYPE_DROP
    }

    fn apply(&self, record: Record) -> StageOutcome {
        let Some(expression) = &self.expression else {
            return StageOutcome::filtered(self.name(), "drop all");
        };
        match record.source_text(self.source.as_deref()) {
            Some(text) if expression.is_match(&text) => {
                StageOutcome::filtered(self.name(), format!("matched {}", expression.as_str()))
            }
            _ => StageOutcome::Emitted(record),
        }
    }
}
