// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use super::STAGE_TYPE_REGEX;
use crate::config::ConfigError;
use crate::record::Record;
use crate::stage::{Stage, StageError, StageOutcome};

/// Extracts every named capture group of `expression` into `Extracted`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegexConfig {
    pub expression: String,
    /// Extracted field to match against. Defaults to the line.
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug)]
pub struct RegexStage {
    expression: Regex,
    source: Option<String>,
}

impl RegexStage {
    pub fn new(config: &RegexConfig) -> Result<Self, ConfigError> {
        let expression =
            Regex::new(&config.expression).map_err(|source| ConfigError::InvalidRegex {
                stage: STAGE_TYPE_REGEX,
                source,
            })?;
        if expression.capture_names().flatten().next().is_none() {
            return Err(ConfigError::InvalidOption {
                stage: STAGE_TYPE_REGEX,
                message: "expression requires at least one named capture group".to_string(),
            });
        }
        Ok(Self {
            expression,
            source: config.source.clone(),
        })
    }
}

impl Stage for RegexStage {
    fn name(&self) -> &str {
        STAGE_TYPE_REGEX
    }

    fn apply(&self, mut record: Record) -> StageOutcome {
        let Some(text) = record.source_text(self.source.as_deref()) else {
            let field = self.source.clone().unwrap_or_default();
            return StageOutcome::failed(self.name(), StageError::MissingField(field));
        };

        let Some(captures) = self.expression.captures(&text) else {
            trace!("regex did not match");
            return StageOutcome::Emitted(record);
        };
        for name in self.expression.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                record
                    .extracted
                    .insert(name.to_string(), Value::String(m.as_str().to_string()));
            }
        }
        StageOutcome::Emitted(record)
    }
}
