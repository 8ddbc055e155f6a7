// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::STAGE_TYPE_JSON;
use crate::config::ConfigError;
use crate::record::Record;
use crate::stage::{Stage, StageError, StageOutcome};

/// Parses the source as a JSON object and copies selected keys into `Extracted`.
///
/// `expressions` maps the extracted name to a dotted key path into the
/// document (`request.method`). An empty path means "same as the name".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonConfig {
    pub expressions: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug)]
pub struct JsonStage {
    expressions: Vec<(String, Vec<String>)>,
    source: Option<String>,
}

impl JsonStage {
    pub fn new(config: &JsonConfig) -> Result<Self, ConfigError> {
        if config.expressions.is_empty() {
            return Err(ConfigError::InvalidOption {
                stage: STAGE_TYPE_JSON,
                message: "expressions must not be empty".to_string(),
            });
        }
        let mut expressions = Vec::with_capacity(config.expressions.len());
        for (name, path) in &config.expressions {
            let path = path.as_deref().unwrap_or(name);
            let segments: Vec<String> = path.split('.').map(str::to_string).collect();
            if segments.iter().any(String::is_empty) {
                return Err(ConfigError::InvalidOption {
                    stage: STAGE_TYPE_JSON,
                    message: format!("invalid key path {path:?} for {name}"),
                });
            }
            expressions.push((name.clone(), segments));
        }
        Ok(Self {
            expressions,
            source: config.source.clone(),
        })
    }
}

fn lookup<'a>(document: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(document, |current, key| current.as_object()?.get(key))
}

impl Stage for JsonStage {
    fn name(&self) -> &str {
        STAGE_TYPE_JSON
    }

    fn apply(&self, mut record: Record) -> StageOutcome {
        let Some(text) = record.source_text(self.source.as_deref()) else {
            let field = self.source.clone().unwrap_or_default();
            return StageOutcome::failed(self.name(), StageError::MissingField(field));
        };
        let document: Value = match serde_json::from_str(&text) {
            Ok(document) => document,
            Err(e) => return StageOutcome::failed(self.name(), StageError::Parse(e.to_string())),
        };
        if !document.is_object() {
            return StageOutcome::failed(
                self.name(),
                StageError::InvalidType {
                    field: self.source.clone().unwrap_or_else(|| "line".to_string()),
                    expected: "a JSON object",
                },
            );
        }

        for (name, path) in &self.expressions {
            if let Some(value) = lookup(&document, path) {
                record.extracted.insert(name.clone(), value.clone());
            }
        }
        StageOutcome::Emitted(record)
    }
}
