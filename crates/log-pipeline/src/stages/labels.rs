// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::Deserialize;

use super::STAGE_TYPE_LABELS;
use crate::config::ConfigError;
use crate::record::{is_valid_label_name, Record};
use crate::stage::{Stage, StageOutcome};

/// Label name to extracted field. A missing field name means the label name itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LabelsConfig(pub BTreeMap<String, Option<String>>);

impl<K: Into<String>> FromIterator<(K, Option<&'static str>)> for LabelsConfig {
    fn from_iter<T: IntoIterator<Item = (K, Option<&'static str>)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.map(str::to_string)))
                .collect(),
        )
    }
}

#[derive(Debug)]
pub struct LabelsStage {
    // (label, source field)
    labels: Vec<(String, String)>,
}

impl LabelsStage {
    pub fn new(config: &LabelsConfig) -> Result<Self, ConfigError> {
        if config.0.is_empty() {
            return Err(ConfigError::InvalidOption {
                stage: STAGE_TYPE_LABELS,
                message: "at least one label is required".to_string(),
            });
        }
        let mut labels = Vec::with_capacity(config.0.len());
        for (label, source) in &config.0 {
            if !is_valid_label_name(label) {
                return Err(ConfigError::InvalidOption {
                    stage: STAGE_TYPE_LABELS,
                    message: format!("invalid label name {label:?}"),
                });
            }
            let source = source.clone().unwrap_or_else(|| label.clone());
            labels.push((label.clone(), source));
        }
        Ok(Self { labels })
    }
}

impl Stage for LabelsStage {
    fn name(&self) -> &str {
        STAGE_TYPE_LABELS
    }

    fn apply(&self, mut record: Record) -> StageOutcome {
        for (label, source) in &self.labels {
            if let Some(value) = record.extracted_string(source) {
                record.labels.insert(label.clone(), value);
            }
        }
        StageOutcome::Emitted(record)
    }
}
