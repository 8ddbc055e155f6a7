// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stage descriptors and the registry that turns them into stages.
//!
//! Descriptors are externally tagged, one variant per stage kind:
//!
//! ```yaml
//! pipeline_stages:
//!   - logplex: {}
//!   - labels:
//!       host: __logplex_host
//!       app: __logplex_app
//!   - timestamp:
//!       source: __logplex_ts
//!       format: RFC3339
//!   - output:
//!       source: __logplex_msg
//! ```
//!
//! Building is done once, at job configuration time. Custom stages are looked
//! up by name in the [`StageRegistry`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::presets;
use crate::stage::Stage;
use crate::stages::{
    DropConfig, DropStage, JsonConfig, JsonStage, LabelsConfig, LabelsStage, LogplexConfig,
    LogplexStage, OutputConfig, OutputStage, RegexConfig, RegexStage, TimestampConfig,
    TimestampStage,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid expression for {stage} stage: {source}")]
    InvalidRegex {
        stage: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("invalid {stage} stage options: {message}")]
    InvalidOption {
        stage: &'static str,
        message: String,
    },
    #[error("unknown custom stage {0:?}")]
    UnknownCustomStage(String),
    #[error("label {0:?} is reserved for logplex fields")]
    ReservedLabel(String),
    #[error("invalid label name {0:?}")]
    InvalidLabelName(String),
}

/// Options for the preset chains. They take none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetConfig {}

/// A user-registered stage, resolved by `name` through the registry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomConfig {
    pub name: String,
    #[serde(default)]
    pub options: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageConfig {
    Regex(RegexConfig),
    Json(JsonConfig),
    Labels(LabelsConfig),
    Timestamp(TimestampConfig),
    Output(OutputConfig),
    Logplex(LogplexConfig),
    Drop(DropConfig),
    Docker(PresetConfig),
    Cri(PresetConfig),
    HerokuDrain(PresetConfig),
    Custom(CustomConfig),
}

pub type StageFactory = dyn Fn(&Value) -> Result<Arc<dyn Stage>, ConfigError> + Send + Sync;

/// Builds stages from descriptors. Built-in kinds are always available;
/// `custom` descriptors need a factory registered under their name.
#[derive(Clone, Default)]
pub struct StageRegistry {
    custom: BTreeMap<String, Arc<StageFactory>>,
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for `custom` descriptors named `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Arc<dyn Stage>, ConfigError> + Send + Sync + 'static,
    {
        self.custom.insert(name.into(), Arc::new(factory));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.custom.contains_key(name)
    }

    pub fn build(&self, config: &StageConfig) -> Result<Arc<dyn Stage>, ConfigError> {
        let stage: Arc<dyn Stage> = match config {
            StageConfig::Regex(c) => Arc::new(RegexStage::new(c)?),
            StageConfig::Json(c) => Arc::new(JsonStage::new(c)?),
            StageConfig::Labels(c) => Arc::new(LabelsStage::new(c)?),
            StageConfig::Timestamp(c) => Arc::new(TimestampStage::new(c)?),
            StageConfig::Output(c) => Arc::new(OutputStage::new(c)?),
            StageConfig::Logplex(c) => Arc::new(LogplexStage::new(c)),
            StageConfig::Drop(c) => Arc::new(DropStage::new(c)?),
            StageConfig::Docker(_) => Arc::new(presets::docker()?),
            StageConfig::Cri(_) => Arc::new(presets::cri()?),
            StageConfig::HerokuDrain(_) => Arc::new(presets::heroku_drain()?),
            StageConfig::Custom(c) => {
                let factory = self
                    .custom
                    .get(&c.name)
                    .ok_or_else(|| ConfigError::UnknownCustomStage(c.name.clone()))?;
                factory(&c.options)?
            }
        };
        Ok(stage)
    }

    pub fn build_all(&self, configs: &[StageConfig]) -> Result<Vec<Arc<dyn Stage>>, ConfigError> {
        configs.iter().map(|config| self.build(config)).collect()
    }
}
