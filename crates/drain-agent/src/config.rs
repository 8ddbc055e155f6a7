// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Agent configuration: a YAML file listing the drain jobs, with the log
//! level overridable from the environment.
//!
//! ```yaml
//! log_level: info
//! jobs:
//!   - job_name: heroku
//!     pipeline_stages:
//!       - labels:
//!           app: __logplex_app
//!     logplex:
//!       server:
//!         http_listen_port: 8080
//!       labels:
//!         env: prod
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use log_pipeline::StageRegistry;
use logplex_drain::{EndpointError, JobConfig};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "DRAIN_";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum AgentConfigError {
    #[error("configuration file {0} does not exist")]
    MissingFile(PathBuf),
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid log level {0:?}, expected one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),
    #[error(transparent)]
    Job(#[from] EndpointError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub log_level: String,
    pub jobs: Vec<JobConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            jobs: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Reads `path` (if any), then applies `DRAIN_LOG_LEVEL` on top.
    pub fn load(path: Option<&Path>) -> Result<Self, AgentConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if !path.exists() {
                return Err(AgentConfigError::MissingFile(path.to_path_buf()));
            }
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).only(&["log_level"]))
            .extract::<Self>()
            .map_err(Box::new)?;
        Ok(config)
    }

    /// Checks the log level, that job names are unique, and every job.
    pub fn validate(&self, registry: &StageRegistry) -> Result<(), AgentConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(AgentConfigError::InvalidLogLevel(self.log_level.clone()));
        }
        let mut names = HashSet::new();
        for job in &self.jobs {
            job.validate(registry)?;
            if !names.insert(job.job_name.as_str()) {
                return Err(EndpointError::DuplicateJob(job.job_name.clone()).into());
            }
        }
        Ok(())
    }

    /// Filter directive for the log subscriber.
    #[must_use]
    pub fn env_filter(&self) -> String {
        format!("h2=off,hyper=off,{}", self.log_level.to_lowercase())
    }
}
