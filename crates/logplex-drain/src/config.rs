// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use log_pipeline::logplex::is_reserved_key;
use log_pipeline::record::is_valid_label_name;
use log_pipeline::{ConfigError, LabelSet, StageConfig, StageRegistry};
use serde::Deserialize;

use crate::error::EndpointError;

pub const DEFAULT_MAX_REQUEST_CONTENT_LENGTH: usize = 5 * 1024 * 1024;
pub const DEFAULT_SUBMIT_TIMEOUT_MS: u64 = 30_000;

/// Listener settings for one drain endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub http_listen_address: IpAddr,
    /// `0` lets the OS pick a port.
    pub http_listen_port: u16,
    pub max_request_content_length: usize,
    /// Upper bound on how long one record may wait for the pipeline.
    pub submit_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_listen_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_listen_port: 0,
            max_request_content_length: DEFAULT_MAX_REQUEST_CONTENT_LENGTH,
            submit_timeout_ms: DEFAULT_SUBMIT_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http_listen_address, self.http_listen_port)
    }

    #[must_use]
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogplexTargetConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Added to every record received by this endpoint.
    #[serde(default)]
    pub labels: LabelSet,
}

/// One scrape job: a drain endpoint and the stages its records go through.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub job_name: String,
    #[serde(default)]
    pub pipeline_stages: Vec<StageConfig>,
    #[serde(default)]
    pub logplex: LogplexTargetConfig,
}

impl JobConfig {
    /// Checks everything that can be checked before binding a listener,
    /// including that every stage descriptor builds.
    pub fn validate(&self, registry: &StageRegistry) -> Result<(), EndpointError> {
        if self.job_name.trim().is_empty() {
            return Err(EndpointError::EmptyJobName);
        }
        if self.logplex.server.max_request_content_length == 0 {
            return Err(EndpointError::InvalidServer {
                job: self.job_name.clone(),
                message: "max_request_content_length must be greater than 0".to_string(),
            });
        }
        if self.logplex.server.submit_timeout_ms == 0 {
            return Err(EndpointError::InvalidServer {
                job: self.job_name.clone(),
                message: "submit_timeout_ms must be greater than 0".to_string(),
            });
        }
        for (name, _) in &self.logplex.labels {
            if is_reserved_key(name) {
                return Err(ConfigError::ReservedLabel(name.clone()).into());
            }
            if !is_valid_label_name(name) {
                return Err(ConfigError::InvalidLabelName(name.clone()).into());
            }
        }
        registry.build_all(&self.pipeline_stages)?;
        Ok(())
    }

    /// Name of the pipeline built for this job.
    #[must_use]
    pub fn pipeline_name(&self) -> String {
        format!("push_pipeline_{}", self.job_name)
    }
}
