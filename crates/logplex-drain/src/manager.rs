// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use log_pipeline::{Pipeline, RecordSink, StageRegistry};
use tracing::{debug, error};

use crate::config::JobConfig;
use crate::endpoint::{EndpointDetails, IngestionEndpoint};
use crate::error::EndpointError;

/// Owns one drain endpoint per configured job.
#[derive(Debug)]
pub struct EndpointManager {
    targets: BTreeMap<String, IngestionEndpoint>,
}

impl EndpointManager {
    /// Builds every job's pipeline, wraps the shared `sink`, and binds its endpoint.
    ///
    /// If any job fails, endpoints already started are stopped before the
    /// error is returned.
    pub async fn new(
        jobs: &[JobConfig],
        registry: &StageRegistry,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self, EndpointError> {
        let mut manager = Self {
            targets: BTreeMap::new(),
        };
        for job in jobs {
            match manager.start_job(job, registry, &sink).await {
                Ok(endpoint) => {
                    manager.targets.insert(job.job_name.clone(), endpoint);
                }
                Err(e) => {
                    manager.stop().await;
                    return Err(e);
                }
            }
        }
        Ok(manager)
    }

    async fn start_job(
        &self,
        job: &JobConfig,
        registry: &StageRegistry,
        sink: &Arc<dyn RecordSink>,
    ) -> Result<IngestionEndpoint, EndpointError> {
        job.validate(registry)?;
        if self.targets.contains_key(&job.job_name) {
            return Err(EndpointError::DuplicateJob(job.job_name.clone()));
        }

        let pipeline = Pipeline::from_configs(job.pipeline_name(), &job.pipeline_stages, registry)?;
        debug!(job = %job.job_name, stages = ?pipeline.stage_names(), "built job pipeline");
        let handler = pipeline.wrap(Arc::clone(sink));
        IngestionEndpoint::bind(job.job_name.clone(), &job.logplex, handler).await
    }

    /// True if any endpoint is ready.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.targets.values().any(IngestionEndpoint::ready)
    }

    /// Stops every endpoint. Failures are logged, never propagated, so one
    /// endpoint cannot keep the others running.
    pub async fn stop(&self) {
        let results = join_all(self.targets.values().map(|endpoint| endpoint.stop())).await;
        for (job, result) in self.targets.keys().zip(results) {
            if let Err(e) = result {
                error!(job = %job, "failed to stop logplex drain endpoint: {e}");
            }
        }
    }

    /// Every managed endpoint, keyed by job name.
    #[must_use]
    pub fn targets(&self) -> &BTreeMap<String, IngestionEndpoint> {
        &self.targets
    }

    #[must_use]
    pub fn active_targets(&self) -> Vec<&IngestionEndpoint> {
        self.targets.values().filter(|t| t.ready()).collect()
    }

    #[must_use]
    pub fn get(&self, job_name: &str) -> Option<&IngestionEndpoint> {
        self.targets.get(job_name)
    }

    #[must_use]
    pub fn details(&self) -> Vec<EndpointDetails> {
        self.targets.values().map(IngestionEndpoint::details).collect()
    }
}
