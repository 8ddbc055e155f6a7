// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ordered, concurrent composition of stages.
//!
//! ```text
//!   Entry ──► [stage 0] ──► [stage 1] ──► ... ──► [stage k-1] ──► Results
//!          ch(1)        ch(1)        ch(1)                 ch(1)
//! ```
//!
//! [`Pipeline::run`] spawns one task per stage. Stages are joined by bounded
//! hand-off channels of capacity one, so a slow stage backs up everything
//! upstream of it. Each stage task handles one record at a time, in arrival
//! order, so output order equals input order.
//!
//! Shutdown is driven by closure: once every [`Entry`] handle is dropped the
//! first stage sees its input end, finishes the record it holds, and drops its
//! sender. That closure ripples down the chain; [`Results`] ends only after
//! the last stage has exited.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::{ConfigError, StageConfig, StageRegistry};
use crate::record::Record;
use crate::stage::{Stage, StageOutcome};

const HANDOFF_CAPACITY: usize = 1;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("pipeline entry is closed")]
    Closed,
    #[error("pipeline is shutting down")]
    ShuttingDown,
    #[error("timed out waiting for the pipeline to accept the record")]
    Timeout,
    #[error("submission cancelled")]
    Cancelled,
}

#[derive(Clone)]
pub struct Pipeline {
    name: String,
    stages: Arc<[Arc<dyn Stage>]>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    #[must_use]
    pub fn new(name: impl Into<String>, stages: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            name: name.into(),
            stages: stages.into(),
        }
    }

    pub fn from_configs(
        name: impl Into<String>,
        configs: &[StageConfig],
        registry: &StageRegistry,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(name, registry.build_all(configs)?))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Starts one task per stage and returns the two ends of the chain.
    ///
    /// Each call builds a fresh set of channels, so a pipeline can be run
    /// any number of times. Must be called from within a tokio runtime.
    #[must_use]
    pub fn run(&self) -> (Entry, Results) {
        let (entry_tx, mut rx) = mpsc::channel(HANDOFF_CAPACITY);
        for (index, stage) in self.stages.iter().enumerate() {
            let (tx, next_rx) = mpsc::channel(HANDOFF_CAPACITY);
            tokio::spawn(run_stage(Arc::clone(stage), index, rx, tx));
            rx = next_rx;
        }
        debug!(pipeline = %self.name, stages = self.stages.len(), "pipeline started");
        (Entry { tx: entry_tx }, Results { rx })
    }
}

async fn run_stage(
    stage: Arc<dyn Stage>,
    index: usize,
    mut input: mpsc::Receiver<Record>,
    output: mpsc::Sender<Record>,
) {
    while let Some(record) = input.recv().await {
        match stage.apply(record) {
            StageOutcome::Emitted(record) => {
                if output.send(record).await.is_err() {
                    debug!(stage = stage.name(), index, "downstream closed, stopping stage");
                    return;
                }
            }
            StageOutcome::Dropped(reason) => reason.report(),
        }
    }
}

/// Applies every stage in order on the calling task.
///
/// This is how a pipeline nests inside another one as a single stage.
impl Stage for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, mut record: Record) -> StageOutcome {
        for stage in self.stages.iter() {
            match stage.apply(record) {
                StageOutcome::Emitted(next) => record = next,
                dropped @ StageOutcome::Dropped(_) => return dropped,
            }
        }
        StageOutcome::Emitted(record)
    }
}

/// The submitting end of a running pipeline. Dropping every clone closes the pipeline.
#[derive(Debug, Clone)]
pub struct Entry {
    tx: mpsc::Sender<Record>,
}

impl Entry {
    /// Waits until the first stage can take `record`.
    pub async fn submit(&self, record: Record) -> Result<(), SubmissionError> {
        self.tx
            .send(record)
            .await
            .map_err(|_| SubmissionError::Closed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The output end of a running pipeline.
#[derive(Debug)]
pub struct Results {
    rx: mpsc::Receiver<Record>,
}

impl Results {
    /// Next surviving record, or `None` once the pipeline has fully drained.
    pub async fn next(&mut self) -> Option<Record> {
        self.rx.recv().await
    }

    pub async fn collect(mut self) -> Vec<Record> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await {
            records.push(record);
        }
        records
    }
}
