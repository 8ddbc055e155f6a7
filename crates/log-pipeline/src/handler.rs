// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bridges a running [`Pipeline`] to a downstream [`RecordSink`].
//!
//! [`Pipeline::wrap`] starts the pipeline and a forwarder task that drains its
//! results into the sink. The returned [`EntryHandler`] is what record
//! producers hold; it also keeps the submitted/forwarded counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pipeline::{Entry, Pipeline, SubmissionError};
use crate::record::Record;

/// Final destination for records that survive a pipeline.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn deliver(&self, record: Record);
}

#[async_trait]
impl RecordSink for mpsc::Sender<Record> {
    async fn deliver(&self, record: Record) {
        if self.send(record).await.is_err() {
            warn!("record sink channel closed, discarding record");
        }
    }
}

#[derive(Debug, Default)]
pub struct HandlerStats {
    submitted: AtomicU64,
    forwarded: AtomicU64,
}

impl HandlerStats {
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct EntryHandler {
    pipeline: String,
    entry: RwLock<Option<Entry>>,
    shutdown: CancellationToken,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<HandlerStats>,
}

impl Pipeline {
    /// Runs the pipeline and forwards every surviving record to `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn wrap(&self, sink: Arc<dyn RecordSink>) -> EntryHandler {
        let (entry, mut results) = self.run();
        let stats = Arc::new(HandlerStats::default());

        let forwarder = {
            let stats = Arc::clone(&stats);
            let name = self.name().to_string();
            tokio::spawn(async move {
                while let Some(record) = results.next().await {
                    sink.deliver(record).await;
                    stats.forwarded.fetch_add(1, Ordering::Relaxed);
                }
                debug!(pipeline = %name, "pipeline drained");
            })
        };

        EntryHandler {
            pipeline: self.name().to_string(),
            entry: RwLock::new(Some(entry)),
            shutdown: CancellationToken::new(),
            forwarder: Mutex::new(Some(forwarder)),
            stats,
        }
    }
}

impl EntryHandler {
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline
    }

    #[must_use]
    pub fn stats(&self) -> Arc<HandlerStats> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Hands `record` to the pipeline, waiting while it is backed up.
    ///
    /// Fails with [`SubmissionError::ShuttingDown`] as soon as [`stop`](Self::stop)
    /// is called, including for submissions already waiting.
    pub async fn submit(&self, record: Record) -> Result<(), SubmissionError> {
        let entry = self
            .entry
            .read()
            .await
            .clone()
            .ok_or(SubmissionError::ShuttingDown)?;

        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(SubmissionError::ShuttingDown),
            result = entry.submit(record) => {
                result?;
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    /// Rejects new and pending submissions, then waits until every record
    /// already in the pipeline has reached the sink.
    pub async fn stop(&self) -> Result<(), JoinError> {
        self.shutdown.cancel();
        drop(self.entry.write().await.take());

        let forwarder = self.forwarder.lock().await.take();
        if let Some(forwarder) = forwarder {
            forwarder.await?;
            debug!(
                pipeline = %self.pipeline,
                submitted = self.stats.submitted(),
                forwarded = self.stats.forwarded(),
                "entry handler stopped"
            );
        }
        Ok(())
    }
}
