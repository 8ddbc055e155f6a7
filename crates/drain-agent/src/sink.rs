// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use log_pipeline::{Record, RecordSink};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;
use tracing::error;

/// Writes every delivered record as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl JsonLinesSink<Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> RecordSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn deliver(&self, record: Record) {
        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                error!("failed to serialize record: {e}");
                return;
            }
        };
        line.push(b'\n');

        let mut out = self.out.lock().await;
        if let Err(e) = out.write_all(&line).await {
            error!("failed to write record: {e}");
            return;
        }
        if let Err(e) = out.flush().await {
            error!("failed to flush records: {e}");
        }
    }
}
