// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::net::SocketAddr;

use log_pipeline::ConfigError;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid job configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("job name must not be empty")]
    EmptyJobName,
    #[error("duplicate job name {0:?}")]
    DuplicateJob(String),
    #[error("invalid server settings for job {job}: {message}")]
    InvalidServer { job: String, message: String },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("drain server error: {0}")]
    Serve(#[source] io::Error),
    #[error("task for job {job} failed: {source}")]
    Join {
        job: String,
        #[source]
        source: JoinError,
    },
}
