// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod config;
mod sink;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::Context;
use log_pipeline::StageRegistry;
use logplex_drain::EndpointManager;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AgentConfig;
use crate::sink::JsonLinesSink;

const CONFIG_FILE_ENV: &str = "DRAIN_CONFIG_FILE";

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let path = env::args_os()
        .nth(1)
        .or_else(|| env::var_os(CONFIG_FILE_ENV))
        .map(PathBuf::from);

    let registry = StageRegistry::default();
    let config = AgentConfig::load(path.as_deref()).context("loading drain agent configuration")?;
    config
        .validate(&registry)
        .context("validating drain agent configuration")?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(config.env_filter())
                .context("could not parse log level in configuration")?,
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    debug!("Logging subsystem enabled");

    if config.jobs.is_empty() {
        warn!("no drain jobs configured");
    }

    let manager = EndpointManager::new(&config.jobs, &registry, Arc::new(JsonLinesSink::stdout()))
        .await
        .context("starting drain endpoints")?;
    for details in manager.details() {
        info!(
            job = %details.job_name,
            "drain endpoint ready at http://{}{}",
            details.address,
            details.route
        );
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutting down drain endpoints");
    manager.stop().await;
    Ok(())
}
