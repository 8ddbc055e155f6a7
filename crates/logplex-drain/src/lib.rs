// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod http_utils;
pub mod manager;

pub use config::{JobConfig, LogplexTargetConfig, ServerConfig};
pub use endpoint::{EndpointDetails, IngestionEndpoint, DRAIN_ENDPOINT_PATH};
pub use error::EndpointError;
pub use manager::EndpointManager;
