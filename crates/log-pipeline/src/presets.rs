// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ready-made stage chains for common log formats.
//!
//! Each preset is a nested [`Pipeline`] used as a single stage.

use std::collections::BTreeMap;

use crate::config::{ConfigError, StageConfig, StageRegistry};
use crate::logplex::{
    LOGPLEX_APP_FIELD, LOGPLEX_HOST_FIELD, LOGPLEX_LOG_ID_FIELD, LOGPLEX_MSG_FIELD,
    LOGPLEX_PROC_FIELD, LOGPLEX_TIMESTAMP_FIELD,
};
use crate::pipeline::Pipeline;
use crate::stages::{
    ActionOnFailure, JsonConfig, LabelsConfig, LogplexConfig, OutputConfig, RegexConfig,
    TimestampConfig, STAGE_TYPE_CRI, STAGE_TYPE_DOCKER, STAGE_TYPE_HEROKU_DRAIN,
};

const CRI_EXPRESSION: &str =
    r"^(?s)(?P<time>\S+?) (?P<stream>stdout|stderr) (?P<flags>\S+?) (?P<content>.*)$";

fn build(name: &str, configs: &[StageConfig]) -> Result<Pipeline, ConfigError> {
    let stages = StageRegistry::default().build_all(configs)?;
    Ok(Pipeline::new(name, stages))
}

fn timestamp(source: &str, format: &str) -> StageConfig {
    StageConfig::Timestamp(TimestampConfig {
        source: source.to_string(),
        format: format.to_string(),
        action_on_failure: ActionOnFailure::Fudge,
    })
}

fn output(source: &str) -> StageConfig {
    StageConfig::Output(OutputConfig {
        source: source.to_string(),
    })
}

fn stream_label() -> StageConfig {
    StageConfig::Labels([("stream", None::<&str>)].into_iter().collect())
}

/// Docker `json-file` lines: `{"log": ..., "stream": ..., "time": ...}`.
pub fn docker() -> Result<Pipeline, ConfigError> {
    let expressions: BTreeMap<String, Option<String>> = [
        ("output", "log"),
        ("stream", "stream"),
        ("timestamp", "time"),
    ]
    .into_iter()
    .map(|(name, key)| (name.to_string(), Some(key.to_string())))
    .collect();

    build(
        STAGE_TYPE_DOCKER,
        &[
            StageConfig::Json(JsonConfig {
                expressions,
                source: None,
            }),
            stream_label(),
            timestamp("timestamp", "RFC3339Nano"),
            output("output"),
        ],
    )
}

/// CRI container runtime lines: `<time> <stream> <flags> <content>`.
pub fn cri() -> Result<Pipeline, ConfigError> {
    build(
        STAGE_TYPE_CRI,
        &[
            StageConfig::Regex(RegexConfig {
                expression: CRI_EXPRESSION.to_string(),
                source: None,
            }),
            stream_label(),
            timestamp("time", "RFC3339Nano"),
            output("content"),
        ],
    )
}

/// Lines holding a raw logplex frame, as written by a Heroku drain.
pub fn heroku_drain() -> Result<Pipeline, ConfigError> {
    let labels: LabelsConfig = [
        ("host", Some(LOGPLEX_HOST_FIELD)),
        ("app", Some(LOGPLEX_APP_FIELD)),
        ("proc", Some(LOGPLEX_PROC_FIELD)),
        ("log_id", Some(LOGPLEX_LOG_ID_FIELD)),
    ]
    .into_iter()
    .collect();

    build(
        STAGE_TYPE_HEROKU_DRAIN,
        &[
            StageConfig::Logplex(LogplexConfig {}),
            StageConfig::Labels(labels),
            timestamp(LOGPLEX_TIMESTAMP_FIELD, "RFC3339"),
            output(LOGPLEX_MSG_FIELD),
        ],
    )
}
