// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use super::STAGE_TYPE_TIMESTAMP;
use crate::config::ConfigError;
use crate::record::Record;
use crate::stage::{Stage, StageError, StageOutcome};

/// Sets the record timestamp from an extracted field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimestampConfig {
    pub source: String,
    /// `RFC3339`, `RFC3339Nano`, `Unix`, `UnixMs`, or a `strftime` layout.
    pub format: String,
    #[serde(default)]
    pub action_on_failure: ActionOnFailure,
}

/// What to do when the source is missing or does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOnFailure {
    /// Keep the arrival timestamp and emit the record.
    #[default]
    Fudge,
    /// Drop the record.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampFormat {
    Rfc3339,
    Rfc3339Nano,
    Unix,
    UnixMs,
    Layout(String),
}

impl TimestampFormat {
    pub fn from_config(format: &str) -> Result<Self, ConfigError> {
        Ok(match format {
            "RFC3339" => TimestampFormat::Rfc3339,
            "RFC3339Nano" => TimestampFormat::Rfc3339Nano,
            "Unix" => TimestampFormat::Unix,
            "UnixMs" => TimestampFormat::UnixMs,
            layout if layout.contains('%') => TimestampFormat::Layout(layout.to_string()),
            other => {
                return Err(ConfigError::InvalidOption {
                    stage: STAGE_TYPE_TIMESTAMP,
                    message: format!("unknown timestamp format {other:?}"),
                })
            }
        })
    }

    pub fn parse(&self, text: &str) -> Result<DateTime<Utc>, StageError> {
        let text = text.trim();
        match self {
            // chrono accepts fractional seconds for both
            TimestampFormat::Rfc3339 | TimestampFormat::Rfc3339Nano => {
                DateTime::parse_from_rfc3339(text)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| StageError::Parse(format!("{text:?}: {e}")))
            }
            TimestampFormat::Unix => {
                let secs: i64 = text
                    .parse()
                    .map_err(|e| StageError::Parse(format!("{text:?}: {e}")))?;
                DateTime::from_timestamp(secs, 0)
                    .ok_or_else(|| StageError::Parse(format!("{text:?}: out of range")))
            }
            TimestampFormat::UnixMs => {
                let millis: i64 = text
                    .parse()
                    .map_err(|e| StageError::Parse(format!("{text:?}: {e}")))?;
                DateTime::from_timestamp_millis(millis)
                    .ok_or_else(|| StageError::Parse(format!("{text:?}: out of range")))
            }
            TimestampFormat::Layout(layout) => DateTime::parse_from_str(text, layout)
                .map(|ts| ts.with_timezone(&Utc))
                .or_else(|_| NaiveDateTime::parse_from_str(text, layout).map(|ts| ts.and_utc()))
                .map_err(|e| StageError::Parse(format!("{text:?}: {e}"))),
        }
    }
}

#[derive(Debug)]
pub struct TimestampStage {
    source: String,
    format: TimestampFormat,
    action_on_failure: ActionOnFailure,
}

impl TimestampStage {
    pub fn new(config: &TimestampConfig) -> Result<Self, ConfigError> {
        if config.source.is_empty() {
            return Err(ConfigError::InvalidOption {
                stage: STAGE_TYPE_TIMESTAMP,
                message: "source is required".to_string(),
            });
        }
        Ok(Self {
            source: config.source.clone(),
            format: TimestampFormat::from_config(&config.format)?,
            action_on_failure: config.action_on_failure,
        })
    }
}

impl Stage for TimestampStage {
    fn name(&self) -> &str {
        STAGE_TYPE_TIMESTAMP
    }

    fn apply(&self, mut record: Record) -> StageOutcome {
        let parsed = record
            .extracted_string(&self.source)
            .ok_or_else(|| StageError::MissingField(self.source.clone()))
            .and_then(|text| self.format.parse(&text));

        match (parsed, self.action_on_failure) {
            (Ok(timestamp), _) => {
                record.timestamp = timestamp;
                StageOutcome::Emitted(record)
            }
            (Err(_), ActionOnFailure::Fudge) => StageOutcome::Emitted(record),
            (Err(e), ActionOnFailure::Skip) => StageOutcome::failed(self.name(), e),
        }
    }
}
