// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::error::DecodeError;
use super::{
    LOGPLEX_APP_FIELD, LOGPLEX_HOST_FIELD, LOGPLEX_LOG_ID_FIELD, LOGPLEX_MSG_FIELD,
    LOGPLEX_PROC_FIELD, LOGPLEX_TIMESTAMP_FIELD,
};
use crate::record::{Extracted, LabelSet};

/// The decoded form of one frame payload.
///
/// Header fields are separated by runs of spaces. A line break may also end
/// the log id, in which case the message is empty. Otherwise the message is
/// everything after the single space following the log id, minus one trailing
/// line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalMessage {
    /// The `<PRI>VERSION` tag, e.g. `<40>1`.
    pub tag: String,
    pub timestamp: DateTime<Utc>,
    pub hostname: String,
    pub application: String,
    pub process_id: String,
    pub log_id: String,
    pub message: String,
}

impl PositionalMessage {
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| DecodeError::MalformedMessage(format!("payload is not utf-8: {e}")))?;

        let mut rest = text;
        let mut header: [&str; 6] = [""; 6];
        let header_len = header.len();
        for (i, slot) in header.iter_mut().enumerate() {
            let last = i == header_len - 1;
            let (field, remainder) = next_field(rest, last).ok_or_else(|| {
                DecodeError::MalformedMessage(format!("expected 6 header fields, found {i}"))
            })?;
            *slot = field;
            rest = remainder;
        }
        let [tag, timestamp, hostname, application, process_id, log_id] = header;

        let timestamp = DateTime::parse_from_rfc3339(timestamp)?.with_timezone(&Utc);
        let message = rest.strip_prefix(' ').unwrap_or(rest);
        let message = message
            .strip_suffix("\r\n")
            .or_else(|| message.strip_suffix('\n'))
            .unwrap_or(message);

        Ok(Self {
            tag: tag.to_string(),
            timestamp,
            hostname: hostname.to_string(),
            application: application.to_string(),
            process_id: process_id.to_string(),
            log_id: log_id.to_string(),
            message: message.to_string(),
        })
    }

    /// Syslog priority from the tag, if it has the `<N>` form.
    #[must_use]
    pub fn priority(&self) -> Option<u8> {
        let inner = self.tag.strip_prefix('<')?;
        let end = inner.find('>')?;
        inner[..end].parse().ok()
    }

    /// Timestamp rendered as RFC3339 in UTC with a `Z` suffix.
    #[must_use]
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Writes every decoded field into `extracted` under the reserved keys.
    pub fn write_extracted(&self, extracted: &mut Extracted) {
        let fields = [
            (LOGPLEX_TIMESTAMP_FIELD, self.timestamp_string()),
            (LOGPLEX_HOST_FIELD, self.hostname.clone()),
            (LOGPLEX_APP_FIELD, self.application.clone()),
            (LOGPLEX_PROC_FIELD, self.process_id.clone()),
            (LOGPLEX_LOG_ID_FIELD, self.log_id.clone()),
            (LOGPLEX_MSG_FIELD, self.message.clone()),
        ];
        for (key, value) in fields {
            extracted.insert(key.to_string(), Value::String(value));
        }
    }

    /// Labels derived from the header: host, app, proc and log id.
    #[must_use]
    pub fn labels(&self) -> LabelSet {
        [
            (LOGPLEX_HOST_FIELD, self.hostname.as_str()),
            (LOGPLEX_APP_FIELD, self.application.as_str()),
            (LOGPLEX_PROC_FIELD, self.process_id.as_str()),
            (LOGPLEX_LOG_ID_FIELD, self.log_id.as_str()),
        ]
        .into_iter()
        .collect()
    }
}

/// Splits off the next space-delimited field, skipping leading spaces.
/// The returned remainder starts at the separator that ended the field.
/// The last header field may also be ended by a line break.
fn next_field(input: &str, last: bool) -> Option<(&str, &str)> {
    let trimmed = input.trim_start_matches(' ');
    if trimmed.is_empty() {
        return None;
    }
    let end = if last {
        trimmed.find([' ', '\r', '\n'])
    } else {
        trimmed.find(' ')
    }
    .unwrap_or(trimmed.len());
    let field = &trimmed[..end];
    if field.contains(['\n', '\r']) {
        return None;
    }
    Some((field, &trimmed[end..]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const STATE_CHANGE: &str =
        "<40>1 2012-11-30T06:45:29+00:00 host app web.3 - State changed from starting to up\n";

    #[test]
    fn test_parse_state_change() {
        let msg = PositionalMessage::parse(STATE_CHANGE.as_bytes()).unwrap();
        assert_eq!(msg.tag, "<40>1");
        assert_eq!(msg.priority(), Some(40));
        assert_eq!(msg.hostname, "host");
        assert_eq!(msg.application, "app");
        assert_eq!(msg.process_id, "web.3");
        assert_eq!(msg.log_id, "-");
        assert_eq!(msg.message, "State changed from starting to up");
        assert_eq!(
            msg.timestamp,
            Utc.with_ymd_and_hms(2012, 11, 30, 6, 45, 29).unwrap()
        );
        assert_eq!(msg.timestamp_string(), "2012-11-30T06:45:29Z");
    }

    #[test]
    fn test_parse_keeps_fraction_and_converts_offset() {
        let payload = b"<158>1 2022-06-13T14:52:23.622778+02:00 host heroku router - at=info";
        let msg = PositionalMessage::parse(payload).unwrap();
        assert_eq!(msg.timestamp_string(), "2022-06-13T12:52:23.622778Z");
        assert_eq!(msg.message, "at=info");
    }

    #[test]
    fn test_parse_message_keeps_inner_spacing_and_newlines() {
        let payload = b"<40>1 2012-11-30T06:45:29+00:00 host app web.3 -   indented\nsecond line\r\n";
        let msg = PositionalMessage::parse(payload).unwrap();
        assert_eq!(msg.message, "  indented\nsecond line");
    }

    #[test]
    fn test_parse_header_only_yields_empty_message() {
        let msg = PositionalMessage::parse(b"<40>1 2012-11-30T06:45:29+00:00 host app web.3 -")
            .unwrap();
        assert_eq!(msg.log_id, "-");
        assert_eq!(msg.message, "");

        for payload in [
            &b"<40>1 2012-11-30T06:45:29+00:00 host app web.3 -\n"[..],
            &b"<40>1 2012-11-30T06:45:29+00:00 host app web.3 -\r\n"[..],
        ] {
            let msg = PositionalMessage::parse(payload).unwrap();
            assert_eq!(msg.process_id, "web.3");
            assert_eq!(msg.log_id, "-");
            assert_eq!(msg.message, "");
        }
    }

    #[test]
    fn test_parse_collapses_header_space_runs() {
        let msg =
            PositionalMessage::parse(b"<40>1  2012-11-30T06:45:29Z   host app web.3 - hi").unwrap();
        assert_eq!(msg.hostname, "host");
        assert_eq!(msg.message, "hi");
    }

    #[test]
    fn test_parse_too_few_fields() {
        let err = PositionalMessage::parse(b"<40>1 2012-11-30T06:45:29+00:00 host app").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedMessage(_)));
        assert!(err.is_message_error());
        assert!(err.to_string().contains("found 4"));
    }

    #[test]
    fn test_parse_header_field_with_line_break() {
        let err = PositionalMessage::parse(b"<40>1 2012-11-30T06:45:29+00:00 host\napp web.3 - x")
            .unwrap_err();
        assert!(matches!(err, DecodeError::MalformedMessage(_)));
    }

    #[test]
    fn test_parse_bad_timestamp() {
        let err = PositionalMessage::parse(b"<40>1 yesterday host app web.3 - hello").unwrap_err();
        assert!(matches!(err, DecodeError::BadTimestamp(_)));
    }

    #[test]
    fn test_write_extracted_and_labels() {
        let msg = PositionalMessage::parse(STATE_CHANGE.as_bytes()).unwrap();

        let mut extracted = Extracted::new();
        msg.write_extracted(&mut extracted);
        assert_eq!(extracted.len(), 6);
        assert_eq!(extracted[LOGPLEX_TIMESTAMP_FIELD], "2012-11-30T06:45:29Z");
        assert_eq!(extracted[LOGPLEX_MSG_FIELD], "State changed from starting to up");

        let labels = msg.labels();
        assert_eq!(labels.len(), 4);
        assert_eq!(labels.get(LOGPLEX_PROC_FIELD), Some("web.3"));
        assert!(!labels.contains(LOGPLEX_MSG_FIELD));
    }
}
