// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The unit of data flowing through a [`Pipeline`](crate::pipeline::Pipeline).
//!
//! A [`Record`] carries the raw line, the fields extracted so far, the label
//! set used for routing, and a timestamp. Stages take a record by value and
//! hand it back (or drop it), so exactly one stage unit owns a record at any
//! point in time.

use std::collections::{btree_map, BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields extracted by stages, keyed by field name.
pub type Extracted = HashMap<String, Value>;

/// A set of label name/value pairs. Inserting an existing name replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets `name` to `value`, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Returns a new set holding `self` overlaid with `other`; `other` wins on collisions.
    #[must_use]
    pub fn merge(&self, other: &LabelSet) -> LabelSet {
        let mut merged = self.clone();
        merged.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

impl Extend<(String, String)> for LabelSet {
    fn extend<T: IntoIterator<Item = (String, String)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}=\"{value}\"")?;
        }
        write!(f, "}}")
    }
}

/// One log line plus everything stages have learned about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub line: String,
    pub extracted: Extracted,
    pub labels: LabelSet,
    pub timestamp: DateTime<Utc>,
}

impl Record {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            extracted: Extracted::new(),
            labels: LabelSet::new(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = labels;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Looks up an extracted field and renders it as a string.
    #[must_use]
    pub fn extracted_string(&self, key: &str) -> Option<String> {
        self.extracted.get(key).and_then(value_to_string)
    }

    /// Resolves the text a stage should read: the named extracted field, or the line.
    ///
    /// Returns `None` when a source is named but missing or null.
    #[must_use]
    pub fn source_text(&self, source: Option<&str>) -> Option<String> {
        match source {
            Some(key) => self.extracted_string(key),
            None => Some(self.line.clone()),
        }
    }
}

/// Label names follow the usual `[a-zA-Z_][a-zA-Z0-9_]*` shape.
#[must_use]
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders an extracted value as label/line text. Null has no text form.
#[must_use]
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
