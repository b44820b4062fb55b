use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::DateTime;
use chrono::Utc;

use crate::fingerprint::fingerprint;

/// Represents a field value carried by an incoming sample
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    UnsignedInteger(u64),
    Float(f64),
    Boolean(bool),
}

impl FieldValue {
    /// Converts numeric variants to `f64`.
    ///
    /// Strings and booleans are not numeric and yield `None`; callers skip them.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::UnsignedInteger(u) => Some(*u as f64),
            FieldValue::String(_) | FieldValue::Boolean(_) => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::UnsignedInteger(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// A single timestamped measurement belonging to one series.
///
/// The fingerprint is derived from the name and tag set when the sample is
/// constructed, so two samples of the same series always share it.
#[derive(Debug, Clone)]
pub struct Sample {
    name: String,
    tags: BTreeMap<String, String>,
    fields: HashMap<String, FieldValue>,
    timestamp: DateTime<Utc>,
    fingerprint: u64,
}

impl Sample {
    pub fn new(
        name: impl Into<String>,
        tags: BTreeMap<String, String>,
        fields: HashMap<String, FieldValue>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let name = name.into();
        let fingerprint = fingerprint(&name, &tags);
        Self {
            name,
            tags,
            fields,
            timestamp,
            fingerprint,
        }
    }

    pub fn builder(name: impl Into<String>) -> SampleBuilder {
        SampleBuilder {
            name: name.into(),
            tags: BTreeMap::new(),
            fields: HashMap::new(),
            timestamp: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &HashMap<String, FieldValue> {
        &self.fields
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

pub struct SampleBuilder {
    name: String,
    tags: BTreeMap<String, String>,
    fields: HashMap<String, FieldValue>,
    timestamp: Option<DateTime<Utc>>,
}

impl SampleBuilder {
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Builds the sample, stamping it with the current time if none was set.
    pub fn build(self) -> Sample {
        Sample::new(
            self.name,
            self.tags,
            self.fields,
            self.timestamp.unwrap_or_else(Utc::now),
        )
    }
}
