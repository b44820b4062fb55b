//! Line protocol decoding into [`Sample`]s.

use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::DateTime;
use chrono::Utc;
use divergent::FieldValue;
use divergent::Sample;
use influxdb_line_protocol::FieldValue as LineFieldValue;
use thiserror::Error;

use crate::config::Precision;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed line protocol")]
    Parse(#[from] influxdb_line_protocol::Error),
    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(i64),
}

/// Decodes one line of line protocol.
///
/// Blank lines and comments yield `Ok(None)`. A line without a timestamp is
/// stamped with `now`.
pub fn parse_line(
    line: &str,
    precision: Precision,
    now: DateTime<Utc>,
) -> Result<Option<Sample>, IngestError> {
    let Some(parsed) = influxdb_line_protocol::parse_lines(line).next() else {
        return Ok(None);
    };
    let parsed = parsed?;

    let tags: BTreeMap<String, String> = parsed
        .series
        .tag_set
        .as_ref()
        .map(|set| {
            set.iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let fields: HashMap<String, FieldValue> = parsed
        .field_set
        .iter()
        .map(|(key, value)| (key.to_string(), convert_field(value)))
        .collect();

    let timestamp = match parsed.timestamp {
        Some(raw) => precision
            .to_datetime(raw)
            .ok_or(IngestError::TimestampOutOfRange(raw))?,
        None => now,
    };

    Ok(Some(Sample::new(
        parsed.series.measurement.to_string(),
        tags,
        fields,
        timestamp,
    )))
}

fn convert_field(value: &LineFieldValue<'_>) -> FieldValue {
    match value {
        LineFieldValue::I64(i) => FieldValue::Integer(*i),
        LineFieldValue::U64(u) => FieldValue::UnsignedInteger(*u),
        LineFieldValue::F64(f) => FieldValue::Float(*f),
        LineFieldValue::String(s) => FieldValue::String(s.to_string()),
        LineFieldValue::Boolean(b) => FieldValue::Boolean(*b),
    }
}
