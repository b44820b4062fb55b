use std::collections::BTreeMap;

use divergent::AggregateRecord;

use crate::config::OutputFormat;

pub mod influx;
pub mod json;

/// Trait for encoding aggregate records into different formats
pub trait MetricsEncoder: Send + Sync {
    /// Encode one line with measurement name, tags, fields, and timestamp.
    /// Returns an empty string when there is nothing to encode.
    fn encode_metrics(
        &self,
        measurement: &str,
        tags: &BTreeMap<String, String>,
        fields: &BTreeMap<String, f64>,
        timestamp: i64,
    ) -> String;

    /// Encode a flushed aggregate (convenience method)
    fn encode_record(&self, record: &AggregateRecord, timestamp: i64) -> String {
        self.encode_metrics(&record.name, &record.tags, &record.fields, timestamp)
    }
}

/// Factory function to create encoders based on the configured format
pub fn create_encoder(format: OutputFormat) -> Box<dyn MetricsEncoder> {
    match format {
        OutputFormat::Json => Box::new(json::JsonEncoder::new()),
        OutputFormat::Influx => Box::new(influx::InfluxEncoder::new()),
    }
}
