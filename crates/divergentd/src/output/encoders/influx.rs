use std::collections::BTreeMap;

use influxdb_line_protocol::LineProtocolBuilder;

use super::MetricsEncoder;

/// InfluxDB line protocol encoder
#[derive(Debug, Default)]
pub struct InfluxEncoder;

impl InfluxEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsEncoder for InfluxEncoder {
    fn encode_metrics(
        &self,
        measurement: &str,
        tags: &BTreeMap<String, String>,
        fields: &BTreeMap<String, f64>,
        timestamp: i64,
    ) -> String {
        let mut builder = LineProtocolBuilder::new().measurement(measurement);

        for (key, value) in tags {
            builder = builder.tag(key, value);
        }

        // The first field moves the builder into its AfterField state.
        let mut entries = fields.iter();
        let Some((first_key, first_value)) = entries.next() else {
            tracing::debug!(measurement, "no fields to encode");
            return String::new();
        };
        let mut after_first_field = builder.field(first_key, *first_value);
        for (key, value) in entries {
            after_first_field = after_first_field.field(key, *value);
        }

        let built = after_first_field.timestamp(timestamp).close_line().build();
        String::from_utf8(built).unwrap_or_else(|e| {
            tracing::error!(measurement, "encoded line is not valid UTF-8: {e}");
            String::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_divergence_record() {
        let encoder = InfluxEncoder::new();
        let tags = BTreeMap::from([
            ("host".to_string(), "server1".to_string()),
            ("ifName".to_string(), "eth0".to_string()),
        ]);
        let fields = BTreeMap::from([
            ("rx_divergent".to_string(), 12.5),
            ("tx_divergent".to_string(), -3.25),
        ]);

        let result = encoder.encode_metrics("net", &tags, &fields, 1609459200000000000);

        assert_eq!(
            result,
            "net,host=server1,ifName=eth0 rx_divergent=12.5,tx_divergent=-3.25 1609459200000000000\n"
        );
    }

    #[test]
    fn test_encode_no_tags() {
        let encoder = InfluxEncoder::new();
        let fields = BTreeMap::from([("value_divergent".to_string(), 42.0)]);

        let result = encoder.encode_metrics("simple", &BTreeMap::new(), &fields, 1234567890);

        assert!(result.starts_with("simple value_divergent=42"));
        assert!(!result.contains(','));
    }

    #[test]
    fn test_encode_empty_fields_yields_nothing() {
        let encoder = InfluxEncoder::new();
        let tags = BTreeMap::from([("service".to_string(), "test".to_string())]);

        let result = encoder.encode_metrics("empty", &tags, &BTreeMap::new(), 1234567890);

        assert!(result.is_empty());
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let encoder = InfluxEncoder::new();
        let tags = BTreeMap::from([("mount".to_string(), "Program Files".to_string())]);
        let fields = BTreeMap::from([("bytes read_divergent".to_string(), 1.0)]);

        let result = encoder.encode_metrics("disk io", &tags, &fields, 1);

        assert!(result.starts_with("disk\\ io,mount=Program\\ Files "));
        assert!(result.contains("bytes\\ read_divergent=1"));
    }

    #[test]
    fn test_field_ordering_is_sorted() {
        let encoder = InfluxEncoder::new();
        let fields = BTreeMap::from([
            ("z_divergent".to_string(), 1.0),
            ("a_divergent".to_string(), 2.0),
            ("m_divergent".to_string(), 3.0),
        ]);

        let result = encoder.encode_metrics("ordering", &BTreeMap::new(), &fields, 1);

        let a_pos = result.find("a_divergent").unwrap();
        let m_pos = result.find("m_divergent").unwrap();
        let z_pos = result.find("z_divergent").unwrap();
        assert!(a_pos < m_pos);
        assert!(m_pos < z_pos);
    }
}
