use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use clap::Parser;
use clap::ValueEnum;
use divergent::ResetMode;
use serde::Deserialize;
use serde::Serialize;

/// Output encoding for emitted aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Influx,
    Json,
}

/// Timestamp precision of line protocol input and output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
pub enum Precision {
    #[default]
    #[value(name = "ns")]
    #[serde(rename = "ns")]
    Nanoseconds,
    #[value(name = "us")]
    #[serde(rename = "us")]
    Microseconds,
    #[value(name = "ms")]
    #[serde(rename = "ms")]
    Milliseconds,
    #[value(name = "s")]
    #[serde(rename = "s")]
    Seconds,
}

impl Precision {
    /// Interprets a raw line protocol timestamp.
    pub fn to_datetime(self, raw: i64) -> Option<DateTime<Utc>> {
        match self {
            Precision::Nanoseconds => Some(DateTime::from_timestamp_nanos(raw)),
            Precision::Microseconds => DateTime::from_timestamp_micros(raw),
            Precision::Milliseconds => DateTime::from_timestamp_millis(raw),
            Precision::Seconds => DateTime::from_timestamp(raw, 0),
        }
    }

    /// Renders a timestamp in this precision; saturates past year 2262 in
    /// nanosecond mode.
    pub fn from_datetime(self, timestamp: DateTime<Utc>) -> i64 {
        match self {
            Precision::Nanoseconds => timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX),
            Precision::Microseconds => timestamp.timestamp_micros(),
            Precision::Milliseconds => timestamp.timestamp_millis(),
            Precision::Seconds => timestamp.timestamp(),
        }
    }
}

/// Input source or output destination; `-` selects stdin/stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Std,
    Path(PathBuf),
}

impl Endpoint {
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            Endpoint::Std
        } else {
            Endpoint::Path(PathBuf::from(value))
        }
    }
}

impl Serialize for Endpoint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Endpoint::Std => serializer.serialize_str("-"),
            Endpoint::Path(path) => serializer.serialize_str(&path.to_string_lossy()),
        }
    }
}

/// Aggregator settings read from `--config`. Every value is optional; the
/// command line takes precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct FileConfig {
    pub period: Option<String>,
    pub drop_original: Option<bool>,
    pub reset_mode: Option<ResetMode>,
    pub reset_every: Option<String>,
    pub namepass: Vec<String>,
    pub namedrop: Vec<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub format: Option<OutputFormat>,
    pub precision: Option<Precision>,
}

#[derive(Parser, Clone, Debug, Default)]
pub struct DaemonArgs {
    #[arg(
        long,
        env = "DIVERGENT_CONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "YAML file with aggregator settings, e.g. /etc/divergent/config.yaml"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "DIVERGENT_PERIOD",
        help = "Flush period, e.g. 30s or 1m [default: 30s]"
    )]
    pub period: Option<String>,

    #[arg(
        long,
        env = "DIVERGENT_DROP_ORIGINAL",
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Do not pass aggregated input samples through to the output; \
                `--drop-original=false` overrides the config file [default: false]"
    )]
    pub drop_original: Option<bool>,

    #[arg(
        long,
        help = "What a reset does with tracked series: clear or retain [default: clear]"
    )]
    pub reset_mode: Option<ResetMode>,

    #[arg(
        long,
        help = "Reset the cache on this cadence, e.g. 1h; never when unset"
    )]
    pub reset_every: Option<String>,

    #[arg(
        long,
        help = "Glob a measurement must match to be aggregated; repeatable"
    )]
    pub namepass: Vec<String>,

    #[arg(
        long,
        help = "Glob excluding measurements from aggregation; repeatable"
    )]
    pub namedrop: Vec<String>,

    #[arg(
        long,
        value_hint = clap::ValueHint::FilePath,
        help = "Line protocol input file, - for stdin [default: -]"
    )]
    pub input: Option<String>,

    #[arg(
        long,
        value_hint = clap::ValueHint::FilePath,
        help = "Output file (rotated daily), - for stdout [default: -]"
    )]
    pub output: Option<String>,

    #[arg(long, value_enum, help = "Encoding of emitted aggregates [default: influx]")]
    pub format: Option<OutputFormat>,

    #[arg(long, value_enum, help = "Timestamp precision of input and output [default: ns]")]
    pub precision: Option<Precision>,
}
