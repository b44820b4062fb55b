pub mod cli;
pub mod daemon;

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use divergent::ResetMode;
use serde::Serialize;
use thiserror::Error;

pub use cli::*;
pub use daemon::*;

const DEFAULT_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid duration `{value}` for {setting}")]
    InvalidDuration {
        setting: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("{setting} must be greater than zero")]
    ZeroDuration { setting: &'static str },
    #[error("invalid measurement pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Fully resolved aggregator settings: command line over config file over
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatorConfig {
    #[serde(serialize_with = "serialize_duration")]
    pub period: Duration,
    pub drop_original: bool,
    pub reset_mode: ResetMode,
    #[serde(serialize_with = "serialize_optional_duration")]
    pub reset_every: Option<Duration>,
    pub namepass: Vec<String>,
    pub namedrop: Vec<String>,
    pub input: Endpoint,
    pub output: Endpoint,
    pub format: OutputFormat,
    pub precision: Precision,
}

impl AggregatorConfig {
    pub fn resolve(args: &DaemonArgs) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => load_file(path)?,
            None => FileConfig::default(),
        };

        let period = match args.period.as_deref().or(file.period.as_deref()) {
            Some(value) => parse_duration("period", value)?,
            None => DEFAULT_PERIOD,
        };
        let reset_every = args
            .reset_every
            .as_deref()
            .or(file.reset_every.as_deref())
            .map(|value| parse_duration("reset_every", value))
            .transpose()?;

        let namepass = if args.namepass.is_empty() {
            file.namepass
        } else {
            args.namepass.clone()
        };
        let namedrop = if args.namedrop.is_empty() {
            file.namedrop
        } else {
            args.namedrop.clone()
        };
        for pattern in namepass.iter().chain(namedrop.iter()) {
            glob::Pattern::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        }

        Ok(Self {
            period,
            drop_original: args.drop_original.or(file.drop_original).unwrap_or(false),
            reset_mode: args.reset_mode.or(file.reset_mode).unwrap_or_default(),
            reset_every,
            namepass,
            namedrop,
            input: Endpoint::parse(
                args.input.as_deref().or(file.input.as_deref()).unwrap_or("-"),
            ),
            output: Endpoint::parse(
                args.output.as_deref().or(file.output.as_deref()).unwrap_or("-"),
            ),
            format: args.format.or(file.format).unwrap_or_default(),
            precision: args.precision.or(file.precision).unwrap_or_default(),
        })
    }
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_duration(setting: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let duration =
        humantime::parse_duration(value).map_err(|source| ConfigError::InvalidDuration {
            setting,
            value: value.to_string(),
            source,
        })?;
    if duration.is_zero() {
        return Err(ConfigError::ZeroDuration { setting });
    }
    Ok(duration)
}

fn serialize_duration<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

fn serialize_optional_duration<S: serde::Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match duration {
        Some(duration) => serialize_duration(duration, serializer),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = AggregatorConfig::resolve(&DaemonArgs::default()).unwrap();
        assert_eq!(
            config,
            AggregatorConfig {
                period: Duration::from_secs(30),
                drop_original: false,
                reset_mode: ResetMode::Clear,
                reset_every: None,
                namepass: vec![],
                namedrop: vec![],
                input: Endpoint::Std,
                output: Endpoint::Std,
                format: OutputFormat::Influx,
                precision: Precision::Nanoseconds,
            }
        );
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "period: 1m\ndrop_original: true\nreset_mode: retain\nnamepass: [\"net*\"]\nformat: json\nprecision: s"
        )
        .unwrap();

        let args = DaemonArgs {
            config: Some(file.path().to_path_buf()),
            period: Some("15s".to_string()),
            namepass: vec!["disk*".to_string()],
            ..Default::default()
        };
        let config = AggregatorConfig::resolve(&args).unwrap();

        assert_eq!(config.period, Duration::from_secs(15));
        assert!(config.drop_original);
        assert_eq!(config.reset_mode, ResetMode::Retain);
        assert_eq!(config.namepass, vec!["disk*".to_string()]);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.precision, Precision::Seconds);
    }

    #[test]
    fn test_cli_can_disable_drop_original_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "drop_original: true").unwrap();

        let args = DaemonArgs {
            config: Some(file.path().to_path_buf()),
            drop_original: Some(false),
            ..Default::default()
        };
        assert!(!AggregatorConfig::resolve(&args).unwrap().drop_original);

        let args = DaemonArgs {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(AggregatorConfig::resolve(&args).unwrap().drop_original);
    }

    #[test]
    fn test_zero_period_is_rejected() {
        let args = DaemonArgs {
            period: Some("0s".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            AggregatorConfig::resolve(&args),
            Err(ConfigError::ZeroDuration { setting: "period" })
        ));
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        let args = DaemonArgs {
            reset_every: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            AggregatorConfig::resolve(&args),
            Err(ConfigError::InvalidDuration {
                setting: "reset_every",
                ..
            })
        ));
    }

    #[test]
    fn test_bad_pattern_is_rejected() {
        let args = DaemonArgs {
            namedrop: vec!["[unclosed".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            AggregatorConfig::resolve(&args),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let args = DaemonArgs {
            config: Some(PathBuf::from("/nonexistent/divergent.yaml")),
            ..Default::default()
        };
        assert!(matches!(
            AggregatorConfig::resolve(&args),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_serializes_durations_readably() {
        let config = AggregatorConfig::resolve(&DaemonArgs {
            reset_every: Some("1h".to_string()),
            ..Default::default()
        })
        .unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("period: 30s"));
        assert!(yaml.contains("reset_every: 1h"));
        assert!(yaml.contains("input: '-'") || yaml.contains("input: \"-\""));
    }
}
