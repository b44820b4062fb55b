use glob::Pattern;

use crate::config::ConfigError;

/// Selects which measurements feed the divergence cache.
///
/// A measurement is selected when it matches any `namepass` pattern (or
/// `namepass` is empty) and matches no `namedrop` pattern.
#[derive(Debug, Clone, Default)]
pub struct MeasurementFilter {
    pass: Vec<Pattern>,
    drop: Vec<Pattern>,
}

impl MeasurementFilter {
    pub fn new(namepass: &[String], namedrop: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            pass: compile(namepass)?,
            drop: compile(namedrop)?,
        })
    }

    pub fn matches(&self, measurement: &str) -> bool {
        let passed = self.pass.is_empty() || self.pass.iter().any(|p| p.matches(measurement));
        passed && !self.drop.iter().any(|p| p.matches(measurement))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}
