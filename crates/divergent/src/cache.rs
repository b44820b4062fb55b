use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;

use crate::sample::Sample;

/// Suffix appended to a field name in emitted aggregates.
pub const DIVERGENT_SUFFIX: &str = "_divergent";

/// Window bookkeeping for a single field of a series.
///
/// `min` is the value at the start of the current window and `max` the most
/// recently observed value; neither is a statistical extremum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStat {
    pub min: f64,
    pub min_ts: DateTime<Utc>,
    pub max: f64,
    pub max_ts: DateTime<Utc>,
}

impl FieldStat {
    fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            min: value,
            min_ts: timestamp,
            max: value,
            max_ts: timestamp,
        }
    }

    fn observe(&mut self, value: f64, timestamp: DateTime<Utc>) {
        self.max = value;
        self.max_ts = timestamp;
    }

    /// Window length in seconds. Negative when the window end arrived with an
    /// earlier timestamp than its start.
    pub fn elapsed_seconds(&self) -> f64 {
        let delta = self.max_ts - self.min_ts;
        match delta.num_nanoseconds() {
            Some(nanos) => nanos as f64 / 1e9,
            None => delta.num_milliseconds() as f64 / 1e3,
        }
    }

    /// Rate of change over the window, or `None` when the window is empty or
    /// inverted, or the rate is not finite.
    pub fn rate(&self) -> Option<f64> {
        let elapsed = self.elapsed_seconds();
        if elapsed <= 0.0 {
            return None;
        }
        let rate = (self.max - self.min) / elapsed;
        rate.is_finite().then_some(rate)
    }

    fn reanchor(&mut self) {
        self.min = self.max;
        self.min_ts = self.max_ts;
    }
}

/// Tracked state of one series.
#[derive(Debug, Clone)]
pub struct SeriesAggregate {
    name: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldStat>,
}

impl SeriesAggregate {
    fn new(name: &str, tags: &BTreeMap<String, String>) -> Self {
        Self {
            name: name.to_string(),
            tags: tags.clone(),
            fields: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldStat> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldStat> {
        self.fields.get(name)
    }
}

/// A derived record produced by [`DivergenceCache::flush`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
}

/// What [`DivergenceCache::reset`] does with tracked series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetMode {
    /// Forget every series; the next sample starts a fresh window.
    #[default]
    Clear,
    /// Keep all series and windows across resets.
    Retain,
}

impl fmt::Display for ResetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetMode::Clear => write!(f, "clear"),
            ResetMode::Retain => write!(f, "retain"),
        }
    }
}

impl FromStr for ResetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clear" => Ok(ResetMode::Clear),
            "retain" => Ok(ResetMode::Retain),
            other => Err(format!("unknown reset mode `{other}`, expected `clear` or `retain`")),
        }
    }
}

/// Per-series, per-field divergence tracker.
///
/// Not synchronized; callers serialize `ingest`, `flush` and `reset`, or use
/// [`SharedDivergenceCache`](crate::SharedDivergenceCache).
#[derive(Debug, Default)]
pub struct DivergenceCache {
    series: HashMap<u64, SeriesAggregate>,
    reset_mode: ResetMode,
}

impl DivergenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reset_mode(reset_mode: ResetMode) -> Self {
        Self {
            series: HashMap::new(),
            reset_mode,
        }
    }

    pub fn reset_mode(&self) -> ResetMode {
        self.reset_mode
    }

    /// Number of tracked series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn series(&self, fingerprint: u64) -> Option<&SeriesAggregate> {
        self.series.get(&fingerprint)
    }

    /// Records the numeric fields of `sample`.
    ///
    /// The first observation of a field opens its window; later observations
    /// move the window end regardless of value or timestamp ordering. A sample
    /// without numeric fields leaves the cache untouched.
    pub fn ingest(&mut self, sample: &Sample) {
        let mut numeric = sample
            .fields()
            .iter()
            .filter_map(|(field, value)| value.as_f64().map(|v| (field, v)))
            .peekable();
        if numeric.peek().is_none() {
            tracing::trace!(
                series = sample.name(),
                "sample carries no numeric fields, skipping"
            );
            return;
        }

        let timestamp = sample.timestamp();
        let series = self
            .series
            .entry(sample.fingerprint())
            .or_insert_with(|| {
                tracing::debug!(
                    series = sample.name(),
                    fingerprint = sample.fingerprint(),
                    "tracking new series"
                );
                SeriesAggregate::new(sample.name(), sample.tags())
            });

        for (field, value) in numeric {
            match series.fields.get_mut(field) {
                Some(stat) => stat.observe(value, timestamp),
                None => {
                    tracing::debug!(series = %series.name, field = %field, "tracking new field");
                    series
                        .fields
                        .insert(field.clone(), FieldStat::new(value, timestamp));
                }
            }
        }
    }

    /// Emits the divergence rate of every tracked field and re-anchors each
    /// window at its current end.
    ///
    /// Fields whose window is empty or inverted are re-anchored but not
    /// emitted. Series with nothing to emit produce no record. Records are
    /// ordered by name, then tags.
    pub fn flush(&mut self) -> Vec<AggregateRecord> {
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for series in self.series.values_mut() {
            let mut fields = BTreeMap::new();
            for (field, stat) in series.fields.iter_mut() {
                match stat.rate() {
                    Some(rate) => {
                        fields.insert(format!("{field}{DIVERGENT_SUFFIX}"), rate);
                    }
                    None => {
                        skipped += 1;
                        tracing::trace!(
                            series = %series.name,
                            field = %field,
                            elapsed = stat.elapsed_seconds(),
                            "no finite rate for window, not emitting"
                        );
                    }
                }
                stat.reanchor();
            }

            if !fields.is_empty() {
                records.push(AggregateRecord {
                    name: series.name.clone(),
                    tags: series.tags.clone(),
                    fields,
                });
            }
        }

        records.sort_by(|a, b| (&a.name, &a.tags).cmp(&(&b.name, &b.tags)));
        tracing::debug!(
            series = self.series.len(),
            records = records.len(),
            skipped_fields = skipped,
            "flushed divergence cache"
        );
        records
    }

    /// Ends a collection epoch according to the configured [`ResetMode`].
    pub fn reset(&mut self) {
        match self.reset_mode {
            ResetMode::Clear => {
                tracing::debug!(series = self.series.len(), "clearing divergence cache");
                self.series.clear();
            }
            ResetMode::Retain => {
                tracing::trace!(series = self.series.len(), "retaining divergence cache");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn sample(name: &str, field: &str, value: f64, secs: i64) -> Sample {
        Sample::builder(name)
            .tag("foo", "bar")
            .field(field, value)
            .timestamp(t0() + Duration::seconds(secs))
            .build()
    }

    #[test]
    fn test_first_sample_opens_window() {
        let mut cache = DivergenceCache::new();
        let s = sample("m1", "a", 5.0, 0);
        cache.ingest(&s);

        let stat = cache.series(s.fingerprint()).unwrap().field("a").unwrap();
        assert_eq!(*stat, FieldStat::new(5.0, t0()));
    }

    #[test]
    fn test_later_sample_moves_only_window_end() {
        let mut cache = DivergenceCache::new();
        cache.ingest(&sample("m1", "a", 5.0, 0));
        let s = sample("m1", "a", 1.0, 4);
        cache.ingest(&s);

        let stat = cache.series(s.fingerprint()).unwrap().field("a").unwrap();
        assert_eq!(stat.min, 5.0);
        assert_eq!(stat.min_ts, t0());
        assert_eq!(stat.max, 1.0);
        assert_eq!(stat.max_ts, t0() + Duration::seconds(4));
        assert_eq!(stat.rate(), Some(-1.0));
    }

    #[test]
    fn test_inverted_window_is_skipped_and_reanchored() {
        let mut cache = DivergenceCache::new();
        cache.ingest(&sample("m1", "a", 1.0, 10));
        let late = sample("m1", "a", 9.0, 2);
        cache.ingest(&late);

        let stat = cache.series(late.fingerprint()).unwrap().field("a").unwrap();
        assert_eq!(stat.elapsed_seconds(), -8.0);
        assert!(cache.flush().is_empty());

        let stat = cache.series(late.fingerprint()).unwrap().field("a").unwrap();
        assert_eq!(stat.min, 9.0);
        assert_eq!(stat.min_ts, stat.max_ts);
    }

    #[test]
    fn test_overflowing_rate_is_skipped_and_reanchored() {
        let mut cache = DivergenceCache::new();
        cache.ingest(&sample("m1", "a", -1.7e308, 0));
        let s = sample("m1", "a", 1.7e308, 1);
        cache.ingest(&s);

        assert!(cache.flush().is_empty());
        let stat = cache.series(s.fingerprint()).unwrap().field("a").unwrap();
        assert_eq!(stat.min, 1.7e308);
        assert_eq!(stat.min_ts, stat.max_ts);

        cache.ingest(&sample("m1", "a", 1.7e308, 3));
        let records = cache.flush();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields["a_divergent"], 0.0);
    }

    #[test]
    fn test_nan_value_is_not_emitted() {
        let mut cache = DivergenceCache::new();
        cache.ingest(&sample("m1", "a", 1.0, 0));
        cache.ingest(&sample("m1", "a", f64::NAN, 2));
        assert!(cache.flush().is_empty());
    }

    #[test]
    fn test_single_observation_emits_nothing() {
        let mut cache = DivergenceCache::new();
        cache.ingest(&sample("m1", "a", 1.0, 0));
        assert!(cache.flush().is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reset_clear_forgets_series() {
        let mut cache = DivergenceCache::new();
        assert_eq!(cache.reset_mode(), ResetMode::Clear);
        cache.ingest(&sample("m1", "a", 1.0, 0));
        cache.reset();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reset_retain_keeps_windows() {
        let mut cache = DivergenceCache::with_reset_mode(ResetMode::Retain);
        cache.ingest(&sample("m1", "a", 1.0, 0));
        cache.reset();
        cache.ingest(&sample("m1", "a", 3.0, 2));

        let records = cache.flush();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields["a_divergent"], 1.0);
    }

    #[test]
    fn test_reset_mode_parsing() {
        assert_eq!("clear".parse::<ResetMode>(), Ok(ResetMode::Clear));
        assert_eq!("RETAIN".parse::<ResetMode>(), Ok(ResetMode::Retain));
        assert!("forever".parse::<ResetMode>().is_err());
        assert_eq!(ResetMode::Retain.to_string(), "retain");
    }

    #[test]
    fn test_records_are_ordered_by_name_then_tags() {
        let mut cache = DivergenceCache::new();
        for name in ["zeta", "alpha", "mid"] {
            cache.ingest(&sample(name, "a", 0.0, 0));
            cache.ingest(&sample(name, "a", 1.0, 1));
        }
        let names: Vec<_> = cache.flush().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
