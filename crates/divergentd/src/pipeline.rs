//! The host loops around the divergence cache: ingest, periodic flush and
//! periodic reset.

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use divergent::SharedDivergenceCache;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::Precision;
use crate::filter::MeasurementFilter;
use crate::ingest::parse_line;
use crate::output::MetricsEncoder;
use crate::output::SharedSink;

/// Counters reported when the ingest loop ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: u64,
    pub aggregated: u64,
    pub passed_through: u64,
    pub malformed: u64,
}

/// Everything the ingest loop needs to route one input line.
#[derive(Clone)]
pub struct IngestContext {
    pub cache: SharedDivergenceCache,
    pub sink: SharedSink,
    pub filter: Arc<MeasurementFilter>,
    pub drop_original: bool,
    pub precision: Precision,
}

impl IngestContext {
    /// Parses a line, feeds selected samples to the cache and forwards the
    /// original unless it was aggregated with `drop_original` set.
    pub fn process_line(&self, line: &str, stats: &mut IngestStats) {
        stats.lines += 1;
        let sample = match parse_line(line, self.precision, Utc::now()) {
            Ok(Some(sample)) => sample,
            Ok(None) => return,
            Err(e) => {
                stats.malformed += 1;
                tracing::warn!(error = %e, line, "skipping malformed input line");
                return;
            }
        };

        let selected = self.filter.matches(sample.name());
        if selected {
            self.cache.ingest(&sample);
            stats.aggregated += 1;
        }

        if !selected || !self.drop_original {
            let result = self.sink.lock().expect("poisoned").write_line(line);
            match result {
                Ok(()) => stats.passed_through += 1,
                Err(e) => tracing::error!("Failed to pass through sample: {e}"),
            }
        }
    }
}

/// Reads line protocol until end of input or cancellation.
pub async fn run_ingest<R>(
    reader: R,
    ctx: IngestContext,
    cancellation_token: CancellationToken,
) -> IngestStats
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IngestStats::default();
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                tracing::info!("Ingest shutdown requested");
                break;
            }
            next = lines.next_line() => {
                match next {
                    Ok(Some(line)) => ctx.process_line(&line, &mut stats),
                    Ok(None) => {
                        tracing::info!("Input exhausted");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read input: {e}");
                        break;
                    }
                }
            }
        }
    }

    if let Err(e) = ctx.sink.lock().expect("poisoned").flush() {
        tracing::error!("Failed to flush output: {e}");
    }
    tracing::info!(
        lines = stats.lines,
        aggregated = stats.aggregated,
        passed_through = stats.passed_through,
        malformed = stats.malformed,
        "Ingest loop stopped"
    );
    stats
}

/// Flushes the cache once and writes the encoded aggregates, stamped with
/// `now`. Returns the number of records emitted.
pub fn flush_once(
    cache: &SharedDivergenceCache,
    encoder: &dyn MetricsEncoder,
    sink: &SharedSink,
    precision: Precision,
    now: DateTime<Utc>,
) -> usize {
    let records = cache.flush();
    let timestamp = precision.from_datetime(now);

    let mut sink = sink.lock().expect("poisoned");
    for record in &records {
        if let Err(e) = sink.write_line(&encoder.encode_record(record, timestamp)) {
            tracing::error!(series = %record.name, "Failed to write aggregate: {e}");
        }
    }
    if let Err(e) = sink.flush() {
        tracing::error!("Failed to flush output: {e}");
    }

    tracing::debug!(records = records.len(), "Emitted divergence aggregates");
    records.len()
}

/// Flushes every `period`, plus once more on cancellation so the last partial
/// window is emitted.
pub async fn run_flush(
    cache: SharedDivergenceCache,
    encoder: Arc<dyn MetricsEncoder>,
    sink: SharedSink,
    period: Duration,
    precision: Precision,
    cancellation_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    interval.tick().await;

    tracing::info!("Starting divergence flush with period: {:?}", period);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                flush_once(&cache, encoder.as_ref(), &sink, precision, Utc::now());
                tracing::info!("Divergence flush shutdown requested");
                break;
            }
            _ = interval.tick() => {
                flush_once(&cache, encoder.as_ref(), &sink, precision, Utc::now());
            }
        }
    }
}

/// Resets the cache every `every` until cancelled.
pub async fn run_reset(
    cache: SharedDivergenceCache,
    every: Duration,
    cancellation_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                tracing::info!("Divergence reset shutdown requested");
                break;
            }
            _ = interval.tick() => {
                tracing::info!(series = cache.len(), "Resetting divergence cache");
                cache.reset();
            }
        }
    }
}
