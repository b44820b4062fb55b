//! Streaming divergence aggregation.
//!
//! Tracks, per series and per numeric field, the value at the start and end
//! of the current window and emits `(end - start) / elapsed_seconds` as
//! `<field>_divergent` on every flush. Flushing re-anchors each window at its
//! end, so consecutive periods tile the stream without gaps.
//!
//! - [`Sample`]: an incoming measurement with its series fingerprint
//! - [`DivergenceCache`]: the single-owner aggregation state
//! - [`SharedDivergenceCache`]: a mutex-guarded handle for multi-task hosts

mod cache;
mod fingerprint;
mod sample;
mod shared;

pub use cache::{
    AggregateRecord, DivergenceCache, FieldStat, ResetMode, SeriesAggregate, DIVERGENT_SUFFIX,
};
pub use fingerprint::fingerprint;
pub use sample::{FieldValue, Sample, SampleBuilder};
pub use shared::SharedDivergenceCache;
