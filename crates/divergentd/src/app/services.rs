use std::sync::Arc;

use divergent::SharedDivergenceCache;

use crate::filter::MeasurementFilter;
use crate::output::MetricsEncoder;
use crate::output::SharedSink;

/// Application dependencies - simple struct with shared handles
pub struct ApplicationServices {
    pub cache: SharedDivergenceCache,
    pub filter: Arc<MeasurementFilter>,
    pub encoder: Arc<dyn MetricsEncoder>,
    pub sink: SharedSink,
}
