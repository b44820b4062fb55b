use std::sync::Arc;

use anyhow::Result;
use divergent::SharedDivergenceCache;

use crate::app::Application;
use crate::app::ApplicationServices;
use crate::config::AggregatorConfig;
use crate::filter::MeasurementFilter;
use crate::output::create_encoder;
use crate::output::Sink;

/// Application builder
pub struct ApplicationBuilder {
    config: AggregatorConfig,
}

impl ApplicationBuilder {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Build complete application
    pub fn build(self) -> Result<Application> {
        tracing::info!("Building application components...");

        let filter = MeasurementFilter::new(&self.config.namepass, &self.config.namedrop)?;
        let sink = Sink::open(&self.config.output)?;

        let services = ApplicationServices {
            cache: SharedDivergenceCache::with_reset_mode(self.config.reset_mode),
            filter: Arc::new(filter),
            encoder: Arc::from(create_encoder(self.config.format)),
            sink: sink.shared(),
        };

        Ok(Application::new(services, self.config))
    }
}
