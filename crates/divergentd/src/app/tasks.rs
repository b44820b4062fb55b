use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use tokio::io::AsyncBufRead;
use tokio::io::BufReader;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::core::Application;
use crate::config::Endpoint;
use crate::pipeline;
use crate::pipeline::IngestContext;

/// Task manager, responsible for starting and managing all background tasks
pub struct Tasks {
    pub tasks: Vec<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start all background tasks
    pub async fn spawn_all_tasks(&mut self, app: &Application) -> Result<()> {
        let reader = open_input(&app.config().input).await?;

        let flush_task = self.spawn_flush_task(app);
        self.tasks.push(flush_task);

        if let Some(every) = app.config().reset_every {
            let reset_task = self.spawn_reset_task(app, every);
            self.tasks.push(reset_task);
        }

        // Spawned last so no input is read before the flusher is running.
        let ingest_task = self.spawn_ingest_task(app, reader);
        self.tasks.push(ingest_task);

        Ok(())
    }

    /// wait for end of input or a shutdown signal, then stop every task
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        let signal_handler = {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                let mut sigint = signal(SignalKind::interrupt())?;

                tokio::spawn(async move {
                    tokio::select! {
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating graceful shutdown");
                        }
                        _ = sigint.recv() => {
                            tracing::info!("Received SIGINT, initiating graceful shutdown");
                        }
                    }
                })
            }
            #[cfg(not(unix))]
            {
                tokio::spawn(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl+C: {e}");
                        return;
                    }
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                })
            }
        };

        tokio::select! {
            _ = signal_handler => {
                tracing::info!("Shutdown signal received, cancelling all tasks");
            }
            _ = self.cancellation_token.cancelled() => {
                tracing::info!("Input finished, stopping remaining tasks");
            }
        }
        self.cancellation_token.cancel();

        self.wait_for_tasks_with_timeout(Duration::from_secs(30)).await;
        Ok(())
    }

    async fn wait_for_tasks_with_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            for task in &mut self.tasks {
                if let Err(e) = task.await {
                    tracing::error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("Task shutdown timed out after {:?}", timeout);
        });
    }

    fn spawn_ingest_task(
        &self,
        app: &Application,
        reader: Box<dyn AsyncBufRead + Unpin + Send>,
    ) -> JoinHandle<()> {
        let services = app.services();
        let ctx = IngestContext {
            cache: services.cache.clone(),
            sink: services.sink.clone(),
            filter: services.filter.clone(),
            drop_original: app.config().drop_original,
            precision: app.config().precision,
        };
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            tracing::info!("Starting ingest task");
            pipeline::run_ingest(reader, ctx, token.clone()).await;
            // End of input ends the run; the flush task emits the last window.
            token.cancel();
            tracing::info!("Ingest task completed");
        })
    }

    fn spawn_flush_task(&self, app: &Application) -> JoinHandle<()> {
        let services = app.services();
        let cache = services.cache.clone();
        let encoder = services.encoder.clone();
        let sink = services.sink.clone();
        let period = app.config().period;
        let precision = app.config().precision;
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            tracing::info!("Starting flush task");
            pipeline::run_flush(cache, encoder, sink, period, precision, token).await;
            tracing::info!("Flush task completed");
        })
    }

    fn spawn_reset_task(&self, app: &Application, every: Duration) -> JoinHandle<()> {
        let cache = app.services().cache.clone();
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            tracing::info!("Starting reset task");
            pipeline::run_reset(cache, every, token).await;
            tracing::info!("Reset task completed");
        })
    }
}

async fn open_input(input: &Endpoint) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match input {
        Endpoint::Std => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
        Endpoint::Path(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open input file {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}
