//! Scheduler - 1 回の同期を走らせる入口
//!
//! 構築時に設定・カタログ・初期タスクを検証し、`run()` でループを回す。
//! `run()` は `Done` に到達するか、致命的な失敗が出るまで戻らない。

use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, info, info_span};

use super::bootstrap::default_sequence;
use super::builder::{BuildError, SchedulerBuilder, validate};
use super::config::SchedulerConfig;
use super::dispatch_loop::DispatchLoop;
use super::report::RunReport;
use crate::domain::{RunId, SchedulerError, StreamCatalog, Task};
use crate::ports::{RecordSource, StandardDestination};

/// A scheduler ready to run one sync.
pub struct Scheduler {
    config: SchedulerConfig,
    catalog: Arc<StreamCatalog>,
    source: Arc<dyn RecordSource>,
    initial: Task,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Scheduler seeded with a caller-built initial task.
    pub fn new(
        config: SchedulerConfig,
        catalog: StreamCatalog,
        source: Arc<dyn RecordSource>,
        initial: Task,
    ) -> Result<Self, BuildError> {
        validate(&config, &catalog, &initial)?;
        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            source,
            initial,
        })
    }

    /// Scheduler seeded with the default bootstrap around `destination`.
    pub fn for_destination(
        config: SchedulerConfig,
        catalog: StreamCatalog,
        source: Arc<dyn RecordSource>,
        destination: Arc<dyn StandardDestination>,
    ) -> Result<Self, BuildError> {
        let initial = default_sequence(destination, &catalog);
        Self::new(config, catalog, source, initial)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &StreamCatalog {
        &self.catalog
    }

    /// Drive the sync until `Done` or the first fatal fault.
    pub async fn run(self) -> Result<RunReport, SchedulerError> {
        let run_id = RunId::generate();
        let started_at = Utc::now();
        let span = info_span!("sync_run", %run_id);

        async move {
            info!(
                streams = self.catalog.len(),
                max_concurrency = self.config.max_concurrency,
                "sync run started"
            );

            let summary = DispatchLoop::new(self.config, self.catalog, self.source, self.initial)
                .run()
                .await?;

            let report = RunReport {
                run_id,
                started_at,
                finished_at: Utc::now(),
                counts: summary.counts,
                completed_streams: summary.completed_streams,
                still_in_flight: summary.still_in_flight,
            };
            info!(
                dispatched = report.counts.dispatched,
                completed_streams = report.completed_streams.len(),
                still_in_flight = report.still_in_flight,
                "sync run finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }
}
