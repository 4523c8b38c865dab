//! SchedulerBuilder - スケジューラの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - record source がなければ構築しない
//! - 初期タスクと書き込み先はどちらか一方だけ
//! - 設定値の検証と、初期タスクのストリームがカタログ内にあるかの検証は build() 時に行う

use std::sync::Arc;

use super::bootstrap::default_sequence;
use super::config::SchedulerConfig;
use super::scheduler::Scheduler;
use crate::domain::{StreamCatalog, StreamId, Task};
use crate::ports::{RecordSource, StandardDestination};

/// Builds a [`Scheduler`].
///
/// # 使用例
/// ```ignore
/// let scheduler = SchedulerBuilder::new()
///     .catalog(StreamCatalog::new(["users", "orders"])?)
///     .record_source(source)
///     .destination(destination)
///     .build()?;
/// let report = scheduler.run().await?;
/// ```
#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    catalog: Option<StreamCatalog>,
    source: Option<Arc<dyn RecordSource>>,
    initial: Option<Task>,
    destination: Option<Arc<dyn StandardDestination>>,
}

/// BuildError はスケジューラ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No record source was given.")]
    MissingRecordSource,

    #[error("Neither an initial task nor a destination was given.")]
    MissingSeed,

    #[error("Both an initial task and a destination were given; pick one.")]
    AmbiguousSeed,

    #[error("Invalid scheduler config: {0}")]
    InvalidConfig(String),

    #[error("Initial task '{task}' refers to stream '{stream}' which is not in the catalog.")]
    UnknownStream { task: String, stream: StreamId },
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Streams of the sync. Defaults to an empty catalog.
    pub fn catalog(mut self, catalog: StreamCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn record_source(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Seed the queue with a caller-built task.
    pub fn initial_task(mut self, task: Task) -> Self {
        self.initial = Some(task);
        self
    }

    /// Seed the queue with the default bootstrap around `destination`.
    pub fn destination(mut self, destination: Arc<dyn StandardDestination>) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn build(self) -> Result<Scheduler, BuildError> {
        let source = self.source.ok_or(BuildError::MissingRecordSource)?;
        let catalog = self.catalog.unwrap_or_default();

        let initial = match (self.initial, self.destination) {
            (Some(_), Some(_)) => return Err(BuildError::AmbiguousSeed),
            (None, None) => return Err(BuildError::MissingSeed),
            (Some(task), None) => task,
            (None, Some(destination)) => default_sequence(destination, &catalog),
        };

        Scheduler::new(self.config, catalog, source, initial)
    }
}

pub(crate) fn validate(
    config: &SchedulerConfig,
    catalog: &StreamCatalog,
    initial: &Task,
) -> Result<(), BuildError> {
    config.validate().map_err(BuildError::InvalidConfig)?;

    if let Some(stream) = initial.stream() {
        if !catalog.contains(stream) {
            return Err(BuildError::UnknownStream {
                task: initial.name().to_string(),
                stream: stream.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::domain::{RecordInput, TaskError};
    use crate::impls::InMemoryRecordSource;

    struct NullDestination;

    #[async_trait]
    impl StandardDestination for NullDestination {
        async fn setup(&self) -> Result<(), TaskError> {
            Ok(())
        }

        async fn open_stream(&self, _stream: &StreamId) -> Result<(), TaskError> {
            Ok(())
        }

        async fn process_batch(&self, _stream: &StreamId, _input: &RecordInput) -> Result<(), TaskError> {
            Ok(())
        }

        async fn close_stream(&self, _stream: &StreamId) -> Result<(), TaskError> {
            Ok(())
        }

        async fn teardown(&self) -> Result<(), TaskError> {
            Ok(())
        }
    }

    fn source() -> Arc<dyn RecordSource> {
        Arc::new(InMemoryRecordSource::default())
    }

    #[test]
    fn test_build_with_destination() {
        let scheduler = SchedulerBuilder::new()
            .catalog(StreamCatalog::new(["users"]).unwrap())
            .record_source(source())
            .destination(Arc::new(NullDestination))
            .build();
        assert!(scheduler.is_ok());
    }

    #[test]
    fn test_build_missing_record_source() {
        let result = SchedulerBuilder::new().initial_task(Task::done()).build();
        assert!(matches!(result, Err(BuildError::MissingRecordSource)));
    }

    #[test]
    fn test_build_requires_exactly_one_seed() {
        let result = SchedulerBuilder::new().record_source(source()).build();
        assert!(matches!(result, Err(BuildError::MissingSeed)));

        let result = SchedulerBuilder::new()
            .record_source(source())
            .initial_task(Task::done())
            .destination(Arc::new(NullDestination))
            .build();
        assert!(matches!(result, Err(BuildError::AmbiguousSeed)));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = SchedulerConfig {
            max_concurrency: 0,
            ..SchedulerConfig::default()
        };
        let result = SchedulerBuilder::new()
            .config(config)
            .record_source(source())
            .initial_task(Task::done())
            .build();
        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_rejects_initial_task_outside_catalog() {
        let result = SchedulerBuilder::new()
            .catalog(StreamCatalog::new(["users"]).unwrap())
            .record_source(source())
            .initial_task(Task::when_stream_complete(StreamId::new("orders"), Task::done))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::UnknownStream { stream, .. }) if stream.as_str() == "orders"
        ));
    }
}
