//! Task model: the closed set of things the dispatch loop can pull.
//!
//! - `Task::Work`: opaque work, executed on the worker pool.
//! - `Task::Records`: work that drains the record source for one stream.
//! - `Task::Control`: interpreted by the loop itself, never dispatched.
//!
//! Work variants are stored behind `Arc` so the loop can cheaply clone a task
//! when it has to re-enqueue it (deferral, continued draining).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::control::Control;
use super::errors::TaskError;
use super::{AdmissionSpec, Batch, StreamId};

/// A unit of work whose execution is delegated to the worker pool.
///
/// # 使用例
/// ```ignore
/// struct Flush;
///
/// #[async_trait]
/// impl WorkTask for Flush {
///     fn name(&self) -> &str { "flush" }
///
///     async fn execute(&self) -> Result<Task, TaskError> {
///         Ok(Task::noop())
///     }
/// }
/// ```
#[async_trait]
pub trait WorkTask: Send + Sync {
    /// Human-readable name used in logs and fault reports.
    fn name(&self) -> &str;

    fn admission(&self) -> Option<&AdmissionSpec> {
        None
    }

    /// Stream this task is bound to, if any.
    fn stream(&self) -> Option<&StreamId> {
        None
    }

    /// Slots advertised to `ForEachAvailable` when this task is instance 0.
    fn available_slots(&self) -> usize {
        0
    }

    /// Run the task and return exactly one follow-up task.
    async fn execute(&self) -> Result<Task, TaskError>;
}

/// Records handed to a consumer by the primer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordInput {
    pub payload: Batch,
    pub end_of_stream: bool,

    /// Reserved for a timer driven flush policy. Always false.
    pub force_flush: bool,
}

/// A unit of work that writes records drained from one stream.
#[async_trait]
pub trait ConsumeRecords: Send + Sync {
    fn name(&self) -> &str;

    fn admission(&self) -> Option<&AdmissionSpec> {
        None
    }

    /// Record consumers always carry stream affinity.
    fn stream(&self) -> &StreamId;

    fn available_slots(&self) -> usize {
        0
    }

    async fn consume(&self, input: &RecordInput) -> Result<Task, TaskError>;
}

/// A record-consuming task plus the fields the primer fills in.
#[derive(Clone)]
pub struct RecordConsumer {
    consumer: Arc<dyn ConsumeRecords>,
    input: RecordInput,
}

impl RecordConsumer {
    pub fn new(consumer: Arc<dyn ConsumeRecords>) -> Self {
        Self {
            consumer,
            input: RecordInput::default(),
        }
    }

    pub fn stream(&self) -> &StreamId {
        self.consumer.stream()
    }

    pub fn payload(&self) -> &Batch {
        &self.input.payload
    }

    pub fn end_of_stream(&self) -> bool {
        self.input.end_of_stream
    }

    pub fn force_flush(&self) -> bool {
        self.input.force_flush
    }

    pub(crate) fn fill(&mut self, payload: Batch, end_of_stream: bool) {
        self.input = RecordInput {
            payload,
            end_of_stream,
            force_flush: false,
        };
    }

    async fn consume(&self) -> Result<Task, TaskError> {
        self.consumer.consume(&self.input).await
    }
}

/// Anything the dispatch loop can pull from the queue.
#[derive(Clone)]
pub enum Task {
    Work(Arc<dyn WorkTask>),
    Records(RecordConsumer),
    Control(Control),
}

impl Task {
    pub fn work(task: impl WorkTask + 'static) -> Self {
        Task::Work(Arc::new(task))
    }

    pub fn records(consumer: impl ConsumeRecords + 'static) -> Self {
        Task::Records(RecordConsumer::new(Arc::new(consumer)))
    }

    pub fn name(&self) -> &str {
        match self {
            Task::Work(work) => work.name(),
            Task::Records(records) => records.consumer.name(),
            Task::Control(control) => control.name(),
        }
    }

    pub fn admission(&self) -> Option<&AdmissionSpec> {
        match self {
            Task::Work(work) => work.admission(),
            Task::Records(records) => records.consumer.admission(),
            Task::Control(_) => None,
        }
    }

    /// Stream affinity, including the stream a `WhenStreamComplete` guard waits on.
    pub fn stream(&self) -> Option<&StreamId> {
        match self {
            Task::Work(work) => work.stream(),
            Task::Records(records) => Some(records.stream()),
            Task::Control(control) => control.stream(),
        }
    }

    pub fn available_slots(&self) -> usize {
        match self {
            Task::Work(work) => work.available_slots(),
            Task::Records(records) => records.consumer.available_slots(),
            Task::Control(_) => 0,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Task::Control(_))
    }

    /// Execute a work task. Control tasks are never executed.
    pub(crate) async fn execute(&self) -> Result<Task, TaskError> {
        match self {
            Task::Work(work) => work.execute().await,
            Task::Records(records) => records.consume().await,
            Task::Control(control) => Err(TaskError::failed(format!(
                "control task '{}' cannot be executed",
                control.name()
            ))),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Work(work) => f
                .debug_struct("Work")
                .field("name", &work.name())
                .field("stream", &work.stream())
                .finish(),
            Task::Records(records) => f
                .debug_struct("Records")
                .field("name", &records.consumer.name())
                .field("stream", records.stream())
                .field("payload_len", &records.payload().len())
                .field("end_of_stream", &records.end_of_stream())
                .finish(),
            Task::Control(control) => control.fmt(f),
        }
    }
}

impl From<Control> for Task {
    fn from(control: Control) -> Self {
        Task::Control(control)
    }
}
