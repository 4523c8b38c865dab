//! Control - ループが同期的に解釈する制御タスク
//!
//! 制御タスクはワーカープールに渡されない。
//! 解釈は `app::interpreter` が担当し、ここでは形だけを定義する。

use std::fmt;
use std::sync::Arc;

use super::task::Task;
use super::StreamId;

/// Builds the underlying task of a control primitive.
pub type Supplier = Arc<dyn Fn() -> Task + Send + Sync>;

/// Builds the task for slot `i` of a `ForEachAvailable`.
pub type IndexedSupplier = Arc<dyn Fn(usize) -> Task + Send + Sync>;

/// Builds the task for one stream of a `ForEachStream`.
pub type StreamSupplier = Arc<dyn Fn(&StreamId) -> Task + Send + Sync>;

/// Control primitives understood by the dispatch loop.
#[derive(Clone)]
pub enum Control {
    /// Decrement counter `id`, then enqueue `next()`.
    Decrementing { id: String, next: Supplier },

    /// Increment counter `id`, then enqueue `next()`.
    Incrementing { id: String, next: Supplier },

    /// Enqueue `next()` at most once per `id` for the whole run.
    ExactlyOnce { id: String, next: Supplier },

    /// Enqueue `task_for(0)`, then `task_for(1..n)` where `n` is what
    /// instance 0 advertises as available slots.
    ForEachAvailable { task_for: IndexedSupplier },

    /// Enqueue one task per stream of the catalog.
    ForEachStream { task_for: StreamSupplier },

    /// Enqueue `next()` once counter `id` is zero, otherwise poll again.
    WhenAllComplete { id: String, next: Supplier },

    /// Enqueue `next()` once `stream` is complete, otherwise poll again.
    WhenStreamComplete { stream: StreamId, next: Supplier },

    /// Nothing follows.
    Noop,

    /// Stop the loop.
    Done,
}

impl Control {
    pub fn name(&self) -> &'static str {
        match self {
            Control::Decrementing { .. } => "decrementing",
            Control::Incrementing { .. } => "incrementing",
            Control::ExactlyOnce { .. } => "exactly-once",
            Control::ForEachAvailable { .. } => "for-each-available",
            Control::ForEachStream { .. } => "for-each-stream",
            Control::WhenAllComplete { .. } => "when-all-complete",
            Control::WhenStreamComplete { .. } => "when-stream-complete",
            Control::Noop => "noop",
            Control::Done => "done",
        }
    }

    pub fn stream(&self) -> Option<&StreamId> {
        match self {
            Control::WhenStreamComplete { stream, .. } => Some(stream),
            _ => None,
        }
    }
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Decrementing { id, .. }
            | Control::Incrementing { id, .. }
            | Control::ExactlyOnce { id, .. }
            | Control::WhenAllComplete { id, .. } => {
                f.debug_struct(self.name()).field("id", id).finish()
            }
            Control::WhenStreamComplete { stream, .. } => {
                f.debug_struct(self.name()).field("stream", stream).finish()
            }
            _ => f.write_str(self.name()),
        }
    }
}

// ========================================
// Task 側のコンストラクタ
// ========================================

impl Task {
    pub fn decrementing<F>(id: impl Into<String>, next: F) -> Self
    where
        F: Fn() -> Task + Send + Sync + 'static,
    {
        Task::Control(Control::Decrementing {
            id: id.into(),
            next: Arc::new(next),
        })
    }

    pub fn incrementing<F>(id: impl Into<String>, next: F) -> Self
    where
        F: Fn() -> Task + Send + Sync + 'static,
    {
        Task::Control(Control::Incrementing {
            id: id.into(),
            next: Arc::new(next),
        })
    }

    pub fn exactly_once<F>(id: impl Into<String>, next: F) -> Self
    where
        F: Fn() -> Task + Send + Sync + 'static,
    {
        Task::Control(Control::ExactlyOnce {
            id: id.into(),
            next: Arc::new(next),
        })
    }

    pub fn for_each_available<F>(task_for: F) -> Self
    where
        F: Fn(usize) -> Task + Send + Sync + 'static,
    {
        Task::Control(Control::ForEachAvailable {
            task_for: Arc::new(task_for),
        })
    }

    pub fn for_each_stream<F>(task_for: F) -> Self
    where
        F: Fn(&StreamId) -> Task + Send + Sync + 'static,
    {
        Task::Control(Control::ForEachStream {
            task_for: Arc::new(task_for),
        })
    }

    pub fn when_all_complete<F>(id: impl Into<String>, next: F) -> Self
    where
        F: Fn() -> Task + Send + Sync + 'static,
    {
        Task::Control(Control::WhenAllComplete {
            id: id.into(),
            next: Arc::new(next),
        })
    }

    pub fn when_stream_complete<F>(stream: StreamId, next: F) -> Self
    where
        F: Fn() -> Task + Send + Sync + 'static,
    {
        Task::Control(Control::WhenStreamComplete {
            stream,
            next: Arc::new(next),
        })
    }

    pub fn noop() -> Self {
        Task::Control(Control::Noop)
    }

    pub fn done() -> Self {
        Task::Control(Control::Done)
    }
}
