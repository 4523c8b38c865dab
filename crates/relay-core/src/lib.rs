//! relay-core
//!
//! Write-side task scheduling engine for a data sync.
//!
//! A single dispatch loop pulls tasks from a FIFO queue. Control tasks
//! (counters, fan-outs, barriers, exactly-once, termination) are interpreted
//! on the loop itself; work tasks pass an admission gate, record consumers are
//! primed with a batch from the record source, and everything else runs on the
//! worker pool, whose single follow-up task goes back on the queue.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, stream, record, admission, task, control, errors）
//! - **ports**: 抽象化レイヤー（RecordSource, StandardDestination）
//! - **app**: アプリケーションロジック（scheduler, dispatch loop, gate, interpreter, primer, bootstrap, config）
//! - **impls**: 実装（InMemoryRecordSource など開発用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{BuildError, RunReport, Scheduler, SchedulerBuilder, SchedulerConfig};
pub use domain::{SchedulerError, StreamCatalog, StreamId, Task, TaskError};
