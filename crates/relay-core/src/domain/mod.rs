//! Domain model (IDs, streams, records, admission specs, tasks, errors).
//!
//! - task / control: スケジューラが扱うタスクの閉じた集合
//! - admission: タスク種別ごとの同時実行上限
//! - stream / record: 同期対象のストリームとレコード

pub mod admission;
pub mod control;
pub mod errors;
pub mod ids;
pub mod record;
pub mod stream;
pub mod task;

pub use admission::{AdmissionSpec, TaskIdentity};
pub use control::{Control, IndexedSupplier, StreamSupplier, Supplier};
pub use errors::{ConfigError, SchedulerError, TaskError};
pub use ids::{DispatchId, RunId};
pub use record::{Batch, Record};
pub use stream::{CatalogError, StreamCatalog, StreamId};
pub use task::{ConsumeRecords, RecordConsumer, RecordInput, Task, WorkTask};
