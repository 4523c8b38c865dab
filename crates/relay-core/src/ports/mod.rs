//! Ports - 外部コラボレーターとの境界
//!
//! スケジューラ本体は I/O をしない。
//! レコードの供給と書き込みは、ここで定義する trait 越しにだけ行う。

pub mod destination;
pub mod record_source;

pub use self::destination::StandardDestination;
pub use self::record_source::RecordSource;
