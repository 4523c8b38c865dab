//! App - アプリケーション層
//!
//! ports を組み合わせて、1 回の同期を走らせるロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Scheduler / SchedulerBuilder**: 構築時の検証と run の入口
//! - **DispatchLoop**: キューから 1 件ずつ取り出して振り分ける調整ループ
//! - **AdmissionGate**: タスク種別ごと・ストリームごとの同時実行上限
//! - **Interpreter**: 制御タスクの同期的な解釈
//! - **Primer**: レコード消費タスクへのバッチ詰め
//! - **Bootstrap**: 書き込み先からの既定タスク列

pub mod backoff;
pub mod bootstrap;
pub mod builder;
pub mod config;
mod dispatch_loop;
pub mod gate;
pub mod interpreter;
pub mod primer;
pub mod queue;
pub mod report;
pub mod scheduler;
pub mod state;

// 主要な型を再エクスポート
pub use self::backoff::BackoffPolicy;
pub use self::bootstrap::default_sequence;
pub use self::builder::{BuildError, SchedulerBuilder};
pub use self::config::SchedulerConfig;
pub use self::gate::{Admission, AdmissionGate, AdmissionPermit, InFlight};
pub use self::interpreter::{Interpreted, interpret};
pub use self::primer::{Primed, prime};
pub use self::queue::TaskQueue;
pub use self::report::{RunCounts, RunReport};
pub use self::scheduler::Scheduler;
pub use self::state::SchedulerState;
