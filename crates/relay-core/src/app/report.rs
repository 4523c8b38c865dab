//! RunReport - 1 回の run の集計
//!
//! `Scheduler::run` が正常終了したときに返す。詰まり具合（defer の回数や
//! バリアのポーリング回数）もここで見られる。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{RunId, StreamId};

/// Counters collected by the dispatch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Work tasks handed to the worker pool.
    pub dispatched: u64,

    /// Control tasks evaluated by the interpreter.
    pub interpreted: u64,

    /// Deferrals by the admission gate.
    pub deferred_admission: u64,

    /// Deferrals because the record source had nothing to give.
    pub deferred_empty: u64,

    /// Times a barrier re-enqueued itself.
    pub barrier_polls: u64,
}

/// Summary of a run that ended with `Done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    #[serde(flatten)]
    pub counts: RunCounts,

    /// Streams whose end was observed, in catalog order.
    pub completed_streams: Vec<StreamId>,

    /// Executions still running when the loop stopped (0 with `drain_on_done`).
    pub still_in_flight: usize,
}
