//! RecordSource port - ストリームごとの有界バッファ
//!
//! スケジューラはレコードソースを所有しない。
//! 消費タスクを実行する直前に `take` で 1 バッチだけ取り出す。

use crate::domain::{Batch, StreamId};

/// Bounded per-stream buffer that record-consuming tasks drain.
///
/// # 契約
/// - `take` は待たない（non-blocking）。何もなければ空のバッチを返す
/// - `is_stream_complete` は一度 true になったら false に戻らない
pub trait RecordSource: Send + Sync {
    fn take(&self, stream: &StreamId) -> Batch;

    /// True once the stream will never yield more records.
    fn is_stream_complete(&self, stream: &StreamId) -> bool;
}
