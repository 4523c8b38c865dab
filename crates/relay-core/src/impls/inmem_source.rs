//! InMemoryRecordSource - 開発用・テスト用のレコードソース
//!
//! # 実装詳細
//! - HashMap<StreamId, StreamBuffer> でストリームごとにバッファを管理
//! - Mutex で排他制御（ロック中に await しないので std の Mutex で十分）
//! - バッファは有界。満杯のときの push は `SourceError::Full` を返す
//!
//! # 使用例
//! ```ignore
//! let source = InMemoryRecordSource::new(100, 10_000);
//! source.push(record)?;
//! source.complete(&stream);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{Batch, Record, StreamId};
use crate::ports::RecordSource;

/// SourceError は push 時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("buffer for stream '{0}' is full")]
    Full(StreamId),

    #[error("stream '{0}' is already complete")]
    Closed(StreamId),
}

#[derive(Debug, Default)]
struct StreamBuffer {
    records: VecDeque<Record>,
    closed: bool,
}

/// Bounded in-memory buffer per stream.
pub struct InMemoryRecordSource {
    buffers: Mutex<HashMap<StreamId, StreamBuffer>>,
    batch_size: usize,
    capacity: usize,
}

impl InMemoryRecordSource {
    /// `batch_size` bounds one `take`, `capacity` bounds one stream's buffer.
    /// Both are clamped to at least 1.
    pub fn new(batch_size: usize, capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
            batch_size: batch_size.max(1),
            capacity: capacity.max(1),
        }
    }

    fn buffers(&self) -> MutexGuard<'_, HashMap<StreamId, StreamBuffer>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, record: Record) -> Result<(), SourceError> {
        let mut buffers = self.buffers();
        let buffer = buffers.entry(record.stream.clone()).or_default();
        if buffer.closed {
            return Err(SourceError::Closed(record.stream));
        }
        if buffer.records.len() >= self.capacity {
            return Err(SourceError::Full(record.stream));
        }
        buffer.records.push_back(record);
        Ok(())
    }

    /// Mark `stream` as having no more records. Idempotent.
    pub fn complete(&self, stream: &StreamId) {
        self.buffers().entry(stream.clone()).or_default().closed = true;
    }

    pub fn buffered(&self, stream: &StreamId) -> usize {
        self.buffers()
            .get(stream)
            .map_or(0, |buffer| buffer.records.len())
    }
}

impl Default for InMemoryRecordSource {
    fn default() -> Self {
        Self::new(1_000, 100_000)
    }
}

impl RecordSource for InMemoryRecordSource {
    fn take(&self, stream: &StreamId) -> Batch {
        let mut buffers = self.buffers();
        let Some(buffer) = buffers.get_mut(stream) else {
            return Batch::new();
        };
        let n = buffer.records.len().min(self.batch_size);
        buffer.records.drain(..n).collect()
    }

    fn is_stream_complete(&self, stream: &StreamId) -> bool {
        self.buffers()
            .get(stream)
            .is_some_and(|buffer| buffer.closed && buffer.records.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stream: &str, n: i64) -> Record {
        Record::new(StreamId::new(stream), serde_json::json!({ "n": n }))
    }

    #[test]
    fn take_respects_batch_size_and_order() {
        let source = InMemoryRecordSource::new(2, 10);
        for n in 0..3 {
            source.push(record("users", n)).unwrap();
        }
        let stream = StreamId::new("users");

        let first = source.take(&stream);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].data["n"], 0);
        assert_eq!(first[1].data["n"], 1);

        let second = source.take(&stream);
        assert_eq!(second.len(), 1);
        assert!(source.take(&stream).is_empty());
    }

    #[test]
    fn unknown_stream_yields_empty_batch() {
        let source = InMemoryRecordSource::default();
        let stream = StreamId::new("ghost");
        assert!(source.take(&stream).is_empty());
        assert!(!source.is_stream_complete(&stream));
    }

    #[test]
    fn complete_only_after_buffer_is_drained() {
        let source = InMemoryRecordSource::new(10, 10);
        let stream = StreamId::new("users");
        source.push(record("users", 1)).unwrap();
        source.complete(&stream);

        assert!(!source.is_stream_complete(&stream));
        assert_eq!(source.take(&stream).len(), 1);
        assert!(source.is_stream_complete(&stream));
    }

    #[test]
    fn push_fails_when_full_or_closed() {
        let source = InMemoryRecordSource::new(10, 1);
        let stream = StreamId::new("users");
        source.push(record("users", 1)).unwrap();
        assert_eq!(
            source.push(record("users", 2)),
            Err(SourceError::Full(stream.clone()))
        );

        source.complete(&stream);
        source.take(&stream);
        assert_eq!(
            source.push(record("users", 3)),
            Err(SourceError::Closed(stream.clone()))
        );
        assert_eq!(source.buffered(&stream), 0);
    }
}
