//! StandardDestination port - 書き込み先の抽象化
//!
//! デフォルトのブートストラップ（setup → ストリームごとの open/process/close →
//! teardown）は、この trait だけを通して書き込み先を呼ぶ。

use async_trait::async_trait;

use crate::domain::{RecordInput, StreamId, TaskError};

/// The opaque "standard destination" a sync writes into.
///
/// Every method runs on the worker pool, never on the dispatch loop.
#[async_trait]
pub trait StandardDestination: Send + Sync {
    async fn setup(&self) -> Result<(), TaskError>;

    async fn open_stream(&self, stream: &StreamId) -> Result<(), TaskError>;

    /// Write one primed batch. Never called with an empty payload;
    /// `close_stream` follows once the stream has ended and its last batch is written.
    async fn process_batch(&self, stream: &StreamId, input: &RecordInput) -> Result<(), TaskError>;

    async fn close_stream(&self, stream: &StreamId) -> Result<(), TaskError>;

    async fn teardown(&self) -> Result<(), TaskError>;

    /// How many record consumers the bootstrap starts per stream.
    fn consumers_per_stream(&self) -> usize {
        1
    }
}
