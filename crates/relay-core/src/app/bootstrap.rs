//! Bootstrap - 書き込み先 1 つから同期全体のタスク列を組み立てる
//!
//! ```text
//! Setup ─▶ ForEachStream(s ─▶ Incrementing("open-streams", OpenStream(s)))
//! OpenStream(s) ─▶ ForEachAvailable(0 ─▶ WatchStream(s), i ─▶ ProcessRecords(s, i - 1))
//! WatchStream(s) ─▶ WhenStreamComplete(s, ExactlyOnce("close:<s>", CloseStream(s)))
//! ProcessRecords(s, i) ─▶ Noop
//! CloseStream(s) ─▶ Decrementing("open-streams",
//!                     ExactlyOnce("teardown", WhenAllComplete("open-streams", Teardown)))
//! Teardown ─▶ Done
//! ```
//!
//! 空のバッチは実行されないので、クローズはストリームの完了フラグで起こす。
//! CloseStream は ProcessRecords と同じ admission（ストリームごとに 1 つ）を持つので、
//! 最後のバッチの書き込み中には走らない。
//!
//! カタログが空なら `Setup ─▶ Teardown ─▶ Done`。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::domain::{
    AdmissionSpec, ConsumeRecords, RecordInput, StreamCatalog, StreamId, Task, TaskError, WorkTask,
};
use crate::ports::StandardDestination;

/// Counter tracking streams that are open but not yet closed.
pub const OPEN_STREAMS: &str = "open-streams";

/// Exactly-once id guarding the teardown barrier.
pub const TEARDOWN_ONCE: &str = "teardown";

/// Admission identity shared by the record consumers and the close of a stream.
pub const PROCESS_RECORDS: &str = "process-records";

// 1 ストリームにつき同時に 1 つだけ書く
fn stream_writer_admission() -> AdmissionSpec {
    AdmissionSpec::new(PROCESS_RECORDS, 0, 1)
}

/// Initial task for a sync that writes into `destination`.
pub fn default_sequence(destination: Arc<dyn StandardDestination>, catalog: &StreamCatalog) -> Task {
    Task::work(Setup {
        destination,
        has_streams: !catalog.is_empty(),
    })
}

fn close_id(stream: &StreamId) -> String {
    format!("close:{stream}")
}

struct Setup {
    destination: Arc<dyn StandardDestination>,
    has_streams: bool,
}

#[async_trait]
impl WorkTask for Setup {
    fn name(&self) -> &str {
        "setup"
    }

    async fn execute(&self) -> Result<Task, TaskError> {
        self.destination.setup().await?;

        let destination = Arc::clone(&self.destination);
        if !self.has_streams {
            return Ok(Task::work(Teardown { destination }));
        }

        Ok(Task::for_each_stream(move |stream| {
            let destination = Arc::clone(&destination);
            let stream = stream.clone();
            Task::incrementing(OPEN_STREAMS, move || {
                Task::work(OpenStream {
                    destination: Arc::clone(&destination),
                    stream: stream.clone(),
                })
            })
        }))
    }
}

struct OpenStream {
    destination: Arc<dyn StandardDestination>,
    stream: StreamId,
}

#[async_trait]
impl WorkTask for OpenStream {
    fn name(&self) -> &str {
        "open-stream"
    }

    fn stream(&self) -> Option<&StreamId> {
        Some(&self.stream)
    }

    async fn execute(&self) -> Result<Task, TaskError> {
        self.destination.open_stream(&self.stream).await?;

        let destination = Arc::clone(&self.destination);
        let stream = self.stream.clone();
        let consumers = self.destination.consumers_per_stream().max(1);
        Ok(Task::for_each_available(move |i| match i {
            0 => Task::work(WatchStream {
                destination: Arc::clone(&destination),
                stream: stream.clone(),
                consumers,
            }),
            i => Task::records(ProcessRecords::new(Arc::clone(&destination), stream.clone(), i - 1)),
        }))
    }
}

/// Instance 0 of a stream's fan-out: registers the close and sizes the fan-out.
struct WatchStream {
    destination: Arc<dyn StandardDestination>,
    stream: StreamId,
    consumers: usize,
}

#[async_trait]
impl WorkTask for WatchStream {
    fn name(&self) -> &str {
        "watch-stream"
    }

    fn stream(&self) -> Option<&StreamId> {
        Some(&self.stream)
    }

    fn available_slots(&self) -> usize {
        self.consumers + 1
    }

    async fn execute(&self) -> Result<Task, TaskError> {
        let destination = Arc::clone(&self.destination);
        let stream = self.stream.clone();
        Ok(Task::when_stream_complete(self.stream.clone(), move || {
            let destination = Arc::clone(&destination);
            let stream = stream.clone();
            Task::exactly_once(close_id(&stream), move || {
                Task::work(CloseStream::new(Arc::clone(&destination), stream.clone()))
            })
        }))
    }
}

struct ProcessRecords {
    destination: Arc<dyn StandardDestination>,
    stream: StreamId,
    slot: usize,
    admission: AdmissionSpec,
}

impl ProcessRecords {
    fn new(destination: Arc<dyn StandardDestination>, stream: StreamId, slot: usize) -> Self {
        Self {
            destination,
            stream,
            slot,
            admission: stream_writer_admission(),
        }
    }
}

#[async_trait]
impl ConsumeRecords for ProcessRecords {
    fn name(&self) -> &str {
        PROCESS_RECORDS
    }

    fn admission(&self) -> Option<&AdmissionSpec> {
        Some(&self.admission)
    }

    fn stream(&self) -> &StreamId {
        &self.stream
    }

    async fn consume(&self, input: &RecordInput) -> Result<Task, TaskError> {
        trace!(
            stream = %self.stream,
            slot = self.slot,
            records = input.payload.len(),
            end_of_stream = input.end_of_stream,
            "writing batch"
        );
        self.destination.process_batch(&self.stream, input).await?;
        Ok(Task::noop())
    }
}

struct CloseStream {
    destination: Arc<dyn StandardDestination>,
    stream: StreamId,
    admission: AdmissionSpec,
}

impl CloseStream {
    fn new(destination: Arc<dyn StandardDestination>, stream: StreamId) -> Self {
        Self {
            destination,
            stream,
            admission: stream_writer_admission(),
        }
    }
}

#[async_trait]
impl WorkTask for CloseStream {
    fn name(&self) -> &str {
        "close-stream"
    }

    fn admission(&self) -> Option<&AdmissionSpec> {
        Some(&self.admission)
    }

    fn stream(&self) -> Option<&StreamId> {
        Some(&self.stream)
    }

    async fn execute(&self) -> Result<Task, TaskError> {
        self.destination.close_stream(&self.stream).await?;

        let destination = Arc::clone(&self.destination);
        Ok(Task::decrementing(OPEN_STREAMS, move || {
            let destination = Arc::clone(&destination);
            Task::exactly_once(TEARDOWN_ONCE, move || {
                let destination = Arc::clone(&destination);
                Task::when_all_complete(OPEN_STREAMS, move || {
                    Task::work(Teardown {
                        destination: Arc::clone(&destination),
                    })
                })
            })
        }))
    }
}

struct Teardown {
    destination: Arc<dyn StandardDestination>,
}

#[async_trait]
impl WorkTask for Teardown {
    fn name(&self) -> &str {
        "teardown"
    }

    async fn execute(&self) -> Result<Task, TaskError> {
        self.destination.teardown().await?;
        Ok(Task::done())
    }
}
