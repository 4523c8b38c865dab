//! Primer - レコード消費タスクにバッチを詰める
//!
//! # フロー
//! 1. `RecordSource::take` でストリームから 1 バッチ取り出す
//! 2. 空なら defer（タスクはそのまま再キューし、実行しない）。
//!    ストリームが完了済みなら完了フラグだけ立てる
//! 3. バッチを payload に載せ、`is_stream_complete` から end_of_stream を決める
//! 4. end_of_stream = false なら、実行後に未充填のコピーを再キューして排出を続ける
//! 5. end_of_stream = true なら完了フラグを立て、再キューしない

use tracing::{debug, info};

use super::state::SchedulerState;
use crate::domain::{RecordConsumer, StreamId, Task};
use crate::ports::RecordSource;

/// Outcome of priming one record consumer.
#[derive(Debug)]
pub enum Primed {
    /// Dispatch `task`; once it finishes, enqueue `drain_again` if present.
    Ready { task: Task, drain_again: Option<Task> },

    /// Nothing to consume yet. The task comes back untouched.
    Defer(Task),
}

pub fn prime(
    consumer: RecordConsumer,
    source: &dyn RecordSource,
    state: &mut SchedulerState,
) -> Primed {
    let stream = consumer.stream().clone();
    let batch = source.take(&stream);
    let end_of_stream = source.is_stream_complete(&stream);

    if end_of_stream {
        mark_complete(state, &stream);
    }

    if batch.is_empty() {
        return Primed::Defer(Task::Records(consumer));
    }

    let unprimed = consumer.clone();
    let mut primed = consumer;
    debug!(stream = %stream, records = batch.len(), end_of_stream, "primed record consumer");
    primed.fill(batch, end_of_stream);

    if end_of_stream {
        Primed::Ready {
            task: Task::Records(primed),
            drain_again: None,
        }
    } else {
        Primed::Ready {
            task: Task::Records(primed),
            drain_again: Some(Task::Records(unprimed)),
        }
    }
}

fn mark_complete(state: &mut SchedulerState, stream: &StreamId) {
    if state.mark_stream_complete(stream) {
        info!(stream = %stream, "stream complete");
    }
}
