//! Interpreter - 制御タスクの同期的な解釈
//!
//! 1 回の呼び出しで制御タスクを 1 つだけ消費し、決して待たない。
//! 結果は「キューに積むタスク」「ガード自身の再キュー」「終了」のどれか。

use tracing::{debug, trace};

use super::state::SchedulerState;
use crate::domain::{Control, Task};

/// What the loop should do after interpreting one control task.
#[derive(Debug)]
pub enum Interpreted {
    /// Enqueue these tasks, in order (possibly none).
    Enqueue(Vec<Task>),

    /// A barrier is not satisfied yet; re-enqueue the guard itself.
    Wait(Task),

    /// Stop pulling tasks.
    Done,
}

/// Evaluate `control` against `state`.
pub fn interpret(control: Control, state: &mut SchedulerState) -> Interpreted {
    match control {
        Control::Incrementing { id, next } => {
            let value = state.increment(&id);
            trace!(counter = %id, value, "counter incremented");
            Interpreted::Enqueue(vec![next()])
        }
        Control::Decrementing { id, next } => {
            let value = state.decrement(&id);
            trace!(counter = %id, value, "counter decremented");
            Interpreted::Enqueue(vec![next()])
        }
        Control::ExactlyOnce { id, next } => {
            // 作成はスキップ時にも行う（作成に副作用がない前提）
            let task = next();
            if state.mark_seen(&id) {
                Interpreted::Enqueue(vec![task])
            } else {
                debug!(id = %id, "exactly-once task already enqueued, skipping");
                Interpreted::Enqueue(Vec::new())
            }
        }
        Control::ForEachAvailable { task_for } => {
            let first = task_for(0);
            let slots = first.available_slots();
            let mut tasks = Vec::with_capacity(slots.max(1));
            tasks.push(first);
            tasks.extend((1..slots).map(|i| task_for(i)));
            debug!(slots, enqueued = tasks.len(), "fan-out over available slots");
            Interpreted::Enqueue(tasks)
        }
        Control::ForEachStream { task_for } => {
            let tasks: Vec<Task> = state.catalog().iter().map(|s| task_for(s)).collect();
            debug!(streams = tasks.len(), "fan-out over catalog");
            Interpreted::Enqueue(tasks)
        }
        Control::WhenAllComplete { id, next } => {
            let value = state.counter(&id);
            if value == 0 {
                debug!(counter = %id, "barrier released");
                Interpreted::Enqueue(vec![next()])
            } else {
                trace!(counter = %id, value, "barrier not satisfied");
                Interpreted::Wait(Task::Control(Control::WhenAllComplete { id, next }))
            }
        }
        Control::WhenStreamComplete { stream, next } => {
            if state.is_stream_complete(&stream) {
                debug!(stream = %stream, "stream barrier released");
                Interpreted::Enqueue(vec![next()])
            } else {
                trace!(stream = %stream, "stream barrier not satisfied");
                Interpreted::Wait(Task::Control(Control::WhenStreamComplete { stream, next }))
            }
        }
        Control::Noop => Interpreted::Enqueue(Vec::new()),
        Control::Done => Interpreted::Done,
    }
}
