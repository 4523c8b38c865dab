//! TaskQueue - ループとワーカープールをつなぐ唯一の通路
//!
//! - 書き込みはループとワーカー（完了時の後続タスク）の両方から
//! - 読み出しはループだけ（1 イテレーションにつき 1 件）
//! - ロック中に await しないので std の Mutex を使い、待機は Notify で起こす

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use crate::domain::Task;

/// Unbounded FIFO of pending tasks.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
    notify: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the tail and wake the loop if it is waiting.
    pub fn push(&self, task: Task) {
        self.tasks().push_back(task);
        // Notify outside the lock
        self.notify.notify_one();
    }

    pub fn extend(&self, tasks: impl IntoIterator<Item = Task>) {
        let pushed = {
            let mut queue = self.tasks();
            let before = queue.len();
            queue.extend(tasks);
            queue.len() > before
        };
        if pushed {
            self.notify.notify_one();
        }
    }

    /// Pull the head without waiting.
    pub fn try_pop(&self) -> Option<Task> {
        self.tasks().pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks().is_empty()
    }

    /// Sleep for at most `delay`, returning early when something is pushed.
    pub async fn wait(&self, delay: Duration) {
        tokio::select! {
            _ = self.notify.notified() => {},
            _ = tokio::time::sleep(delay) => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn tasks_come_out_in_fifo_order() {
        let queue = TaskQueue::new();
        queue.push(Task::incrementing("a", Task::noop));
        queue.extend([Task::noop(), Task::done()]);
        assert_eq!(queue.len(), 3);

        let names: Vec<&'static str> = std::iter::from_fn(|| queue.try_pop())
            .map(|task| match task {
                Task::Control(control) => control.name(),
                _ => "work",
            })
            .collect();
        assert_eq!(names, vec!["incrementing", "noop", "done"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn wait_times_out_when_nothing_is_pushed() {
        let queue = TaskQueue::new();
        let start = Instant::now();
        queue.wait(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn push_wakes_waiter_early() {
        let queue = Arc::new(TaskQueue::new());

        let waiter = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move {
                let start = Instant::now();
                queue.wait(Duration::from_secs(5)).await;
                start.elapsed()
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(Task::done());

        let waited = waiter.await.unwrap();
        assert!(waited < Duration::from_secs(5));
        assert_eq!(queue.len(), 1);
    }
}
