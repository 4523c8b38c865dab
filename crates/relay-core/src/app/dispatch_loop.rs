//! DispatchLoop - 調整ループ本体
//!
//! # フロー（RUNNING の間くり返す）
//! 1. グローバルの in-flight（セマフォ）に空きがなければ待つ（キューからは取らない）
//! 2. キューから待たずに 1 件取る。空なら待って再試行
//! 3. 制御タスク → インタプリタ
//! 4. admission spec があればゲート。defer なら末尾に戻す
//! 5. グローバルの枠を 1 つ取る
//! 6. レコード消費タスクならプライマー。defer なら末尾に戻す（ゲートと枠は返す）
//! 7. ワーカープールへ渡す。完了時に後続タスクを積み、permit を返し、
//!    必要なら排出継続用のコピーも積む
//!
//! 末尾に戻すだけの反復がキュー 1 周分続いたら、キューへの push か
//! バックオフの経過まで待つ（3 つ目の待ち）。
//!
//! `Done` に到達したら新規の取り出しをやめる。実行中のタスクは止めない。

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{Instrument, debug, debug_span, error, trace, warn};

use super::backoff::Backoff;
use super::config::SchedulerConfig;
use super::gate::{Admission, AdmissionGate, AdmissionPermit, InFlight};
use super::interpreter::{Interpreted, interpret};
use super::primer::{Primed, prime};
use super::queue::TaskQueue;
use super::report::RunCounts;
use super::state::SchedulerState;
use crate::domain::{DispatchId, SchedulerError, StreamCatalog, StreamId, Task};
use crate::ports::RecordSource;

type Execution = Result<(), SchedulerError>;

/// What one loop iteration achieved.
enum Step {
    /// Something was dispatched or interpreted.
    Progress,

    /// The task went back to the tail unchanged (deferral or barrier poll).
    Requeued,

    Done,
}

/// Bookkeeping for an execution handed to the worker pool.
struct Running {
    dispatch_id: DispatchId,
    task: String,
    stream: Option<StreamId>,
}

/// What the loop hands back once it reached `Done`.
pub(crate) struct LoopSummary {
    pub(crate) counts: RunCounts,
    pub(crate) completed_streams: Vec<StreamId>,
    pub(crate) still_in_flight: usize,
}

pub(crate) struct DispatchLoop {
    config: SchedulerConfig,
    source: Arc<dyn RecordSource>,
    queue: Arc<TaskQueue>,
    state: SchedulerState,
    gate: AdmissionGate,
    in_flight: InFlight,
    executions: JoinSet<Execution>,
    running: HashMap<Id, Running>,
    backoff: Backoff,
    counts: RunCounts,

    /// Consecutive iterations that only re-enqueued.
    stalled: usize,
}

impl DispatchLoop {
    pub(crate) fn new(
        config: SchedulerConfig,
        catalog: Arc<StreamCatalog>,
        source: Arc<dyn RecordSource>,
        initial: Task,
    ) -> Self {
        let queue = Arc::new(TaskQueue::new());
        queue.push(initial);
        let backoff = Backoff::new(config.backoff.clone());
        let in_flight = InFlight::new(config.max_concurrency);
        Self {
            config,
            source,
            queue,
            state: SchedulerState::new(catalog),
            gate: AdmissionGate::new(),
            in_flight,
            executions: JoinSet::new(),
            running: HashMap::new(),
            backoff,
            counts: RunCounts::default(),
            stalled: 0,
        }
    }

    pub(crate) async fn run(mut self) -> Result<LoopSummary, SchedulerError> {
        if let Err(err) = self.drive().await {
            warn!(error = %err, in_flight = self.executions.len(), "run stopped by fatal fault");
            // 実行中のものは強制キャンセルしない
            self.executions.detach_all();
            return Err(err);
        }

        let still_in_flight = if self.config.drain_on_done {
            self.drain().await?;
            0
        } else {
            let n = self.executions.len();
            self.executions.detach_all();
            n
        };

        Ok(LoopSummary {
            counts: self.counts,
            completed_streams: self.state.completed_streams(),
            still_in_flight,
        })
    }

    async fn drive(&mut self) -> Result<(), SchedulerError> {
        loop {
            self.reap()?;

            if self.in_flight.is_saturated() {
                trace!(in_flight = self.in_flight.get(), "saturated");
                self.idle().await;
                continue;
            }

            let Some(task) = self.queue.try_pop() else {
                self.idle().await;
                continue;
            };

            self.check_affinity(&task)?;

            match self.step(task) {
                Step::Progress => {
                    self.stalled = 0;
                    self.backoff.reset();
                }
                Step::Requeued => {
                    self.stalled += 1;
                    // キューを一周しても進まなければ待つ
                    if self.stalled > self.queue.len() {
                        self.stalled = 0;
                        self.idle().await;
                    } else {
                        tokio::task::yield_now().await;
                    }
                }
                Step::Done => {
                    debug!(pending = self.queue.len(), "done reached");
                    return Ok(());
                }
            }
        }
    }

    /// Route one task: interpreter, gate, primer, then the worker pool.
    fn step(&mut self, task: Task) -> Step {
        let task = match task {
            Task::Control(control) => {
                self.counts.interpreted += 1;
                return match interpret(control, &mut self.state) {
                    Interpreted::Enqueue(tasks) => {
                        self.queue.extend(tasks);
                        Step::Progress
                    }
                    Interpreted::Wait(guard) => {
                        self.counts.barrier_polls += 1;
                        self.queue.push(guard);
                        Step::Requeued
                    }
                    Interpreted::Done => Step::Done,
                };
            }
            work => work,
        };

        let admission = task
            .admission()
            .map(|spec| self.gate.try_admit(spec, task.stream()));
        let permit = match admission {
            Some(Admission::Admit(permit)) => Some(permit),
            Some(Admission::Defer) => {
                trace!(task = task.name(), "admission deferred");
                self.counts.deferred_admission += 1;
                self.queue.push(task);
                return Step::Requeued;
            }
            None => None,
        };

        let Some(slot) = self.in_flight.try_acquire() else {
            drop(permit);
            self.queue.push(task);
            return Step::Requeued;
        };

        let (task, drain_again) = match task {
            Task::Records(consumer) => match prime(consumer, self.source.as_ref(), &mut self.state) {
                Primed::Ready { task, drain_again } => (task, drain_again),
                Primed::Defer(task) => {
                    // ゲートと枠の permit はここで返す
                    drop(slot);
                    drop(permit);
                    self.counts.deferred_empty += 1;
                    self.queue.push(task);
                    return Step::Requeued;
                }
            },
            other => (other, None),
        };

        self.dispatch(task, permit, slot, drain_again);
        Step::Progress
    }

    fn dispatch(
        &mut self,
        task: Task,
        permit: Option<AdmissionPermit>,
        slot: OwnedSemaphorePermit,
        drain_again: Option<Task>,
    ) {
        let dispatch_id = DispatchId::generate();
        let name = task.name().to_string();
        let stream = task.stream().cloned();
        let queue = Arc::clone(&self.queue);

        debug!(
            %dispatch_id,
            task = %name,
            stream = ?stream,
            in_flight = self.in_flight.get(),
            "dispatching"
        );

        let span = debug_span!("execute", %dispatch_id, task = %name);
        let (failed_task, failed_stream) = (name.clone(), stream.clone());
        let handle = self.executions.spawn(
            async move {
                match task.execute().await {
                    Ok(follow_up) => {
                        queue.push(follow_up);
                        drop(permit);
                        drop(slot);
                        if let Some(copy) = drain_again {
                            queue.push(copy);
                        }
                        Ok(())
                    }
                    Err(source) => {
                        error!(error = %source, "task failed");
                        Err(SchedulerError::TaskFailed {
                            task: failed_task,
                            stream: failed_stream,
                            source,
                        })
                    }
                }
            }
            .instrument(span),
        );

        self.running.insert(
            handle.id(),
            Running {
                dispatch_id,
                task: name,
                stream,
            },
        );
        self.counts.dispatched += 1;
    }

    /// Collect finished executions, surfacing the first fault.
    fn reap(&mut self) -> Result<(), SchedulerError> {
        while let Some(joined) = self.executions.try_join_next_with_id() {
            self.settle(joined)?;
        }
        Ok(())
    }

    async fn drain(&mut self) -> Result<(), SchedulerError> {
        debug!(in_flight = self.executions.len(), "draining in-flight executions");
        while let Some(joined) = self.executions.join_next_with_id().await {
            if let Err(err) = self.settle(joined) {
                self.executions.detach_all();
                return Err(err);
            }
        }
        Ok(())
    }

    fn settle(&mut self, joined: Result<(Id, Execution), JoinError>) -> Result<(), SchedulerError> {
        match joined {
            Ok((id, result)) => {
                if let Some(running) = self.running.remove(&id) {
                    trace!(dispatch_id = %running.dispatch_id, ok = result.is_ok(), "execution finished");
                }
                result
            }
            Err(join_error) => {
                let running = self.running.remove(&join_error.id());
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    join_error.to_string()
                };
                let (task, stream) = match running {
                    Some(running) => {
                        error!(dispatch_id = %running.dispatch_id, task = %running.task, %message, "task panicked");
                        (running.task, running.stream)
                    }
                    None => ("<unknown>".to_string(), None),
                };
                Err(SchedulerError::TaskPanicked {
                    task,
                    stream,
                    message,
                })
            }
        }
    }

    fn check_affinity(&self, task: &Task) -> Result<(), SchedulerError> {
        match task.stream() {
            Some(stream) if !self.state.catalog().contains(stream) => {
                Err(SchedulerError::UnknownStream {
                    task: task.name().to_string(),
                    stream: stream.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn idle(&mut self) {
        let delay = self.backoff.next_delay();
        trace!(?delay, queued = self.queue.len(), "idle");
        self.queue.wait(delay).await;
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
