//! Errors - エラー型と分類
//!
//! # 分類
//! - 同時実行数の競合 / 空のバッチ / 未成立のバリア: エラーではない（再キューで処理）
//! - カタログ外のストリームを指すタスク: プログラミングエラー（即失敗）
//! - タスク実行の失敗: run 全体を止める（呼び出し元に返す）

use thiserror::Error;

use super::StreamId;

/// Failure returned by a work task's execution.
///
/// Only unrecoverable faults belong here; expected conditions should be
/// expressed as follow-up tasks instead.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for TaskError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Errors surfaced by the scheduler to its caller.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task '{task}' refers to stream '{stream}' which is not in the catalog")]
    UnknownStream { task: String, stream: StreamId },

    #[error("task '{task}'{} failed: {source}", stream_suffix(.stream))]
    TaskFailed {
        task: String,
        stream: Option<StreamId>,
        #[source]
        source: TaskError,
    },

    #[error("task '{task}'{} panicked: {message}", stream_suffix(.stream))]
    TaskPanicked {
        task: String,
        stream: Option<StreamId>,
        message: String,
    },
}

impl SchedulerError {
    /// The stream involved in the failure, if any.
    pub fn stream(&self) -> Option<&StreamId> {
        match self {
            SchedulerError::UnknownStream { stream, .. } => Some(stream),
            SchedulerError::TaskFailed { stream, .. }
            | SchedulerError::TaskPanicked { stream, .. } => stream.as_ref(),
        }
    }
}

fn stream_suffix(stream: &Option<StreamId>) -> String {
    match stream {
        Some(stream) => format!(" on stream '{stream}'"),
        None => String::new(),
    }
}

/// ConfigError は設定ファイル読み込み時のエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_failure_reports_task_and_stream() {
        let err = SchedulerError::TaskFailed {
            task: "process-records".to_string(),
            stream: Some(StreamId::new("users")),
            source: TaskError::failed("disk full"),
        };
        let msg = err.to_string();
        assert!(msg.contains("process-records"));
        assert!(msg.contains("users"));
        assert!(msg.contains("disk full"));
        assert_eq!(err.stream(), Some(&StreamId::new("users")));
    }

    #[test]
    fn task_failure_without_stream_has_no_stream_suffix() {
        let err = SchedulerError::TaskPanicked {
            task: "setup".to_string(),
            stream: None,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "task 'setup' panicked: boom");
        assert!(err.stream().is_none());
    }
}
