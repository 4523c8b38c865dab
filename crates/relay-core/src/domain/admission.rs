//! Admission spec - タスク種別ごとの同時実行上限
//!
//! `0` はその次元に上限がないことを意味する。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity that admission counters are keyed by (e.g. `"process-records"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskIdentity(String);

impl TaskIdentity {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Bounds how many instances of one task identity run at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionSpec {
    pub identity: TaskIdentity,

    /// Max concurrent instances across the whole sync (`0` = unlimited).
    #[serde(default)]
    pub per_sync_limit: usize,

    /// Max concurrent instances per stream (`0` = unlimited).
    /// Only applies to tasks that carry stream affinity.
    #[serde(default)]
    pub per_stream_limit: usize,
}

impl AdmissionSpec {
    pub fn new(identity: impl Into<String>, per_sync_limit: usize, per_stream_limit: usize) -> Self {
        Self {
            identity: TaskIdentity::new(identity),
            per_sync_limit,
            per_stream_limit,
        }
    }

    pub fn is_limited(&self) -> bool {
        self.per_sync_limit > 0 || self.per_stream_limit > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limits_mean_unlimited() {
        let spec = AdmissionSpec::new("flush", 0, 0);
        assert!(!spec.is_limited());
        assert!(AdmissionSpec::new("flush", 2, 0).is_limited());
        assert!(AdmissionSpec::new("flush", 0, 1).is_limited());
    }

    #[test]
    fn limits_default_to_zero_when_omitted() {
        let spec: AdmissionSpec =
            serde_json::from_str(r#"{ "identity": "flush" }"#).expect("deserialize");
        assert_eq!(spec.identity.as_str(), "flush");
        assert_eq!(spec.per_sync_limit, 0);
        assert_eq!(spec.per_stream_limit, 0);
    }
}
