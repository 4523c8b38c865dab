//! SchedulerState - ループだけが触る実行時状態
//!
//! 名前付きカウンタ、ExactlyOnce の既出 id、ストリーム完了フラグ。
//! どれもループ（とインタプリタ・プライマー）からしか変更されないので、
//! ロックは不要。ワーカープール側のタスクには渡さない。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::domain::{StreamCatalog, StreamId};

/// Process-wide state for one run, discarded when the loop exits.
#[derive(Debug)]
pub struct SchedulerState {
    catalog: Arc<StreamCatalog>,

    /// Named counters driven by Incrementing / Decrementing.
    counters: HashMap<String, i64>,

    /// ExactlyOnce ids. Only grows.
    seen: HashSet<String>,

    /// Streams whose end was observed by the primer. Only grows.
    completed: HashSet<StreamId>,
}

impl SchedulerState {
    pub fn new(catalog: Arc<StreamCatalog>) -> Self {
        Self {
            catalog,
            counters: HashMap::new(),
            seen: HashSet::new(),
            completed: HashSet::new(),
        }
    }

    pub fn catalog(&self) -> &StreamCatalog {
        &self.catalog
    }

    /// Current value of counter `id`; counters start at zero.
    pub fn counter(&self, id: &str) -> i64 {
        self.counters.get(id).copied().unwrap_or(0)
    }

    pub(crate) fn increment(&mut self, id: &str) -> i64 {
        let value = self.counters.entry(id.to_string()).or_insert(0);
        *value += 1;
        *value
    }

    pub(crate) fn decrement(&mut self, id: &str) -> i64 {
        let value = self.counters.entry(id.to_string()).or_insert(0);
        *value -= 1;
        *value
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Returns true the first time `id` is seen.
    pub(crate) fn mark_seen(&mut self, id: &str) -> bool {
        self.seen.insert(id.to_string())
    }

    pub fn is_stream_complete(&self, stream: &StreamId) -> bool {
        self.completed.contains(stream)
    }

    /// Returns true if the flag flipped with this call.
    pub(crate) fn mark_stream_complete(&mut self, stream: &StreamId) -> bool {
        self.completed.insert(stream.clone())
    }

    /// Completed streams in catalog order.
    pub fn completed_streams(&self) -> Vec<StreamId> {
        self.catalog
            .iter()
            .filter(|stream| self.completed.contains(*stream))
            .cloned()
            .collect()
    }
}
