//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID
//! Run と Dispatch の識別子は ULID を使います。
//! 時刻でソートできるので、ログを並べたときに発行順がそのまま読めます。
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を持ち、`T` はコンパイル時だけのマーカー型です。
//! RunId と DispatchId は同じ 16 bytes でも混同できません。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"run-", "dispatch-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// Generate a fresh id from the current time.
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Run のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Run {}

impl IdMarker for Run {
    fn prefix() -> &'static str {
        "run-"
    }
}

/// Dispatch のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dispatch {}

impl IdMarker for Dispatch {
    fn prefix() -> &'static str {
        "dispatch-"
    }
}

/// Identifier of one scheduler run (from seed task to `Done`).
pub type RunId = Id<Run>;

/// Identifier of one hand-off of a work task to the worker pool.
pub type DispatchId = Id<Dispatch>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();

        let run = RunId::from_ulid(ulid1);
        let dispatch = DispatchId::from_ulid(ulid2);

        assert_eq!(run.as_ulid(), ulid1);
        assert_eq!(dispatch.as_ulid(), ulid2);

        assert!(run.to_string().starts_with("run-"));
        assert!(dispatch.to_string().starts_with("dispatch-"));
        // let _: RunId = dispatch; // <- does not compile
    }

    #[test]
    fn generated_ids_are_unique_and_sortable() {
        let id1 = DispatchId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = DispatchId::generate();

        assert_ne!(id1, id2);
        assert!(id1 < id2);
    }

    #[test]
    fn run_id_can_be_serialized() {
        let run_id = RunId::generate();

        let serialized = serde_json::to_string(&run_id).unwrap();
        let deserialized: RunId = serde_json::from_str(&serialized).unwrap();

        assert_eq!(run_id, deserialized);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<RunId>(), size_of::<Ulid>());
        assert_eq!(size_of::<DispatchId>(), size_of::<Ulid>());
    }
}
