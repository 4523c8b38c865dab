//! AdmissionGate - タスク種別 / (種別, ストリーム) ごとの同時実行数制御
//!
//! 上限のある次元ごとに `Semaphore` を 1 つ持ち、初めて見たときに上限値で作る。
//! 判定（admit / defer）はループの中だけで `try_acquire_owned` で行う。
//! 解放はワーカー側の完了時に `AdmissionPermit` を drop して permit を返すことで行う。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::domain::{AdmissionSpec, StreamId, TaskIdentity};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CounterKey {
    Identity(TaskIdentity),
    Stream(TaskIdentity, StreamId),
}

/// One limited dimension: its size and the permits left.
#[derive(Debug, Clone)]
struct Limit {
    size: usize,
    semaphore: Arc<Semaphore>,
}

impl Limit {
    fn new(size: usize) -> Self {
        let size = size.min(Semaphore::MAX_PERMITS);
        Self {
            size,
            semaphore: Arc::new(Semaphore::new(size)),
        }
    }

    fn held(&self) -> usize {
        self.size.saturating_sub(self.semaphore.available_permits())
    }
}

/// Result of asking the gate to admit one task.
#[derive(Debug)]
pub enum Admission {
    /// Permits were acquired; dropping the permit releases them.
    Admit(AdmissionPermit),

    /// At capacity. Nothing stays acquired.
    Defer,
}

/// Semaphores keyed by task identity and by (identity, stream).
///
/// The first spec seen for a key sizes its semaphore.
#[derive(Debug, Default)]
pub struct AdmissionGate {
    limits: HashMap<CounterKey, Limit>,
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_acquire(&mut self, key: CounterKey, size: usize) -> Option<OwnedSemaphorePermit> {
        let limit = self.limits.entry(key).or_insert_with(|| Limit::new(size));
        Arc::clone(&limit.semaphore).try_acquire_owned().ok()
    }

    /// Admit or defer a task carrying `spec`.
    ///
    /// 1. per-identity: take a permit when `per_sync_limit > 0`
    /// 2. per-(identity, stream): same, when the task has a stream and `per_stream_limit > 0`
    ///
    /// A task failing either check is deferred as a whole; a permit taken by
    /// the first check is dropped with the partial admission.
    pub fn try_admit(&mut self, spec: &AdmissionSpec, stream: Option<&StreamId>) -> Admission {
        let mut permits = Vec::with_capacity(2);
        if !spec.is_limited() {
            return Admission::Admit(AdmissionPermit { _permits: permits });
        }

        if spec.per_sync_limit > 0 {
            let key = CounterKey::Identity(spec.identity.clone());
            match self.try_acquire(key, spec.per_sync_limit) {
                Some(permit) => permits.push(permit),
                None => return Admission::Defer,
            }
        }

        if spec.per_stream_limit > 0
            && let Some(stream) = stream
        {
            let key = CounterKey::Stream(spec.identity.clone(), stream.clone());
            match self.try_acquire(key, spec.per_stream_limit) {
                Some(permit) => permits.push(permit),
                None => return Admission::Defer,
            }
        }

        Admission::Admit(AdmissionPermit { _permits: permits })
    }

    /// Instances of `identity` currently in flight (only tracked when the
    /// spec sets a per-sync limit).
    pub fn in_flight(&self, identity: &TaskIdentity) -> usize {
        self.held(&CounterKey::Identity(identity.clone()))
    }

    /// Instances of `identity` on `stream` currently in flight
    /// (only tracked when the spec sets a per-stream limit).
    pub fn in_flight_on_stream(&self, identity: &TaskIdentity, stream: &StreamId) -> usize {
        self.held(&CounterKey::Stream(identity.clone(), stream.clone()))
    }

    fn held(&self, key: &CounterKey) -> usize {
        self.limits.get(key).map_or(0, Limit::held)
    }
}

/// Permits held by one admitted execution. Released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permits: Vec<OwnedSemaphorePermit>,
}

/// Global slots for work tasks handed to the worker pool.
#[derive(Debug, Clone)]
pub struct InFlight {
    limit: Limit,
}

impl InFlight {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            limit: Limit::new(max_concurrency),
        }
    }

    pub fn get(&self) -> usize {
        self.limit.held()
    }

    pub fn is_saturated(&self) -> bool {
        self.limit.semaphore.available_permits() == 0
    }

    /// Take one slot; `None` when saturated. The slot frees when dropped.
    pub(crate) fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.limit.semaphore).try_acquire_owned().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn users() -> StreamId {
        StreamId::new("users")
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    fn per_sync_limit_defers_once_saturated(#[case] limit: usize) {
        let mut gate = AdmissionGate::new();
        let spec = AdmissionSpec::new("flush", limit, 0);

        let permits: Vec<_> = (0..limit)
            .map(|_| match gate.try_admit(&spec, None) {
                Admission::Admit(permit) => permit,
                Admission::Defer => panic!("should admit below the limit"),
            })
            .collect();

        assert!(matches!(gate.try_admit(&spec, None), Admission::Defer));
        assert_eq!(gate.in_flight(&spec.identity), limit);

        drop(permits);
        assert_eq!(gate.in_flight(&spec.identity), 0);
        assert!(matches!(gate.try_admit(&spec, None), Admission::Admit(_)));
    }

    #[test]
    fn per_stream_limit_is_independent_per_stream() {
        let mut gate = AdmissionGate::new();
        let spec = AdmissionSpec::new("process", 0, 1);
        let orders = StreamId::new("orders");

        let _users = gate.try_admit(&spec, Some(&users()));
        assert!(matches!(gate.try_admit(&spec, Some(&users())), Admission::Defer));
        assert!(matches!(gate.try_admit(&spec, Some(&orders)), Admission::Admit(_)));
        assert_eq!(gate.in_flight_on_stream(&spec.identity, &users()), 1);
    }

    #[test]
    fn failed_stream_check_rolls_back_identity_permit() {
        let mut gate = AdmissionGate::new();
        let spec = AdmissionSpec::new("process", 5, 1);

        let _first = gate.try_admit(&spec, Some(&users()));
        assert_eq!(gate.in_flight(&spec.identity), 1);

        assert!(matches!(gate.try_admit(&spec, Some(&users())), Admission::Defer));
        assert_eq!(gate.in_flight(&spec.identity), 1);
        assert_eq!(gate.in_flight_on_stream(&spec.identity, &users()), 1);
    }

    #[test]
    fn permit_releases_both_dimensions_on_drop() {
        let mut gate = AdmissionGate::new();
        let spec = AdmissionSpec::new("process", 1, 1);

        let first = gate.try_admit(&spec, Some(&users()));
        assert!(matches!(first, Admission::Admit(_)));
        drop(first);

        assert_eq!(gate.in_flight(&spec.identity), 0);
        assert_eq!(gate.in_flight_on_stream(&spec.identity, &users()), 0);
        assert!(matches!(gate.try_admit(&spec, Some(&users())), Admission::Admit(_)));
    }

    #[test]
    fn per_stream_limit_is_ignored_without_affinity() {
        let mut gate = AdmissionGate::new();
        let spec = AdmissionSpec::new("setup", 0, 1);

        let _a = gate.try_admit(&spec, None);
        assert!(matches!(gate.try_admit(&spec, None), Admission::Admit(_)));
    }

    #[test]
    fn unlimited_spec_is_always_admitted() {
        let mut gate = AdmissionGate::new();
        let spec = AdmissionSpec::new("free", 0, 0);

        let held: Vec<_> = (0..10).map(|_| gate.try_admit(&spec, Some(&users()))).collect();
        assert!(held.iter().all(|a| matches!(a, Admission::Admit(_))));
        assert_eq!(gate.in_flight(&spec.identity), 0);
    }

    #[test]
    fn in_flight_slots_saturate_and_free_on_drop() {
        let in_flight = InFlight::new(2);
        let a = in_flight.try_acquire().expect("first slot");
        let b = in_flight.try_acquire().expect("second slot");
        assert_eq!(in_flight.get(), 2);
        assert!(in_flight.is_saturated());
        assert!(in_flight.try_acquire().is_none());

        drop(a);
        assert_eq!(in_flight.get(), 1);
        assert!(!in_flight.is_saturated());
        drop(b);
        assert_eq!(in_flight.get(), 0);
    }
}
