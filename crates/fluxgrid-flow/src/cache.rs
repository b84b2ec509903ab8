//! Result caching keyed by a snapshot fingerprint.
//!
//! A cycle over an unchanged network is pure recomputation, so the
//! optimizer memoizes the latest complete result. The key is a
//! deterministic FNV fingerprint over everything allocation reads: node
//! state and standing, connection topology and limits. Any change to any of
//! those yields a different fingerprint and therefore a recomputation; two
//! graphs that fingerprint alike allocate alike.
//!
//! The cache holds a single entry with a TTL. Time is passed in by the
//! caller, which keeps expiry testable without sleeping.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use fluxgrid_core::graph::Snapshot;
use fluxgrid_core::hash::FlowHash;
use fluxgrid_core::id::NodeId;

use crate::threshold::NodeEvaluation;

/// Deterministic fingerprint of a snapshot plus its evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint(pub u64);

/// Compute the fingerprint the cache is keyed by. Iteration is in id order
/// on both maps, so equal inputs always produce equal fingerprints.
pub fn fingerprint(snapshot: &Snapshot, evals: &BTreeMap<NodeId, NodeEvaluation>) -> Fingerprint {
    let mut hash = FlowHash::new();
    hash.write_u64(snapshot.node_count() as u64);
    for (&id, node) in snapshot.nodes() {
        hash.write_u32(id.0);
        hash.write_fixed64(node.current);
        hash.write_fixed64(node.capacity);
        hash.write_i32(node.priority);
        if let Some(eval) = evals.get(&id) {
            hash.write_u8(eval.band.index());
            hash.write_i32(eval.effective_priority);
        }
    }
    hash.write_u64(snapshot.connection_count() as u64);
    for (&id, conn) in snapshot.connections() {
        hash.write_u32(id.0);
        hash.write_u32(conn.source.0);
        hash.write_u32(conn.target.0);
        hash.write_u8(conn.resource.index() as u8);
        hash.write_fixed64(conn.max_rate);
        match conn.priority {
            Some(p) => {
                hash.write_u8(1);
                hash.write_i32(p);
            }
            None => hash.write_u8(0),
        }
    }
    Fingerprint(hash.finish())
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    fingerprint: Fingerprint,
    inserted_at: Instant,
    result: T,
}

/// Single-entry TTL cache for cycle results.
#[derive(Debug, Clone)]
pub struct ResultCache<T> {
    ttl: Duration,
    entry: Option<CacheEntry<T>>,
}

impl<T: Clone> ResultCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The stored result, if its fingerprint matches and it has not aged
    /// past the TTL at `now`.
    pub fn lookup(&self, fingerprint: Fingerprint, now: Instant) -> Option<&T> {
        let entry = self.entry.as_ref()?;
        if entry.fingerprint != fingerprint {
            return None;
        }
        if now.duration_since(entry.inserted_at) >= self.ttl {
            return None;
        }
        Some(&entry.result)
    }

    /// Store a result, replacing whatever was cached before.
    pub fn store(&mut self, fingerprint: Fingerprint, result: T, now: Instant) {
        self.entry = Some(CacheEntry {
            fingerprint,
            inserted_at: now,
            result,
        });
    }

    /// Drop the cached entry.
    pub fn clear(&mut self) {
        self.entry = None;
    }
}
