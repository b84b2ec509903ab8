//! Threshold bands and priority evaluation.
//!
//! Each target node is placed into a band by its fill ratio, and the band's
//! boost is added to the node's base priority to produce the effective
//! priority the allocator orders by. Band boosts are configurable; the
//! defaults favor nearly-empty nodes strongly and push nearly-full nodes to
//! the back of the queue.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fluxgrid_core::fixed::Fixed64;
use fluxgrid_core::graph::Snapshot;
use fluxgrid_core::id::NodeId;
use fluxgrid_core::node::Node;

// ---------------------------------------------------------------------------
// Bands
// ---------------------------------------------------------------------------

/// Fill-ratio band. Boundaries are half-open: a node sitting exactly on a
/// boundary belongs to the higher band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThresholdBand {
    /// Below 10% full.
    Critical,
    /// Below 25% full.
    Low,
    /// Below 75% full.
    Normal,
    /// Below 95% full.
    High,
    /// 95% full or more. Zero-capacity nodes land here so they never
    /// out-compete real demand.
    Excess,
}

impl ThresholdBand {
    /// Stable numeric encoding, used when a band is fed into a fingerprint.
    pub fn index(self) -> u8 {
        match self {
            ThresholdBand::Critical => 0,
            ThresholdBand::Low => 1,
            ThresholdBand::Normal => 2,
            ThresholdBand::High => 3,
            ThresholdBand::Excess => 4,
        }
    }
}

/// Classify a node by its fill ratio.
///
/// Boundaries are compared by cross-multiplication (`current * 20 <
/// capacity * 19` instead of `current / capacity < 0.95`) so a node sitting
/// exactly on a boundary classifies exactly, with no division truncation.
/// The products are taken over the raw bits in 128-bit integers, so the
/// full `Fixed64` range classifies without overflow.
pub fn band_for(node: &Node) -> ThresholdBand {
    let cap = node.capacity;
    if cap <= Fixed64::ZERO {
        return ThresholdBand::Excess;
    }
    let cur = node.current.clamp(Fixed64::ZERO, cap).to_bits() as i128;
    let cap = cap.to_bits() as i128;
    if cur * 10 < cap {
        ThresholdBand::Critical
    } else if cur * 4 < cap {
        ThresholdBand::Low
    } else if cur * 4 < cap * 3 {
        ThresholdBand::Normal
    } else if cur * 20 < cap * 19 {
        ThresholdBand::High
    } else {
        ThresholdBand::Excess
    }
}

// ---------------------------------------------------------------------------
// Boosts
// ---------------------------------------------------------------------------

/// Per-band priority boosts added to a node's base priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandBoosts {
    pub critical: i32,
    pub low: i32,
    pub normal: i32,
    pub high: i32,
    pub excess: i32,
}

impl Default for BandBoosts {
    fn default() -> Self {
        Self {
            critical: 100,
            low: 50,
            normal: 0,
            high: -25,
            excess: -100,
        }
    }
}

impl BandBoosts {
    pub fn boost(&self, band: ThresholdBand) -> i32 {
        match band {
            ThresholdBand::Critical => self.critical,
            ThresholdBand::Low => self.low,
            ThresholdBand::Normal => self.normal,
            ThresholdBand::High => self.high,
            ThresholdBand::Excess => self.excess,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// One node's standing for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEvaluation {
    pub band: ThresholdBand,
    /// Base priority plus band boost, saturating at the i32 bounds.
    pub effective_priority: i32,
    pub fill_ratio: Fixed64,
}

/// Evaluate every node in the snapshot. The result map iterates in node-id
/// order, so downstream consumers inherit determinism for free.
pub fn evaluate(snapshot: &Snapshot, boosts: &BandBoosts) -> BTreeMap<NodeId, NodeEvaluation> {
    snapshot
        .nodes()
        .map(|(&id, node)| {
            let ratio = node.fill_ratio();
            let band = band_for(node);
            (
                id,
                NodeEvaluation {
                    band,
                    effective_priority: node.priority.saturating_add(boosts.boost(band)),
                    fill_ratio: ratio,
                },
            )
        })
        .collect()
}

/// Total order over demand targets: higher effective priority first, then
/// emptier (lower fill ratio) first, then lower node id. The final id key
/// makes the order total, so equal-standing nodes resolve the same way in
/// every run.
pub fn allocation_cmp(
    a_id: NodeId,
    a: &NodeEvaluation,
    b_id: NodeId,
    b: &NodeEvaluation,
) -> Ordering {
    b.effective_priority
        .cmp(&a.effective_priority)
        .then_with(|| a.fill_ratio.cmp(&b.fill_ratio))
        .then_with(|| a_id.cmp(&b_id))
}
