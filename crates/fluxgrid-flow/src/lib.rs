//! Fluxgrid Flow -- the per-cycle resource-flow optimizer.
//!
//! This crate consumes immutable snapshots from `fluxgrid-core` and turns
//! them into transfer instructions. It owns the allocation policy: threshold
//! bands and effective priorities, converter chain resolution, batched
//! greedy allocation, deficit accounting, and the fingerprint-keyed result
//! cache.
//!
//! # Pipeline
//!
//! ```text
//! Snapshot -> evaluate (threshold bands)
//!          -> fingerprint -> cache hit? return stored result
//!          -> converter pre-pass (topological, cycles excluded)
//!          -> batched allocation (priority desc, fill asc, id asc)
//!          -> deficits + metrics -> cache store (complete cycles only)
//! ```
//!
//! The whole pipeline is deterministic: fixed-point arithmetic, ordered
//! maps, and total tie-break orders mean the same snapshot yields the same
//! transfers on every platform and every run.

pub mod batch;
pub mod cache;
pub mod config;
pub mod converter;
pub mod optimizer;
pub mod threshold;

pub use config::FlowConfig;
pub use optimizer::{
    CycleMetrics, Deficit, FlowOptimizer, OptimizationResult, OptimizeError, Transfer,
};
