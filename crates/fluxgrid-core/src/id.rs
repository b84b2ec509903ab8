use serde::{Deserialize, Serialize};

/// Identifies a node in the flow graph. Supplied by the caller when the
/// node is registered; stable for the node's lifetime. Cheap to copy and
/// compare, and ordered so that allocation tie-breaks are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identifies a connection (directed edge) in the flow graph. Caller
/// supplied, stable, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

/// Cycles are the atomic unit of optimization time.
pub type CycleId = u64;
