use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::fixed::Fixed64;
use crate::id::{ConnectionId, NodeId};
use crate::resource::ResourceKind;

// ---------------------------------------------------------------------------
// Converter spec
// ---------------------------------------------------------------------------

/// Conversion recipe carried by converter nodes.
///
/// `inputs` maps each required input kind to its weight per blended unit of
/// conversion. One unit of conversion consumes `weight` of each input and
/// yields `efficiency` of the output kind, so the declared recipe
/// "10 minerals -> 5 energy" is weight 1 with efficiency 0.5. Weights must
/// be positive and sum to at least 1 so conversion can lose mass but never
/// gain it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterSpec {
    /// Input kind -> consumption weight per unit of conversion.
    pub inputs: BTreeMap<ResourceKind, Fixed64>,
    /// The kind produced. Must differ from every input kind.
    pub output: ResourceKind,
    /// Output per unit of conversion: 0 < efficiency <= 1.
    pub efficiency: Fixed64,
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// What role a node plays in the flow network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Producer,
    Consumer,
    Storage,
    Converter(ConverterSpec),
}

/// A producer, consumer, storage container, or converter in the network.
///
/// Field meaning varies by kind:
/// - Producer: `current` is the output rate this cycle, `capacity` the
///   maximum throughput.
/// - Consumer: `capacity` is the declared consumption rate per cycle,
///   `current` the intake already received this cycle.
/// - Storage: `capacity`/`current` are volume; `current <= capacity` is an
///   invariant enforced by validation.
/// - Converter: `capacity` caps output per cycle; the recipe lives in the
///   kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Kinds this node emits/accepts. Ignored for converters, whose sets
    /// are derived from the recipe.
    pub resources: BTreeSet<ResourceKind>,
    pub capacity: Fixed64,
    pub current: Fixed64,
    /// Base priority; higher is served first when supply is constrained.
    pub priority: i32,
    /// Inactive nodes stay registered but are excluded from optimization.
    pub active: bool,
}

impl Node {
    /// Convenience constructor for a producer emitting one kind.
    pub fn producer(id: NodeId, resource: ResourceKind, capacity: Fixed64, rate: Fixed64) -> Self {
        Self {
            id,
            kind: NodeKind::Producer,
            resources: BTreeSet::from([resource]),
            capacity,
            current: rate,
            priority: 0,
            active: true,
        }
    }

    /// Convenience constructor for a consumer of one kind with a declared
    /// per-cycle demand.
    pub fn consumer(id: NodeId, resource: ResourceKind, demand: Fixed64) -> Self {
        Self {
            id,
            kind: NodeKind::Consumer,
            resources: BTreeSet::from([resource]),
            capacity: demand,
            current: Fixed64::ZERO,
            priority: 0,
            active: true,
        }
    }

    /// Convenience constructor for a storage container of one kind.
    pub fn storage(id: NodeId, resource: ResourceKind, capacity: Fixed64, current: Fixed64) -> Self {
        Self {
            id,
            kind: NodeKind::Storage,
            resources: BTreeSet::from([resource]),
            capacity,
            current,
            priority: 0,
            active: true,
        }
    }

    /// Convenience constructor for a converter with an output cap.
    pub fn converter(id: NodeId, spec: ConverterSpec, capacity: Fixed64) -> Self {
        Self {
            id,
            kind: NodeKind::Converter(spec),
            resources: BTreeSet::new(),
            capacity,
            current: Fixed64::ZERO,
            priority: 0,
            active: true,
        }
    }

    /// The converter recipe, if this node is a converter.
    pub fn converter_spec(&self) -> Option<&ConverterSpec> {
        match &self.kind {
            NodeKind::Converter(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn is_converter(&self) -> bool {
        matches!(self.kind, NodeKind::Converter(_))
    }

    /// Whether this node can emit the given kind onto an outgoing connection.
    pub fn emits(&self, resource: ResourceKind) -> bool {
        match &self.kind {
            NodeKind::Producer | NodeKind::Storage => self.resources.contains(&resource),
            NodeKind::Converter(spec) => spec.output == resource,
            NodeKind::Consumer => false,
        }
    }

    /// Whether this node can accept the given kind from an incoming connection.
    pub fn accepts(&self, resource: ResourceKind) -> bool {
        match &self.kind {
            NodeKind::Consumer | NodeKind::Storage => self.resources.contains(&resource),
            NodeKind::Converter(spec) => spec.inputs.contains_key(&resource),
            NodeKind::Producer => false,
        }
    }

    /// Supply this node can offer as a source at the start of a cycle.
    /// Converters start at zero; their output is resolved in the pre-pass.
    pub fn available_supply(&self) -> Fixed64 {
        match self.kind {
            NodeKind::Producer => self.current.min(self.capacity),
            NodeKind::Storage => self.current,
            NodeKind::Consumer | NodeKind::Converter(_) => Fixed64::ZERO,
        }
    }

    /// Demand this node can absorb as a target: headroom for storage,
    /// declared rate minus intake so far for consumers, zero otherwise.
    pub fn outstanding_demand(&self) -> Fixed64 {
        match self.kind {
            NodeKind::Consumer | NodeKind::Storage => {
                (self.capacity - self.current).max(Fixed64::ZERO)
            }
            NodeKind::Producer | NodeKind::Converter(_) => Fixed64::ZERO,
        }
    }

    /// Fill ratio current/capacity, clamped to [0, 1]. A node with zero
    /// capacity counts as full so it never out-competes real demand.
    pub fn fill_ratio(&self) -> Fixed64 {
        let one = Fixed64::from_num(1);
        if self.capacity <= Fixed64::ZERO {
            return one;
        }
        (self.current / self.capacity).clamp(Fixed64::ZERO, one)
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// A directed, typed flow edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: NodeId,
    pub target: NodeId,
    pub resource: ResourceKind,
    /// Upper bound on transfer per cycle.
    pub max_rate: Fixed64,
    /// Last recorded transfer amount; `current_rate <= max_rate` is an
    /// invariant enforced by validation.
    pub current_rate: Fixed64,
    /// Edge-level priority override. Defaults to the target node priority.
    pub priority: Option<i32>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        source: NodeId,
        target: NodeId,
        resource: ResourceKind,
        max_rate: Fixed64,
    ) -> Self {
        Self {
            id,
            source,
            target,
            resource,
            max_rate,
            current_rate: Fixed64::ZERO,
            priority: None,
        }
    }

    /// The priority used to order this edge among a target's inputs.
    pub fn effective_priority(&self, target_priority: i32) -> i32 {
        self.priority.unwrap_or(target_priority)
    }
}
