use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fixed::Fixed64;
use crate::id::{ConnectionId, NodeId};
use crate::node::{Connection, Node, NodeKind};
use crate::validation::{self, ValidationError};

// ---------------------------------------------------------------------------
// Adjacency
// ---------------------------------------------------------------------------

/// Adjacency lists for a single node, tracking incoming and outgoing
/// connections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NodeAdjacency {
    /// Connections whose target is this node.
    incoming: Vec<ConnectionId>,
    /// Connections whose source is this node.
    outgoing: Vec<ConnectionId>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An immutable view of the active subgraph, taken at a point in time.
///
/// The optimizer works exclusively on snapshots, so graph mutations that
/// happen while a cycle is in flight are invisible to that cycle and
/// picked up by the next snapshot. Ordered maps guarantee deterministic
/// iteration everywhere a snapshot is walked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    nodes: BTreeMap<NodeId, Node>,
    connections: BTreeMap<ConnectionId, Connection>,
    sequence: u64,
}

impl Snapshot {
    /// Assemble a snapshot from raw parts. Normally obtained via
    /// [`FlowGraph::active_snapshot`]; direct construction exists for
    /// drivers that stage topology themselves and for integrity tests.
    pub fn new(
        nodes: BTreeMap<NodeId, Node>,
        connections: BTreeMap<ConnectionId, Connection>,
        sequence: u64,
    ) -> Self {
        Self {
            nodes,
            connections,
            sequence,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Iterate nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Iterate connections in id order.
    pub fn connections(&self) -> impl Iterator<Item = (&ConnectionId, &Connection)> {
        self.connections.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// The graph change sequence this snapshot was taken at.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

// ---------------------------------------------------------------------------
// FlowGraph
// ---------------------------------------------------------------------------

/// The authoritative store of flow-network topology.
///
/// Every mutation is validated before it is applied; a rejected mutation
/// leaves the graph byte-identical to its prior state. The graph never
/// computes flow itself -- the optimizer reads an immutable
/// [`Snapshot`] and returns transfer instructions that an external ledger
/// applies back through [`FlowGraph::set_current`] /
/// [`FlowGraph::record_rate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    nodes: BTreeMap<NodeId, Node>,
    connections: BTreeMap<ConnectionId, Connection>,
    adjacency: BTreeMap<NodeId, NodeAdjacency>,
    /// Monotonic counter bumped on every successful mutation. Collaborators
    /// poll this instead of subscribing to an event bus.
    sequence: u64,
}

impl FlowGraph {
    /// Create a new, empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic change counter; compare against a remembered value to
    /// detect that the topology or node state changed.
    pub fn change_sequence(&self) -> u64 {
        self.sequence
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn contains_connection(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Iterate nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Iterate connections in id order.
    pub fn connections(&self) -> impl Iterator<Item = (&ConnectionId, &Connection)> {
        self.connections.iter()
    }

    /// Connections whose target is the given node.
    pub fn incoming(&self, node: NodeId) -> &[ConnectionId] {
        self.adjacency
            .get(&node)
            .map(|adj| adj.incoming.as_slice())
            .unwrap_or(&[])
    }

    /// Connections whose source is the given node.
    pub fn outgoing(&self, node: NodeId) -> &[ConnectionId] {
        self.adjacency
            .get(&node)
            .map(|adj| adj.outgoing.as_slice())
            .unwrap_or(&[])
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Register a node. Rejects duplicate ids and any node invariant
    /// violation; all violations are reported together.
    pub fn register_node(&mut self, node: Node) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.nodes.contains_key(&node.id) {
            errors.push(ValidationError::DuplicateNodeId(node.id));
        }
        if let Err(node_errors) = validation::validate_node(&node) {
            errors.extend(node_errors);
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        self.adjacency.insert(node.id, NodeAdjacency::default());
        self.nodes.insert(node.id, node);
        self.sequence += 1;
        Ok(())
    }

    /// Register a connection between two existing nodes. Rejects duplicate
    /// ids, unknown endpoints, self-loops, and resource mismatches.
    pub fn register_connection(&mut self, conn: Connection) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.connections.contains_key(&conn.id) {
            errors.push(ValidationError::DuplicateConnectionId(conn.id));
        }

        let source = self.nodes.get(&conn.source);
        let target = self.nodes.get(&conn.target);
        if source.is_none() {
            errors.push(ValidationError::UnknownNode(conn.source));
        }
        if target.is_none() {
            errors.push(ValidationError::UnknownNode(conn.target));
        }
        if let (Some(source), Some(target)) = (source, target)
            && let Err(conn_errors) = validation::validate_connection(&conn, source, target)
        {
            errors.extend(conn_errors);
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        if let Some(adj) = self.adjacency.get_mut(&conn.source) {
            adj.outgoing.push(conn.id);
        }
        if let Some(adj) = self.adjacency.get_mut(&conn.target) {
            adj.incoming.push(conn.id);
        }
        self.connections.insert(conn.id, conn);
        self.sequence += 1;
        Ok(())
    }

    /// Remove a node and every connection touching it. Removing an absent
    /// id is a no-op, not an error.
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(adj) = self.adjacency.remove(&id) else {
            return;
        };
        for conn_id in adj.incoming.iter().chain(adj.outgoing.iter()) {
            self.remove_connection_internal(*conn_id);
        }
        self.nodes.remove(&id);
        self.sequence += 1;
    }

    /// Remove a connection. Idempotent.
    pub fn remove_connection(&mut self, id: ConnectionId) {
        if self.remove_connection_internal(id) {
            self.sequence += 1;
        }
    }

    fn remove_connection_internal(&mut self, id: ConnectionId) -> bool {
        let Some(conn) = self.connections.remove(&id) else {
            return false;
        };
        if let Some(adj) = self.adjacency.get_mut(&conn.source) {
            adj.outgoing.retain(|&c| c != id);
        }
        if let Some(adj) = self.adjacency.get_mut(&conn.target) {
            adj.incoming.retain(|&c| c != id);
        }
        true
    }

    /// Update a node's `current` value (stored amount or rate). Rejects
    /// negative values and storage overfill; the node is unchanged on error.
    pub fn set_current(&mut self, id: NodeId, current: Fixed64) -> Result<(), ValidationError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(ValidationError::UnknownNode(id))?;
        if current < Fixed64::ZERO {
            return Err(ValidationError::NegativeCurrent(id));
        }
        if matches!(node.kind, NodeKind::Storage) && current > node.capacity {
            return Err(ValidationError::CurrentExceedsCapacity(id));
        }
        node.current = current;
        self.sequence += 1;
        Ok(())
    }

    /// Toggle a node's participation in optimization. Inactive nodes stay
    /// registered with all their connections.
    pub fn set_active(&mut self, id: NodeId, active: bool) -> Result<(), ValidationError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(ValidationError::UnknownNode(id))?;
        if node.active != active {
            node.active = active;
            self.sequence += 1;
        }
        Ok(())
    }

    /// Update a node's base priority.
    pub fn set_priority(&mut self, id: NodeId, priority: i32) -> Result<(), ValidationError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(ValidationError::UnknownNode(id))?;
        if node.priority != priority {
            node.priority = priority;
            self.sequence += 1;
        }
        Ok(())
    }

    /// Record the transfer amount the ledger applied over a connection
    /// this cycle. Enforces `rate <= max_rate`.
    pub fn record_rate(&mut self, id: ConnectionId, rate: Fixed64) -> Result<(), ValidationError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(ValidationError::UnknownConnection(id))?;
        if rate < Fixed64::ZERO {
            return Err(ValidationError::NegativeRate(id));
        }
        if rate > conn.max_rate {
            return Err(ValidationError::RateExceedsMax(id));
        }
        conn.current_rate = rate;
        self.sequence += 1;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Take an immutable snapshot of the active subgraph: active nodes plus
    /// the connections whose endpoints are both active. Cascade removal
    /// guarantees no dangling connections can appear here.
    pub fn active_snapshot(&self) -> Snapshot {
        let nodes: BTreeMap<NodeId, Node> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.active)
            .map(|(id, n)| (*id, n.clone()))
            .collect();
        let connections: BTreeMap<ConnectionId, Connection> = self
            .connections
            .iter()
            .filter(|(_, c)| nodes.contains_key(&c.source) && nodes.contains_key(&c.target))
            .map(|(id, c)| (*id, c.clone()))
            .collect();
        Snapshot::new(nodes, connections, self.sequence)
    }
}
