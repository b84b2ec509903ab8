//! Stateless guard functions invoked by the graph model and by external
//! callers constructing nodes/connections from loosely-typed input (save
//! data, UI forms).
//!
//! Validators return the *full* list of violated invariants, not just the
//! first, so callers can report a complete batch of errors for one rejected
//! mutation. Nothing here mutates state and nothing panics on bad input.

use crate::fixed::Fixed64;
use crate::id::{ConnectionId, NodeId};
use crate::node::{Connection, Node, NodeKind};
use crate::resource::ResourceKind;

/// Recoverable, caller-correctable validation failures. Always returned,
/// never thrown; the graph is left unchanged when any of these is reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown resource kind: {0:?}")]
    UnknownResourceType(String),
    #[error("node id already registered: {0:?}")]
    DuplicateNodeId(NodeId),
    #[error("connection id already registered: {0:?}")]
    DuplicateConnectionId(ConnectionId),
    #[error("node not found: {0:?}")]
    UnknownNode(NodeId),
    #[error("connection not found: {0:?}")]
    UnknownConnection(ConnectionId),
    #[error("connection {connection:?} carries {resource:?}, unsupported by an endpoint")]
    ResourceTypeMismatch {
        connection: ConnectionId,
        resource: ResourceKind,
    },
    #[error("connection source and target are the same node: {0:?}")]
    SelfLoop(NodeId),
    #[error("invalid resource set on node {0:?}")]
    InvalidResourceSet(NodeId),
    #[error("empty resource set on node {0:?}")]
    EmptyResourceSet(NodeId),
    #[error("negative capacity on node {0:?}")]
    NegativeCapacity(NodeId),
    #[error("negative current on node {0:?}")]
    NegativeCurrent(NodeId),
    #[error("current exceeds capacity on storage node {0:?}")]
    CurrentExceedsCapacity(NodeId),
    #[error("converter efficiency out of (0, 1] on node {0:?}")]
    EfficiencyOutOfRange(NodeId),
    #[error("negative max rate on connection {0:?}")]
    NegativeMaxRate(ConnectionId),
    #[error("negative current rate on connection {0:?}")]
    NegativeRate(ConnectionId),
    #[error("current rate exceeds max rate on connection {0:?}")]
    RateExceedsMax(ConnectionId),
}

/// Map an external string or numeric encoding to a [`ResourceKind`].
///
/// Accepts the canonical lowercase name or the stable numeric index as a
/// decimal string. Fails closed: anything unrecognized is an error, never a
/// silent default.
pub fn parse_resource_kind(raw: &str) -> Result<ResourceKind, ValidationError> {
    let trimmed = raw.trim();
    if let Some(kind) = ResourceKind::from_name(trimmed) {
        return Ok(kind);
    }
    if let Ok(index) = trimmed.parse::<u32>()
        && let Some(kind) = ResourceKind::from_index(index)
    {
        return Ok(kind);
    }
    Err(ValidationError::UnknownResourceType(trimmed.to_string()))
}

/// Check every node invariant, collecting all violations.
pub fn validate_node(node: &Node) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if node.capacity < Fixed64::ZERO {
        errors.push(ValidationError::NegativeCapacity(node.id));
    }
    if node.current < Fixed64::ZERO {
        errors.push(ValidationError::NegativeCurrent(node.id));
    }

    match &node.kind {
        NodeKind::Producer | NodeKind::Consumer => {
            if node.resources.is_empty() {
                errors.push(ValidationError::EmptyResourceSet(node.id));
            }
        }
        NodeKind::Storage => {
            if node.resources.is_empty() {
                errors.push(ValidationError::EmptyResourceSet(node.id));
            }
            if node.current > node.capacity {
                errors.push(ValidationError::CurrentExceedsCapacity(node.id));
            }
        }
        NodeKind::Converter(spec) => {
            let one = Fixed64::from_num(1);
            if spec.efficiency <= Fixed64::ZERO || spec.efficiency > one {
                errors.push(ValidationError::EfficiencyOutOfRange(node.id));
            }
            if spec.inputs.is_empty() {
                errors.push(ValidationError::EmptyResourceSet(node.id));
            } else {
                // A no-op converter (output among inputs) is rejected, and
                // so is a recipe whose weights could create mass out of
                // nothing.
                let mut weight_sum = Fixed64::ZERO;
                let mut set_ok = !spec.inputs.contains_key(&spec.output);
                for &weight in spec.inputs.values() {
                    if weight <= Fixed64::ZERO {
                        set_ok = false;
                    }
                    weight_sum += weight;
                }
                if weight_sum < one {
                    set_ok = false;
                }
                if !set_ok {
                    errors.push(ValidationError::InvalidResourceSet(node.id));
                }
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Check every connection invariant against its resolved endpoints,
/// collecting all violations.
pub fn validate_connection(
    conn: &Connection,
    source: &Node,
    target: &Node,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if conn.source == conn.target {
        errors.push(ValidationError::SelfLoop(conn.source));
    }
    if !source.emits(conn.resource) || !target.accepts(conn.resource) {
        errors.push(ValidationError::ResourceTypeMismatch {
            connection: conn.id,
            resource: conn.resource,
        });
    }
    if conn.max_rate < Fixed64::ZERO {
        errors.push(ValidationError::NegativeMaxRate(conn.id));
    }
    if conn.current_rate < Fixed64::ZERO {
        errors.push(ValidationError::NegativeRate(conn.id));
    } else if conn.current_rate > conn.max_rate {
        errors.push(ValidationError::RateExceedsMax(conn.id));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
