//! Fluxgrid Core -- the graph model for the resource-flow optimization engine.
//!
//! This crate provides the authoritative store of flow-network topology
//! (producers, consumers, storage, converters and the typed connections
//! between them), the validation layer that guards every mutation, and the
//! deterministic fixed-point arithmetic the optimizer depends on.
//!
//! # Ownership Model
//!
//! - [`graph::FlowGraph`] is the single owner of nodes and connections.
//!   External game logic registers and removes topology through its methods;
//!   no component mutates fields directly.
//! - The optimizer (in `fluxgrid-flow`) never sees the live graph. It
//!   receives an immutable [`graph::Snapshot`] taken via
//!   [`graph::FlowGraph::active_snapshot`], so graph mutations that happen
//!   during an in-flight cycle are simply picked up by the next snapshot.
//! - Collaborators that need change notification poll
//!   [`graph::FlowGraph::change_sequence`] instead of subscribing to an
//!   event bus.
//!
//! # Key Types
//!
//! - [`graph::FlowGraph`] -- authoritative node/connection store with
//!   validated mutations and cascade removal.
//! - [`node::Node`] / [`node::Connection`] -- the flow-network data model.
//! - [`resource::ResourceKind`] -- the closed set of resource kinds; string
//!   input is funneled through [`validation::parse_resource_kind`] and
//!   fails closed on unknown values.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`hash::FlowHash`] -- FNV-1a hasher used for snapshot fingerprints.

pub mod fixed;
pub mod graph;
pub mod hash;
pub mod id;
pub mod node;
pub mod resource;
pub mod validation;
