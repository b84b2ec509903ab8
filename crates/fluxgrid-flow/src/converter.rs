//! Converter resolution.
//!
//! Converters run in a pre-pass before general allocation: each converter
//! consumes from its input edges and publishes output supply for the rest of
//! the cycle. Chained converters must run upstream-first, so the pre-pass
//! orders them topologically over the converter-to-converter edges; members
//! of a conversion cycle are excluded and reported, leaving the rest of the
//! network unaffected.
//!
//! # Design
//!
//! Conversion is resolved in whole "units": one unit consumes `weight` of
//! each input kind and yields `efficiency` of the output kind. Units are
//! truncated to the emission grid before output is computed, so repeated
//! cycles never create resources through rounding.

use std::collections::{BTreeMap, BTreeSet};

use fluxgrid_core::fixed::{Fixed64, checked_div_64, quantize_down};
use fluxgrid_core::graph::Snapshot;
use fluxgrid_core::id::NodeId;
use fluxgrid_core::node::ConverterSpec;
use fluxgrid_core::resource::ResourceKind;

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// The outcome of resolving one converter for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub output: ResourceKind,
    /// Output produced, truncated to the emission grid. Zero when any
    /// required input is absent.
    pub amount: Fixed64,
    /// Exact amount drawn per input kind. Always within what was available.
    pub consumed: BTreeMap<ResourceKind, Fixed64>,
}

impl Conversion {
    fn none(output: ResourceKind) -> Self {
        Self {
            output,
            amount: Fixed64::ZERO,
            consumed: BTreeMap::new(),
        }
    }
}

/// Resolve a recipe against the input amounts available this cycle.
///
/// Conversion is all-or-nothing per unit: the unit count is the minimum of
/// `available / weight` across inputs, further capped by
/// `capacity / efficiency` so output never exceeds the node's per-cycle cap.
/// A missing input kind yields zero output and zero consumption.
pub fn resolve(
    spec: &ConverterSpec,
    capacity: Fixed64,
    available: &BTreeMap<ResourceKind, Fixed64>,
) -> Conversion {
    let mut units = Fixed64::MAX;
    for (&kind, &weight) in &spec.inputs {
        let have = available.get(&kind).copied().unwrap_or(Fixed64::ZERO);
        if have <= Fixed64::ZERO {
            return Conversion::none(spec.output);
        }
        // An unrepresentable quotient means this input does not constrain
        // the unit count.
        if let Some(bound) = checked_div_64(have, weight) {
            units = units.min(bound);
        }
    }
    if let Some(bound) = checked_div_64(capacity, spec.efficiency) {
        units = units.min(bound);
    }
    let units = quantize_down(units.max(Fixed64::ZERO));
    if units <= Fixed64::ZERO {
        return Conversion::none(spec.output);
    }

    let consumed = spec
        .inputs
        .iter()
        .map(|(&kind, &weight)| (kind, weight * units))
        .collect();
    Conversion {
        output: spec.output,
        amount: quantize_down(spec.efficiency * units),
        consumed,
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Topological run order for the converter pre-pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConverterOrder {
    /// Converters in dependency order, upstream producers of an input
    /// before its consumers. Ties resolve by node id.
    pub ordered: Vec<NodeId>,
    /// Converters caught in a conversion cycle, in id order. These are
    /// skipped for the cycle and reported in the result.
    pub cycle_members: Vec<NodeId>,
}

/// Order the snapshot's converters for the pre-pass using Kahn's algorithm
/// over direct converter-to-converter connections. Converters that feed
/// each other (directly or through a chain of converters) never drain, so
/// they land in `cycle_members` instead of `ordered`.
pub fn converter_order(snapshot: &Snapshot) -> ConverterOrder {
    let converters: BTreeSet<NodeId> = snapshot
        .nodes()
        .filter(|(_, n)| n.is_converter())
        .map(|(&id, _)| id)
        .collect();
    if converters.is_empty() {
        return ConverterOrder::default();
    }

    // Dependency edges, deduplicated: parallel connections between the same
    // converter pair count once.
    let mut downstream: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
    let mut in_degree: BTreeMap<NodeId, usize> = converters.iter().map(|&id| (id, 0)).collect();
    for (_, conn) in snapshot.connections() {
        if converters.contains(&conn.source)
            && converters.contains(&conn.target)
            && downstream
                .entry(conn.source)
                .or_default()
                .insert(conn.target)
        {
            *in_degree.entry(conn.target).or_default() += 1;
        }
    }

    // Kahn's algorithm; the ready set is a BTreeSet so equal-depth
    // converters pop in id order.
    let mut ready: BTreeSet<NodeId> = in_degree
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut ordered = Vec::with_capacity(converters.len());
    while let Some(&id) = ready.iter().next() {
        ready.remove(&id);
        ordered.push(id);
        if let Some(targets) = downstream.get(&id) {
            for &next in targets {
                let deg = in_degree.get_mut(&next).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    let placed: BTreeSet<NodeId> = ordered.iter().copied().collect();
    let cycle_members = converters
        .iter()
        .copied()
        .filter(|id| !placed.contains(id))
        .collect();
    ConverterOrder {
        ordered,
        cycle_members,
    }
}
