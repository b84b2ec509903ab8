//! Property tests over randomized networks of producers, storage,
//! consumers, and converters, with amounts spanning the full supported
//! range.

use std::collections::BTreeMap;

use proptest::prelude::*;

use fluxgrid_core::fixed::{Fixed64, f64_to_fixed64 as fx, quantize_down};
use fluxgrid_core::graph::{FlowGraph, Snapshot};
use fluxgrid_core::id::{ConnectionId, NodeId};
use fluxgrid_core::node::{Connection, ConverterSpec, Node};
use fluxgrid_core::resource::ResourceKind;
use fluxgrid_flow::{FlowConfig, FlowOptimizer};

const PRODUCER_BASE: u32 = 1;
const STORAGE_BASE: u32 = 100;
const CONSUMER_BASE: u32 = 200;
const CONVERTER_BASE: u32 = 300;
const SINK_BASE: u32 = 400;

#[derive(Debug, Clone)]
struct NetworkSpec {
    /// (rate, capacity)
    producers: Vec<(u32, u32)>,
    /// (capacity, current)
    storages: Vec<(u32, u32)>,
    /// mineral demand
    consumers: Vec<u32>,
    /// (input weight in tenths, efficiency in hundredths, output capacity)
    converters: Vec<(u32, u32, u32)>,
    /// energy demand downstream of converters
    sinks: Vec<u32>,
    /// (source index, target index, max rate) over the mineral side
    edges: Vec<(usize, usize, u32)>,
    /// (converter index, sink index, max rate) over the energy side
    energy_edges: Vec<(usize, usize, u32)>,
}

fn network_strategy() -> impl Strategy<Value = NetworkSpec> {
    (
        prop::collection::vec((0u32..50_000_000, 0u32..50_000_000), 1..6),
        prop::collection::vec((1u32..2_000_000_000, 0u32..2_000_000_000), 0..4),
        prop::collection::vec(0u32..50_000_000, 1..6),
        prop::collection::vec((10u32..40, 1u32..=100, 1u32..50_000_000), 0..3),
        prop::collection::vec(0u32..50_000_000, 0..3),
        prop::collection::vec((0usize..10, 0usize..10, 1u32..50_000_000), 1..15),
        prop::collection::vec((0usize..4, 0usize..4, 1u32..50_000_000), 0..5),
    )
        .prop_map(
            |(producers, storages, consumers, converters, sinks, edges, energy_edges)| {
                NetworkSpec {
                    producers,
                    storages,
                    consumers,
                    converters,
                    sinks,
                    edges,
                    energy_edges,
                }
            },
        )
}

/// Build a graph from a generated description. Mineral edges run from
/// producers/storage to
/// storage/consumers/converters; energy edges run from converters to sinks.
/// Indices wrap so every generated edge lands somewhere.
fn build(spec: &NetworkSpec) -> FlowGraph {
    let minerals = ResourceKind::Minerals;
    let energy = ResourceKind::Energy;
    let mut graph = FlowGraph::new();

    let mut sources = Vec::new();
    let mut targets = Vec::new();
    let mut converter_ids = Vec::new();
    for (i, &(rate, capacity)) in spec.producers.iter().enumerate() {
        let id = NodeId(PRODUCER_BASE + i as u32);
        graph
            .register_node(Node::producer(id, minerals, fx(capacity as f64), fx(rate as f64)))
            .unwrap();
        sources.push(id);
    }
    for (i, &(capacity, current)) in spec.storages.iter().enumerate() {
        let id = NodeId(STORAGE_BASE + i as u32);
        let current = current.min(capacity);
        graph
            .register_node(Node::storage(id, minerals, fx(capacity as f64), fx(current as f64)))
            .unwrap();
        sources.push(id);
        targets.push(id);
    }
    for (i, &demand) in spec.consumers.iter().enumerate() {
        let id = NodeId(CONSUMER_BASE + i as u32);
        graph
            .register_node(Node::consumer(id, minerals, fx(demand as f64)))
            .unwrap();
        targets.push(id);
    }
    for (i, &(weight_tenths, eff_hundredths, capacity)) in spec.converters.iter().enumerate() {
        let id = NodeId(CONVERTER_BASE + i as u32);
        let recipe = ConverterSpec {
            inputs: BTreeMap::from([(minerals, fx(weight_tenths as f64 / 10.0))]),
            output: energy,
            efficiency: fx(eff_hundredths as f64 / 100.0),
        };
        graph
            .register_node(Node::converter(id, recipe, fx(capacity as f64)))
            .unwrap();
        targets.push(id);
        converter_ids.push(id);
    }
    let mut sink_ids = Vec::new();
    for (i, &demand) in spec.sinks.iter().enumerate() {
        let id = NodeId(SINK_BASE + i as u32);
        graph
            .register_node(Node::consumer(id, energy, fx(demand as f64)))
            .unwrap();
        sink_ids.push(id);
    }

    let mut next_conn = 1u32;
    for &(s, t, max_rate) in &spec.edges {
        let source = sources[s % sources.len()];
        let target = targets[t % targets.len()];
        if source == target {
            continue;
        }
        graph
            .register_connection(Connection::new(
                ConnectionId(next_conn),
                source,
                target,
                minerals,
                fx(max_rate as f64),
            ))
            .unwrap();
        next_conn += 1;
    }
    if !converter_ids.is_empty() && !sink_ids.is_empty() {
        for &(c, s, max_rate) in &spec.energy_edges {
            graph
                .register_connection(Connection::new(
                    ConnectionId(next_conn),
                    converter_ids[c % converter_ids.len()],
                    sink_ids[s % sink_ids.len()],
                    energy,
                    fx(max_rate as f64),
                ))
                .unwrap();
            next_conn += 1;
        }
    }
    graph
}

fn run(snapshot: &Snapshot) -> fluxgrid_flow::OptimizationResult {
    FlowOptimizer::new(FlowConfig::default())
        .run_cycle(snapshot)
        .unwrap()
}

fn flows(
    snapshot: &Snapshot,
    result: &fluxgrid_flow::OptimizationResult,
) -> (BTreeMap<NodeId, Fixed64>, BTreeMap<NodeId, Fixed64>) {
    let mut outflow = BTreeMap::new();
    let mut inflow = BTreeMap::new();
    for transfer in &result.transfers {
        let conn = snapshot.connection(transfer.connection).unwrap();
        *outflow.entry(conn.source).or_insert(Fixed64::ZERO) += transfer.amount;
        *inflow.entry(conn.target).or_insert(Fixed64::ZERO) += transfer.amount;
    }
    (outflow, inflow)
}

proptest! {
    // Per source: total outflow never exceeds what the node could supply;
    // for converters the bound is efficiency times the input actually
    // drawn. Per non-converter target: total inflow never exceeds
    // outstanding demand.
    #[test]
    fn allocation_conserves_supply_and_demand(spec in network_strategy()) {
        let snapshot = build(&spec).active_snapshot();
        let result = run(&snapshot);
        let (outflow, inflow) = flows(&snapshot, &result);

        for (&id, total) in &outflow {
            let node = snapshot.node(id).unwrap();
            if let Some(recipe) = node.converter_spec() {
                let fed = inflow.get(&id).copied().unwrap_or(Fixed64::ZERO);
                prop_assert!(*total <= recipe.efficiency * fed);
            } else {
                prop_assert!(*total <= node.available_supply());
            }
        }
        for (&id, total) in &inflow {
            let node = snapshot.node(id).unwrap();
            if !node.is_converter() {
                prop_assert!(*total <= node.outstanding_demand());
            }
        }
    }

    // Per edge: the allocated amount respects the rate limit and the
    // emission grid, and is strictly positive. Converter input draws are
    // transfers too and must obey the same rules.
    #[test]
    fn transfers_respect_rate_limits_and_grid(spec in network_strategy()) {
        let snapshot = build(&spec).active_snapshot();
        let result = run(&snapshot);

        let mut seen = std::collections::BTreeSet::new();
        for transfer in &result.transfers {
            let conn = snapshot.connection(transfer.connection).unwrap();
            prop_assert!(transfer.amount > Fixed64::ZERO);
            prop_assert!(transfer.amount <= conn.max_rate);
            prop_assert_eq!(quantize_down(transfer.amount), transfer.amount);
            prop_assert!(seen.insert(transfer.connection), "one transfer per edge");
        }
    }

    // Same snapshot, fresh optimizers: byte-identical results.
    #[test]
    fn allocation_is_deterministic(spec in network_strategy()) {
        let snapshot = build(&spec).active_snapshot();
        let a = run(&snapshot);
        let b = run(&snapshot);
        prop_assert_eq!(a.transfers, b.transfers);
        prop_assert_eq!(a.unresolved_deficits, b.unresolved_deficits);
        prop_assert_eq!(a.converter_cycles, b.converter_cycles);
    }

    // A deficit is exactly the demand the cycle failed to deliver, and is
    // only reported for nodes with at least one incoming edge processed.
    #[test]
    fn deficits_account_for_undelivered_demand(spec in network_strategy()) {
        let snapshot = build(&spec).active_snapshot();
        let result = run(&snapshot);
        let (_, inflow) = flows(&snapshot, &result);

        for deficit in &result.unresolved_deficits {
            let node = snapshot.node(deficit.node).unwrap();
            let delivered = inflow.get(&deficit.node).copied().unwrap_or(Fixed64::ZERO);
            prop_assert!(deficit.amount > Fixed64::ZERO);
            prop_assert_eq!(deficit.amount, node.outstanding_demand() - delivered);
            prop_assert!(
                snapshot.connections().any(|(_, c)| c.target == deficit.node),
                "deficit only for targets with incoming edges"
            );
        }
    }
}
