//! Typed edge list derived once from an adjacency matrix.

use std::num::NonZeroU32;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::error::{TopologyError, TopologyResult};
use crate::matrix::AdjacencyMatrix;
use crate::validate;

/// Class tag used by the fixed fuel inflow and by terminal edges.
pub const BASE_CLASS: u8 = 1;

/// One end of a flow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Fuel reservoir feeding the combustor.
    Fuel,
    /// Matrix-addressed reactor (0 = combustor).
    Reactor(usize),
    /// Ambient reservoir behind the boundary row.
    Atmosphere,
    /// Exhaust sink receiving terminal outflow.
    Sink,
}

/// How an edge's mass-flow rate is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Fuel reservoir into the combustor.
    Inflow,
    /// Share of a reactor's outflow into a downstream reactor.
    Interior,
    /// Whole outflow of a reactor with no downstream reactors, into the sink.
    Terminal,
    /// Externally scheduled influx from the atmosphere.
    Entrainment,
}

impl EdgeKind {
    /// True when the rate is `mass(source) / residence_time`.
    pub fn is_mass_derived(self) -> bool {
        !matches!(self, EdgeKind::Entrainment)
    }
}

/// A directed edge with everything its flow closure needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowEdge {
    pub from: Endpoint,
    pub to: Endpoint,
    pub kind: EdgeKind,
    /// Flow-function class (1-based).
    pub class: u8,
    /// Number of edges sharing the source's outflow; 1 for everything but interior fan-out.
    pub sink_count: NonZeroU32,
}

/// How many flow functions of each family are available.
///
/// Class tag `v` selects function `v - 1`; any tag beyond these counts is a
/// configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowClasses {
    pub residence: usize,
    pub entrainment: usize,
}

impl Default for FlowClasses {
    fn default() -> Self {
        Self {
            residence: 1,
            entrainment: 1,
        }
    }
}

/// Validated edge list in wiring order.
///
/// Edges are ordered fuel inflow first, then every reactor's outflow in
/// topological order, then entrainment.
#[derive(Debug, Clone)]
pub struct FlowPlan {
    reactors: usize,
    order: Vec<usize>,
    sink_counts: Vec<u32>,
    edges: Vec<FlowEdge>,
}

impl FlowPlan {
    /// Derive and validate the edge list.
    ///
    /// Nothing partial is returned: any inconsistency fails the whole plan.
    pub fn from_matrix(matrix: &AdjacencyMatrix, classes: FlowClasses) -> TopologyResult<Self> {
        validate::validate_matrix(matrix)?;

        let reactors = matrix.reactor_count();
        let boundary = matrix.boundary();

        if classes.residence < usize::from(BASE_CLASS) {
            return Err(TopologyError::UnknownFlowClass {
                from: 0,
                to: 0,
                class: BASE_CLASS,
            });
        }

        let mut outflow_class = vec![BASE_CLASS; reactors];
        let mut sink_counts = vec![0_u32; reactors];
        for (reactor, count) in sink_counts.iter_mut().enumerate() {
            let mut class = None;
            for to in 0..reactors {
                let tag = matrix.get(reactor, to);
                if tag == 0 {
                    continue;
                }
                if usize::from(tag) > classes.residence {
                    return Err(TopologyError::UnknownFlowClass {
                        from: reactor,
                        to,
                        class: tag,
                    });
                }
                match class {
                    None => class = Some(tag),
                    Some(c) if c != tag => {
                        return Err(TopologyError::MixedOutflowClass { reactor });
                    }
                    Some(_) => {}
                }
                *count += 1;
            }
            if let Some(c) = class {
                outflow_class[reactor] = c;
            }
        }

        for to in 0..reactors {
            let tag = matrix.get(boundary, to);
            if tag > 0 && usize::from(tag) > classes.entrainment {
                return Err(TopologyError::UnknownFlowClass {
                    from: boundary,
                    to,
                    class: tag,
                });
            }
        }

        let order = topological_order(matrix)?;

        let single = NonZeroU32::MIN;
        let mut edges = Vec::with_capacity(matrix.edge_count() + reactors + 1);
        edges.push(FlowEdge {
            from: Endpoint::Fuel,
            to: Endpoint::Reactor(0),
            kind: EdgeKind::Inflow,
            class: BASE_CLASS,
            sink_count: single,
        });

        for &reactor in &order {
            if sink_counts[reactor] == 0 {
                edges.push(FlowEdge {
                    from: Endpoint::Reactor(reactor),
                    to: Endpoint::Sink,
                    kind: EdgeKind::Terminal,
                    class: outflow_class[reactor],
                    sink_count: single,
                });
                continue;
            }
            let sink_count = NonZeroU32::new(sink_counts[reactor])
                .ok_or(TopologyError::ZeroSinkCount { reactor })?;
            for to in (0..reactors).filter(|&to| matrix.get(reactor, to) > 0) {
                edges.push(FlowEdge {
                    from: Endpoint::Reactor(reactor),
                    to: Endpoint::Reactor(to),
                    kind: EdgeKind::Interior,
                    class: outflow_class[reactor],
                    sink_count,
                });
            }
        }

        for to in 0..reactors {
            let tag = matrix.get(boundary, to);
            if tag > 0 {
                edges.push(FlowEdge {
                    from: Endpoint::Atmosphere,
                    to: Endpoint::Reactor(to),
                    kind: EdgeKind::Entrainment,
                    class: tag,
                    sink_count: single,
                });
            }
        }

        debug!(
            reactors,
            edges = edges.len(),
            terminals = sink_counts.iter().filter(|&&c| c == 0).count(),
            "flow plan derived"
        );

        Ok(Self {
            reactors,
            order,
            sink_counts,
            edges,
        })
    }

    /// Number of matrix-addressed reactors (combustor + exhaust cells).
    pub fn reactor_count(&self) -> usize {
        self.reactors
    }

    /// Reactor indices in topological order (combustor-side first).
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Every edge in wiring order.
    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    /// Downstream reactor count of `reactor` (0 for terminal reactors).
    pub fn sink_count(&self, reactor: usize) -> u32 {
        self.sink_counts.get(reactor).copied().unwrap_or(0)
    }

    /// Reactors that drain into the exhaust sink.
    pub fn terminal_reactors(&self) -> impl Iterator<Item = usize> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|&r| self.sink_counts[r] == 0)
    }

    /// Edges leaving `from`.
    pub fn outflow(&self, from: Endpoint) -> impl Iterator<Item = &FlowEdge> + '_ {
        self.edges.iter().filter(move |e| e.from == from)
    }
}

/// Order matrix-addressed reactors so every source precedes its sinks.
fn topological_order(matrix: &AdjacencyMatrix) -> TopologyResult<Vec<usize>> {
    let reactors = matrix.reactor_count();
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(reactors, matrix.edge_count());
    let nodes: Vec<NodeIndex> = (0..reactors).map(|r| graph.add_node(r)).collect();
    for (from, to, _) in matrix.edges() {
        if from < reactors && to < reactors {
            graph.add_edge(nodes[from], nodes[to], ());
        }
    }

    toposort(&graph, None)
        .map(|sorted| sorted.into_iter().map(|n| graph[n]).collect())
        .map_err(|cycle| TopologyError::Cycle {
            index: graph[cycle.node_id()],
        })
}
