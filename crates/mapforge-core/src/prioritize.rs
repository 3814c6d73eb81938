//! Star-graph prioritization of equivalence components.
//!
//! Given an equivalence graph and an ordered list of preferred prefixes,
//! each connected component collapses into a star: every member maps to
//! the component's canonical node via `skos:exactMatch`. The result is a
//! functional mapping (every reference is the subject of at most one
//! mapping), directly usable as a lookup table for standardizing
//! identifiers in external datasets.

use std::collections::VecDeque;

use ahash::AHashMap;

use crate::evidence::{Digest, ReasonedEvidence};
use crate::graph::{EquivalenceGraph, NodeId};
use crate::vocabulary::{CHAIN_MAPPING, EXACT_MATCH};
use crate::{Mapping, Reference};

/// Collapse each equivalence component onto its highest-priority member.
///
/// A node's score is the position of its prefix in `priority` (earlier
/// is better); prefixes not listed score worst. Ties break by ascending
/// CURIE, so the canonical node is stable under any permutation of the
/// priority list that preserves the relative order of the prefixes
/// actually present in the component.
pub fn prioritize(mappings: &[Mapping], priority: &[String]) -> Vec<Mapping> {
    prioritize_with(
        mappings,
        priority,
        &EquivalenceGraph::default_equivalence(),
    )
}

/// [`prioritize`] with an explicit equivalence predicate set.
pub fn prioritize_with(
    mappings: &[Mapping],
    priority: &[String],
    equivalence: &[Reference],
) -> Vec<Mapping> {
    let graph = EquivalenceGraph::from_mappings(mappings, equivalence);
    let positions: AHashMap<&str, usize> = priority
        .iter()
        .enumerate()
        .map(|(position, prefix)| (prefix.as_str(), position))
        .collect();
    let score = |id: NodeId| -> usize {
        positions
            .get(graph.node(id).prefix.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    };

    let components = graph.components();
    let component_count = components.len();
    let mut out = Vec::new();
    for component in components {
        // Members are already in ascending CURIE order, so a stable
        // min-by-score lands on the smallest CURIE among ties.
        let canonical = component
            .iter()
            .copied()
            .min_by_key(|&id| score(id))
            .unwrap_or_else(|| unreachable!("components are non-empty"));
        out.extend(star_mappings(&graph, &component, canonical));
    }

    out.sort_by(|left, right| {
        let object_position = |m: &Mapping| {
            positions
                .get(m.object.prefix.as_str())
                .copied()
                .unwrap_or(usize::MAX)
        };
        (
            object_position(left),
            &left.object.identifier,
            &left.subject.prefix,
            &left.subject.identifier,
        )
            .cmp(&(
                object_position(right),
                &right.object.identifier,
                &right.subject.prefix,
                &right.subject.identifier,
            ))
    });
    tracing::info!(
        input = mappings.len(),
        components = component_count,
        output = out.len(),
        "prioritized mapping collection"
    );
    out
}

/// Breadth-first walk from the canonical node, emitting one mapping per
/// other member. Each mapping's evidence summarizes the graph path back
/// to the canonical node: parents are the path edges' mapping digests
/// and the confidence is the minimum aggregate confidence along the
/// path.
fn star_mappings(
    graph: &EquivalenceGraph,
    component: &[NodeId],
    canonical: NodeId,
) -> Vec<Mapping> {
    struct Visit {
        parent: Option<(NodeId, u32)>,
        min_confidence: f64,
    }

    let mut visits: AHashMap<NodeId, Visit> = AHashMap::with_capacity(component.len());
    visits.insert(
        canonical,
        Visit {
            parent: None,
            min_confidence: 1.0,
        },
    );
    let mut queue = VecDeque::from([canonical]);
    while let Some(current) = queue.pop_front() {
        let current_min = visits[&current].min_confidence;
        for &(neighbor, edge_index) in graph.neighbors(current) {
            if visits.contains_key(&neighbor) {
                continue;
            }
            let edge = graph.edge(edge_index);
            visits.insert(
                neighbor,
                Visit {
                    parent: Some((current, edge_index)),
                    min_confidence: current_min.min(edge.confidence),
                },
            );
            queue.push_back(neighbor);
        }
    }

    let mut out = Vec::with_capacity(component.len().saturating_sub(1));
    for &member in component {
        if member == canonical {
            continue;
        }
        let Some(visit) = visits.get(&member) else {
            continue; // disconnected members cannot appear within a component
        };

        let mut path: Vec<Digest> = Vec::new();
        let mut cursor = member;
        while let Some((parent, edge_index)) = visits[&cursor].parent {
            path.push(graph.edge(edge_index).mapping);
            cursor = parent;
        }

        out.push(Mapping::new(
            graph.node(member).clone(),
            EXACT_MATCH.clone(),
            graph.node(canonical).clone(),
            vec![ReasonedEvidence::new(
                CHAIN_MAPPING.clone(),
                visit.min_confidence,
                path,
            )
            .into()],
        ));
    }
    out
}
