//! The equivalence graph and its connected components.
//!
//! References are interned to dense `u32` node ids on construction, so
//! component computation over tens of millions of edges works on integer
//! arrays rather than strings. CURIE strings are materialized only when
//! a caller asks for the underlying [`Reference`].

use ahash::AHashMap;

use crate::evidence::Digest;
use crate::vocabulary::{EQUIVALENT_TO, EXACT_MATCH};
use crate::{Mapping, Reference};

/// Dense node id within one [`EquivalenceGraph`].
pub type NodeId = u32;

/// One undirected edge, contributed by one mapping.
#[derive(Debug, Clone)]
pub struct EdgeRecord {
    pub a: NodeId,
    pub b: NodeId,
    /// The contributing mapping's aggregate confidence at build time.
    pub confidence: f64,
    /// The contributing mapping's triple digest, for provenance.
    pub mapping: Digest,
}

/// Undirected multigraph over the equivalence subset of a collection.
///
/// Nodes are references appearing as subject or object of any mapping
/// whose predicate is in the equivalence set; each such mapping
/// contributes one edge. Parallel edges are kept (they carry distinct
/// provenance).
pub struct EquivalenceGraph {
    nodes: Vec<Reference>,
    ids: AHashMap<Reference, NodeId>,
    adjacency: Vec<Vec<(NodeId, u32)>>,
    edges: Vec<EdgeRecord>,
}

impl EquivalenceGraph {
    /// The default equivalence set: `skos:exactMatch` and
    /// `owl:equivalentTo`.
    pub fn default_equivalence() -> Vec<Reference> {
        vec![EXACT_MATCH.clone(), EQUIVALENT_TO.clone()]
    }

    pub fn from_mappings(mappings: &[Mapping], equivalence: &[Reference]) -> Self {
        Self::from_mappings_filtered(mappings, equivalence, |_| true)
    }

    /// Build the graph, admitting only references accepted by `keep`.
    /// An edge is admitted only when both endpoints are.
    pub fn from_mappings_filtered(
        mappings: &[Mapping],
        equivalence: &[Reference],
        keep: impl Fn(&Reference) -> bool,
    ) -> Self {
        let equivalence: ahash::AHashSet<&Reference> = equivalence.iter().collect();
        let mut graph = Self {
            nodes: Vec::new(),
            ids: AHashMap::new(),
            adjacency: Vec::new(),
            edges: Vec::new(),
        };
        for mapping in mappings {
            if !equivalence.contains(&mapping.predicate) {
                continue;
            }
            if mapping.subject == mapping.object {
                continue;
            }
            if !keep(&mapping.subject) || !keep(&mapping.object) {
                continue;
            }
            let a = graph.intern(&mapping.subject);
            let b = graph.intern(&mapping.object);
            let edge = graph.edges.len() as u32;
            graph.edges.push(EdgeRecord {
                a,
                b,
                confidence: mapping.confidence(),
                mapping: mapping.digest(),
            });
            graph.adjacency[a as usize].push((b, edge));
            graph.adjacency[b as usize].push((a, edge));
        }
        graph
    }

    fn intern(&mut self, reference: &Reference) -> NodeId {
        if let Some(&id) = self.ids.get(reference) {
            return id;
        }
        let id = self.nodes.len() as NodeId;
        self.nodes.push(reference.clone());
        self.ids.insert(reference.clone(), id);
        self.adjacency.push(Vec::new());
        id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Reference {
        &self.nodes[id as usize]
    }

    pub fn node_id(&self, reference: &Reference) -> Option<NodeId> {
        self.ids.get(reference).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Reference)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(id, reference)| (id as NodeId, reference))
    }

    /// Neighbors of a node as `(neighbor, edge index)` pairs.
    pub fn neighbors(&self, id: NodeId) -> &[(NodeId, u32)] {
        &self.adjacency[id as usize]
    }

    pub fn edge(&self, index: u32) -> &EdgeRecord {
        &self.edges[index as usize]
    }

    /// Connected components, deterministically ordered: members sorted
    /// by ascending CURIE, components sorted by their smallest member's
    /// CURIE.
    pub fn components(&self) -> Vec<Vec<NodeId>> {
        let mut union_find = UnionFind::new(self.nodes.len());
        for edge in &self.edges {
            union_find.union(edge.a, edge.b);
        }

        let mut by_root: AHashMap<NodeId, Vec<NodeId>> = AHashMap::new();
        for id in 0..self.nodes.len() as NodeId {
            by_root.entry(union_find.find(id)).or_default().push(id);
        }

        let mut components: Vec<Vec<NodeId>> = by_root.into_values().collect();
        for component in &mut components {
            component.sort_by(|&a, &b| self.node(a).cmp(self.node(b)));
        }
        components.sort_by(|a, b| self.node(a[0]).cmp(self.node(b[0])));
        components
    }
}

/// Disjoint-set forest with path compression and union by rank.
pub struct UnionFind {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
            rank: vec![0; size],
        }
    }

    pub fn find(&mut self, node: u32) -> u32 {
        let mut root = node;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        // Compress the walked path.
        let mut current = node;
        while self.parent[current as usize] != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }
        root
    }

    /// Merge the sets containing `a` and `b`; returns false when they
    /// were already merged.
    pub fn union(&mut self, a: u32, b: u32) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        let (high, low) = if self.rank[root_a as usize] >= self.rank[root_b as usize] {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[low as usize] = high;
        if self.rank[high as usize] == self.rank[low as usize] {
            self.rank[high as usize] += 1;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::SimpleEvidence;
    use crate::vocabulary::{DB_XREF, MANUAL_MAPPING};

    fn exact(s: &str, o: &str) -> Mapping {
        Mapping::new(
            Reference::from_curie(s).unwrap(),
            EXACT_MATCH.clone(),
            Reference::from_curie(o).unwrap(),
            vec![SimpleEvidence::new(MANUAL_MAPPING.clone(), 1.0).into()],
        )
    }

    #[test]
    fn union_find_merges_and_compresses() {
        let mut uf = UnionFind::new(6);
        assert!(uf.union(0, 1));
        assert!(uf.union(1, 2));
        assert!(!uf.union(0, 2));
        assert!(uf.union(4, 5));
        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(0), uf.find(3));
        assert_eq!(uf.find(4), uf.find(5));
    }

    #[test]
    fn graph_keeps_only_equivalence_predicates() {
        let mut xref = exact("a:1", "b:1");
        xref.predicate = DB_XREF.clone();
        let mappings = vec![exact("a:2", "b:2"), xref];
        let graph =
            EquivalenceGraph::from_mappings(&mappings, &EquivalenceGraph::default_equivalence());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn components_are_deterministic() {
        let mappings = vec![
            exact("uberon:X", "mesh:Y"),
            exact("mesh:Y", "ncit:Z"),
            exact("a:1", "b:1"),
        ];
        let graph =
            EquivalenceGraph::from_mappings(&mappings, &EquivalenceGraph::default_equivalence());
        let components = graph.components();
        assert_eq!(components.len(), 2);
        // First component starts at the globally smallest CURIE.
        assert_eq!(graph.node(components[0][0]).curie(), "a:1");
        let curies: Vec<String> = components[1]
            .iter()
            .map(|&id| graph.node(id).curie())
            .collect();
        assert_eq!(curies, vec!["mesh:Y", "ncit:Z", "uberon:X"]);
    }

    #[test]
    fn parallel_edges_are_preserved() {
        let mappings = vec![exact("a:1", "b:1"), exact("b:1", "a:1")];
        let graph =
            EquivalenceGraph::from_mappings(&mappings, &EquivalenceGraph::default_equivalence());
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.components().len(), 1);
    }

    #[test]
    fn filtered_graph_drops_edges_with_excluded_endpoints() {
        let mappings = vec![exact("a:1", "b:1"), exact("b:1", "c:1")];
        let graph = EquivalenceGraph::from_mappings_filtered(
            &mappings,
            &EquivalenceGraph::default_equivalence(),
            |reference| reference.prefix != "c",
        );
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }
}
