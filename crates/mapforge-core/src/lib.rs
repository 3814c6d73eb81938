//! Mapforge core: assembly and reasoning over semantic mappings.
//!
//! A *mapping* asserts that two entities from different controlled
//! vocabularies stand in a semantic relation (`skos:exactMatch`,
//! `oboinowl:hasDbXref`, ...), supported by one or more pieces of
//! evidence. This crate takes mappings from many heterogeneous sources
//! and:
//!
//! 1. deduplicates them by triple identity, unioning evidence,
//! 2. enriches them with logically entailed mappings (inversion,
//!    transitive chaining, generalization, predicate mutation),
//! 3. scores every mapping from its evidence set (noisy-or combination),
//! 4. collapses each equivalence class into a star graph rooted at the
//!    highest-priority member, and
//! 5. measures the joint coverage ("landscape") of a set of vocabularies.
//!
//! Key design points:
//!
//! - **Content addressing**: evidences and mappings have stable SHA-256
//!   digests over their semantic fields. Derived evidence refers to its
//!   parent mappings by digest, never by pointer, so provenance survives
//!   serialization and merging and the evidence graph stays acyclic.
//! - **Table-driven predicates**: symmetry, transitivity, inversion, and
//!   generalization live in a [`PredicateTable`]; adding a predicate is a
//!   table entry, not a code change.
//! - **Integer node ids**: the equivalence graph and landscape analyzer
//!   intern references to `u32` ids and work on bitmaps, so components
//!   over tens of millions of edges fit on a workstation.
//!
//! ## Module Organization
//!
//! - `reference`: CURIE-identified entity references
//! - `vocabulary`: the predicate/justification vocabulary and predicate table
//! - `evidence`: simple and reasoned evidence, content digests
//! - `mapping`: the mapping record and triple identity
//! - `index`: in-memory indexes over a mapping collection
//! - `ops`: bulk collection operations (deduplicate, filter, project)
//! - `infer`: the four-rule inference engine
//! - `graph`: equivalence graph and union-find components
//! - `prioritize`: star-graph prioritization
//! - `landscape`: vocabulary overlap and unique-entity analysis

pub mod cancel;
pub mod evidence;
pub mod graph;
pub mod index;
pub mod infer;
pub mod landscape;
pub mod mapping;
pub mod ops;
pub mod prioritize;
pub mod reference;
pub mod vocabulary;

use thiserror::Error;

pub use cancel::CancelToken;
pub use evidence::{noisy_or, Digest, Evidence, MappingSetRef, ReasonedEvidence, SimpleEvidence};
pub use graph::{EquivalenceGraph, NodeId, UnionFind};
pub use index::MappingIndex;
pub use infer::{flip, infer, InferenceOptions, InferenceOutcome, MutationRule};
pub use landscape::{landscape_analysis, LandscapeSummary, StaticTermCatalog, TermCatalog};
pub use mapping::{Mapping, Triple};
pub use ops::{deduplicate, FilterScope, PrefixFilter};
pub use prioritize::{prioritize, prioritize_with};
pub use reference::Reference;
pub use vocabulary::{PredicateInfo, PredicateTable};

/// Errors produced by the mapping core.
#[derive(Debug, Error)]
pub enum Error {
    /// A reference string could not be parsed as `prefix:identifier`.
    #[error("malformed CURIE: {curie:?}")]
    MalformedCurie { curie: String },

    /// A long-running operation observed its cancellation token.
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
