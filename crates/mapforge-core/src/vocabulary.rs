//! The predicate and justification vocabulary, and the predicate table.
//!
//! Symmetry, transitivity, inversion, and generalization are *data*, not
//! code: the inference engine consults a [`PredicateTable`] and never
//! hardcodes predicate behavior. Predicates absent from the table are
//! treated as opaque (no symmetry, no transitivity, no inverse, no
//! generalization) and warned about once each.

use std::sync::LazyLock;

use dashmap::DashSet;

use crate::Reference;

fn skos(identifier: &str, name: &str) -> Reference {
    Reference::named("skos", identifier, name)
}

fn semapv(identifier: &str, name: &str) -> Reference {
    Reference::named("semapv", identifier, name)
}

/// `skos:exactMatch` — the subject and object are semantically equivalent.
pub static EXACT_MATCH: LazyLock<Reference> = LazyLock::new(|| skos("exactMatch", "exact match"));
/// `skos:broadMatch` — the subject is broader than the object.
pub static BROAD_MATCH: LazyLock<Reference> = LazyLock::new(|| skos("broadMatch", "broad match"));
/// `skos:narrowMatch` — the subject is narrower than the object.
pub static NARROW_MATCH: LazyLock<Reference> =
    LazyLock::new(|| skos("narrowMatch", "narrow match"));
/// `skos:closeMatch` — semantically close, but not interchangeable.
pub static CLOSE_MATCH: LazyLock<Reference> = LazyLock::new(|| skos("closeMatch", "close match"));
/// `skos:relatedMatch` — related in some unspecified way.
pub static RELATED_MATCH: LazyLock<Reference> =
    LazyLock::new(|| skos("relatedMatch", "related match"));
/// `owl:equivalentTo` — logical equivalence asserted by an ontology.
pub static EQUIVALENT_TO: LazyLock<Reference> =
    LazyLock::new(|| Reference::new("owl", "equivalentTo"));
/// `iao:0100001` — the subject has been deprecated and replaced by the object.
pub static REPLACED_BY: LazyLock<Reference> =
    LazyLock::new(|| Reference::named("iao", "0100001", "term replaced by"));
/// `oboinowl:hasDbXref` — an undefined database cross-reference.
pub static DB_XREF: LazyLock<Reference> =
    LazyLock::new(|| Reference::named("oboinowl", "hasDbXref", "has database cross-reference"));

/// Justification for a manually curated mapping.
pub static MANUAL_MAPPING: LazyLock<Reference> =
    LazyLock::new(|| semapv("ManualMappingCuration", "manual mapping curation"));
/// Justification for a lexically matched mapping.
pub static LEXICAL_MAPPING: LazyLock<Reference> =
    LazyLock::new(|| semapv("LexicalMatchingProcess", "lexical matching process"));
/// Justification for a mapping whose matching process was not recorded.
pub static UNSPECIFIED_MAPPING: LazyLock<Reference> =
    LazyLock::new(|| semapv("UnspecifiedMatchingProcess", "unspecified matching process"));
/// Justification for a mapping derived by swapping subject and object.
pub static INVERSION_MAPPING: LazyLock<Reference> =
    LazyLock::new(|| semapv("MappingInversion", "mapping inversion"));
/// Justification for a mapping derived by chaining through intermediates.
pub static CHAIN_MAPPING: LazyLock<Reference> =
    LazyLock::new(|| semapv("MappingChaining", "mapping chaining"));
/// Justification for a mapping derived by relaxing its predicate.
pub static GENERALIZATION_MAPPING: LazyLock<Reference> =
    LazyLock::new(|| semapv("MappingGeneralization", "mapping generalization"));
/// Justification for a mapping derived from background knowledge about a
/// resource (e.g. "this resource uses xrefs to encode equivalence").
pub static KNOWLEDGE_MAPPING: LazyLock<Reference> = LazyLock::new(|| {
    semapv(
        "BackgroundKnowledgeBasedMatchingProcess",
        "background knowledge-based matching process",
    )
});

/// Imprecise predicates that assembly pipelines usually drop after
/// inference has extracted what it can from them.
pub static IMPRECISE: LazyLock<Vec<Reference>> =
    LazyLock::new(|| vec![DB_XREF.clone(), CLOSE_MATCH.clone()]);

/// Reasoning-relevant properties of a single predicate.
#[derive(Debug, Clone, Default)]
pub struct PredicateInfo {
    /// `(s, p, o)` entails `(o, p, s)`.
    pub symmetric: bool,
    /// `(a, p, b)` and `(b, p, c)` entail `(a, p, c)`.
    pub transitive: bool,
    /// `(s, p, o)` entails `(o, inverse, s)` for non-symmetric predicates.
    pub inverse: Option<Reference>,
    /// `(s, p, o)` entails `(s, generalizes_to, o)`.
    pub generalizes_to: Option<Reference>,
}

impl PredicateInfo {
    /// The predicate of the flipped mapping, if flipping is meaningful:
    /// the predicate itself when symmetric, its configured inverse
    /// otherwise.
    pub fn flipped(&self, predicate: &Reference) -> Option<Reference> {
        if self.symmetric {
            Some(predicate.clone())
        } else {
            self.inverse.clone()
        }
    }
}

/// Table of per-predicate reasoning properties.
///
/// Lookups for predicates without an entry return an opaque
/// [`PredicateInfo`] and log a warning once per distinct predicate, so a
/// stray `rdfs:seeAlso` in an input shows up in the logs exactly once
/// rather than a million times.
pub struct PredicateTable {
    entries: ahash::AHashMap<Reference, PredicateInfo>,
    opaque: PredicateInfo,
    warned: DashSet<Reference>,
}

impl PredicateTable {
    /// An empty table: every predicate is opaque.
    pub fn empty() -> Self {
        Self {
            entries: ahash::AHashMap::new(),
            opaque: PredicateInfo::default(),
            warned: DashSet::new(),
        }
    }

    /// The standard table over the built-in vocabulary.
    ///
    /// `oboinowl:hasDbXref` is symmetric but *not* transitive: xref links
    /// are undirected in practice, but chaining through them compounds
    /// their imprecision.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.insert(
            EXACT_MATCH.clone(),
            PredicateInfo {
                symmetric: true,
                transitive: true,
                ..Default::default()
            },
        );
        table.insert(
            BROAD_MATCH.clone(),
            PredicateInfo {
                inverse: Some(NARROW_MATCH.clone()),
                generalizes_to: Some(RELATED_MATCH.clone()),
                ..Default::default()
            },
        );
        table.insert(
            NARROW_MATCH.clone(),
            PredicateInfo {
                inverse: Some(BROAD_MATCH.clone()),
                generalizes_to: Some(RELATED_MATCH.clone()),
                ..Default::default()
            },
        );
        table.insert(
            CLOSE_MATCH.clone(),
            PredicateInfo {
                symmetric: true,
                generalizes_to: Some(RELATED_MATCH.clone()),
                ..Default::default()
            },
        );
        table.insert(
            RELATED_MATCH.clone(),
            PredicateInfo {
                symmetric: true,
                ..Default::default()
            },
        );
        table.insert(
            EQUIVALENT_TO.clone(),
            PredicateInfo {
                symmetric: true,
                transitive: true,
                generalizes_to: Some(EXACT_MATCH.clone()),
                ..Default::default()
            },
        );
        table.insert(
            REPLACED_BY.clone(),
            PredicateInfo {
                transitive: true,
                ..Default::default()
            },
        );
        table.insert(
            DB_XREF.clone(),
            PredicateInfo {
                symmetric: true,
                ..Default::default()
            },
        );
        table
    }

    /// Register or replace a predicate entry.
    pub fn insert(&mut self, predicate: Reference, info: PredicateInfo) {
        self.entries.insert(predicate, info);
    }

    /// Whether the predicate has an explicit entry.
    pub fn contains(&self, predicate: &Reference) -> bool {
        self.entries.contains_key(predicate)
    }

    /// Look up a predicate, falling back to opaque defaults.
    pub fn info(&self, predicate: &Reference) -> &PredicateInfo {
        match self.entries.get(predicate) {
            Some(info) => info,
            None => {
                if self.warned.insert(predicate.clone()) {
                    tracing::warn!(predicate = %predicate, "unknown predicate, treating as opaque");
                }
                &self.opaque
            }
        }
    }

    /// All predicates marked transitive.
    pub fn transitive_predicates(&self) -> Vec<Reference> {
        let mut out: Vec<Reference> = self
            .entries
            .iter()
            .filter(|(_, info)| info.transitive)
            .map(|(p, _)| p.clone())
            .collect();
        out.sort();
        out
    }
}

impl Default for PredicateTable {
    fn default() -> Self {
        Self::standard()
    }
}
