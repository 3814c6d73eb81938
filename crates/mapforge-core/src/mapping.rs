//! The mapping record: a triple plus its evidence set.

use serde::{Deserialize, Serialize};

use crate::evidence::{noisy_or, Digest, DigestBuilder, Evidence};
use crate::Reference;

/// A subject-predicate-object triple.
pub type Triple = (Reference, Reference, Reference);

/// A semantic mapping between two references, with provenance.
///
/// A mapping's identity is its triple: two mappings with the same
/// `(subject, predicate, object)` are the same mapping, and merging them
/// unions their evidence sets by digest. The aggregate confidence is a
/// function of the evidence set and is recomputed on demand, never
/// stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub subject: Reference,
    pub predicate: Reference,
    pub object: Reference,
    /// Non-empty; treated as a set (order carries no meaning).
    pub evidence: Vec<Evidence>,
}

impl Mapping {
    pub fn new(
        subject: Reference,
        predicate: Reference,
        object: Reference,
        evidence: Vec<Evidence>,
    ) -> Self {
        debug_assert!(subject != object, "self-mapping {subject} -> {object}");
        debug_assert!(!evidence.is_empty(), "mapping requires evidence");
        Self {
            subject,
            predicate,
            object,
            evidence,
        }
    }

    pub fn from_triple(triple: Triple, evidence: Vec<Evidence>) -> Self {
        let (subject, predicate, object) = triple;
        Self::new(subject, predicate, object, evidence)
    }

    pub fn triple(&self) -> Triple {
        (
            self.subject.clone(),
            self.predicate.clone(),
            self.object.clone(),
        )
    }

    /// Content digest of the triple alone.
    ///
    /// Stable under evidence union, which makes it the key by which
    /// reasoned evidence names its parents and by which collections
    /// deduplicate.
    pub fn digest(&self) -> Digest {
        let mut builder = DigestBuilder::new("mapping");
        builder
            .reference("subject", &self.subject)
            .reference("predicate", &self.predicate)
            .reference("object", &self.object);
        builder.finish()
    }

    /// Aggregate confidence: noisy-or over the evidence set.
    pub fn confidence(&self) -> f64 {
        noisy_or(self.evidence.iter().map(Evidence::confidence))
    }

    /// Sort key used to make collection output deterministic:
    /// subject CURIE, then object CURIE, then predicate CURIE.
    pub fn sort_key(&self) -> (String, String, String) {
        (
            self.subject.curie(),
            self.object.curie(),
            self.predicate.curie(),
        )
    }
}
