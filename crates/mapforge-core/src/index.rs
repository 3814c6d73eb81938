//! In-memory indexes over a mapping collection.

use ahash::AHashMap;

use crate::evidence::Digest;
use crate::{Mapping, Reference};

/// Lookup structures over a borrowed mapping slice.
///
/// Indexes are rebuilt from scratch after any bulk transformation and
/// discarded with the collection they index; callers never mutate them.
/// Values are slot positions into the indexed slice.
pub struct MappingIndex<'a> {
    mappings: &'a [Mapping],
    by_triple: AHashMap<Digest, usize>,
    by_subject: AHashMap<&'a Reference, Vec<usize>>,
    by_object: AHashMap<&'a Reference, Vec<usize>>,
    by_subject_predicate: AHashMap<&'a Reference, AHashMap<&'a Reference, Vec<usize>>>,
}

impl<'a> MappingIndex<'a> {
    pub fn build(mappings: &'a [Mapping]) -> Self {
        let mut by_triple = AHashMap::with_capacity(mappings.len());
        let mut by_subject: AHashMap<&Reference, Vec<usize>> = AHashMap::new();
        let mut by_object: AHashMap<&Reference, Vec<usize>> = AHashMap::new();
        let mut by_subject_predicate: AHashMap<&Reference, AHashMap<&Reference, Vec<usize>>> =
            AHashMap::new();
        for (slot, mapping) in mappings.iter().enumerate() {
            by_triple.entry(mapping.digest()).or_insert(slot);
            by_subject.entry(&mapping.subject).or_default().push(slot);
            by_object.entry(&mapping.object).or_default().push(slot);
            by_subject_predicate
                .entry(&mapping.subject)
                .or_default()
                .entry(&mapping.predicate)
                .or_default()
                .push(slot);
        }
        Self {
            mappings,
            by_triple,
            by_subject,
            by_object,
            by_subject_predicate,
        }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Whether a mapping with the given triple digest is present.
    pub fn contains_triple(&self, digest: &Digest) -> bool {
        self.by_triple.contains_key(digest)
    }

    /// The mapping with the given triple digest, if present.
    pub fn by_triple(&self, digest: &Digest) -> Option<&'a Mapping> {
        self.by_triple.get(digest).map(|&slot| &self.mappings[slot])
    }

    /// All mappings with the given subject.
    pub fn by_subject(&self, subject: &Reference) -> impl Iterator<Item = &'a Mapping> + '_ {
        self.by_subject
            .get(subject)
            .into_iter()
            .flatten()
            .map(|&slot| &self.mappings[slot])
    }

    /// All mappings with the given object.
    pub fn by_object(&self, object: &Reference) -> impl Iterator<Item = &'a Mapping> + '_ {
        self.by_object
            .get(object)
            .into_iter()
            .flatten()
            .map(|&slot| &self.mappings[slot])
    }

    /// All mappings with the given subject and predicate.
    pub fn by_subject_predicate(
        &self,
        subject: &Reference,
        predicate: &Reference,
    ) -> impl Iterator<Item = &'a Mapping> + '_ {
        self.by_subject_predicate
            .get(subject)
            .and_then(|by_predicate| by_predicate.get(predicate))
            .into_iter()
            .flatten()
            .map(|&slot| &self.mappings[slot])
    }
}
