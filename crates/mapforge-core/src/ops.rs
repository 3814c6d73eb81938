//! Bulk operations over mapping collections.
//!
//! Collections are plain `Vec<Mapping>`s owned by the caller; every
//! operation consumes or borrows one collection and produces the next,
//! preserving input order where it does not conflict with the operation's
//! contract. No operation mutates in place.

use ahash::{AHashMap, AHashSet};

use crate::evidence::Digest;
use crate::infer::flip;
use crate::vocabulary::PredicateTable;
use crate::{Evidence, Mapping, Reference};

/// Collapse mappings with identical triples, unioning evidence by digest.
///
/// First occurrence wins the slot; evidence from later duplicates is
/// appended unless an evidence with the same digest is already present.
/// Idempotent, and commutative over concatenation up to output order.
pub fn deduplicate(mappings: Vec<Mapping>) -> Vec<Mapping> {
    let mut slots: AHashMap<Digest, usize> = AHashMap::with_capacity(mappings.len());
    let mut seen_evidence: AHashMap<Digest, AHashSet<Digest>> = AHashMap::new();
    let mut out: Vec<Mapping> = Vec::with_capacity(mappings.len());

    for mapping in mappings {
        let triple = mapping.digest();
        match slots.get(&triple) {
            None => {
                let evidence_digests = mapping.evidence.iter().map(Evidence::digest).collect();
                slots.insert(triple, out.len());
                seen_evidence.insert(triple, evidence_digests);
                out.push(mapping);
            }
            Some(&slot) => {
                let seen = seen_evidence
                    .get_mut(&triple)
                    .unwrap_or_else(|| unreachable!("slot without evidence set"));
                for evidence in mapping.evidence {
                    if seen.insert(evidence.digest()) {
                        out[slot].evidence.push(evidence);
                    }
                }
            }
        }
    }
    out
}

/// Keep mappings whose predicate is in `allowed`.
pub fn filter_predicates(mappings: Vec<Mapping>, allowed: &[Reference]) -> Vec<Mapping> {
    let allowed: AHashSet<&Reference> = allowed.iter().collect();
    mappings
        .into_iter()
        .filter(|m| allowed.contains(&m.predicate))
        .collect()
}

/// Drop mappings whose predicate is in `denied`.
pub fn remove_predicates(mappings: Vec<Mapping>, denied: &[Reference]) -> Vec<Mapping> {
    let denied: AHashSet<&Reference> = denied.iter().collect();
    mappings
        .into_iter()
        .filter(|m| !denied.contains(&m.predicate))
        .collect()
}

/// Which side(s) of a mapping a prefix filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterScope {
    #[default]
    Both,
    SubjectOnly,
    ObjectOnly,
}

/// A composable keep/remove filter over subject and object prefixes.
#[derive(Debug, Clone, Default)]
pub struct PrefixFilter {
    keep: Option<AHashSet<String>>,
    remove: AHashSet<String>,
    scope: FilterScope,
}

impl PrefixFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only prefixes in `prefixes` pass. Composes with [`Self::remove`].
    pub fn keep<I: IntoIterator<Item = S>, S: Into<String>>(mut self, prefixes: I) -> Self {
        self.keep = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    /// Prefixes in `prefixes` never pass, even when also kept.
    pub fn remove<I: IntoIterator<Item = S>, S: Into<String>>(mut self, prefixes: I) -> Self {
        self.remove.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn scope(mut self, scope: FilterScope) -> Self {
        self.scope = scope;
        self
    }

    fn passes_prefix(&self, prefix: &str) -> bool {
        if self.remove.contains(prefix) {
            return false;
        }
        match &self.keep {
            Some(keep) => keep.contains(prefix),
            None => true,
        }
    }

    /// Whether a mapping survives the filter.
    pub fn passes(&self, mapping: &Mapping) -> bool {
        let subject_ok = self.passes_prefix(&mapping.subject.prefix);
        let object_ok = self.passes_prefix(&mapping.object.prefix);
        match self.scope {
            FilterScope::Both => subject_ok && object_ok,
            FilterScope::SubjectOnly => subject_ok,
            FilterScope::ObjectOnly => object_ok,
        }
    }
}

/// Keep mappings passing a [`PrefixFilter`].
pub fn filter_prefixes(mappings: Vec<Mapping>, filter: &PrefixFilter) -> Vec<Mapping> {
    let before = mappings.len();
    let out: Vec<Mapping> = mappings.into_iter().filter(|m| filter.passes(m)).collect();
    tracing::debug!(before, after = out.len(), "filtered by prefix");
    out
}

/// Drop mappings whose subject equals their object. Such mappings are
/// never constructed by this crate, but external sources produce them.
pub fn filter_self_mappings(mappings: Vec<Mapping>) -> Vec<Mapping> {
    mappings
        .into_iter()
        .filter(|m| m.subject != m.object)
        .collect()
}

/// Drop mappings whose aggregate confidence is below `threshold`.
pub fn filter_min_confidence(mappings: Vec<Mapping>, threshold: f64) -> Vec<Mapping> {
    mappings
        .into_iter()
        .filter(|m| m.confidence() >= threshold)
        .collect()
}

/// Drop every mapping whose triple appears in `skip`.
///
/// This is how curated negative mappings are applied: the negatives form
/// the skip set, and any asserted or inferred mapping matching one of
/// them is discarded regardless of its evidence.
pub fn filter_triples(mappings: Vec<Mapping>, skip: &[Mapping]) -> Vec<Mapping> {
    let skip: AHashSet<Digest> = skip.iter().map(Mapping::digest).collect();
    let before = mappings.len();
    let out: Vec<Mapping> = mappings
        .into_iter()
        .filter(|m| !skip.contains(&m.digest()))
        .collect();
    if out.len() != before {
        tracing::debug!(removed = before - out.len(), "removed skip-listed triples");
    }
    out
}

/// Mappings from `source_prefix` subjects to `target_prefix` objects.
///
/// Mappings asserted in the opposite direction are flipped on the way
/// through when their predicate permits, so a `mesh -> chebi` projection
/// sees `chebi -> mesh` exact matches too. The result is deduplicated.
pub fn project(
    mappings: &[Mapping],
    source_prefix: &str,
    target_prefix: &str,
    table: &PredicateTable,
) -> Vec<Mapping> {
    let mut out = Vec::new();
    for mapping in mappings {
        if mapping.subject.prefix == source_prefix && mapping.object.prefix == target_prefix {
            out.push(mapping.clone());
        } else if mapping.subject.prefix == target_prefix
            && mapping.object.prefix == source_prefix
        {
            if let Some(flipped) = flip(mapping, table) {
                out.push(flipped);
            }
        }
    }
    deduplicate(out)
}

/// Count distinct triples per `(subject prefix, object prefix)` pair,
/// most frequent first, ties in pair order.
pub fn count_source_target(mappings: &[Mapping]) -> Vec<((String, String), usize)> {
    let mut triples: AHashSet<Digest> = AHashSet::new();
    let mut counts: AHashMap<(String, String), usize> = AHashMap::new();
    for mapping in mappings {
        if triples.insert(mapping.digest()) {
            *counts
                .entry((mapping.subject.prefix.clone(), mapping.object.prefix.clone()))
                .or_default() += 1;
        }
    }
    let mut out: Vec<_> = counts.into_iter().collect();
    out.sort_by(|(pair_a, count_a), (pair_b, count_b)| {
        count_b.cmp(count_a).then_with(|| pair_a.cmp(pair_b))
    });
    out
}

/// Build a mapping chain from an alternating reference/predicate path:
/// `r1, p1, r2, p2, r3, ...` (odd length, at least three elements).
/// Every produced mapping carries a clone of `evidence`.
///
/// Panics when the path shape is wrong; this is a construction helper
/// for tests and small curated inputs.
pub fn line(elements: &[Reference], evidence: Evidence) -> Vec<Mapping> {
    assert!(
        elements.len() >= 3 && elements.len() % 2 == 1,
        "a mapping line needs an odd number (>= 3) of elements"
    );
    elements
        .windows(3)
        .step_by(2)
        .map(|window| {
            Mapping::new(
                window[0].clone(),
                window[1].clone(),
                window[2].clone(),
                vec![evidence.clone()],
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::SimpleEvidence;
    use crate::vocabulary::{
        BROAD_MATCH, EXACT_MATCH, LEXICAL_MAPPING, MANUAL_MAPPING, NARROW_MATCH,
    };

    fn evidence(confidence: f64) -> Evidence {
        SimpleEvidence::new(MANUAL_MAPPING.clone(), confidence).into()
    }

    fn exact(s: &str, o: &str, e: Evidence) -> Mapping {
        Mapping::new(
            Reference::from_curie(s).unwrap(),
            EXACT_MATCH.clone(),
            Reference::from_curie(o).unwrap(),
            vec![e],
        )
    }

    #[test]
    fn deduplicate_unions_evidence_by_digest() {
        let lexical: Evidence = SimpleEvidence::new(LEXICAL_MAPPING.clone(), 0.5).into();
        let mappings = vec![
            exact("a:1", "b:1", evidence(1.0)),
            exact("a:1", "b:1", lexical),
            exact("a:1", "b:1", evidence(1.0)), // digest-identical, dropped
        ];
        let deduplicated = deduplicate(mappings);
        assert_eq!(deduplicated.len(), 1);
        assert_eq!(deduplicated[0].evidence.len(), 2);
    }

    #[test]
    fn deduplicate_is_idempotent() {
        let mappings = vec![
            exact("a:1", "b:1", evidence(1.0)),
            exact("a:1", "b:1", evidence(0.5)),
            exact("a:2", "b:2", evidence(1.0)),
        ];
        let once = deduplicate(mappings);
        let twice = deduplicate(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn deduplicate_commutes_over_concatenation() {
        let left = vec![exact("a:1", "b:1", evidence(1.0))];
        let right = vec![exact("a:1", "b:1", evidence(0.5)), exact("a:2", "b:2", evidence(1.0))];

        let mut forward = deduplicate([left.clone(), right.clone()].concat());
        let mut backward = deduplicate([right, left].concat());
        forward.sort_by_key(Mapping::sort_key);
        backward.sort_by_key(Mapping::sort_key);
        for (a, b) in forward.iter().zip(&backward) {
            assert_eq!(a.digest(), b.digest());
            let mut ae: Vec<_> = a.evidence.iter().map(Evidence::digest).collect();
            let mut be: Vec<_> = b.evidence.iter().map(Evidence::digest).collect();
            ae.sort();
            be.sort();
            assert_eq!(ae, be);
        }
    }

    #[test]
    fn predicate_filters_select_and_drop() {
        let mut broad = exact("a:1", "b:1", evidence(1.0));
        broad.predicate = BROAD_MATCH.clone();
        let mappings = vec![exact("a:2", "b:2", evidence(1.0)), broad];

        let kept = filter_predicates(mappings.clone(), &[EXACT_MATCH.clone()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].predicate, *EXACT_MATCH);

        let dropped = remove_predicates(mappings, &[EXACT_MATCH.clone()]);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].predicate, *BROAD_MATCH);
    }

    #[test]
    fn prefix_filter_keep_and_remove_compose() {
        let filter = PrefixFilter::new()
            .keep(["chebi", "mesh"])
            .remove(["mesh"]);
        let keep = exact("chebi:1", "chebi:2", evidence(1.0));
        let removed = exact("chebi:1", "mesh:2", evidence(1.0));
        let unkept = exact("chebi:1", "doid:2", evidence(1.0));
        assert!(filter.passes(&keep));
        assert!(!filter.passes(&removed));
        assert!(!filter.passes(&unkept));
    }

    #[test]
    fn prefix_filter_scopes_to_one_side() {
        let filter = PrefixFilter::new()
            .keep(["chebi"])
            .scope(FilterScope::SubjectOnly);
        assert!(filter.passes(&exact("chebi:1", "mesh:2", evidence(1.0))));
        assert!(!filter.passes(&exact("mesh:2", "chebi:1", evidence(1.0))));
    }

    #[test]
    fn min_confidence_drops_zero_confidence_mappings() {
        let mappings = vec![
            exact("a:1", "b:1", evidence(0.0)),
            exact("a:2", "b:2", evidence(0.4)),
        ];
        let kept = filter_min_confidence(mappings, 0.1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].subject.identifier, "2");
    }

    #[test]
    fn filter_triples_applies_negatives() {
        let negative = exact("a:1", "b:1", evidence(1.0));
        let mappings = vec![
            exact("a:1", "b:1", evidence(0.9)),
            exact("a:2", "b:2", evidence(0.9)),
        ];
        let kept = filter_triples(mappings, std::slice::from_ref(&negative));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].subject.identifier, "2");
    }

    #[test]
    fn project_flips_reversed_mappings() {
        let table = PredicateTable::standard();
        let forward = exact("chebi:1", "mesh:1", evidence(1.0));
        let reversed = exact("mesh:2", "chebi:2", evidence(1.0));
        let projected = project(&[forward, reversed], "chebi", "mesh", &table);
        assert_eq!(projected.len(), 2);
        assert!(projected
            .iter()
            .all(|m| m.subject.prefix == "chebi" && m.object.prefix == "mesh"));
    }

    #[test]
    fn line_builds_a_chain() {
        let refs = [
            Reference::new("t", "1"),
            EXACT_MATCH.clone(),
            Reference::new("t", "2"),
            BROAD_MATCH.clone(),
            Reference::new("t", "3"),
        ];
        let mappings = line(&refs, evidence(1.0));
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].predicate, *EXACT_MATCH);
        assert_eq!(mappings[1].predicate, *BROAD_MATCH);
        assert_eq!(mappings[1].subject, Reference::new("t", "2"));
    }

    #[test]
    fn count_source_target_counts_distinct_triples() {
        let mappings = vec![
            exact("a:1", "b:1", evidence(1.0)),
            exact("a:1", "b:1", evidence(0.5)),
            exact("a:2", "b:2", evidence(1.0)),
            exact("b:1", "c:1", evidence(1.0)),
        ];
        let counts = count_source_target(&mappings);
        assert_eq!(counts[0], (("a".into(), "b".into()), 2));
        assert_eq!(counts[1], (("b".into(), "c".into()), 1));
    }

    #[test]
    fn narrow_match_line_flips_in_projection() {
        let table = PredicateTable::standard();
        let narrow = Mapping::new(
            Reference::from_curie("mesh:D000077143").unwrap(),
            NARROW_MATCH.clone(),
            Reference::from_curie("chebi:4672").unwrap(),
            vec![evidence(1.0)],
        );
        let projected = project(&[narrow], "chebi", "mesh", &table);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].predicate, *BROAD_MATCH);
    }
}
