//! The four-rule inference engine.
//!
//! One inference round applies, against a single consistent snapshot of
//! the input collection:
//!
//! 1. **Inversion** — `(s, p, o)` with `p` symmetric or invertible
//!    yields `(o, p', s)`.
//! 2. **Predicate mutation** — caller-supplied rules promote predicates
//!    for configured prefix pairs (typically `hasDbXref` to
//!    `exactMatch` where a resource is known to use xrefs for
//!    equivalence), discounted by the rule's confidence.
//! 3. **Generalization** — predicates with a `generalizes_to` entry
//!    yield the same triple under the more general predicate.
//! 4. **Transitive chaining** — `(a, p, b)` and `(b, p, c)` with `p`
//!    transitive yield `(a, p, c)`; longer chains emerge from iterating
//!    rounds.
//!
//! Newly produced mappings are merged (and deduplicated, unioning
//! evidence by digest) only at round boundaries, so rule application
//! within a round is order-independent and safely parallelizable.
//! Rounds repeat until a fixed point or until the iteration budget runs
//! out; the budget bounds the combinatorial blowups that dense
//! cross-reference hubs can otherwise produce.
//!
//! Every derived mapping carries a single reasoned evidence naming its
//! parent mappings by triple digest, with confidence derived from the
//! parents' aggregate confidences at derivation time.

use crate::cancel::{CancelToken, CANCEL_CHECK_INTERVAL};
use crate::evidence::ReasonedEvidence;
use crate::ops::deduplicate;
use crate::vocabulary::{
    PredicateTable, CHAIN_MAPPING, DB_XREF, EXACT_MATCH, GENERALIZATION_MAPPING,
    INVERSION_MAPPING, KNOWLEDGE_MAPPING,
};
use crate::{Mapping, MappingIndex, Reference, Result};

/// A caller-supplied predicate-mutation rule.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRule {
    /// Subject prefix the rule applies to.
    pub source_prefix: String,
    /// Object prefix the rule applies to; `None` matches any prefix.
    pub target_prefix: Option<String>,
    /// Predicate to rewrite.
    pub old: Reference,
    /// Predicate to produce.
    pub new: Reference,
    /// Confidence factor of the rewrite, in `[0, 1]`.
    pub confidence: f64,
}

impl MutationRule {
    /// The common case: promote `oboinowl:hasDbXref` from a resource to
    /// `skos:exactMatch` at the given confidence.
    pub fn dbxref_upgrade(source_prefix: impl Into<String>, confidence: f64) -> Self {
        Self {
            source_prefix: source_prefix.into(),
            target_prefix: None,
            old: DB_XREF.clone(),
            new: EXACT_MATCH.clone(),
            confidence,
        }
    }

    fn matches(&self, mapping: &Mapping) -> bool {
        mapping.predicate == self.old
            && mapping.subject.prefix == self.source_prefix
            && self
                .target_prefix
                .as_deref()
                .map_or(true, |target| mapping.object.prefix == target)
    }
}

/// Knobs for [`infer`].
#[derive(Debug, Clone, Default)]
pub struct InferenceOptions {
    /// Predicate-mutation rules applied each round.
    pub mutations: Vec<MutationRule>,
    /// Maximum number of rounds before giving up on a fixed point.
    /// `None` uses [`InferenceOptions::DEFAULT_MAX_ROUNDS`].
    pub max_rounds: Option<usize>,
    /// Cooperative cancellation, checked every
    /// [`CANCEL_CHECK_INTERVAL`] processed mappings.
    pub cancel: CancelToken,
}

impl InferenceOptions {
    pub const DEFAULT_MAX_ROUNDS: usize = 5;

    fn budget(&self) -> usize {
        self.max_rounds.unwrap_or(Self::DEFAULT_MAX_ROUNDS).max(1)
    }
}

/// What [`infer`] produced.
#[derive(Debug)]
pub struct InferenceOutcome {
    /// Input plus derived mappings, deduplicated.
    pub mappings: Vec<Mapping>,
    /// Rounds actually executed.
    pub rounds: usize,
    /// Whether the last round produced nothing new.
    pub reached_fixed_point: bool,
    /// Mappings produced by the final executed round.
    pub last_round_new: usize,
}

/// Flip a single mapping when its predicate is symmetric or has an
/// inverse. The flipped mapping carries one reasoned evidence pointing
/// at the original, at the original's aggregate confidence.
pub fn flip(mapping: &Mapping, table: &PredicateTable) -> Option<Mapping> {
    let predicate = table.info(&mapping.predicate).flipped(&mapping.predicate)?;
    Some(Mapping::new(
        mapping.object.clone(),
        predicate,
        mapping.subject.clone(),
        vec![ReasonedEvidence::new(
            INVERSION_MAPPING.clone(),
            mapping.confidence(),
            vec![mapping.digest()],
        )
        .into()],
    ))
}

/// Run inference rounds to a fixed point or to the iteration budget.
///
/// Budget exhaustion is not an error: downstream stages see the partial
/// closure, and a warning records how much the final round still
/// produced.
pub fn infer(
    mappings: Vec<Mapping>,
    table: &PredicateTable,
    options: &InferenceOptions,
) -> Result<InferenceOutcome> {
    let budget = options.budget();
    let mut mappings = deduplicate(mappings);
    let mut rounds = 0;
    let mut last_round_new = 0;

    while rounds < budget {
        options.cancel.check()?;
        rounds += 1;

        let produced = one_round(&mappings, table, options)?;
        last_round_new = produced.len();
        tracing::debug!(round = rounds, produced = last_round_new, "inference round");
        if produced.is_empty() {
            return Ok(InferenceOutcome {
                mappings,
                rounds,
                reached_fixed_point: true,
                last_round_new: 0,
            });
        }
        mappings.extend(produced);
        mappings = deduplicate(mappings);
    }

    // Check whether the budget happened to land exactly on the closure.
    let reached_fixed_point = one_round(&mappings, table, options)?.is_empty();
    if !reached_fixed_point {
        tracing::warn!(
            rounds,
            last_round_new,
            "inference budget exhausted before fixed point; continuing with partial closure"
        );
    }
    Ok(InferenceOutcome {
        mappings,
        rounds,
        reached_fixed_point,
        last_round_new,
    })
}

/// Apply all four rules against one snapshot, returning only mappings
/// whose triples are absent from the snapshot (or multiply derived
/// within the round; the caller's deduplication unions those).
fn one_round(
    snapshot: &[Mapping],
    table: &PredicateTable,
    options: &InferenceOptions,
) -> Result<Vec<Mapping>> {
    let index = MappingIndex::build(snapshot);
    let mut produced = Vec::new();
    let mut ticker = CancelTicker::new(&options.cancel);

    // Inversion.
    for mapping in snapshot {
        ticker.tick()?;
        if let Some(flipped) = flip(mapping, table) {
            if !index.contains_triple(&flipped.digest()) {
                produced.push(flipped);
            }
        }
    }

    // Predicate mutation.
    for mapping in snapshot {
        ticker.tick()?;
        for rule in &options.mutations {
            if !rule.matches(mapping) {
                continue;
            }
            let mutated = Mapping::new(
                mapping.subject.clone(),
                rule.new.clone(),
                mapping.object.clone(),
                vec![ReasonedEvidence::new(
                    KNOWLEDGE_MAPPING.clone(),
                    mapping.confidence() * rule.confidence,
                    vec![mapping.digest()],
                )
                .into()],
            );
            if !index.contains_triple(&mutated.digest()) {
                produced.push(mutated);
            }
        }
    }

    // Generalization.
    for mapping in snapshot {
        ticker.tick()?;
        let Some(general) = table.info(&mapping.predicate).generalizes_to.clone() else {
            continue;
        };
        let generalized = Mapping::new(
            mapping.subject.clone(),
            general,
            mapping.object.clone(),
            vec![ReasonedEvidence::new(
                GENERALIZATION_MAPPING.clone(),
                mapping.confidence(),
                vec![mapping.digest()],
            )
            .into()],
        );
        if !index.contains_triple(&generalized.digest()) {
            produced.push(generalized);
        }
    }

    // Transitive chaining (length two; longer chains come from later
    // rounds re-chaining the results).
    for first in snapshot {
        ticker.tick()?;
        if !table.info(&first.predicate).transitive {
            continue;
        }
        for second in index.by_subject_predicate(&first.object, &first.predicate) {
            if second.object == first.subject {
                continue; // would close a cycle back to the start
            }
            let chained = Mapping::new(
                first.subject.clone(),
                first.predicate.clone(),
                second.object.clone(),
                vec![ReasonedEvidence::new(
                    CHAIN_MAPPING.clone(),
                    first.confidence() * second.confidence(),
                    vec![first.digest(), second.digest()],
                )
                .into()],
            );
            if !index.contains_triple(&chained.digest()) {
                produced.push(chained);
            }
        }
    }

    Ok(produced)
}

/// Counts processed mappings and polls the cancellation token at the
/// configured interval.
struct CancelTicker<'a> {
    cancel: &'a CancelToken,
    processed: usize,
}

impl<'a> CancelTicker<'a> {
    fn new(cancel: &'a CancelToken) -> Self {
        Self {
            cancel,
            processed: 0,
        }
    }

    fn tick(&mut self) -> Result<()> {
        self.processed += 1;
        if self.processed % CANCEL_CHECK_INTERVAL == 0 {
            self.cancel.check()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{Evidence, SimpleEvidence};
    use crate::vocabulary::{
        BROAD_MATCH, EQUIVALENT_TO, MANUAL_MAPPING, NARROW_MATCH, REPLACED_BY,
    };

    fn evidence() -> Evidence {
        SimpleEvidence::new(MANUAL_MAPPING.clone(), 1.0).into()
    }

    fn mapping(s: &str, p: &Reference, o: &str) -> Mapping {
        Mapping::new(
            Reference::from_curie(s).unwrap(),
            p.clone(),
            Reference::from_curie(o).unwrap(),
            vec![evidence()],
        )
    }

    fn triples(mappings: &[Mapping]) -> Vec<String> {
        let mut out: Vec<String> = mappings
            .iter()
            .map(|m| format!("{} {} {}", m.subject, m.predicate, m.object))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn flip_symmetric_keeps_predicate() {
        let table = PredicateTable::standard();
        let m = mapping("chebi:10001", &EXACT_MATCH, "mesh:C067604");
        let flipped = flip(&m, &table).unwrap();
        assert_eq!(flipped.subject, Reference::from_curie("mesh:C067604").unwrap());
        assert_eq!(flipped.predicate, *EXACT_MATCH);
        assert_eq!(flipped.object, Reference::from_curie("chebi:10001").unwrap());
    }

    #[test]
    fn flip_asymmetric_swaps_broad_and_narrow() {
        let table = PredicateTable::standard();
        let narrow = mapping("mesh:D000077143", &NARROW_MATCH, "chebi:4672");
        let flipped = flip(&narrow, &table).unwrap();
        assert_eq!(flipped.predicate, *BROAD_MATCH);

        let replaced = mapping("a:1", &REPLACED_BY, "a:2");
        assert!(flip(&replaced, &table).is_none());
    }

    #[test]
    fn flip_records_provenance() {
        let table = PredicateTable::standard();
        let m = mapping("a:1", &EXACT_MATCH, "b:1");
        let flipped = flip(&m, &table).unwrap();
        match &flipped.evidence[0] {
            Evidence::Reasoned(reasoned) => {
                assert_eq!(reasoned.justification, *INVERSION_MAPPING);
                assert_eq!(reasoned.parents, vec![m.digest()]);
                assert_eq!(reasoned.confidence, m.confidence());
            }
            other => panic!("expected reasoned evidence, got {other:?}"),
        }
    }

    #[test]
    fn two_exact_matches_close_into_six() {
        let table = PredicateTable::standard();
        let inputs = vec![
            mapping("A:1", &EXACT_MATCH, "B:9"),
            mapping("A:1", &EXACT_MATCH, "C:6"),
        ];
        let outcome = infer(inputs, &table, &InferenceOptions::default()).unwrap();
        assert!(outcome.reached_fixed_point);
        assert_eq!(
            triples(&outcome.mappings),
            vec![
                "A:1 skos:exactMatch B:9",
                "A:1 skos:exactMatch C:6",
                "B:9 skos:exactMatch A:1",
                "B:9 skos:exactMatch C:6",
                "C:6 skos:exactMatch A:1",
                "C:6 skos:exactMatch B:9",
            ],
        );
        // The chained mappings cite both parents.
        let chained = outcome
            .mappings
            .iter()
            .find(|m| m.subject.prefix == "B" && m.object.prefix == "C")
            .unwrap();
        match &chained.evidence[0] {
            Evidence::Reasoned(reasoned) => assert_eq!(reasoned.parents.len(), 2),
            other => panic!("expected reasoned evidence, got {other:?}"),
        }
    }

    #[test]
    fn inversion_is_an_involution() {
        let table = PredicateTable::standard();
        let inputs = vec![mapping("a:1", &BROAD_MATCH, "b:1")];
        let outcome = infer(inputs, &table, &InferenceOptions::default()).unwrap();
        let first_pass = outcome.mappings;
        let again = infer(first_pass.clone(), &table, &InferenceOptions::default()).unwrap();
        assert_eq!(triples(&first_pass), triples(&again.mappings));
    }

    #[test]
    fn mutation_promotes_dbxrefs() {
        let table = PredicateTable::standard();
        let inputs = vec![mapping("doid:0050577", &DB_XREF, "mesh:C562966")];
        let options = InferenceOptions {
            mutations: vec![MutationRule::dbxref_upgrade("doid", 0.99)],
            ..Default::default()
        };
        let outcome = infer(inputs, &table, &options).unwrap();
        let promoted = outcome
            .mappings
            .iter()
            .find(|m| m.predicate == *EXACT_MATCH && m.subject.prefix == "doid")
            .expect("promoted mapping");
        match &promoted.evidence[0] {
            Evidence::Reasoned(reasoned) => {
                assert_eq!(reasoned.justification, *KNOWLEDGE_MAPPING);
                assert!((reasoned.confidence - 0.99).abs() < 1e-12);
            }
            other => panic!("expected reasoned evidence, got {other:?}"),
        }
        // The promoted exact match is flipped too.
        assert!(outcome
            .mappings
            .iter()
            .any(|m| m.predicate == *EXACT_MATCH && m.subject.prefix == "mesh"));
        // The mutation does not fire for unlisted subject prefixes.
        assert!(!outcome
            .mappings
            .iter()
            .any(|m| m.predicate == *EXACT_MATCH && m.subject.prefix == "umls"));
    }

    #[test]
    fn mutation_respects_target_prefix() {
        let table = PredicateTable::standard();
        let inputs = vec![
            mapping("doid:1", &DB_XREF, "mesh:1"),
            mapping("doid:2", &DB_XREF, "umls:2"),
        ];
        let options = InferenceOptions {
            mutations: vec![MutationRule {
                target_prefix: Some("mesh".into()),
                ..MutationRule::dbxref_upgrade("doid", 0.9)
            }],
            ..Default::default()
        };
        let outcome = infer(inputs, &table, &options).unwrap();
        assert!(outcome
            .mappings
            .iter()
            .any(|m| m.predicate == *EXACT_MATCH && m.object.prefix == "mesh"));
        assert!(!outcome
            .mappings
            .iter()
            .any(|m| m.predicate == *EXACT_MATCH && m.object.prefix == "umls"));
    }

    #[test]
    fn generalization_only_grows_the_collection() {
        let table = PredicateTable::standard();
        let inputs = vec![mapping("a:1", &EQUIVALENT_TO, "b:1")];
        let outcome = infer(inputs.clone(), &table, &InferenceOptions::default()).unwrap();
        let output_triples = triples(&outcome.mappings);
        for triple in triples(&inputs) {
            assert!(output_triples.contains(&triple));
        }
        // equivalentTo generalizes to exactMatch, which then closes
        // under inversion.
        assert!(output_triples.contains(&"a:1 skos:exactMatch b:1".to_string()));
        assert!(output_triples.contains(&"b:1 skos:exactMatch a:1".to_string()));
    }

    #[test]
    fn chains_never_close_cycles() {
        let table = PredicateTable::standard();
        let inputs = vec![
            mapping("a:1", &EXACT_MATCH, "b:1"),
            mapping("b:1", &EXACT_MATCH, "a:1"),
        ];
        let outcome = infer(inputs, &table, &InferenceOptions::default()).unwrap();
        assert!(outcome
            .mappings
            .iter()
            .all(|m| m.subject != m.object));
    }

    #[test]
    fn budget_exhaustion_reports_partial_closure() {
        let table = PredicateTable::standard();
        // A ten-node exact-match path needs several rounds to close.
        let references: Vec<Reference> = (0..10)
            .map(|i| Reference::new(format!("p{i}"), "1"))
            .collect();
        let inputs: Vec<Mapping> = references
            .windows(2)
            .map(|pair| {
                Mapping::new(
                    pair[0].clone(),
                    EXACT_MATCH.clone(),
                    pair[1].clone(),
                    vec![evidence()],
                )
            })
            .collect();
        let options = InferenceOptions {
            max_rounds: Some(1),
            ..Default::default()
        };
        let outcome = infer(inputs, &table, &options).unwrap();
        assert_eq!(outcome.rounds, 1);
        assert!(!outcome.reached_fixed_point);
        assert!(outcome.last_round_new > 0);
    }

    #[test]
    fn cancellation_stops_inference() {
        let table = PredicateTable::standard();
        let cancel = CancelToken::new();
        cancel.cancel();
        let options = InferenceOptions {
            cancel,
            ..Default::default()
        };
        let inputs = vec![mapping("a:1", &EXACT_MATCH, "b:1")];
        assert!(matches!(
            infer(inputs, &table, &options),
            Err(crate::Error::Cancelled)
        ));
    }

    #[test]
    fn empty_input_is_an_immediate_fixed_point() {
        let table = PredicateTable::standard();
        let outcome = infer(Vec::new(), &table, &InferenceOptions::default()).unwrap();
        assert!(outcome.mappings.is_empty());
        assert!(outcome.reached_fixed_point);
    }
}
