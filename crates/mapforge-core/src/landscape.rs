//! Landscape analysis: joint coverage of a set of vocabularies.
//!
//! Answers the question "across these overlapping vocabularies, how many
//! distinct entities exist?" by combining three measurements:
//!
//! - pairwise overlap between vocabularies before and after processing,
//! - connected components of the equivalence graph restricted to the
//!   analyzed prefixes, and
//! - per-vocabulary term counts from an external catalog, which account
//!   for singleton terms that never entered any mapping.
//!
//! The unique-entity estimate is an estimate: missing mappings inflate
//! it, incorrect mappings and unavailable term lists deflate it.

use ahash::{AHashMap, AHashSet};
use roaring::RoaringBitmap;

use crate::graph::EquivalenceGraph;
use crate::vocabulary::EXACT_MATCH;
use crate::Mapping;

/// Read-only provider of per-vocabulary term counts.
///
/// Implementations may be shared across threads; the analyzer only ever
/// reads.
pub trait TermCatalog: Sync {
    /// The number of terms in the vocabulary, or `None` when no term
    /// list could be loaded for it.
    fn term_count(&self, prefix: &str) -> Option<u64>;
}

/// A term catalog backed by a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticTermCatalog {
    counts: AHashMap<String, u64>,
}

impl StaticTermCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prefix: impl Into<String>, count: u64) {
        self.counts.insert(prefix.into(), count);
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for StaticTermCatalog {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self {
            counts: iter
                .into_iter()
                .map(|(prefix, count)| (prefix.into(), count))
                .collect(),
        }
    }
}

impl TermCatalog for StaticTermCatalog {
    fn term_count(&self, prefix: &str) -> Option<u64> {
        self.counts.get(prefix).copied()
    }
}

/// The results of a landscape analysis over a fixed prefix set.
///
/// Matrix rows and columns follow `prefixes` order.
#[derive(Debug, Clone)]
pub struct LandscapeSummary {
    pub prefixes: Vec<String>,
    /// Catalog term count per prefix (`None`: no term list available).
    pub term_counts: Vec<Option<u64>>,
    /// Overlap before inference: `raw_overlap[p][q]` counts distinct
    /// subjects of prefix `p` with at least one exact match to an object
    /// of prefix `q`. Diagonal entries carry the term count.
    pub raw_overlap: Vec<Vec<u64>>,
    /// Same measurement over the processed (post-inference) collection.
    pub processed_overlap: Vec<Vec<u64>>,
    /// Element-wise `processed_overlap - raw_overlap`.
    pub gains: Vec<Vec<i64>>,
    /// `100 * gains / raw_overlap`; infinity for `0 -> nonzero`, NaN for
    /// `0 -> 0`.
    pub percent_gains: Vec<Vec<f64>>,
    /// Equivalence components among the analyzed prefixes.
    pub component_count: u64,
    /// Per prefix, terms that never entered the equivalence graph.
    pub singletons: Vec<u64>,
    /// Estimated distinct entities: components plus singletons.
    pub unique_entities: u64,
    /// Total terms across the analyzed prefixes.
    pub total_terms: u64,
    /// `(total_terms - unique_entities) / total_terms`.
    pub reduction_ratio: f64,
    /// For every prefix combination that occurs, the number of
    /// components whose member prefixes are exactly that set; singleton
    /// counts are folded into the single-prefix entries. Sorted by
    /// descending count, then by key.
    pub combination_counts: Vec<(Vec<String>, u64)>,
}

impl LandscapeSummary {
    /// A short human-readable account of the analysis.
    pub fn describe(&self) -> String {
        let mapped: u64 = self.component_count;
        let singletons: u64 = self.singletons.iter().sum();
        let percent = |part: u64| {
            if self.unique_entities == 0 {
                0.0
            } else {
                100.0 * part as f64 / self.unique_entities as f64
            }
        };
        format!(
            "This estimates a total of {} unique entities across {} vocabularies.\n\
             {} ({:.1}%) have at least one mapping; {} ({:.1}%) are unique to a \
             single vocabulary.\nMerging reduced {} terms by {:.1}%.",
            self.unique_entities,
            self.prefixes.len(),
            mapped,
            percent(mapped),
            singletons,
            percent(singletons),
            self.total_terms,
            100.0 * self.reduction_ratio,
        )
    }
}

/// Count, per ordered prefix pair, the distinct subjects of the first
/// prefix with at least one exact match to an object of the second.
/// Diagonal entries are the catalog term counts.
pub fn overlap_matrix(
    mappings: &[Mapping],
    prefixes: &[String],
    catalog: &dyn TermCatalog,
) -> Vec<Vec<u64>> {
    let positions: AHashMap<&str, usize> = prefixes
        .iter()
        .enumerate()
        .map(|(position, prefix)| (prefix.as_str(), position))
        .collect();

    let mut subjects: AHashMap<(usize, usize), AHashSet<&str>> = AHashMap::new();
    for mapping in mappings {
        if mapping.predicate != *EXACT_MATCH {
            continue;
        }
        let (Some(&row), Some(&column)) = (
            positions.get(mapping.subject.prefix.as_str()),
            positions.get(mapping.object.prefix.as_str()),
        ) else {
            continue;
        };
        subjects
            .entry((row, column))
            .or_default()
            .insert(mapping.subject.identifier.as_str());
    }

    let size = prefixes.len();
    let mut matrix = vec![vec![0u64; size]; size];
    for ((row, column), set) in subjects {
        matrix[row][column] = set.len() as u64;
    }
    for (position, prefix) in prefixes.iter().enumerate() {
        matrix[position][position] = catalog.term_count(prefix).unwrap_or(0);
    }
    matrix
}

/// Run the full landscape analysis.
///
/// `raw` is the collection as read from the sources, `processed` the
/// collection after inference and filtering; the gain matrices measure
/// what processing bought. Unique-entity estimation uses `processed`.
pub fn landscape_analysis(
    processed: &[Mapping],
    raw: &[Mapping],
    prefixes: &[String],
    catalog: &dyn TermCatalog,
) -> LandscapeSummary {
    let raw_overlap = overlap_matrix(raw, prefixes, catalog);
    let processed_overlap = overlap_matrix(processed, prefixes, catalog);

    let size = prefixes.len();
    let mut gains = vec![vec![0i64; size]; size];
    let mut percent_gains = vec![vec![0f64; size]; size];
    for row in 0..size {
        for column in 0..size {
            let raw_count = raw_overlap[row][column];
            let gain = processed_overlap[row][column] as i64 - raw_count as i64;
            gains[row][column] = gain;
            percent_gains[row][column] = if raw_count == 0 {
                if gain == 0 {
                    f64::NAN
                } else {
                    f64::INFINITY
                }
            } else {
                100.0 * gain as f64 / raw_count as f64
            };
        }
    }

    let prefix_set: AHashSet<&str> = prefixes.iter().map(String::as_str).collect();
    let graph = EquivalenceGraph::from_mappings_filtered(
        processed,
        &EquivalenceGraph::default_equivalence(),
        |reference| prefix_set.contains(reference.prefix.as_str()),
    );

    // Nodes of each prefix participating in any component.
    let mut participating: AHashMap<&str, RoaringBitmap> = AHashMap::new();
    for (id, reference) in graph.nodes() {
        participating
            .entry(reference.prefix.as_str())
            .or_default()
            .insert(id);
    }

    let components = graph.components();
    let component_count = components.len() as u64;

    let mut combination_counts: AHashMap<Vec<String>, u64> = AHashMap::new();
    for component in &components {
        let mut members: Vec<String> = component
            .iter()
            .map(|&id| graph.node(id).prefix.clone())
            .collect();
        members.sort();
        members.dedup();
        *combination_counts.entry(members).or_default() += 1;
    }

    let term_counts: Vec<Option<u64>> = prefixes
        .iter()
        .map(|prefix| catalog.term_count(prefix))
        .collect();
    let mut singletons = Vec::with_capacity(size);
    let mut total_terms = 0u64;
    for (prefix, term_count) in prefixes.iter().zip(&term_counts) {
        let mapped = participating
            .get(prefix.as_str())
            .map_or(0, |bitmap| bitmap.len());
        let total = match term_count {
            Some(count) => *count,
            None => {
                tracing::warn!(%prefix, "no term count available, assuming only mapped terms");
                mapped
            }
        };
        let unmapped = total.saturating_sub(mapped);
        if unmapped > 0 {
            *combination_counts.entry(vec![prefix.clone()]).or_default() += unmapped;
        }
        singletons.push(unmapped);
        total_terms += total;
    }

    let unique_entities = component_count + singletons.iter().sum::<u64>();
    let reduction_ratio = if total_terms == 0 {
        0.0
    } else {
        (total_terms - unique_entities.min(total_terms)) as f64 / total_terms as f64
    };

    let mut combination_counts: Vec<(Vec<String>, u64)> = combination_counts.into_iter().collect();
    combination_counts.sort_by(|(key_a, count_a), (key_b, count_b)| {
        count_b.cmp(count_a).then_with(|| key_a.cmp(key_b))
    });

    LandscapeSummary {
        prefixes: prefixes.to_vec(),
        term_counts,
        raw_overlap,
        processed_overlap,
        gains,
        percent_gains,
        component_count,
        singletons,
        unique_entities,
        total_terms,
        reduction_ratio,
        combination_counts,
    }
}
