//! Staged execution of a configuration.
//!
//! Stage order: acquire -> pre-filter -> materialize raw -> infer ->
//! post-filter -> materialize processed -> prioritize -> materialize
//! priority -> landscape. Every stage is a pure function of the
//! previous collection plus the configuration. The cancellation token
//! is polled on entry to each stage (and continuously inside
//! inference), so cancelling mid-pipeline discards the current stage
//! while leaving already-materialized artifacts valid.

use std::path::Path;
use std::time::Instant;

use mapforge_core::ops::{
    deduplicate, filter_min_confidence, filter_prefixes, filter_self_mappings, filter_triples,
    remove_predicates, PrefixFilter,
};
use mapforge_core::vocabulary::IMPRECISE;
use mapforge_core::{
    infer, landscape_analysis, prioritize, CancelToken, InferenceOptions, LandscapeSummary,
    Mapping, PredicateTable, TermCatalog,
};
use mapforge_io::{archive, cache, neo4j, sssom, AdapterRegistry, SourceError};

use crate::config::{Configuration, OutputPaths};
use crate::Result;

/// The materialized products of one pipeline run.
pub struct PipelineResult {
    /// The deduplicated, pre-filtered input collection.
    pub raw: Vec<Mapping>,
    /// After inference and post-filtering.
    pub processed: Vec<Mapping>,
    /// The star-shaped prioritization mapping.
    pub priority: Vec<Mapping>,
    /// Present when a term catalog was supplied.
    pub landscape: Option<LandscapeSummary>,
    /// Inference rounds executed.
    pub inference_rounds: usize,
    /// Whether inference closed before its budget ran out.
    pub reached_fixed_point: bool,
}

/// Execute a configuration end to end.
///
/// `data_root` anchors every relative input and output path. The term
/// catalog is optional; without one the landscape stage is skipped.
pub fn run(
    configuration: &Configuration,
    registry: &AdapterRegistry,
    catalog: Option<&dyn TermCatalog>,
    data_root: &Path,
    cancel: CancelToken,
) -> Result<PipelineResult> {
    let table = PredicateTable::standard();
    configuration.validate(&table)?;
    cancel.check()?;
    let outputs = configuration.outputs.resolved(data_root);
    tracing::info!(key = %configuration.key, "starting assembly pipeline");

    // Acquisition and raw materialization.
    let raw = acquire(configuration, registry)?;
    let negatives = acquire_negatives(configuration, registry)?;
    let raw = prefilter(configuration, raw, &negatives);
    write_raw(&outputs, &raw)?;

    // Inference sees the materialized raw collection.
    let options = InferenceOptions {
        mutations: configuration.mutation_rules()?,
        max_rounds: configuration.max_inference_rounds,
        cancel: cancel.clone(),
    };
    let start = Instant::now();
    let outcome = infer(raw.clone(), &table, &options)?;
    tracing::info!(
        input = raw.len(),
        output = outcome.mappings.len(),
        rounds = outcome.rounds,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "inference finished"
    );

    cancel.check()?;
    let processed = postfilter(configuration, outcome.mappings, &negatives);
    write_processed(&outputs, &processed)?;

    cancel.check()?;
    let priority = prioritize(&processed, &configuration.priority);
    write_priority(&outputs, &priority)?;

    cancel.check()?;
    let landscape = catalog.map(|catalog| {
        landscape_analysis(&processed, &raw, &configuration.priority, catalog)
    });

    Ok(PipelineResult {
        raw,
        processed,
        priority,
        landscape,
        inference_rounds: outcome.rounds,
        reached_fixed_point: outcome.reached_fixed_point,
    })
}

fn acquire(configuration: &Configuration, registry: &AdapterRegistry) -> Result<Vec<Mapping>> {
    let mut mappings = Vec::new();
    for input in &configuration.inputs {
        // Subset roots restrict a source vocabulary to a sub-hierarchy;
        // they travel to the adapter as a descriptor extra.
        let subset = input
            .prefix
            .as_deref()
            .and_then(|prefix| configuration.subsets.get(prefix));
        let input = match subset {
            None => input.clone(),
            Some(roots) => {
                let mut input = input.clone();
                input.extras.insert(
                    "subset".to_string(),
                    serde_json::Value::from(roots.clone()),
                );
                input
            }
        };
        let input = &input;
        let start = Instant::now();
        match registry.resolve(input) {
            Ok(batch) => {
                tracing::info!(
                    source = %input.label(),
                    mappings = batch.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "acquired source"
                );
                mappings.extend(batch);
            }
            Err(SourceError::Unavailable { source_label: source, message })
                if configuration.allow_unavailable =>
            {
                tracing::warn!(%source, %message, "skipping unavailable source");
            }
            Err(error) => return Err(error.into()),
        }
    }
    Ok(mappings)
}

fn acquire_negatives(
    configuration: &Configuration,
    registry: &AdapterRegistry,
) -> Result<Vec<Mapping>> {
    let mut negatives = Vec::new();
    for input in &configuration.negative_inputs {
        match registry.resolve(input) {
            Ok(batch) => negatives.extend(batch),
            Err(SourceError::Unavailable { source_label: source, message })
                if configuration.allow_unavailable =>
            {
                tracing::warn!(%source, %message, "skipping unavailable negative source");
            }
            Err(error) => return Err(error.into()),
        }
    }
    Ok(negatives)
}

fn prefilter(
    configuration: &Configuration,
    mappings: Vec<Mapping>,
    negatives: &[Mapping],
) -> Vec<Mapping> {
    let before = mappings.len();
    let mut mappings = filter_self_mappings(deduplicate(mappings));
    if !configuration.keep_prefixes.is_empty() || !configuration.remove_prefixes.is_empty() {
        let mut filter = PrefixFilter::new().remove(configuration.remove_prefixes.clone());
        if !configuration.keep_prefixes.is_empty() {
            filter = filter.keep(configuration.keep_prefixes.clone());
        }
        mappings = filter_prefixes(mappings, &filter);
    }
    if !negatives.is_empty() {
        mappings = filter_triples(mappings, negatives);
    }
    tracing::info!(before, after = mappings.len(), "pre-filtered raw collection");
    mappings
}

fn postfilter(
    configuration: &Configuration,
    mappings: Vec<Mapping>,
    negatives: &[Mapping],
) -> Vec<Mapping> {
    let before = mappings.len();
    let mut mappings = mappings;
    if !negatives.is_empty() {
        mappings = filter_triples(mappings, negatives);
    }
    if !configuration.post_keep_prefixes.is_empty()
        || !configuration.post_remove_prefixes.is_empty()
    {
        let mut filter = PrefixFilter::new().remove(configuration.post_remove_prefixes.clone());
        if !configuration.post_keep_prefixes.is_empty() {
            filter = filter.keep(configuration.post_keep_prefixes.clone());
        }
        mappings = filter_prefixes(mappings, &filter);
    }
    if configuration.remove_imprecise {
        mappings = remove_predicates(mappings, IMPRECISE.as_slice());
    }
    if let Some(min_confidence) = configuration.min_confidence {
        mappings = filter_min_confidence(mappings, min_confidence);
    }
    mappings = filter_self_mappings(mappings);
    tracing::info!(before, after = mappings.len(), "post-filtered processed collection");
    mappings
}

fn write_raw(outputs: &OutputPaths, raw: &[Mapping]) -> Result<()> {
    if let Some(path) = &outputs.raw_path {
        cache::write_cache(raw, path)?;
    }
    if let Some(path) = &outputs.raw_sssom_path {
        sssom::write_sssom(raw, path)?;
    }
    Ok(())
}

fn write_processed(outputs: &OutputPaths, processed: &[Mapping]) -> Result<()> {
    if let Some(path) = &outputs.processed_path {
        archive::write_archive(processed, path)?;
    }
    if let Some(path) = &outputs.processed_sssom_path {
        sssom::write_sssom(processed, path)?;
    }
    if let Some(path) = &outputs.neo4j_path {
        neo4j::write_neo4j(processed, path)?;
    }
    Ok(())
}

fn write_priority(outputs: &OutputPaths, priority: &[Mapping]) -> Result<()> {
    if let Some(path) = &outputs.priority_path {
        archive::write_archive(priority, path)?;
    }
    if let Some(path) = &outputs.priority_sssom_path {
        sssom::write_sssom(priority, path)?;
    }
    Ok(())
}
