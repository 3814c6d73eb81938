//! The assembly configuration document.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use mapforge_core::{MutationRule, PredicateTable, Reference};
use mapforge_io::SourceDescriptor;

use crate::{PipelineError, Result};

/// One predicate-mutation rule, in configuration form.
///
/// `old` defaults to `oboinowl:hasDbXref` and `new` to
/// `skos:exactMatch`, which covers the overwhelmingly common case of
/// promoting a resource's cross-references to exact matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Subject prefix the rule applies to.
    pub source: String,
    /// Object prefix the rule applies to; omit to match any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default = "default_old_predicate")]
    pub old: String,
    #[serde(default = "default_new_predicate")]
    pub new: String,
    #[serde(default = "default_mutation_confidence")]
    pub confidence: f64,
}

fn default_old_predicate() -> String {
    "oboinowl:hasDbXref".to_string()
}

fn default_new_predicate() -> String {
    "skos:exactMatch".to_string()
}

fn default_mutation_confidence() -> f64 {
    1.0
}

impl MutationConfig {
    pub(crate) fn to_rule(&self) -> Result<MutationRule> {
        let parse = |curie: &str| {
            Reference::from_curie(curie)
                .map_err(|error| PipelineError::InvalidConfiguration(error.to_string()))
        };
        Ok(MutationRule {
            source_prefix: self.source.clone(),
            target_prefix: self.target.clone(),
            old: parse(&self.old)?,
            new: parse(&self.new)?,
            confidence: self.confidence,
        })
    }
}

/// Where a pipeline materializes its artifacts.
///
/// Relative paths resolve against the caller-supplied data root; paths
/// recorded in shared configuration files are treated as hints rather
/// than taken literally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputPaths {
    /// Binary cache of the raw collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_path: Option<PathBuf>,
    /// Tabular export of the raw collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_sssom_path: Option<PathBuf>,
    /// Archive of the processed (post-inference, post-filter) collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_path: Option<PathBuf>,
    /// Tabular export of the processed collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_sssom_path: Option<PathBuf>,
    /// Archive of the priority (star) collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_path: Option<PathBuf>,
    /// Tabular export of the priority collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_sssom_path: Option<PathBuf>,
    /// Directory for the property-graph export of the processed collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neo4j_path: Option<PathBuf>,
}

impl OutputPaths {
    pub(crate) fn resolved(&self, data_root: &Path) -> OutputPaths {
        let resolve = |path: &Option<PathBuf>| {
            path.as_ref().map(|path| {
                if path.is_absolute() {
                    path.clone()
                } else {
                    data_root.join(path)
                }
            })
        };
        OutputPaths {
            raw_path: resolve(&self.raw_path),
            raw_sssom_path: resolve(&self.raw_sssom_path),
            processed_path: resolve(&self.processed_path),
            processed_sssom_path: resolve(&self.processed_sssom_path),
            priority_path: resolve(&self.priority_path),
            priority_sssom_path: resolve(&self.priority_sssom_path),
            neo4j_path: resolve(&self.neo4j_path),
        }
    }
}

/// A complete, declarative description of one mapping assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,
    /// Identifier used in output paths and logs.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ORCID CURIEs of the people who curated this configuration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creators: Vec<String>,

    pub inputs: Vec<SourceDescriptor>,
    /// Sources of curated negative mappings, removed from the
    /// collection before and after inference.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub negative_inputs: Vec<SourceDescriptor>,

    /// Prefixes in descending priority for canonical-node selection.
    pub priority: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mutations: Vec<MutationConfig>,
    /// Per-prefix subset roots, passed through to source adapters that
    /// can restrict a vocabulary to a sub-hierarchy.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subsets: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keep_prefixes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_prefixes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_keep_prefixes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_remove_prefixes: Vec<String>,

    /// Drop processed mappings below this aggregate confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
    /// Drop imprecise predicates (xrefs, close matches) after inference.
    #[serde(default = "default_true")]
    pub remove_imprecise: bool,
    /// Iteration budget for the inference engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_inference_rounds: Option<usize>,
    /// Continue when a source is unavailable instead of failing.
    #[serde(default)]
    pub allow_unavailable: bool,
    /// Fail on malformed source rows instead of skipping them.
    #[serde(default)]
    pub strict: bool,

    #[serde(flatten)]
    pub outputs: OutputPaths,
}

fn default_true() -> bool {
    true
}

/// Read a configuration from a JSON document.
pub fn load_configuration(path: &Path) -> Result<Configuration> {
    let reader = BufReader::new(File::open(path).map_err(mapforge_io::IoError::from)?);
    Ok(serde_json::from_reader(reader)?)
}

impl Configuration {
    /// Reject unusable configurations before any stage runs.
    pub fn validate(&self, table: &PredicateTable) -> Result<()> {
        let fail = |message: String| Err(PipelineError::InvalidConfiguration(message));

        if self.key.is_empty() || self.key.contains(['/', '\\']) {
            return fail(format!("key {:?} is not usable in output paths", self.key));
        }
        if self.inputs.is_empty() {
            return fail("no inputs declared".to_string());
        }
        if self.priority.is_empty() {
            return fail("empty priority list".to_string());
        }

        if let Some(min_confidence) = self.min_confidence {
            if !(0.0..=1.0).contains(&min_confidence) {
                return fail(format!("min_confidence {min_confidence} outside [0, 1]"));
            }
        }
        for input in self.inputs.iter().chain(&self.negative_inputs) {
            if !(0.0..=1.0).contains(&input.confidence) {
                return fail(format!(
                    "input {} confidence {} outside [0, 1]",
                    input.label(),
                    input.confidence
                ));
            }
        }

        for mutation in &self.mutations {
            if !(0.0..=1.0).contains(&mutation.confidence) {
                return fail(format!(
                    "mutation for {} has confidence {} outside [0, 1]",
                    mutation.source, mutation.confidence
                ));
            }
            let rule = mutation.to_rule()?;
            if !table.contains(&rule.old) || !table.contains(&rule.new) {
                return fail(format!(
                    "mutation {} -> {} uses a predicate missing from the table",
                    rule.old, rule.new
                ));
            }
        }

        // When every input names its vocabulary, prefixes referenced
        // elsewhere must come from one of them. Sources without a
        // declared prefix may cover anything, so the check is skipped.
        let declared: Vec<&str> = self
            .inputs
            .iter()
            .filter_map(|input| input.prefix.as_deref())
            .collect();
        if declared.len() == self.inputs.len() {
            let known: ahash::AHashSet<&str> = declared.into_iter().collect();
            for prefix in self.priority.iter().chain(&self.keep_prefixes) {
                if !known.contains(prefix.as_str()) {
                    return fail(format!("prefix {prefix:?} is not covered by any input"));
                }
            }
            for mutation in &self.mutations {
                if !known.contains(mutation.source.as_str()) {
                    return fail(format!(
                        "mutation source prefix {:?} is not covered by any input",
                        mutation.source
                    ));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn mutation_rules(&self) -> Result<Vec<MutationRule>> {
        self.mutations
            .iter()
            .map(MutationConfig::to_rule)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Configuration {
        serde_json::from_value(serde_json::json!({
            "name": "Test assembly",
            "key": "test",
            "inputs": [
                {"source_kind": "sssom", "prefix": "chebi", "extras": {"path": "chebi.tsv"}},
                {"source_kind": "sssom", "prefix": "mesh", "extras": {"path": "mesh.tsv"}},
            ],
            "priority": ["chebi", "mesh"],
        }))
        .unwrap()
    }

    #[test]
    fn minimal_configuration_validates() {
        let config = minimal();
        assert!(config.validate(&PredicateTable::standard()).is_ok());
        assert!(config.remove_imprecise);
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let mut config = minimal();
        config.inputs.clear();
        assert!(matches!(
            config.validate(&PredicateTable::standard()),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn unknown_mutation_predicates_are_rejected() {
        let mut config = minimal();
        config.mutations.push(MutationConfig {
            source: "chebi".to_string(),
            target: None,
            old: "rdfs:seeAlso".to_string(),
            new: default_new_predicate(),
            confidence: 0.9,
        });
        assert!(matches!(
            config.validate(&PredicateTable::standard()),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn uncovered_priority_prefixes_are_rejected() {
        let mut config = minimal();
        config.priority.push("doid".to_string());
        assert!(matches!(
            config.validate(&PredicateTable::standard()),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn undeclared_input_prefixes_disable_coverage_checks() {
        let mut config = minimal();
        config.inputs[0].prefix = None;
        config.priority.push("doid".to_string());
        assert!(config.validate(&PredicateTable::standard()).is_ok());
    }

    #[test]
    fn mutation_confidence_bounds_are_enforced() {
        let mut config = minimal();
        config.mutations.push(MutationConfig {
            source: "chebi".to_string(),
            target: None,
            old: default_old_predicate(),
            new: default_new_predicate(),
            confidence: 1.5,
        });
        assert!(matches!(
            config.validate(&PredicateTable::standard()),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn output_paths_resolve_against_the_data_root() {
        let outputs = OutputPaths {
            raw_path: Some(PathBuf::from("raw.cache")),
            processed_path: Some(PathBuf::from("/absolute/processed.jsonl")),
            ..Default::default()
        };
        let resolved = outputs.resolved(Path::new("/data/test"));
        assert_eq!(resolved.raw_path.unwrap(), Path::new("/data/test/raw.cache"));
        assert_eq!(
            resolved.processed_path.unwrap(),
            Path::new("/absolute/processed.jsonl")
        );
    }
}
