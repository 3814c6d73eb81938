//! Interchange formats and source adapters for mapping collections.
//!
//! The assembly core never performs I/O; this crate supplies its
//! edges:
//!
//! - `sssom`: the tabular interchange format (TSV, one row per
//!   triple/evidence pair)
//! - `archive`: a line-delimited JSON archive carrying full evidence
//!   graphs, streamable and restartable
//! - `neo4j`: labeled-property-graph export as bulk-import tables
//! - `cache`: a binary artifact for fast pipeline re-runs
//! - the [`SourceAdapter`] contract through which pipelines acquire raw
//!   mappings from arbitrary providers

pub mod archive;
pub mod cache;
pub mod neo4j;
pub mod sssom;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mapforge_core::{Evidence, Mapping, MappingSetRef};

/// Errors from reading or writing mapping artifacts.
#[derive(Debug, Error)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("cache artifact error: {0}")]
    Cache(#[from] bincode::Error),

    #[error("{path}:{line}: {message}")]
    Malformed {
        path: String,
        line: usize,
        message: String,
    },
}

/// How readers treat rows they cannot parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Fail on the first malformed row.
    #[default]
    Strict,
    /// Skip malformed rows with a logged warning.
    Lenient,
}

/// Errors raised by source adapters.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transient failure; the pipeline may continue without this source
    /// when configured to.
    #[error("source {source_label} unavailable: {message}")]
    Unavailable { source_label: String, message: String },

    /// The source produced ill-formed data; always fatal.
    #[error("source {source_label} malformed: {message}")]
    Malformed { source_label: String, message: String },
}

/// Describes one input to a mapping assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Which adapter resolves this input.
    pub source_kind: String,
    /// The vocabulary the source primarily covers, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Source-level confidence in `[0, 1]`, applied as the mapping-set
    /// confidence of every evidence the adapter produces.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Adapter-specific settings (paths, subset roots, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, serde_json::Value>,
}

fn default_confidence() -> f64 {
    1.0
}

impl SourceDescriptor {
    pub fn new(source_kind: impl Into<String>) -> Self {
        Self {
            source_kind: source_kind.into(),
            prefix: None,
            confidence: 1.0,
            extras: BTreeMap::new(),
        }
    }

    /// A short human-readable identifier for logs and errors.
    pub fn label(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", self.source_kind, prefix),
            None => self.source_kind.clone(),
        }
    }

    /// The `path` extra, when present.
    pub fn path_extra(&self) -> Option<&str> {
        self.extras.get("path").and_then(|value| value.as_str())
    }
}

/// A provider of raw mappings.
///
/// Adapters perform all their I/O inside [`resolve`](Self::resolve) and
/// hand back a fully materialized collection; the assembly core never
/// suspends on external input. Every produced mapping must carry at
/// least one simple evidence with a mapping-set handle; adapters built
/// on raw files can delegate that guarantee to
/// [`apply_source_provenance`].
pub trait SourceAdapter: Send + Sync {
    fn resolve(&self, descriptor: &SourceDescriptor) -> Result<Vec<Mapping>, SourceError>;
}

/// Stamp source-level provenance onto freshly read mappings.
///
/// Simple evidences without a mapping set get one named after the
/// descriptor; mapping sets without a set-level confidence inherit the
/// descriptor's. The set-level confidence cascades into every
/// evidence's effective confidence downstream.
pub fn apply_source_provenance(mut mappings: Vec<Mapping>, descriptor: &SourceDescriptor) -> Vec<Mapping> {
    for mapping in &mut mappings {
        for evidence in &mut mapping.evidence {
            if let Evidence::Simple(simple) = evidence {
                let set = simple
                    .mapping_set
                    .get_or_insert_with(|| MappingSetRef::new(descriptor.label()));
                if set.confidence.is_none() {
                    set.confidence = Some(descriptor.confidence);
                }
            }
        }
    }
    mappings
}

/// Adapter lookup by `source_kind`.
pub struct AdapterRegistry {
    adapters: ahash::AHashMap<String, Box<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: ahash::AHashMap::new(),
        }
    }

    /// A registry with the built-in file adapters (`sssom`, `archive`),
    /// resolving relative paths against `data_root`.
    pub fn with_builtins(data_root: impl Into<PathBuf>) -> Self {
        Self::with_builtins_mode(data_root, IngestMode::Lenient)
    }

    /// [`Self::with_builtins`] with an explicit ingest mode for the
    /// tabular adapter.
    pub fn with_builtins_mode(data_root: impl Into<PathBuf>, mode: IngestMode) -> Self {
        let data_root = data_root.into();
        let mut registry = Self::empty();
        registry.register("sssom", SssomFileAdapter::with_mode(data_root.clone(), mode));
        registry.register("archive", ArchiveFileAdapter::new(data_root));
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, adapter: impl SourceAdapter + 'static) {
        self.adapters.insert(kind.into(), Box::new(adapter));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.adapters.contains_key(kind)
    }

    /// Resolve one descriptor through its registered adapter.
    pub fn resolve(&self, descriptor: &SourceDescriptor) -> Result<Vec<Mapping>, SourceError> {
        let adapter =
            self.adapters
                .get(&descriptor.source_kind)
                .ok_or_else(|| SourceError::Unavailable {
                    source_label: descriptor.label(),
                    message: format!("no adapter registered for {:?}", descriptor.source_kind),
                })?;
        adapter.resolve(descriptor)
    }
}

fn descriptor_file(
    data_root: &Path,
    descriptor: &SourceDescriptor,
) -> Result<PathBuf, SourceError> {
    let path = descriptor
        .path_extra()
        .ok_or_else(|| SourceError::Malformed {
            source_label: descriptor.label(),
            message: "missing `path` extra".to_string(),
        })?;
    let path = Path::new(path);
    Ok(if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_root.join(path)
    })
}

/// Reads tabular mapping files.
pub struct SssomFileAdapter {
    data_root: PathBuf,
    mode: IngestMode,
}

impl SssomFileAdapter {
    pub fn new(data_root: PathBuf) -> Self {
        Self::with_mode(data_root, IngestMode::Lenient)
    }

    pub fn with_mode(data_root: PathBuf, mode: IngestMode) -> Self {
        Self { data_root, mode }
    }
}

impl SourceAdapter for SssomFileAdapter {
    fn resolve(&self, descriptor: &SourceDescriptor) -> Result<Vec<Mapping>, SourceError> {
        let path = descriptor_file(&self.data_root, descriptor)?;
        let mappings = sssom::read_sssom(&path, self.mode).map_err(|error| match error {
            IoError::Io(io) => SourceError::Unavailable {
                source_label: descriptor.label(),
                message: io.to_string(),
            },
            other => SourceError::Malformed {
                source_label: descriptor.label(),
                message: other.to_string(),
            },
        })?;
        Ok(apply_source_provenance(mappings, descriptor))
    }
}

/// Reads line-delimited JSON archives.
pub struct ArchiveFileAdapter {
    data_root: PathBuf,
}

impl ArchiveFileAdapter {
    pub fn new(data_root: PathBuf) -> Self {
        Self { data_root }
    }
}

impl SourceAdapter for ArchiveFileAdapter {
    fn resolve(&self, descriptor: &SourceDescriptor) -> Result<Vec<Mapping>, SourceError> {
        let path = descriptor_file(&self.data_root, descriptor)?;
        let mappings = archive::read_archive(&path).map_err(|error| match error {
            IoError::Io(io) => SourceError::Unavailable {
                source_label: descriptor.label(),
                message: io.to_string(),
            },
            other => SourceError::Malformed {
                source_label: descriptor.label(),
                message: other.to_string(),
            },
        })?;
        Ok(apply_source_provenance(mappings, descriptor))
    }
}
