//! The tabular mapping interchange format.
//!
//! One TSV row per `(triple, evidence)` pair: a mapping with three
//! evidences exports as three rows sharing their first three columns.
//! Readers deduplicate by triple on load, re-unioning the evidence.
//!
//! Reasoned evidence exports its justification and derived confidence;
//! parent digests do not fit the tabular model and are only carried by
//! the archive format.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use mapforge_core::ops::deduplicate;
use mapforge_core::vocabulary::UNSPECIFIED_MAPPING;
use mapforge_core::{Evidence, Mapping, MappingSetRef, Reference, SimpleEvidence};

use crate::{IngestMode, IoError};

const COLUMNS: [&str; 10] = [
    "subject_id",
    "predicate_id",
    "object_id",
    "mapping_justification",
    "confidence",
    "author_id",
    "mapping_set",
    "mapping_set_version",
    "mapping_set_license",
    "mapping_set_confidence",
];

/// Write a collection as TSV, one row per evidence, in collection order.
pub fn write_sssom(mappings: &[Mapping], path: &Path) -> Result<(), IoError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", COLUMNS.join("\t"))?;
    for mapping in mappings {
        for evidence in &mapping.evidence {
            let row = match evidence {
                Evidence::Simple(simple) => {
                    let set = simple.mapping_set.as_ref();
                    [
                        mapping.subject.curie(),
                        mapping.predicate.curie(),
                        mapping.object.curie(),
                        simple.justification.curie(),
                        format_float(Some(simple.confidence)),
                        simple
                            .author
                            .as_ref()
                            .map(Reference::curie)
                            .unwrap_or_default(),
                        set.map(|s| s.name.clone()).unwrap_or_default(),
                        set.and_then(|s| s.version.clone()).unwrap_or_default(),
                        set.and_then(|s| s.license.clone()).unwrap_or_default(),
                        format_float(set.and_then(|s| s.confidence)),
                    ]
                }
                Evidence::Reasoned(reasoned) => [
                    mapping.subject.curie(),
                    mapping.predicate.curie(),
                    mapping.object.curie(),
                    reasoned.justification.curie(),
                    format_float(Some(reasoned.confidence)),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                ],
            };
            writeln!(writer, "{}", row.join("\t"))?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Read a TSV mapping file, deduplicating by triple.
///
/// In [`IngestMode::Lenient`] malformed rows are skipped with a logged
/// warning; in [`IngestMode::Strict`] the first malformed row fails the
/// read. Rows without a justification get
/// `semapv:UnspecifiedMatchingProcess`; rows without a confidence get
/// `1.0`.
pub fn read_sssom(path: &Path, mode: IngestMode) -> Result<Vec<Mapping>, IoError> {
    let reader = BufReader::new(File::open(path)?);
    let display_path = path.display().to_string();
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Ok(Vec::new()),
    };
    let columns: Vec<&str> = header.split('\t').collect();
    let position = |name: &str| columns.iter().position(|&column| column == name);
    let (Some(subject_at), Some(predicate_at), Some(object_at)) = (
        position("subject_id"),
        position("predicate_id"),
        position("object_id"),
    ) else {
        return Err(IoError::Malformed {
            path: display_path,
            line: 1,
            message: "missing subject_id/predicate_id/object_id columns".to_string(),
        });
    };
    let justification_at = position("mapping_justification");
    let confidence_at = position("confidence");
    let author_at = position("author_id");
    let set_at = position("mapping_set");
    let set_version_at = position("mapping_set_version");
    let set_license_at = position("mapping_set_license");
    let set_confidence_at = position("mapping_set_confidence");

    let mut mappings = Vec::new();
    let mut skipped = 0usize;
    for (index, line) in lines.enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let line_number = index + 2;
        let fields: Vec<&str> = line.split('\t').collect();
        let cell = |at: Option<usize>| at.and_then(|at| fields.get(at)).copied().unwrap_or("");

        let parsed = parse_row(
            cell(Some(subject_at)),
            cell(Some(predicate_at)),
            cell(Some(object_at)),
            cell(justification_at),
            cell(confidence_at),
            cell(author_at),
            cell(set_at),
            cell(set_version_at),
            cell(set_license_at),
            cell(set_confidence_at),
        );
        match parsed {
            Ok(mapping) => mappings.push(mapping),
            Err(message) => match mode {
                IngestMode::Strict => {
                    return Err(IoError::Malformed {
                        path: display_path,
                        line: line_number,
                        message,
                    })
                }
                IngestMode::Lenient => {
                    skipped += 1;
                    tracing::warn!(path = %display_path, line = line_number, %message, "skipping malformed row");
                }
            },
        }
    }
    if skipped > 0 {
        tracing::warn!(path = %display_path, skipped, "lenient ingest skipped rows");
    }
    Ok(deduplicate(mappings))
}

#[allow(clippy::too_many_arguments)]
fn parse_row(
    subject: &str,
    predicate: &str,
    object: &str,
    justification: &str,
    confidence: &str,
    author: &str,
    set: &str,
    set_version: &str,
    set_license: &str,
    set_confidence: &str,
) -> Result<Mapping, String> {
    let subject = Reference::from_curie(subject).map_err(|e| e.to_string())?;
    let predicate = Reference::from_curie(predicate).map_err(|e| e.to_string())?;
    let object = Reference::from_curie(object).map_err(|e| e.to_string())?;
    if subject == object {
        return Err(format!("self-mapping on {subject}"));
    }

    let justification = if justification.is_empty() {
        UNSPECIFIED_MAPPING.clone()
    } else {
        Reference::from_curie(justification).map_err(|e| e.to_string())?
    };
    let confidence = parse_float(confidence)?.unwrap_or(1.0);

    let mut evidence = SimpleEvidence::new(justification, confidence);
    if !author.is_empty() {
        evidence = evidence.with_author(Reference::from_curie(author).map_err(|e| e.to_string())?);
    }
    if !set.is_empty() {
        let mut mapping_set = MappingSetRef::new(set);
        if !set_version.is_empty() {
            mapping_set.version = Some(set_version.to_string());
        }
        if !set_license.is_empty() {
            mapping_set.license = Some(set_license.to_string());
        }
        mapping_set.confidence = parse_float(set_confidence)?;
        evidence = evidence.with_mapping_set(mapping_set);
    }

    Ok(Mapping::new(subject, predicate, object, vec![evidence.into()]))
}

fn parse_float(field: &str) -> Result<Option<f64>, String> {
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse::<f64>()
        .map(Some)
        .map_err(|_| format!("bad confidence {field:?}"))
}

fn format_float(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value}"),
        None => String::new(),
    }
}
