//! The line-delimited JSON archive format.
//!
//! One JSON object per line: a header, then one object per mapping
//! carrying the full evidence set. Reasoned-evidence parents are written
//! as `{"ref": <digest>}` when the parent mapping was already emitted
//! earlier in the stream, else as
//! `{"inline": {subject, predicate, object, digest}}` when the writer
//! can see the parent's triple, falling back to a bare reference for
//! parents that were filtered out of the collection. A reader can
//! therefore restart from any prefix of the stream and still resolve
//! every digest it has seen.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use mapforge_core::ops::deduplicate;
use mapforge_core::{Digest, Evidence, Mapping, ReasonedEvidence, Reference, SimpleEvidence};

use crate::IoError;

const FORMAT: &str = "mapforge-archive/1";

#[derive(Serialize, Deserialize)]
struct Header {
    format: String,
    written_at: String,
    mappings: usize,
}

#[derive(Serialize, Deserialize)]
struct ArchiveMapping {
    subject: Reference,
    predicate: Reference,
    object: Reference,
    evidence: Vec<ArchiveEvidence>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ArchiveEvidence {
    Simple(SimpleEvidence),
    Reasoned {
        justification: Reference,
        confidence: f64,
        parents: Vec<ArchiveParent>,
    },
}

#[derive(Serialize, Deserialize)]
enum ArchiveParent {
    #[serde(rename = "ref")]
    Ref(Digest),
    #[serde(rename = "inline")]
    Inline(InlineParent),
}

#[derive(Serialize, Deserialize)]
struct InlineParent {
    subject: Reference,
    predicate: Reference,
    object: Reference,
    digest: Digest,
}

/// Write a collection as a line-delimited JSON archive.
pub fn write_archive(mappings: &[Mapping], path: &Path) -> Result<(), IoError> {
    let mut writer = BufWriter::new(File::create(path)?);
    let header = Header {
        format: FORMAT.to_string(),
        written_at: Utc::now().to_rfc3339(),
        mappings: mappings.len(),
    };
    serde_json::to_writer(&mut writer, &header)?;
    writeln!(writer)?;

    let by_digest: AHashMap<Digest, &Mapping> =
        mappings.iter().map(|m| (m.digest(), m)).collect();
    let mut emitted: AHashSet<Digest> = AHashSet::with_capacity(mappings.len());

    for mapping in mappings {
        let evidence = mapping
            .evidence
            .iter()
            .map(|evidence| match evidence {
                Evidence::Simple(simple) => ArchiveEvidence::Simple(simple.clone()),
                Evidence::Reasoned(reasoned) => ArchiveEvidence::Reasoned {
                    justification: reasoned.justification.clone(),
                    confidence: reasoned.confidence,
                    parents: reasoned
                        .parents
                        .iter()
                        .map(|&parent| {
                            if emitted.contains(&parent) {
                                return ArchiveParent::Ref(parent);
                            }
                            match by_digest.get(&parent) {
                                Some(known) => ArchiveParent::Inline(InlineParent {
                                    subject: known.subject.clone(),
                                    predicate: known.predicate.clone(),
                                    object: known.object.clone(),
                                    digest: parent,
                                }),
                                // The parent was filtered away; its digest
                                // is still a valid stable identifier.
                                None => ArchiveParent::Ref(parent),
                            }
                        })
                        .collect(),
                },
            })
            .collect();
        let record = ArchiveMapping {
            subject: mapping.subject.clone(),
            predicate: mapping.predicate.clone(),
            object: mapping.object.clone(),
            evidence,
        };
        serde_json::to_writer(&mut writer, &record)?;
        writeln!(writer)?;
        emitted.insert(mapping.digest());
    }
    writer.flush()?;
    Ok(())
}

/// Read a line-delimited JSON archive, deduplicating by triple.
pub fn read_archive(path: &Path) -> Result<Vec<Mapping>, IoError> {
    let reader = BufReader::new(File::open(path)?);
    let display_path = path.display().to_string();
    let mut lines = reader.lines().enumerate();

    let Some((_, header_line)) = lines.next() else {
        return Ok(Vec::new());
    };
    let header: Header = serde_json::from_str(&header_line?)?;
    if header.format != FORMAT {
        return Err(IoError::Malformed {
            path: display_path,
            line: 1,
            message: format!("unsupported archive format {:?}", header.format),
        });
    }

    let mut mappings = Vec::with_capacity(header.mappings);
    for (index, line) in lines {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let record: ArchiveMapping =
            serde_json::from_str(&line).map_err(|error| IoError::Malformed {
                path: display_path.clone(),
                line: index + 1,
                message: error.to_string(),
            })?;
        let evidence = record
            .evidence
            .into_iter()
            .map(|evidence| match evidence {
                ArchiveEvidence::Simple(simple) => Evidence::Simple(simple),
                ArchiveEvidence::Reasoned {
                    justification,
                    confidence,
                    parents,
                } => Evidence::Reasoned(ReasonedEvidence::new(
                    justification,
                    confidence,
                    parents
                        .into_iter()
                        .map(|parent| match parent {
                            ArchiveParent::Ref(digest) => digest,
                            ArchiveParent::Inline(inline) => inline.digest,
                        })
                        .collect(),
                )),
            })
            .collect();
        mappings.push(Mapping::new(
            record.subject,
            record.predicate,
            record.object,
            evidence,
        ));
    }
    Ok(deduplicate(mappings))
}
