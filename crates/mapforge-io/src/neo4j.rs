//! Labeled-property-graph export.
//!
//! Produces bulk-import tables for a graph database: four node tables
//! (concepts, mappings, evidences, mapping sets) and two edge tables
//! (the mapping triples themselves, and the provenance links from
//! mappings to evidences and onward to mapping sets, authors, and
//! parent mappings). Every record has a stable identifier: hash-derived
//! for mappings and evidences, natural for concepts and sets.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;

use mapforge_core::{Digest, Evidence, Mapping, MappingSetRef, Reference};

use crate::IoError;

const CONCEPTS_FILE: &str = "concepts.tsv";
const MAPPINGS_FILE: &str = "mappings.tsv";
const EVIDENCES_FILE: &str = "evidences.tsv";
const MAPPING_SETS_FILE: &str = "mapping_sets.tsv";
const MAPPING_EDGES_FILE: &str = "mapping_edges.tsv";
const PROVENANCE_EDGES_FILE: &str = "provenance_edges.tsv";

/// Export a collection as graph bulk-import tables under `directory`.
pub fn write_neo4j(mappings: &[Mapping], directory: &Path) -> Result<(), IoError> {
    fs::create_dir_all(directory)?;

    // Natural-keyed nodes, deduplicated and sorted for stable output.
    let mut concepts: AHashMap<String, &Reference> = AHashMap::new();
    let mut sets: AHashMap<&str, &MappingSetRef> = AHashMap::new();
    let mut evidences: AHashMap<Digest, &Evidence> = AHashMap::new();
    for mapping in mappings {
        concepts
            .entry(mapping.subject.curie())
            .or_insert(&mapping.subject);
        concepts
            .entry(mapping.object.curie())
            .or_insert(&mapping.object);
        for evidence in &mapping.evidence {
            evidences.entry(evidence.digest()).or_insert(evidence);
            if let Evidence::Simple(simple) = evidence {
                if let Some(author) = &simple.author {
                    concepts.entry(author.curie()).or_insert(author);
                }
                if let Some(set) = &simple.mapping_set {
                    sets.entry(set.name.as_str()).or_insert(set);
                }
            }
        }
    }

    let mut concept_writer = table(directory, CONCEPTS_FILE, "curie:ID\tprefix\tidentifier\tname")?;
    let mut sorted_concepts: Vec<_> = concepts.into_iter().collect();
    sorted_concepts.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (curie, reference) in sorted_concepts {
        writeln!(
            concept_writer,
            "{curie}\t{}\t{}\t{}",
            reference.prefix,
            reference.identifier,
            reference.name.as_deref().unwrap_or_default(),
        )?;
    }
    concept_writer.flush()?;

    let mut set_writer = table(directory, MAPPING_SETS_FILE, "name:ID\tversion\tlicense\tconfidence")?;
    let mut sorted_sets: Vec<_> = sets.into_iter().collect();
    sorted_sets.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (name, set) in sorted_sets {
        writeln!(
            set_writer,
            "{name}\t{}\t{}\t{}",
            set.version.as_deref().unwrap_or_default(),
            set.license.as_deref().unwrap_or_default(),
            set.confidence.map(|c| c.to_string()).unwrap_or_default(),
        )?;
    }
    set_writer.flush()?;

    let mut evidence_writer = table(
        directory,
        EVIDENCES_FILE,
        "digest:ID\tkind\tjustification\tconfidence",
    )?;
    let mut sorted_evidences: Vec<_> = evidences.iter().collect();
    sorted_evidences.sort_by_key(|(digest, _)| **digest);
    for (digest, evidence) in &sorted_evidences {
        let kind = match evidence {
            Evidence::Simple(_) => "simple",
            Evidence::Reasoned(_) => "reasoned",
        };
        writeln!(
            evidence_writer,
            "{digest}\t{kind}\t{}\t{}",
            evidence.justification().curie(),
            evidence.confidence(),
        )?;
    }
    evidence_writer.flush()?;

    let mut mapping_writer = table(
        directory,
        MAPPINGS_FILE,
        "digest:ID\tsubject\tpredicate\tobject\tconfidence",
    )?;
    let mut mapping_edges = table(
        directory,
        MAPPING_EDGES_FILE,
        ":START_ID\t:END_ID\t:TYPE\tmapping",
    )?;
    let mut provenance_edges = table(directory, PROVENANCE_EDGES_FILE, ":START_ID\t:END_ID\t:TYPE")?;
    for mapping in mappings {
        let digest = mapping.digest();
        writeln!(
            mapping_writer,
            "{digest}\t{}\t{}\t{}\t{}",
            mapping.subject.curie(),
            mapping.predicate.curie(),
            mapping.object.curie(),
            mapping.confidence(),
        )?;
        writeln!(
            mapping_edges,
            "{}\t{}\t{}\t{digest}",
            mapping.subject.curie(),
            mapping.object.curie(),
            mapping.predicate.curie(),
        )?;
        for evidence in &mapping.evidence {
            let evidence_digest = evidence.digest();
            writeln!(provenance_edges, "{digest}\t{evidence_digest}\tHAS_EVIDENCE")?;
            match evidence {
                Evidence::Simple(simple) => {
                    if let Some(author) = &simple.author {
                        writeln!(
                            provenance_edges,
                            "{evidence_digest}\t{}\tHAS_AUTHOR",
                            author.curie()
                        )?;
                    }
                    if let Some(set) = &simple.mapping_set {
                        writeln!(provenance_edges, "{evidence_digest}\t{}\tFROM_SET", set.name)?;
                    }
                }
                Evidence::Reasoned(reasoned) => {
                    for parent in &reasoned.parents {
                        writeln!(provenance_edges, "{evidence_digest}\t{parent}\tDERIVED_FROM")?;
                    }
                }
            }
        }
    }
    mapping_writer.flush()?;
    mapping_edges.flush()?;
    provenance_edges.flush()?;

    tracing::info!(
        directory = %directory.display(),
        mappings = mappings.len(),
        "wrote property-graph export"
    );
    Ok(())
}

fn table(directory: &Path, file: &str, header: &str) -> Result<BufWriter<File>, IoError> {
    let mut writer = BufWriter::new(File::create(directory.join(file))?);
    writeln!(writer, "{header}")?;
    Ok(writer)
}
