//! Round trips through the interchange, archive, and cache formats.

use std::fs;

use tempfile::tempdir;

use mapforge_core::ops::deduplicate;
use mapforge_core::vocabulary::{
    CHAIN_MAPPING, EXACT_MATCH, LEXICAL_MAPPING, MANUAL_MAPPING, NARROW_MATCH,
};
use mapforge_core::{Mapping, MappingSetRef, ReasonedEvidence, Reference, SimpleEvidence};
use mapforge_io::{archive, cache, neo4j, sssom, IngestMode, IoError};

fn simple(s: &str, o: &str, confidence: f64) -> Mapping {
    Mapping::new(
        Reference::from_curie(s).unwrap(),
        EXACT_MATCH.clone(),
        Reference::from_curie(o).unwrap(),
        vec![SimpleEvidence::new(MANUAL_MAPPING.clone(), confidence)
            .with_author(Reference::from_curie("orcid:0000-0003-4423-4370").unwrap())
            .with_mapping_set(MappingSetRef::new("test_set").with_confidence(0.9))
            .into()],
    )
}

fn evidence_digests(mapping: &Mapping) -> Vec<String> {
    let mut out: Vec<String> = mapping
        .evidence
        .iter()
        .map(|evidence| evidence.digest().to_hex())
        .collect();
    out.sort();
    out
}

fn assert_same_collection(left: &[Mapping], right: &[Mapping]) {
    let key = |m: &Mapping| (m.digest(), evidence_digests(m));
    let mut left: Vec<_> = left.iter().map(key).collect();
    let mut right: Vec<_> = right.iter().map(key).collect();
    left.sort();
    right.sort();
    assert_eq!(left, right);
}

#[test]
fn sssom_round_trip_preserves_simple_evidence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mappings.tsv");

    let mut narrow = simple("mesh:D000077143", "chebi:4672", 0.8);
    narrow.predicate = NARROW_MATCH.clone();
    let mappings = deduplicate(vec![
        simple("chebi:1234", "mesh:C067604", 1.0),
        narrow,
        // Two evidences on one triple export as two rows.
        Mapping::new(
            Reference::from_curie("chebi:1234").unwrap(),
            EXACT_MATCH.clone(),
            Reference::from_curie("mesh:C067604").unwrap(),
            vec![SimpleEvidence::new(LEXICAL_MAPPING.clone(), 0.5).into()],
        ),
    ]);

    sssom::write_sssom(&mappings, &path).unwrap();
    let read_back = sssom::read_sssom(&path, IngestMode::Strict).unwrap();
    assert_same_collection(&mappings, &read_back);
}

#[test]
fn sssom_reader_deduplicates_rows_by_triple() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mappings.tsv");
    fs::write(
        &path,
        "subject_id\tpredicate_id\tobject_id\tmapping_justification\tconfidence\n\
         a:1\tskos:exactMatch\tb:1\tsemapv:ManualMappingCuration\t1\n\
         a:1\tskos:exactMatch\tb:1\tsemapv:LexicalMatchingProcess\t0.5\n",
    )
    .unwrap();
    let mappings = sssom::read_sssom(&path, IngestMode::Strict).unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].evidence.len(), 2);
}

#[test]
fn strict_mode_rejects_malformed_rows_lenient_skips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mappings.tsv");
    fs::write(
        &path,
        "subject_id\tpredicate_id\tobject_id\tmapping_justification\n\
         a:1\tskos:exactMatch\tb:1\tsemapv:ManualMappingCuration\n\
         not a curie\tskos:exactMatch\tb:2\tsemapv:ManualMappingCuration\n",
    )
    .unwrap();

    assert!(matches!(
        sssom::read_sssom(&path, IngestMode::Strict),
        Err(IoError::Malformed { line: 3, .. })
    ));

    let lenient = sssom::read_sssom(&path, IngestMode::Lenient).unwrap();
    assert_eq!(lenient.len(), 1);
}

#[test]
fn archive_round_trip_preserves_reasoned_evidence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mappings.jsonl");

    let parent_a = simple("a:1", "b:1", 1.0);
    let parent_b = simple("b:1", "c:1", 0.7);
    let chained = Mapping::new(
        Reference::from_curie("a:1").unwrap(),
        EXACT_MATCH.clone(),
        Reference::from_curie("c:1").unwrap(),
        vec![ReasonedEvidence::new(
            CHAIN_MAPPING.clone(),
            0.7,
            vec![parent_a.digest(), parent_b.digest()],
        )
        .into()],
    );
    let mappings = vec![parent_a, parent_b, chained];

    archive::write_archive(&mappings, &path).unwrap();
    let read_back = archive::read_archive(&path).unwrap();
    assert_same_collection(&mappings, &read_back);

    // Parents emitted earlier in the stream are written as refs, not inline.
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"ref\""));
    assert!(!text.contains("\"inline\""));
}

#[test]
fn archive_inlines_parents_that_appear_later_in_the_stream() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mappings.jsonl");

    let parent = simple("a:1", "b:1", 1.0);
    let derived = Mapping::new(
        Reference::from_curie("b:1").unwrap(),
        EXACT_MATCH.clone(),
        Reference::from_curie("a:1").unwrap(),
        vec![ReasonedEvidence::new(CHAIN_MAPPING.clone(), 1.0, vec![parent.digest()]).into()],
    );
    // Derived first: its parent has not been emitted yet.
    let mappings = vec![derived, parent];

    archive::write_archive(&mappings, &path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"inline\""));

    let read_back = archive::read_archive(&path).unwrap();
    assert_same_collection(&mappings, &read_back);
}

#[test]
fn archive_rejects_unknown_formats() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mappings.jsonl");
    fs::write(
        &path,
        "{\"format\":\"something-else/9\",\"written_at\":\"\",\"mappings\":0}\n",
    )
    .unwrap();
    assert!(matches!(
        archive::read_archive(&path),
        Err(IoError::Malformed { line: 1, .. })
    ));
}

#[test]
fn cache_round_trip_is_exact() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("raw.cache");
    let mappings = vec![simple("a:1", "b:1", 1.0), simple("a:2", "b:2", 0.4)];
    cache::write_cache(&mappings, &path).unwrap();
    let read_back = cache::read_cache(&path).unwrap();
    assert_eq!(mappings, read_back);
}

#[test]
fn neo4j_export_writes_all_tables() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("neo4j");

    let parent = simple("a:1", "b:1", 1.0);
    let derived = Mapping::new(
        Reference::from_curie("b:1").unwrap(),
        EXACT_MATCH.clone(),
        Reference::from_curie("a:1").unwrap(),
        vec![ReasonedEvidence::new(CHAIN_MAPPING.clone(), 1.0, vec![parent.digest()]).into()],
    );
    neo4j::write_neo4j(&[parent, derived], &out).unwrap();

    let lines = |file: &str| -> Vec<String> {
        fs::read_to_string(out.join(file))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    };

    let concepts = lines("concepts.tsv");
    assert!(concepts[0].starts_with("curie:ID"));
    // a:1, b:1, and the author concept.
    assert_eq!(concepts.len(), 4);

    assert_eq!(lines("mappings.tsv").len(), 3);
    assert_eq!(lines("evidences.tsv").len(), 3);
    assert_eq!(lines("mapping_sets.tsv").len(), 2);
    assert_eq!(lines("mapping_edges.tsv").len(), 3);

    let provenance = lines("provenance_edges.tsv");
    assert!(provenance.iter().any(|row| row.ends_with("HAS_EVIDENCE")));
    assert!(provenance.iter().any(|row| row.ends_with("HAS_AUTHOR")));
    assert!(provenance.iter().any(|row| row.ends_with("FROM_SET")));
    assert!(provenance.iter().any(|row| row.ends_with("DERIVED_FROM")));
}
