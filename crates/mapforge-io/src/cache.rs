//! Binary cache artifacts for fast pipeline re-runs.
//!
//! The raw mapping collection can take minutes to acquire from source
//! adapters; caching it lets downstream stages re-run without repeating
//! that work. The cache is an internal artifact: it carries a version
//! stamp and is not expected to survive schema changes.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use mapforge_core::Mapping;

use crate::IoError;

const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    mappings: Vec<Mapping>,
}

/// Write a collection as a binary cache artifact.
pub fn write_cache(mappings: &[Mapping], path: &Path) -> Result<(), IoError> {
    let writer = BufWriter::new(File::create(path)?);
    let file = CacheFile {
        version: CACHE_VERSION,
        mappings: mappings.to_vec(),
    };
    bincode::serialize_into(writer, &file)?;
    Ok(())
}

/// Read a binary cache artifact.
pub fn read_cache(path: &Path) -> Result<Vec<Mapping>, IoError> {
    let reader = BufReader::new(File::open(path)?);
    let file: CacheFile = bincode::deserialize_from(reader)?;
    if file.version != CACHE_VERSION {
        return Err(IoError::Malformed {
            path: path.display().to_string(),
            line: 0,
            message: format!("unsupported cache version {}", file.version),
        });
    }
    Ok(file.mappings)
}
