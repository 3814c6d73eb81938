//! References to entities in controlled vocabularies.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::Error;

/// A reference to an entity in a given identifier space.
///
/// Identity is the `(prefix, identifier)` pair, case-sensitively. The
/// optional `name` is display-only: it takes no part in equality,
/// ordering, hashing, or content digests, so the same entity carries the
/// same identity whether or not a label was available at ingest time.
///
/// References are immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub prefix: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Reference {
    pub fn new(prefix: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            identifier: identifier.into(),
            name: None,
        }
    }

    pub fn named(
        prefix: impl Into<String>,
        identifier: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            identifier: identifier.into(),
            name: Some(name.into()),
        }
    }

    /// Parse a compact URI of the form `prefix:identifier`.
    ///
    /// The string is split at the *first* colon; both sides must be
    /// non-empty and whitespace-free. Identifiers may themselves contain
    /// colons (`orcid:0000-0003-4423-4370` parses; so does
    /// `umls:C45:67` with identifier `C45:67`).
    pub fn from_curie(curie: &str) -> Result<Self, Error> {
        let malformed = || Error::MalformedCurie {
            curie: curie.to_string(),
        };
        let (prefix, identifier) = curie.split_once(':').ok_or_else(malformed)?;
        if prefix.is_empty() || identifier.is_empty() {
            return Err(malformed());
        }
        if curie.chars().any(char::is_whitespace) {
            return Err(malformed());
        }
        Ok(Self::new(prefix, identifier))
    }

    /// [`Self::from_curie`] with a caller-supplied prefix normalizer.
    ///
    /// The core has no opinion about prefix spelling; callers that want
    /// registry-backed standardization (`CHEBI` vs `chebi`, `MESH` vs
    /// `mesh`) supply it here. Returning `None` from the normalizer
    /// rejects the prefix as unknown.
    pub fn from_curie_normalized(
        curie: &str,
        normalize: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Error> {
        let mut reference = Self::from_curie(curie)?;
        reference.prefix = normalize(&reference.prefix).ok_or_else(|| Error::MalformedCurie {
            curie: curie.to_string(),
        })?;
        Ok(reference)
    }

    /// The canonical string serialization, `prefix:identifier`.
    pub fn curie(&self) -> String {
        format!("{}:{}", self.prefix, self.identifier)
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix && self.identifier == other.identifier
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.prefix.hash(state);
        self.identifier.hash(state);
    }
}

impl PartialOrd for Reference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reference {
    /// Orders by `(prefix, identifier)`, which coincides with lexicographic
    /// CURIE order because the prefix never contains a colon.
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.prefix, &self.identifier).cmp(&(&other.prefix, &other.identifier))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.identifier)
    }
}
