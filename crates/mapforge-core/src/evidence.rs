//! Evidence records and content-addressed digests.
//!
//! Every evidence (and every mapping triple) has a stable SHA-256 digest
//! over its semantically significant fields. Digests serve three jobs:
//!
//! 1. **Deduplication** — evidence sets are unioned by digest when two
//!    mappings with the same triple are merged.
//! 2. **Provenance** — reasoned evidence names its parent mappings by
//!    triple digest rather than by object reference, so the evidence
//!    graph is a DAG over stable keys no matter how many derivations
//!    reached the same triple.
//! 3. **Stability** — the same record hashes the same across runs,
//!    platforms, and serialization round trips.
//!
//! Display names are excluded from hashing; they are presentation data.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};

use crate::Reference;

/// A 32-byte content digest, hex-encoded when serialized.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let high = (chunk[0] as char).to_digit(16)?;
            let low = (chunk[1] as char).to_digit(16)?;
            bytes[i] = (high * 16 + low) as u8;
        }
        Some(Self(bytes))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Digest::from_hex(&hex).ok_or_else(|| D::Error::custom("invalid digest hex"))
    }
}

/// Incremental hasher with field-level domain separation.
pub(crate) struct DigestBuilder {
    hasher: Sha256,
}

impl DigestBuilder {
    pub fn new(kind: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        Self { hasher }
    }

    pub fn field(&mut self, name: &str, value: &str) -> &mut Self {
        self.hasher.update(b"|");
        self.hasher.update(name.as_bytes());
        self.hasher.update(b"=");
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn reference(&mut self, name: &str, reference: &Reference) -> &mut Self {
        self.field(name, &reference.curie())
    }

    pub fn optional_reference(&mut self, name: &str, reference: Option<&Reference>) -> &mut Self {
        if let Some(reference) = reference {
            self.reference(name, reference);
        }
        self
    }

    pub fn f64(&mut self, name: &str, value: f64) -> &mut Self {
        // Bit-exact: two evidences differing only in the 15th decimal of
        // their confidence are different evidences.
        self.hasher.update(b"|");
        self.hasher.update(name.as_bytes());
        self.hasher.update(b"=");
        self.hasher.update(value.to_bits().to_le_bytes());
        self
    }

    pub fn digest(&mut self, name: &str, value: &Digest) -> &mut Self {
        self.hasher.update(b"|");
        self.hasher.update(name.as_bytes());
        self.hasher.update(b"=");
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn finish(self) -> Digest {
        Digest(self.hasher.finalize().into())
    }
}

/// A handle to the mapping set an evidence was drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSetRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Set-level confidence in `[0, 1]`, multiplied into every evidence
    /// drawn from the set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl MappingSetRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            license: None,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// A curated justification for a single mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleEvidence {
    /// A term from the matching-process vocabulary (manual curation,
    /// lexical matching, ...).
    pub justification: Reference,
    /// Confidence in `[0, 1]` assigned by the producing process.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_set: Option<MappingSetRef>,
}

impl SimpleEvidence {
    pub fn new(justification: Reference, confidence: f64) -> Self {
        Self {
            justification,
            confidence,
            author: None,
            mapping_set: None,
        }
    }

    pub fn with_author(mut self, author: Reference) -> Self {
        self.author = Some(author);
        self
    }

    pub fn with_mapping_set(mut self, mapping_set: MappingSetRef) -> Self {
        self.mapping_set = Some(mapping_set);
        self
    }
}

/// A justification derived by the inference engine from parent mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonedEvidence {
    /// The rule that produced the mapping (inversion, chaining,
    /// generalization, background knowledge).
    pub justification: Reference,
    /// Derived confidence: the product of the parents' aggregate
    /// confidences at derivation time, times any rule-specific factor.
    pub confidence: f64,
    /// Triple digests of the parent mappings, in derivation order.
    /// Never empty.
    pub parents: Vec<Digest>,
}

impl ReasonedEvidence {
    pub fn new(justification: Reference, confidence: f64, parents: Vec<Digest>) -> Self {
        debug_assert!(!parents.is_empty(), "reasoned evidence requires parents");
        Self {
            justification,
            confidence,
            parents,
        }
    }
}

/// One justification for why a mapping holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    Simple(SimpleEvidence),
    Reasoned(ReasonedEvidence),
}

impl Evidence {
    pub fn justification(&self) -> &Reference {
        match self {
            Evidence::Simple(e) => &e.justification,
            Evidence::Reasoned(e) => &e.justification,
        }
    }

    /// The effective confidence of this single evidence.
    ///
    /// For simple evidence this is the recorded confidence scaled by the
    /// mapping set's confidence, when one is present. For reasoned
    /// evidence the scaling already happened at derivation time.
    pub fn confidence(&self) -> f64 {
        match self {
            Evidence::Simple(e) => {
                let set_confidence = e
                    .mapping_set
                    .as_ref()
                    .and_then(|set| set.confidence)
                    .unwrap_or(1.0);
                e.confidence * set_confidence
            }
            Evidence::Reasoned(e) => e.confidence,
        }
    }

    /// Content digest over all semantic fields (names excluded).
    pub fn digest(&self) -> Digest {
        match self {
            Evidence::Simple(e) => {
                let mut builder = DigestBuilder::new("evidence/simple");
                builder
                    .reference("justification", &e.justification)
                    .f64("confidence", e.confidence)
                    .optional_reference("author", e.author.as_ref());
                if let Some(set) = &e.mapping_set {
                    builder.field("set", &set.name);
                    if let Some(version) = &set.version {
                        builder.field("set_version", version);
                    }
                    if let Some(license) = &set.license {
                        builder.field("set_license", license);
                    }
                    if let Some(confidence) = set.confidence {
                        builder.f64("set_confidence", confidence);
                    }
                }
                builder.finish()
            }
            Evidence::Reasoned(e) => {
                let mut builder = DigestBuilder::new("evidence/reasoned");
                builder
                    .reference("justification", &e.justification)
                    .f64("confidence", e.confidence);
                for parent in &e.parents {
                    builder.digest("parent", parent);
                }
                builder.finish()
            }
        }
    }
}

impl From<SimpleEvidence> for Evidence {
    fn from(evidence: SimpleEvidence) -> Self {
        Evidence::Simple(evidence)
    }
}

impl From<ReasonedEvidence> for Evidence {
    fn from(evidence: ReasonedEvidence) -> Self {
        Evidence::Reasoned(evidence)
    }
}

/// Combine independent evidence confidences with the noisy-or rule:
/// `1 - prod(1 - c_i)`.
///
/// Monotone (adding evidence never lowers the result), associative over
/// union, and bounded in `[0, 1]`.
pub fn noisy_or(confidences: impl IntoIterator<Item = f64>) -> f64 {
    let miss: f64 = confidences
        .into_iter()
        .map(|c| 1.0 - c.clamp(0.0, 1.0))
        .product();
    1.0 - miss
}
