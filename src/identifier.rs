//! Content-addressed identifiers.
//!
//! An [`Identifier`] is an absolute IRI. Entities either receive one
//! explicitly (a full IRI or a key made [`direct`]) or have one [`derive`]d
//! from the values of their defining fields. Derivation hashes a canonical
//! encoding of a [`Seed`] with blake3 in key-derivation mode, using the
//! namespace of the entity type as the context string, and prefixes the
//! digest with the same namespace. Identical seeds under different namespaces
//! therefore never share an identifier.

use std::fmt;

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl From<&str> for Identifier {
    fn from(iri: &str) -> Self {
        Self(iri.to_owned())
    }
}
impl From<String> for Identifier {
    fn from(iri: String) -> Self {
        Self(iri)
    }
}

/// The ordered, already canonicalized values an identifier is derived from.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Seed {
    Text(String),
    Tuple(Vec<Seed>),
    Reference(Identifier),
}

// tags keep a text and a reference with the same spelling apart
const TEXT_TAG: u8 = 0x01;
const TUPLE_TAG: u8 = 0x02;
const REFERENCE_TAG: u8 = 0x03;

impl Seed {
    fn feed(&self, hasher: &mut blake3::Hasher) {
        match self {
            Seed::Text(text) => {
                hasher.update(&[TEXT_TAG]);
                hasher.update(&(text.len() as u64).to_le_bytes());
                hasher.update(text.as_bytes());
            }
            Seed::Tuple(members) => {
                hasher.update(&[TUPLE_TAG]);
                hasher.update(&(members.len() as u64).to_le_bytes());
                for member in members {
                    member.feed(hasher);
                }
            }
            Seed::Reference(identifier) => {
                hasher.update(&[REFERENCE_TAG]);
                hasher.update(&(identifier.0.len() as u64).to_le_bytes());
                hasher.update(identifier.0.as_bytes());
            }
        }
    }
}

/// Derives the identifier for `seed` within `namespace`.
///
/// Length prefixes make the encoding unambiguous, so `("ab", "c")` and
/// `("a", "bc")` hash differently.
pub fn derive(namespace: &str, seed: &Seed) -> Identifier {
    let mut hasher = blake3::Hasher::new_derive_key(namespace);
    seed.feed(&mut hasher);
    Identifier(format!("{}a{}", namespace, hasher.finalize().to_hex()))
}

/// Builds an identifier from an explicit key, percent-encoding anything that
/// is not an unreserved IRI character.
pub fn direct(namespace: &str, key: &str) -> Identifier {
    let mut iri = String::with_capacity(namespace.len() + key.len());
    iri.push_str(namespace);
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                iri.push(byte as char)
            }
            _ => iri.push_str(&format!("%{:02X}", byte)),
        }
    }
    Identifier(iri)
}
