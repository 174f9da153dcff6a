use std::collections::HashMap;
use std::sync::Mutex;

// used to keep the one-to-one mapping between terms and their interned numbers
use bimap::BiMap;
// used for the statement indexes
use roaring::RoaringTreemap;
use seahash::SeaHasher;
use std::hash::BuildHasherDefault;

use crate::error::{GraphObjectError, Result};
use crate::lock;
use crate::store::{Quad, QuadPattern, QuadStore};
use crate::term::Term;

type TermHasher = BuildHasherDefault<SeaHasher>;
type Interned = u64;
type Statement = [Interned; 4];

// ------------- Lookups -------------
#[derive(Debug, Default)]
struct Lookup {
    index: HashMap<Interned, RoaringTreemap, TermHasher>,
}
impl Lookup {
    fn insert(&mut self, key: Interned, statement: u64) {
        self.index.entry(key).or_default().insert(statement);
    }
    fn lookup(&self, key: Interned) -> Option<&RoaringTreemap> {
        self.index.get(&key)
    }
}

#[derive(Debug, Default)]
struct Indexed {
    terms: BiMap<Term, Interned>,
    statements: Vec<Statement>,
    kept: HashMap<Statement, u64, TermHasher>,
    // one index per statement position: subject, predicate, object, graph
    positions: [Lookup; 4],
}
impl Indexed {
    fn intern(&mut self, term: Term) -> Interned {
        if let Some(interned) = self.terms.get_by_left(&term) {
            return *interned;
        }
        let interned = self.terms.len() as Interned;
        self.terms.insert(term, interned);
        interned
    }
    fn term(&self, interned: Interned) -> Result<&Term> {
        self.terms.get_by_right(&interned).ok_or_else(|| {
            GraphObjectError::Store(format!("interned term {} has no spelling", interned))
        })
    }
    fn keep(&mut self, quad: &Quad) -> bool {
        let statement = [
            self.intern(Term::Iri(quad.subject.clone())),
            self.intern(Term::Iri(quad.predicate.clone())),
            self.intern(quad.object.clone()),
            self.intern(Term::Iri(quad.graph.clone())),
        ];
        if self.kept.contains_key(&statement) {
            return false;
        }
        let id = self.statements.len() as u64;
        self.statements.push(statement);
        self.kept.insert(statement, id);
        for (position, interned) in statement.iter().enumerate() {
            self.positions[position].insert(*interned, id);
        }
        true
    }
    fn decode(&self, statement: &Statement) -> Result<Quad> {
        let iri = |interned: Interned| -> Result<_> {
            self.term(interned)?.as_iri().cloned().ok_or_else(|| {
                GraphObjectError::Store(format!("interned term {} is not an IRI", interned))
            })
        };
        Ok(Quad {
            subject: iri(statement[0])?,
            predicate: iri(statement[1])?,
            object: self.term(statement[2])?.clone(),
            graph: iri(statement[3])?,
        })
    }
    fn matching(&self, pattern: &QuadPattern) -> Result<Vec<Quad>> {
        let bound = [
            pattern.subject.clone().map(Term::Iri),
            pattern.predicate.clone().map(Term::Iri),
            pattern.object.clone(),
            pattern.graph.clone().map(Term::Iri),
        ];
        let mut result: Option<RoaringTreemap> = None;
        for (position, term) in bound.iter().enumerate() {
            let Some(term) = term else { continue };
            let Some(interned) = self.terms.get_by_left(term) else {
                return Ok(Vec::new());
            };
            let Some(hits) = self.positions[position].lookup(*interned) else {
                return Ok(Vec::new());
            };
            result = Some(match result {
                Some(so_far) => so_far & hits,
                None => hits.clone(),
            });
        }
        match result {
            Some(hits) => hits
                .iter()
                .map(|id| self.decode(&self.statements[id as usize]))
                .collect(),
            None => self.statements.iter().map(|s| self.decode(s)).collect(),
        }
    }
}

/// A store that lives and dies with the process.
///
/// Terms are interned to numbers and every statement position is indexed
/// with a roaring bitmap of statement numbers, so a pattern match is an
/// intersection of the bitmaps for its bound positions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    indexed: Mutex<Indexed>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuadStore for MemoryStore {
    fn add(&self, quads: &[Quad]) -> Result<usize> {
        let mut indexed = lock(&self.indexed);
        Ok(quads.iter().filter(|q| indexed.keep(q)).count())
    }
    fn quads(&self, pattern: &QuadPattern) -> Result<Vec<Quad>> {
        lock(&self.indexed).matching(pattern)
    }
    fn len(&self) -> Result<usize> {
        Ok(lock(&self.indexed).statements.len())
    }
}
