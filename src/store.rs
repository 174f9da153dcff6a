//! The backing store boundary.
//!
//! The engine only needs two things from a store: adding statements and
//! matching statement patterns. [`MemoryStore`](crate::memory::MemoryStore)
//! and [`SqliteStore`](crate::persist::SqliteStore) implement it; anything
//! else can be plugged in through [`QuadStore`].

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::identifier::Identifier;
use crate::memory::MemoryStore;
use crate::persist::SqliteStore;
use crate::settings::StoreSettings;
use crate::term::Term;

/// A statement attributed to the context (named graph) it was saved into.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quad {
    pub subject: Identifier,
    pub predicate: Identifier,
    pub object: Term,
    pub graph: Identifier,
}

impl Quad {
    pub fn new(
        subject: Identifier,
        predicate: Identifier,
        object: impl Into<Term>,
        graph: Identifier,
    ) -> Self {
        Self {
            subject,
            predicate,
            object: object.into(),
            graph,
        }
    }
}
impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<{}> <{}> {} <{}> .",
            self.subject, self.predicate, self.object, self.graph
        )
    }
}

/// A statement pattern; `None` matches anything in that position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuadPattern {
    pub subject: Option<Identifier>,
    pub predicate: Option<Identifier>,
    pub object: Option<Term>,
    pub graph: Option<Identifier>,
}

impl QuadPattern {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn subject(mut self, subject: Identifier) -> Self {
        self.subject = Some(subject);
        self
    }
    pub fn predicate(mut self, predicate: Identifier) -> Self {
        self.predicate = Some(predicate);
        self
    }
    pub fn object(mut self, object: impl Into<Term>) -> Self {
        self.object = Some(object.into());
        self
    }
    pub fn graph(mut self, graph: Identifier) -> Self {
        self.graph = Some(graph);
        self
    }
    pub fn matches(&self, quad: &Quad) -> bool {
        self.subject.as_ref().is_none_or(|s| s == &quad.subject)
            && self.predicate.as_ref().is_none_or(|p| p == &quad.predicate)
            && self.object.as_ref().is_none_or(|o| o == &quad.object)
            && self.graph.as_ref().is_none_or(|g| g == &quad.graph)
    }
}

/// Stores serialize their own writes; callers never write concurrently.
pub trait QuadStore: Send + Sync {
    /// Adds all of `quads` or none of them. Returns how many were new.
    fn add(&self, quads: &[Quad]) -> Result<usize>;
    /// Every stored statement matching `pattern`, in insertion order.
    fn quads(&self, pattern: &QuadPattern) -> Result<Vec<Quad>>;
    fn len(&self) -> Result<usize>;
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
    /// Distinct graph names, sorted.
    fn graphs(&self) -> Result<Vec<Identifier>> {
        let mut graphs: Vec<Identifier> = self
            .quads(&QuadPattern::new())?
            .into_iter()
            .map(|q| q.graph)
            .collect();
        graphs.sort();
        graphs.dedup();
        Ok(graphs)
    }
}

pub fn open(settings: &StoreSettings) -> Result<Arc<dyn QuadStore>> {
    Ok(match settings {
        StoreSettings::Memory => Arc::new(MemoryStore::new()),
        StoreSettings::Sqlite { path: None } => Arc::new(SqliteStore::open_in_memory()?),
        StoreSettings::Sqlite { path: Some(path) } => Arc::new(SqliteStore::open(path)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Literal;

    #[test]
    fn patterns_match_bound_positions_only() {
        let quad = Quad::new(
            Identifier::from("http://example.org/s"),
            Identifier::from("http://example.org/p"),
            Literal::from(3i64),
            Identifier::from("http://example.org/g"),
        );
        assert!(QuadPattern::new().matches(&quad));
        assert!(
            QuadPattern::new()
                .subject(Identifier::from("http://example.org/s"))
                .object(Literal::from(3i64))
                .matches(&quad)
        );
        assert!(
            !QuadPattern::new()
                .graph(Identifier::from("http://example.org/other"))
                .matches(&quad)
        );
    }
}
