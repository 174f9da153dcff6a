//! Named graphs with imports.
//!
//! A [`Context`] collects staged entities and imports other contexts.
//! Imports are declared, never inferred, and are expected to be acyclic;
//! walking them is nevertheless guarded by a visited set, so a cycle costs
//! nothing but the repeated edge.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::entity::Entity;
use crate::error::Result;
use crate::identifier::Identifier;
use crate::lock;
use crate::store::{Quad, QuadStore};

/// Counts for one save: distinct defined entities, distinct statements, and
/// how many of those statements the store did not hold already.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub entities: usize,
    pub triples: usize,
    pub added: usize,
}

struct ContextInner {
    identifier: Identifier,
    // staged entities in staging order, with their addresses for lookups
    staged: Mutex<(Vec<Entity>, HashSet<usize>)>,
    imports: Mutex<Vec<Context>>,
}

#[derive(Clone)]
pub struct Context(Arc<ContextInner>);

impl Context {
    pub fn new(identifier: Identifier) -> Self {
        Context(Arc::new(ContextInner {
            identifier,
            staged: Mutex::new((Vec::new(), HashSet::new())),
            imports: Mutex::new(Vec::new()),
        }))
    }
    pub fn identifier(&self) -> &Identifier {
        &self.0.identifier
    }
    pub fn add_import(&self, other: &Context) {
        let mut imports = lock(&self.0.imports);
        if !imports.iter().any(|c| c.0.identifier == other.0.identifier) {
            imports.push(other.clone());
        }
    }
    pub fn imports(&self) -> Vec<Context> {
        lock(&self.0.imports).clone()
    }
    /// Stages an entity. Entities it references are staged along with it,
    /// as they are at the time the context is read or saved.
    pub fn stage(&self, entity: &Entity) {
        let mut staged = lock(&self.0.staged);
        let (entities, addresses) = &mut *staged;
        if addresses.insert(entity.address()) {
            entities.push(entity.clone());
        }
    }
    /// Staged entities and everything reachable from them through references.
    pub fn staged(&self) -> Vec<Entity> {
        let mut pending = lock(&self.0.staged).0.clone();
        let mut reached: Vec<Entity> = Vec::new();
        let mut addresses: HashSet<usize> = HashSet::new();
        pending.reverse();
        while let Some(entity) = pending.pop() {
            if !addresses.insert(entity.address()) {
                continue;
            }
            let mut references = entity.references();
            references.reverse();
            pending.extend(references);
            reached.push(entity);
        }
        reached
    }
    /// This context followed by every context it transitively imports, each once.
    pub fn closure(&self) -> Vec<Context> {
        let mut visited: HashSet<Identifier> = HashSet::new();
        let mut closure = Vec::new();
        let mut pending = vec![self.clone()];
        while let Some(context) = pending.pop() {
            if !visited.insert(context.0.identifier.clone()) {
                continue;
            }
            let mut imports = context.imports();
            imports.reverse();
            pending.extend(imports);
            closure.push(context);
        }
        closure
    }
    /// Number of distinct entities staged across the import closure.
    pub fn size(&self) -> usize {
        // the entities are kept so that no address is freed and reused
        let mut seen: Vec<Entity> = Vec::new();
        let mut addresses: HashSet<usize> = HashSet::new();
        for context in self.closure() {
            for entity in context.staged() {
                if addresses.insert(entity.address()) {
                    seen.push(entity);
                }
            }
        }
        seen.len()
    }
    /// Every statement of the closure, each attributed to the context its
    /// entity was staged in.
    pub fn quads(&self) -> Result<BTreeSet<Quad>> {
        Ok(self.collect()?.0)
    }
    fn collect(&self) -> Result<(BTreeSet<Quad>, usize)> {
        let mut quads = BTreeSet::new();
        let mut entities: HashSet<Identifier> = HashSet::new();
        for context in self.closure() {
            let staged = context.staged();
            debug!(context = %context, entities = staged.len(), "collecting statements");
            for entity in staged {
                quads.extend(entity.statements(&context.0.identifier)?);
                if let Some(identifier) = entity.identifier() {
                    entities.insert(identifier);
                }
            }
        }
        Ok((quads, entities.len()))
    }
    /// Writes the closure to `store` in one call. Nothing is written if any
    /// staged entity is undefined.
    pub fn save(&self, store: &dyn QuadStore) -> Result<SaveReport> {
        let started = Instant::now();
        let (quads, entities) = self.collect()?;
        let quads: Vec<Quad> = quads.into_iter().collect();
        let added = store.add(&quads)?;
        let report = SaveReport {
            entities,
            triples: quads.len(),
            added,
        };
        info!(
            context = %self,
            entities = report.entities,
            triples = report.triples,
            added = report.added,
            ms = started.elapsed().as_secs_f64() * 1000.0,
            "context saved"
        );
        Ok(report)
    }
}
impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.identifier)
    }
}
impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Context")
            .field("identifier", &self.0.identifier)
            .finish()
    }
}
