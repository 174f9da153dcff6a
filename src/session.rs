use std::sync::Arc;

use tracing::info;

use crate::context::Context;
use crate::datasource;
use crate::entity::{Entity, Value};
use crate::error::Result;
use crate::identifier::{self, Identifier};
use crate::memory::MemoryStore;
use crate::schema::{RDF_TYPE, Schema};
use crate::settings::{DEFAULT_BASE_IRI, Settings};
use crate::store::{self, QuadPattern, QuadStore};

/// The schema and the store every entity of a session works against.
///
/// Cloning a session is cheap and the clones share both.
#[derive(Clone)]
pub struct Session {
    schema: Arc<Schema>,
    store: Arc<dyn QuadStore>,
}

impl Session {
    pub fn new(base: &str, store: Arc<dyn QuadStore>) -> Result<Self> {
        let session = Self {
            schema: Arc::new(Schema::new(base)),
            store,
        };
        datasource::register(&session.schema)?;
        Ok(session)
    }
    pub fn in_memory() -> Result<Self> {
        Self::new(DEFAULT_BASE_IRI, Arc::new(MemoryStore::new()))
    }
    pub fn open(settings: &Settings) -> Result<Self> {
        let store = store::open(&settings.store)?;
        info!(base = %settings.base_iri, store = ?settings.store, "session opened");
        Self::new(&settings.base_iri, store)
    }
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
    pub fn store(&self) -> &Arc<dyn QuadStore> {
        &self.store
    }
    /// A new, undefined entity of the named type with declared defaults set.
    pub fn create(&self, type_name: &str) -> Result<Entity> {
        let entity = Entity::new(self.clone(), self.schema.get(type_name)?);
        for descriptor in entity.entity_type().properties() {
            if let Some(default) = descriptor.default_value() {
                entity
                    .property(descriptor.name())?
                    .set(Value::Literal(default.clone()))?;
            }
        }
        Ok(entity)
    }
    /// A new entity named by a key within the namespace of its type.
    pub fn create_with_key(&self, type_name: &str, key: &str) -> Result<Entity> {
        let entity = self.create(type_name)?;
        entity.assign(identifier::direct(entity.entity_type().namespace(), key))?;
        Ok(entity)
    }
    pub fn create_with_identifier(&self, type_name: &str, identifier: Identifier) -> Result<Entity> {
        let entity = self.create(type_name)?;
        entity.assign(identifier)?;
        Ok(entity)
    }
    /// A handle on an entity already in the store, typed as given. Property
    /// reads on it go to the store.
    pub fn entity(&self, type_name: &str, identifier: Identifier) -> Result<Entity> {
        Ok(Entity::with_identifier(
            self.clone(),
            self.schema.get(type_name)?,
            identifier,
        ))
    }
    /// A handle on an entity in the store, typed by the most specific type
    /// among its stored type tags.
    pub fn load(&self, identifier: Identifier) -> Result<Entity> {
        let tags = self.type_tags(&identifier)?;
        let entity_type = self.schema.most_specific(&tags);
        Ok(Entity::with_identifier(self.clone(), entity_type, identifier))
    }
    // the declared value type is a candidate too, so a reference without
    // stored type tags still resolves to at least what was declared
    pub(crate) fn hydrate(&self, declared: &str, identifier: Identifier) -> Result<Entity> {
        let mut tags = self.type_tags(&identifier)?;
        if let Ok(declared) = self.schema.get(declared) {
            tags.push(declared.tag().clone());
        }
        let entity_type = self.schema.most_specific(&tags);
        Ok(Entity::with_identifier(self.clone(), entity_type, identifier))
    }
    fn type_tags(&self, identifier: &Identifier) -> Result<Vec<Identifier>> {
        Ok(self
            .store
            .quads(
                &QuadPattern::new()
                    .subject(identifier.clone())
                    .predicate(Identifier::from(RDF_TYPE)),
            )?
            .into_iter()
            .filter_map(|quad| quad.object.as_iri().cloned())
            .collect())
    }
    pub fn context(&self, identifier: impl Into<Identifier>) -> Context {
        Context::new(identifier.into())
    }
    /// Forgets every registered type, keeping only the built-in ones.
    pub fn reset(&self) -> Result<()> {
        self.schema.reset();
        datasource::register(&self.schema)
    }
}
