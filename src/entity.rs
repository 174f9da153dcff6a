//! Entity instances.
//!
//! An [`Entity`] is a cheap handle: clones share the same identifier, the
//! same property instances and the same reverse links. Property values are
//! resident in memory until a [`Context`](crate::context::Context) writes
//! them out as statements.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use tracing::trace;

use crate::error::{GraphObjectError, Result};
use crate::identifier::{self, Identifier, Seed};
use crate::lock;
use crate::property::PropertyHandle;
use crate::schema::{Direction, EntityType, Identity, PropertyDescriptor, RDF_TYPE};
use crate::session::Session;
use crate::store::Quad;
use crate::term::{Literal, Term};

// ------------- Values -------------
/// A property value: a literal datum or a reference to another entity.
///
/// Values are totally ordered, literals before references, references by
/// identifier. Undefined references sort first, among themselves by address.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Literal(Literal),
    Entity(Entity),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Literal(_) => "literal",
            Value::Entity(_) => "reference",
        }
    }
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Value::Literal(literal) => Some(literal),
            Value::Entity(_) => None,
        }
    }
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Literal(_) => None,
            Value::Entity(entity) => Some(entity),
        }
    }
    fn seed(&self, deriving: &mut HashSet<usize>) -> Option<Seed> {
        match self {
            Value::Literal(literal) => Some(literal.seed()),
            Value::Entity(entity) => entity.derive(deriving).map(Seed::Reference),
        }
    }
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Literal(literal) => write!(f, "{}", literal),
            Value::Entity(entity) => write!(f, "{}", entity),
        }
    }
}
impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        Value::Literal(literal)
    }
}
impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Value::Entity(entity)
    }
}
impl From<&Entity> for Value {
    fn from(entity: &Entity) -> Self {
        Value::Entity(entity.clone())
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Literal(Literal::from(s))
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Literal(Literal::from(s))
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Literal(Literal::from(i))
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Literal(Literal::from(b))
    }
}

// ------------- Entities -------------
#[derive(Debug)]
pub(crate) struct PropertyInstance {
    pub(crate) descriptor: Arc<PropertyDescriptor>,
    pub(crate) values: Vec<Value>,
}

#[derive(Debug)]
struct OwnerLink {
    owner: Weak<EntityInner>,
    descriptor: Arc<PropertyDescriptor>,
}

struct EntityInner {
    session: Session,
    entity_type: Arc<EntityType>,
    identifier: OnceLock<Identifier>,
    properties: Mutex<Vec<PropertyInstance>>,
    owners: Mutex<Vec<OwnerLink>>,
}

#[derive(Clone)]
pub struct Entity(Arc<EntityInner>);

impl Entity {
    pub(crate) fn new(session: Session, entity_type: Arc<EntityType>) -> Self {
        let properties = entity_type
            .properties()
            .iter()
            .map(|descriptor| PropertyInstance {
                descriptor: Arc::clone(descriptor),
                values: Vec::new(),
            })
            .collect();
        Entity(Arc::new(EntityInner {
            session,
            entity_type,
            identifier: OnceLock::new(),
            properties: Mutex::new(properties),
            owners: Mutex::new(Vec::new()),
        }))
    }
    pub(crate) fn with_identifier(
        session: Session,
        entity_type: Arc<EntityType>,
        identifier: Identifier,
    ) -> Self {
        let entity = Self::new(session, entity_type);
        let _ = entity.0.identifier.set(identifier);
        entity
    }
    pub fn session(&self) -> &Session {
        &self.0.session
    }
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.0.entity_type
    }
    /// Fixes the identifier. Fails if a different one is already fixed.
    pub fn assign(&self, identifier: Identifier) -> Result<()> {
        let kept = self.0.identifier.get_or_init(|| identifier.clone());
        if kept != &identifier {
            return Err(GraphObjectError::IdentifierConflict {
                fixed: kept.to_string(),
                requested: identifier.to_string(),
            });
        }
        Ok(())
    }
    /// The identifier, derived from the defining fields on first request if
    /// none was assigned. `None` while the entity is undefined, which
    /// includes entities whose defining fields lead back to themselves.
    pub fn identifier(&self) -> Option<Identifier> {
        self.derive(&mut HashSet::new())
    }
    // `deriving` holds the entities whose derivation is in progress
    fn derive(&self, deriving: &mut HashSet<usize>) -> Option<Identifier> {
        if let Some(identifier) = self.0.identifier.get() {
            return Some(identifier.clone());
        }
        let Identity::Fields(fields) = self.0.entity_type.identity() else {
            return None;
        };
        if !deriving.insert(self.address()) {
            trace!(entity_type = %self.0.entity_type, "defining fields form a cycle");
            return None;
        }
        let seeds = self.seeds(fields, deriving);
        deriving.remove(&self.address());
        let derived = identifier::derive(self.0.entity_type.namespace(), &Seed::Tuple(seeds?));
        trace!(entity_type = %self.0.entity_type, identifier = %derived, "derived identifier");
        Some(self.0.identifier.get_or_init(|| derived).clone())
    }
    fn seeds(&self, fields: &[String], deriving: &mut HashSet<usize>) -> Option<Vec<Seed>> {
        let mut seeds = Vec::with_capacity(fields.len());
        for field in fields {
            let (multiple, values) = self.snapshot(field)?;
            let mut field_seeds = values
                .iter()
                .map(|v| v.seed(deriving))
                .collect::<Option<Vec<_>>>()?;
            if multiple {
                field_seeds.sort();
                field_seeds.dedup();
                seeds.push(Seed::Tuple(field_seeds));
            } else {
                seeds.push(field_seeds.into_iter().next()?);
            }
        }
        Some(seeds)
    }
    /// The identifier if it is already fixed; never derives.
    pub(crate) fn known_identifier(&self) -> Option<&Identifier> {
        self.0.identifier.get()
    }
    pub fn defined(&self) -> bool {
        self.identifier().is_some()
    }
    pub fn property(&self, name: &str) -> Result<PropertyHandle> {
        let descriptor = self.0.entity_type.property(name).ok_or_else(|| {
            GraphObjectError::UnknownProperty {
                owner: self.0.entity_type.name().to_owned(),
                property: name.to_owned(),
            }
        })?;
        Ok(PropertyHandle::new(self.clone(), Arc::clone(descriptor)))
    }
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<&Self> {
        self.property(name)?.set(value)?;
        Ok(self)
    }
    pub fn unset(&self, name: &str, value: impl Into<Value>) -> Result<&Self> {
        self.property(name)?.unset(value)?;
        Ok(self)
    }
    /// Resident values of a property, or what the store holds for it.
    pub fn get(&self, name: &str) -> Result<Vec<Value>> {
        self.property(name)?.get().fetch()
    }
    /// The single value of a property, if any.
    pub fn one(&self, name: &str) -> Result<Option<Value>> {
        self.property(name)?.one()
    }

    // single-valued flag and a copy of the values, taken without holding the
    // lock afterwards so that deriving identifiers of values cannot deadlock
    pub(crate) fn snapshot(&self, name: &str) -> Option<(bool, Vec<Value>)> {
        let properties = lock(&self.0.properties);
        properties
            .iter()
            .find(|p| p.descriptor.name() == name)
            .map(|p| (p.descriptor.multiple(), p.values.clone()))
    }
    pub(crate) fn with_values<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> Option<R> {
        let mut properties = lock(&self.0.properties);
        properties
            .iter_mut()
            .find(|p| p.descriptor.name() == name)
            .map(|p| f(&mut p.values))
    }
    fn resident(&self) -> Vec<(Arc<PropertyDescriptor>, Vec<Value>)> {
        lock(&self.0.properties)
            .iter()
            .map(|p| (Arc::clone(&p.descriptor), p.values.clone()))
            .collect()
    }

    pub(crate) fn add_owner(&self, owner: &Entity, descriptor: &Arc<PropertyDescriptor>) {
        lock(&self.0.owners).push(OwnerLink {
            owner: Arc::downgrade(&owner.0),
            descriptor: Arc::clone(descriptor),
        });
    }
    pub(crate) fn remove_owner(&self, owner: &Entity, descriptor: &Arc<PropertyDescriptor>) {
        let mut owners = lock(&self.0.owners);
        if let Some(position) = owners.iter().position(|link| {
            Arc::ptr_eq(&link.descriptor, descriptor)
                && link.owner.upgrade().is_some_and(|o| Arc::ptr_eq(&o, &owner.0))
        }) {
            owners.remove(position);
        }
    }
    /// Entities currently holding this entity as a value of the named property.
    pub fn owners(&self, property: &str) -> Vec<Entity> {
        self.owners_where(|descriptor| descriptor.name() == property)
    }
    pub(crate) fn owners_where(&self, select: impl Fn(&PropertyDescriptor) -> bool) -> Vec<Entity> {
        lock(&self.0.owners)
            .iter()
            .filter(|link| select(&link.descriptor))
            .filter_map(|link| link.owner.upgrade().map(Entity))
            .collect()
    }
    /// Entities reachable in one step: resident reference values and the
    /// owners read through inverse properties.
    pub fn references(&self) -> Vec<Entity> {
        let mut references = Vec::new();
        for (descriptor, values) in self.resident() {
            match descriptor.direction() {
                Direction::Forward => {
                    references.extend(values.into_iter().filter_map(|v| match v {
                        Value::Entity(entity) => Some(entity),
                        Value::Literal(_) => None,
                    }))
                }
                Direction::Inverse => references.extend(
                    self.owners_where(|d| {
                        d.direction() == Direction::Forward && d.predicate() == descriptor.predicate()
                    }),
                ),
            }
        }
        references
    }
    /// The statements describing this entity, attributed to `graph`.
    ///
    /// Fails with [`GraphObjectError::UndefinedIdentifier`] if this entity or
    /// any entity it references is undefined.
    pub fn statements(&self, graph: &Identifier) -> Result<Vec<Quad>> {
        let subject = self
            .identifier()
            .ok_or_else(|| GraphObjectError::UndefinedIdentifier(self.to_string()))?;
        let rdf_type = Identifier::from(RDF_TYPE);
        let mut quads: Vec<Quad> = self
            .0
            .entity_type
            .lineage()
            .into_iter()
            .map(|t| {
                Quad::new(subject.clone(), rdf_type.clone(), t.tag().clone(), graph.clone())
            })
            .collect();
        for (descriptor, values) in self.resident() {
            if descriptor.direction() == Direction::Inverse {
                continue;
            }
            for value in values {
                let object = match value {
                    Value::Literal(literal) => Term::Literal(literal),
                    Value::Entity(entity) => Term::Iri(entity.identifier().ok_or_else(|| {
                        GraphObjectError::UndefinedIdentifier(format!(
                            "{} referenced through {}",
                            entity, descriptor
                        ))
                    })?),
                };
                quads.push(Quad::new(
                    subject.clone(),
                    descriptor.predicate().clone(),
                    object,
                    graph.clone(),
                ));
            }
        }
        Ok(quads)
    }
    pub(crate) fn same(&self, other: &Entity) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
            || matches!(
                (self.known_identifier(), other.known_identifier()),
                (Some(a), Some(b)) if a == b
            )
    }
}
impl Eq for Entity {}
impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entity {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.same(other) {
            return Ordering::Equal;
        }
        match (self.known_identifier(), other.known_identifier()) {
            (Some(a), Some(b)) => a.cmp(b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => self.address().cmp(&other.address()),
        }
    }
}
impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.0.entity_type.name())
            .field("identifier", &self.known_identifier())
            .finish()
    }
}
impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.known_identifier() {
            Some(identifier) => write!(f, "{}({})", self.0.entity_type, identifier),
            None => write!(f, "{}(?)", self.0.entity_type),
        }
    }
}
