//! Property access.
//!
//! A [`PropertyHandle`] pairs an entity with one of its property
//! descriptors. Writes are checked against the declared value kind and
//! cardinality; reads come from resident values first and from the store
//! otherwise.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::entity::{Entity, Value};
use crate::error::{GraphObjectError, Result};
use crate::schema::{Direction, PropertyDescriptor, ValueKind};
use crate::store::QuadPattern;
use crate::term::Term;

/// The result of [`PropertyHandle::read`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reading {
    One(Option<Value>),
    Many(Vec<Value>),
}

impl Reading {
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Reading::One(value) => value.into_iter().collect(),
            Reading::Many(values) => values,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PropertyHandle {
    owner: Entity,
    descriptor: Arc<PropertyDescriptor>,
}

impl PropertyHandle {
    pub(crate) fn new(owner: Entity, descriptor: Arc<PropertyDescriptor>) -> Self {
        Self { owner, descriptor }
    }
    pub fn owner(&self) -> &Entity {
        &self.owner
    }
    pub fn descriptor(&self) -> &Arc<PropertyDescriptor> {
        &self.descriptor
    }
    fn check(&self, value: &Value) -> Result<()> {
        let expected = match self.descriptor.kind() {
            ValueKind::Literal => "literal",
            ValueKind::Reference(_) => "reference",
        };
        if value.kind() != expected {
            return Err(GraphObjectError::TypeMismatch {
                property: self.descriptor.to_string(),
                expected,
                found: value.kind(),
            });
        }
        Ok(())
    }
    // the forward property an inverse property writes through
    fn forward(&self, value: &Value) -> Result<PropertyHandle> {
        let (_, property) = self.descriptor.inverse_of().ok_or_else(|| {
            GraphObjectError::UnknownProperty {
                owner: self.descriptor.owner().to_owned(),
                property: self.descriptor.name().to_owned(),
            }
        })?;
        match value {
            Value::Entity(other) => other.property(property),
            Value::Literal(_) => Err(GraphObjectError::TypeMismatch {
                property: self.descriptor.to_string(),
                expected: "reference",
                found: "literal",
            }),
        }
    }

    /// Adds a value; a single-valued property drops its previous value.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check(&value)?;
        if self.descriptor.direction() == Direction::Inverse {
            return self.forward(&value)?.set(self.owner.clone());
        }
        if let Value::Entity(entity) = &value {
            // fix the identifier before ordering against other values
            entity.identifier();
        }
        let multiple = self.descriptor.multiple();
        let (inserted, dropped) = self
            .owner
            .with_values(self.descriptor.name(), |values| {
                if multiple {
                    if values.contains(&value) {
                        return (false, Vec::new());
                    }
                    let position = values.partition_point(|v| v < &value);
                    values.insert(position, value.clone());
                    (true, Vec::new())
                } else {
                    if values.len() == 1 && values[0] == value {
                        return (false, Vec::new());
                    }
                    (true, std::mem::replace(values, vec![value.clone()]))
                }
            })
            .unwrap_or((false, Vec::new()));
        for old in dropped {
            if let Value::Entity(entity) = old {
                entity.remove_owner(&self.owner, &self.descriptor);
            }
        }
        if inserted {
            if let Value::Entity(entity) = &value {
                entity.add_owner(&self.owner, &self.descriptor);
            }
        }
        Ok(())
    }
    /// Sets a value and hands the property back for chaining.
    pub fn write(&self, value: impl Into<Value>) -> Result<&Self> {
        self.set(value)?;
        Ok(self)
    }
    /// Removes a value previously set on this property.
    pub fn unset(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check(&value)?;
        if self.descriptor.direction() == Direction::Inverse {
            return self.forward(&value)?.unset(self.owner.clone());
        }
        let removed = self
            .owner
            .with_values(self.descriptor.name(), |values| {
                values
                    .iter()
                    .position(|v| v == &value)
                    .map(|position| values.remove(position))
            })
            .flatten();
        match removed {
            Some(Value::Entity(entity)) => {
                entity.remove_owner(&self.owner, &self.descriptor);
                Ok(())
            }
            Some(Value::Literal(_)) => Ok(()),
            None => Err(GraphObjectError::ValueNotFound {
                property: self.descriptor.to_string(),
                value: value.to_string(),
            }),
        }
    }
    /// Values held in memory, in value order.
    pub fn values(&self) -> Vec<Value> {
        let mut values = match self.descriptor.direction() {
            Direction::Forward => self
                .owner
                .snapshot(self.descriptor.name())
                .map(|(_, values)| values)
                .unwrap_or_default(),
            Direction::Inverse => self
                .owner
                .owners_where(|d| {
                    d.direction() == Direction::Forward && d.predicate() == self.descriptor.predicate()
                })
                .into_iter()
                .map(Value::Entity)
                .collect(),
        };
        // identifiers fixed since insertion change the order
        for value in &values {
            if let Value::Entity(entity) = value {
                entity.identifier();
            }
        }
        values.sort();
        values.dedup();
        values
    }
    pub fn has_value(&self, value: &Value) -> bool {
        self.values().contains(value)
    }
    /// A query over this property. Nothing is evaluated until
    /// [`PropertyValues::fetch`], and every fetch evaluates again.
    pub fn get(&self) -> PropertyValues {
        PropertyValues {
            handle: self.clone(),
        }
    }
    /// One-or-none for single-valued properties, everything otherwise.
    pub fn read(&self) -> Result<Reading> {
        let values = self.get().fetch()?;
        Ok(if self.descriptor.multiple() {
            Reading::Many(values)
        } else {
            Reading::One(values.into_iter().next())
        })
    }
    pub fn one(&self) -> Result<Option<Value>> {
        Ok(self.get().fetch()?.into_iter().next())
    }

    fn query(&self) -> Result<Vec<Value>> {
        let Some(owner) = self.owner.identifier() else {
            debug!(property = %self.descriptor, "owner is undefined; nothing to query");
            return Ok(Vec::new());
        };
        let session = self.owner.session();
        let predicate = self.descriptor.predicate().clone();
        let direction = self.descriptor.direction();
        let pattern = match direction {
            Direction::Forward => QuadPattern::new().subject(owner).predicate(predicate),
            Direction::Inverse => QuadPattern::new().predicate(predicate).object(owner),
        };
        let mut seen = HashSet::new();
        let terms: Vec<Term> = session
            .store()
            .quads(&pattern)?
            .into_iter()
            .map(|quad| match direction {
                Direction::Forward => quad.object,
                Direction::Inverse => Term::Iri(quad.subject),
            })
            .filter(|term| seen.insert(term.clone()))
            .collect();
        let mut values = Vec::with_capacity(terms.len());
        for term in terms {
            match (self.descriptor.kind(), term) {
                (ValueKind::Literal, Term::Literal(literal)) => values.push(Value::Literal(literal)),
                (ValueKind::Reference(value_type), Term::Iri(iri)) => {
                    values.push(Value::Entity(session.hydrate(value_type, iri)?))
                }
                (_, term) => warn!(
                    property = %self.descriptor,
                    term = %term,
                    "stored value does not match the declared value kind; skipped"
                ),
            }
        }
        values.sort();
        Ok(values)
    }
}
impl fmt::Display for PropertyHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.descriptor.name())
    }
}

/// A restartable view over the values of a property.
#[derive(Clone, Debug)]
pub struct PropertyValues {
    handle: PropertyHandle,
}

impl PropertyValues {
    /// Resident values if there are any, the store's otherwise.
    pub fn fetch(&self) -> Result<Vec<Value>> {
        let resident = self.handle.values();
        if !resident.is_empty() {
            return Ok(resident);
        }
        self.handle.query()
    }
    pub fn iter(&self) -> Result<std::vec::IntoIter<Value>> {
        Ok(self.fetch()?.into_iter())
    }
}
