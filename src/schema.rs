//! The entity registry.
//!
//! Entity types are declared explicitly with a [`TypeDeclaration`] and then
//! registered with a [`Schema`]. Registration creates one
//! [`PropertyDescriptor`] per (owner type, property name) and keeps it for
//! the lifetime of the schema, so every entity of a type shares the same
//! descriptors. Types form a single-inheritance tree rooted at [`ENTITY`];
//! that tree is what most-specific-type resolution walks.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use seahash::SeaHasher;
use std::hash::BuildHasherDefault;
use tracing::{debug, warn};

use crate::error::{GraphObjectError, Result};
use crate::identifier::Identifier;
use crate::lock;
use crate::term::Literal;

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
/// Name of the root type every other type descends from.
pub const ENTITY: &str = "Entity";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Multiple,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Literal,
    /// Holds the name of the declared value type.
    Reference(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// `(owner, predicate, value)`
    Forward,
    /// `(value, predicate, owner)`
    Inverse,
}

/// How an entity of a type obtains its identifier when none is assigned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identity {
    Assigned,
    Fields(Vec<String>),
}

// ------------- Declarations -------------
#[derive(Clone, Debug)]
pub struct PropertySpec {
    name: String,
    cardinality: Cardinality,
    kind: ValueKind,
    direction: Direction,
    inverse_of: Option<(String, String)>,
    predicate: Option<Identifier>,
    default: Option<Literal>,
    display_name: Option<String>,
    description: Option<String>,
}

impl PropertySpec {
    fn new(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_owned(),
            cardinality: Cardinality::Single,
            kind,
            direction: Direction::Forward,
            inverse_of: None,
            predicate: None,
            default: None,
            display_name: None,
            description: None,
        }
    }
    pub fn literal(name: &str) -> Self {
        Self::new(name, ValueKind::Literal)
    }
    pub fn reference(name: &str, value_type: &str) -> Self {
        Self::new(name, ValueKind::Reference(value_type.to_owned()))
    }
    /// A property that reads `property` of `owner_type` backwards: its values
    /// are the owners pointing at this entity.
    pub fn inverse(name: &str, owner_type: &str, property: &str) -> Self {
        let mut spec = Self::new(name, ValueKind::Reference(owner_type.to_owned()));
        spec.direction = Direction::Inverse;
        spec.cardinality = Cardinality::Multiple;
        spec.inverse_of = Some((owner_type.to_owned(), property.to_owned()));
        spec
    }
    pub fn multiple(mut self) -> Self {
        self.cardinality = Cardinality::Multiple;
        self
    }
    pub fn single(mut self) -> Self {
        self.cardinality = Cardinality::Single;
        self
    }
    pub fn predicate(mut self, predicate: impl Into<Identifier>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }
    pub fn default_value(mut self, value: impl Into<Literal>) -> Self {
        self.default = Some(value.into());
        self
    }
    pub fn display_name(mut self, display_name: &str) -> Self {
        self.display_name = Some(display_name.to_owned());
        self
    }
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }
}

#[derive(Clone, Debug)]
pub struct TypeDeclaration {
    name: String,
    tag: Option<Identifier>,
    parent: String,
    identity: Option<Identity>,
    properties: Vec<PropertySpec>,
}

impl TypeDeclaration {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            tag: None,
            parent: ENTITY.to_owned(),
            identity: None,
            properties: Vec::new(),
        }
    }
    pub fn parent(mut self, parent: &str) -> Self {
        self.parent = parent.to_owned();
        self
    }
    /// Overrides the type IRI, which otherwise is the schema base followed
    /// by the type name.
    pub fn tag(mut self, tag: impl Into<Identifier>) -> Self {
        self.tag = Some(tag.into());
        self
    }
    /// Derive identifiers from these fields. Without this the identity of the
    /// parent type is inherited.
    pub fn identity(mut self, fields: &[&str]) -> Self {
        self.identity = Some(Identity::Fields(fields.iter().map(|f| f.to_string()).collect()));
        self
    }
    /// Entities of this type are only defined once given an identifier or key.
    pub fn assigned(mut self) -> Self {
        self.identity = Some(Identity::Assigned);
        self
    }
    pub fn property(mut self, spec: PropertySpec) -> Self {
        self.properties.push(spec);
        self
    }
}

// ------------- Descriptors -------------
#[derive(Debug, PartialEq, Eq)]
pub struct PropertyDescriptor {
    owner: String,
    name: String,
    predicate: Identifier,
    cardinality: Cardinality,
    kind: ValueKind,
    direction: Direction,
    inverse_of: Option<(String, String)>,
    default: Option<Literal>,
    display_name: String,
    description: Option<String>,
}

impl PropertyDescriptor {
    pub fn owner(&self) -> &str {
        &self.owner
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn predicate(&self) -> &Identifier {
        &self.predicate
    }
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }
    pub fn multiple(&self) -> bool {
        self.cardinality == Cardinality::Multiple
    }
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }
    pub fn direction(&self) -> Direction {
        self.direction
    }
    /// Owner type and property name of the forward property an inverse
    /// property reads backwards.
    pub fn inverse_of(&self) -> Option<(&str, &str)> {
        self.inverse_of
            .as_ref()
            .map(|(owner, property)| (owner.as_str(), property.as_str()))
    }
    pub fn default_value(&self) -> Option<&Literal> {
        self.default.as_ref()
    }
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
impl fmt::Display for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

#[derive(Debug)]
pub struct EntityType {
    name: String,
    tag: Identifier,
    namespace: String,
    parent: Option<Arc<EntityType>>,
    identity: Identity,
    // inherited descriptors first, in declaration order
    properties: Vec<Arc<PropertyDescriptor>>,
}

impl EntityType {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn tag(&self) -> &Identifier {
        &self.tag
    }
    /// Prefix of every identifier minted for entities of this type.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
    pub fn parent(&self) -> Option<&Arc<EntityType>> {
        self.parent.as_ref()
    }
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
    pub fn properties(&self) -> &[Arc<PropertyDescriptor>] {
        &self.properties
    }
    pub fn property(&self, name: &str) -> Option<&Arc<PropertyDescriptor>> {
        self.properties.iter().find(|p| p.name == name)
    }
    /// This type followed by all of its ancestors up to the root.
    pub fn lineage(&self) -> Vec<&EntityType> {
        let mut lineage = vec![self];
        let mut current = self.parent.as_deref();
        while let Some(t) = current {
            lineage.push(t);
            current = t.parent.as_deref();
        }
        lineage
    }
    pub fn is_subtype_of(&self, other: &EntityType) -> bool {
        self.lineage().iter().any(|t| t.tag == other.tag)
    }
}
impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ------------- Keepers -------------
#[derive(Debug, Default)]
struct TypeKeeper {
    kept: HashMap<String, Arc<EntityType>, OtherHasher>,
    lookup: HashMap<Identifier, Arc<EntityType>, OtherHasher>, // double indexing, but types should be few
}
impl TypeKeeper {
    fn keep(&mut self, entity_type: EntityType) -> (Arc<EntityType>, bool) {
        if let Some(kept) = self.kept.get(&entity_type.name) {
            return (Arc::clone(kept), true);
        }
        let kept = Arc::new(entity_type);
        self.kept.insert(kept.name.clone(), Arc::clone(&kept));
        self.lookup.insert(kept.tag.clone(), Arc::clone(&kept));
        (kept, false)
    }
}

#[derive(Debug, Default)]
struct PropertyKeeper {
    kept: HashMap<(String, String), Arc<PropertyDescriptor>, OtherHasher>,
}
impl PropertyKeeper {
    fn keep(&mut self, descriptor: PropertyDescriptor) -> (Arc<PropertyDescriptor>, bool) {
        let keepsake = (descriptor.owner.clone(), descriptor.name.clone());
        if let Some(kept) = self.kept.get(&keepsake) {
            return (Arc::clone(kept), true);
        }
        let kept = Arc::new(descriptor);
        self.kept.insert(keepsake, Arc::clone(&kept));
        (kept, false)
    }
}

// ------------- Schema -------------
#[derive(Debug)]
pub struct Schema {
    base: String,
    type_keeper: Mutex<TypeKeeper>,
    property_keeper: Mutex<PropertyKeeper>,
}

impl Schema {
    pub fn new(base: &str) -> Self {
        let schema = Self {
            base: base.to_owned(),
            type_keeper: Mutex::new(TypeKeeper::default()),
            property_keeper: Mutex::new(PropertyKeeper::default()),
        };
        schema.keep_root();
        schema
    }
    fn keep_root(&self) {
        let tag = Identifier::new(format!("{}{}", self.base, ENTITY));
        let root = EntityType {
            name: ENTITY.to_owned(),
            namespace: format!("{}/", tag),
            tag,
            parent: None,
            identity: Identity::Assigned,
            properties: Vec::new(),
        };
        lock(&self.type_keeper).keep(root);
    }
    pub fn base(&self) -> &str {
        &self.base
    }
    pub fn root(&self) -> Arc<EntityType> {
        if let Some(root) = lock(&self.type_keeper).kept.get(ENTITY) {
            return Arc::clone(root);
        }
        self.keep_root();
        self.root()
    }
    /// Registers a declared type. Registering a name that is already kept
    /// returns the kept type unchanged.
    pub fn register(&self, declaration: TypeDeclaration) -> Result<Arc<EntityType>> {
        if let Some(kept) = lock(&self.type_keeper).kept.get(&declaration.name) {
            return Ok(Arc::clone(kept));
        }
        let parent = self.get(&declaration.parent)?;
        let tag = declaration
            .tag
            .clone()
            .unwrap_or_else(|| Identifier::new(format!("{}{}", self.base, declaration.name)));
        let namespace = format!("{}/", tag);

        let mut properties: Vec<Arc<PropertyDescriptor>> = parent.properties.clone();
        for spec in declaration.properties {
            let descriptor = self.describe(&declaration.name, &tag, spec)?;
            let (kept, _) = lock(&self.property_keeper).keep(descriptor);
            match properties.iter_mut().find(|p| p.name == kept.name) {
                Some(inherited) => *inherited = kept,
                None => properties.push(kept),
            }
        }
        let identity = declaration
            .identity
            .clone()
            .unwrap_or_else(|| parent.identity.clone());
        if let Identity::Fields(fields) = &identity {
            for field in fields {
                if !properties.iter().any(|p| &p.name == field) {
                    return Err(GraphObjectError::UnknownProperty {
                        owner: declaration.name.clone(),
                        property: field.clone(),
                    });
                }
            }
        }
        let entity_type = EntityType {
            name: declaration.name,
            tag,
            namespace,
            parent: Some(parent),
            identity,
            properties,
        };
        let (kept, previously_kept) = lock(&self.type_keeper).keep(entity_type);
        if !previously_kept {
            debug!(entity_type = %kept.name, tag = %kept.tag, "registered entity type");
        }
        Ok(kept)
    }
    fn describe(&self, owner: &str, tag: &Identifier, spec: PropertySpec) -> Result<PropertyDescriptor> {
        if let ValueKind::Reference(value_type) = &spec.kind {
            if value_type != owner {
                self.get(value_type)?;
            }
        }
        let predicate = match (&spec.inverse_of, spec.predicate) {
            (Some((other, property)), _) => {
                let other_type = self.get(other)?;
                let forward = other_type.property(property).ok_or_else(|| {
                    GraphObjectError::UnknownProperty {
                        owner: other.clone(),
                        property: property.clone(),
                    }
                })?;
                if forward.kind == ValueKind::Literal {
                    return Err(GraphObjectError::TypeMismatch {
                        property: forward.to_string(),
                        expected: "reference",
                        found: "literal",
                    });
                }
                forward.predicate.clone()
            }
            (None, Some(predicate)) => predicate,
            (None, None) => Identifier::new(format!("{}/{}", tag, spec.name)),
        };
        Ok(PropertyDescriptor {
            owner: owner.to_owned(),
            display_name: spec.display_name.unwrap_or_else(|| spec.name.clone()),
            name: spec.name,
            predicate,
            cardinality: spec.cardinality,
            kind: spec.kind,
            direction: spec.direction,
            inverse_of: spec.inverse_of,
            default: spec.default,
            description: spec.description,
        })
    }
    pub fn get(&self, name: &str) -> Result<Arc<EntityType>> {
        lock(&self.type_keeper)
            .kept
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| GraphObjectError::UnknownType(name.to_owned()))
    }
    pub fn resolve(&self, tag: &Identifier) -> Option<Arc<EntityType>> {
        lock(&self.type_keeper).lookup.get(tag).map(Arc::clone)
    }
    pub fn descriptor(&self, owner: &str, property: &str) -> Option<Arc<PropertyDescriptor>> {
        lock(&self.property_keeper)
            .kept
            .get(&(owner.to_owned(), property.to_owned()))
            .map(Arc::clone)
    }
    pub fn len(&self) -> usize {
        lock(&self.type_keeper).kept.len()
    }
    /// Picks the most specialized registered type among `candidates`.
    ///
    /// Unknown tags are skipped with a warning; if nothing is known the root
    /// type is returned.
    pub fn most_specific(&self, candidates: &[Identifier]) -> Arc<EntityType> {
        let mut candidates = candidates.to_vec();
        candidates.sort();
        candidates.dedup();
        let mut most_specific = self.root();
        let mut resolved = Vec::with_capacity(candidates.len());
        for tag in &candidates {
            match self.resolve(tag) {
                Some(t) => {
                    if t.is_subtype_of(&most_specific) {
                        most_specific = t.clone();
                    }
                    resolved.push(t);
                }
                None => warn!(
                    tag = %tag,
                    "no registered entity type for this tag; declare and register it to resolve objects to a more precise type"
                ),
            }
        }
        // unrelated candidates leave the choice to the order of their tags
        for t in resolved.iter().filter(|t| !most_specific.is_subtype_of(t)) {
            warn!(
                chosen = %most_specific,
                unrelated = %t,
                "type tags name unrelated types; the first in tag order wins"
            );
        }
        most_specific
    }
    /// Forgets every registered type and descriptor except the root.
    pub fn reset(&self) {
        *lock(&self.type_keeper) = TypeKeeper::default();
        *lock(&self.property_keeper) = PropertyKeeper::default();
        self.keep_root();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        let schema = Schema::new("http://example.org/schema/");
        schema
            .register(TypeDeclaration::new("Cell").property(PropertySpec::literal("name")))
            .expect("cell");
        schema
            .register(
                TypeDeclaration::new("Neuron")
                    .parent("Cell")
                    .property(PropertySpec::literal("kind").multiple()),
            )
            .expect("neuron");
        schema
    }

    #[test]
    fn descriptors_are_shared_and_inherited() {
        let schema = schema();
        let cell = schema.get("Cell").expect("cell");
        let neuron = schema.get("Neuron").expect("neuron");
        let from_cell = cell.property("name").expect("name");
        let from_neuron = neuron.property("name").expect("inherited name");
        assert!(Arc::ptr_eq(from_cell, from_neuron));
        assert_eq!(from_cell.predicate().as_str(), "http://example.org/schema/Cell/name");
        assert!(neuron.property("kind").expect("kind").multiple());
        assert!(cell.property("kind").is_none());
    }

    #[test]
    fn unrelated_candidates_resolve_by_tag_order() {
        let schema = schema();
        schema
            .register(TypeDeclaration::new("Muscle").parent("Cell"))
            .expect("muscle");
        let cell = schema.get("Cell").expect("cell").tag().clone();
        let muscle = schema.get("Muscle").expect("muscle").tag().clone();
        let neuron = schema.get("Neuron").expect("neuron").tag().clone();
        for candidates in [
            vec![cell.clone(), muscle.clone(), neuron.clone()],
            vec![neuron.clone(), cell.clone(), muscle.clone()],
            vec![neuron.clone(), muscle.clone()],
        ] {
            assert_eq!(schema.most_specific(&candidates).name(), "Muscle");
        }
        assert_eq!(schema.most_specific(&[cell, neuron]).name(), "Neuron");
    }

    #[test]
    fn registering_twice_keeps_the_first() {
        let schema = schema();
        let first = schema.get("Cell").expect("cell");
        let again = schema
            .register(TypeDeclaration::new("Cell").property(PropertySpec::literal("other")))
            .expect("again");
        assert!(Arc::ptr_eq(&first, &again));
        assert!(again.property("other").is_none());
    }

    #[test]
    fn most_specific_prefers_the_deepest_type() {
        let schema = schema();
        let cell = schema.get("Cell").expect("cell").tag().clone();
        let neuron = schema.get("Neuron").expect("neuron").tag().clone();
        let unknown = Identifier::from("http://example.org/schema/Unknown");
        let picked = schema.most_specific(&[neuron.clone(), cell.clone(), unknown.clone()]);
        assert_eq!(picked.name(), "Neuron");
        assert_eq!(schema.most_specific(&[unknown]).name(), ENTITY);
    }

    #[test]
    fn unknown_parent_and_identity_fields_are_rejected() {
        let schema = schema();
        assert!(matches!(
            schema.register(TypeDeclaration::new("X").parent("Nope")),
            Err(GraphObjectError::UnknownType(_))
        ));
        assert!(matches!(
            schema.register(TypeDeclaration::new("Y").identity(&["missing"])),
            Err(GraphObjectError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn reset_forgets_registered_types() {
        let schema = schema();
        schema.reset();
        assert_eq!(schema.len(), 1);
        assert!(schema.get("Cell").is_err());
        assert!(schema.descriptor("Cell", "name").is_none());
        assert_eq!(schema.root().name(), ENTITY);
    }
}
