//! Data sources and the records of how they were translated.
//!
//! A [`DataSource`] is an entity that knows the sources it was translated
//! from (`source`) and the [`Translation`](TRANSLATION) that produced it
//! (`translation`). A translation names its translator and the sources it
//! consumed, and is identified by exactly those, so re-running the same
//! translator over the same inputs reproduces the same identifiers.

use std::fmt;

use crate::context::Context;
use crate::entity::{Entity, Value};
use crate::error::{GraphObjectError, Result};
use crate::identifier::{self, Identifier};
use crate::schema::{PropertySpec, Schema, TypeDeclaration};
use crate::session::Session;

pub const DATA_SOURCE: &str = "DataSource";
pub const TRANSLATION: &str = "Translation";
pub const TRANSLATOR: &str = "DataTranslator";

/// Registers the built-in data source types.
pub fn register(schema: &Schema) -> Result<()> {
    schema.register(TypeDeclaration::new(TRANSLATOR).assigned())?;
    schema.register(
        TypeDeclaration::new(DATA_SOURCE)
            .assigned()
            .property(
                PropertySpec::reference("source", DATA_SOURCE)
                    .multiple()
                    .display_name("Input source")
                    .description("The data source that was translated into this one"),
            ),
    )?;
    schema.register(
        TypeDeclaration::new(TRANSLATION)
            .property(PropertySpec::reference("translator", TRANSLATOR))
            .property(PropertySpec::reference("source", DATA_SOURCE).multiple())
            .identity(&["translator", "source"]),
    )?;
    // DataSource and Translation refer to each other, so the translation
    // property lives on the derived subtype declared once both exist
    schema.register(
        TypeDeclaration::new(DERIVED_SOURCE)
            .parent(DATA_SOURCE)
            .property(
                PropertySpec::reference("translation", TRANSLATION)
                    .display_name("Translation")
                    .description(
                        "Information about the translation process that created this object",
                    ),
            )
            .identity(&["translation"]),
    )?;
    Ok(())
}

/// Parent of every type a translator can produce.
pub const DERIVED_SOURCE: &str = "DerivedDataSource";

/// A data source entity together with the key it is known by and the
/// contexts holding what was translated out of it.
#[derive(Clone, Debug)]
pub struct DataSource {
    entity: Entity,
    key: Option<String>,
    contexts: Vec<Context>,
}

impl DataSource {
    /// A raw source of the named type, identified by `key`.
    pub fn new(session: &Session, type_name: &str, key: &str) -> Result<Self> {
        let entity = session.create_with_key(type_name, key)?;
        let source = Self::from_entity(entity)?;
        Ok(Self {
            key: Some(key.to_owned()),
            ..source
        })
    }
    pub fn from_entity(entity: Entity) -> Result<Self> {
        let data_source = entity.session().schema().get(DATA_SOURCE)?;
        if !entity.entity_type().is_subtype_of(&data_source) {
            return Err(GraphObjectError::TypeMismatch {
                property: entity.entity_type().name().to_owned(),
                expected: "a data source type",
                found: "another entity type",
            });
        }
        Ok(Self {
            entity,
            key: None,
            contexts: Vec::new(),
        })
    }
    pub fn entity(&self) -> &Entity {
        &self.entity
    }
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
    pub fn identifier(&self) -> Option<Identifier> {
        self.entity.identifier()
    }
    /// The key if there is one, else the identifier.
    pub fn name(&self) -> Option<String> {
        self.key
            .clone()
            .or_else(|| self.identifier().map(|i| i.to_string()))
    }
    pub fn set(&self, property: &str, value: impl Into<Value>) -> Result<&Self> {
        self.entity.set(property, value)?;
        Ok(self)
    }
    pub fn sources(&self) -> Result<Vec<DataSource>> {
        self.entity
            .get("source")?
            .into_iter()
            .filter_map(|v| v.as_entity().cloned())
            .map(DataSource::from_entity)
            .collect()
    }
    pub fn translation(&self) -> Result<Option<Entity>> {
        if self.entity.entity_type().property("translation").is_none() {
            return Ok(None);
        }
        Ok(self
            .entity
            .one("translation")?
            .and_then(|v| v.as_entity().cloned()))
    }
    pub fn translator(&self) -> Result<Option<Entity>> {
        match self.translation()? {
            Some(translation) => Ok(translation
                .one("translator")?
                .and_then(|v| v.as_entity().cloned())),
            None => Ok(None),
        }
    }
    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }
    pub fn attach_context(&mut self, context: Context) {
        if !self
            .contexts
            .iter()
            .any(|c| c.identifier() == context.identifier())
        {
            self.contexts.push(context);
        }
    }
}
impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.entity.entity_type().name())?;
        for descriptor in self.entity.entity_type().properties() {
            let values = match self.entity.property(descriptor.name()) {
                Ok(property) => property.values(),
                Err(_) => Vec::new(),
            };
            let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            writeln!(f, "    {}: [{}]", descriptor.display_name(), values.join(", "))?;
        }
        Ok(())
    }
}

/// Produces a derived data source from realized ones.
///
/// Implementations build their output with [`TranslationRun::make_new_output`],
/// which records the consumed sources and the translation.
pub trait Translator {
    /// Inputs must be of this type or one of its subtypes.
    fn input_type(&self) -> &str {
        DATA_SOURCE
    }
    fn translate(&self, run: &TranslationRun, sources: &[DataSource]) -> Result<DataSource>;
}

/// What a translator gets to work with during one rule execution.
pub struct TranslationRun {
    session: Session,
    name: String,
    translator: Entity,
}

impl TranslationRun {
    pub fn new(session: &Session, translator: &str) -> Result<Self> {
        Ok(Self {
            session: session.clone(),
            name: translator.to_owned(),
            translator: session.create_with_key(TRANSLATOR, translator)?,
        })
    }
    pub fn session(&self) -> &Session {
        &self.session
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn translator(&self) -> &Entity {
        &self.translator
    }
    pub fn make_translation(&self, sources: &[DataSource]) -> Result<Entity> {
        let translation = self.session.create(TRANSLATION)?;
        translation.set("translator", &self.translator)?;
        for source in sources {
            translation.set("source", source.entity())?;
        }
        Ok(translation)
    }
    /// A new output of `output_type` whose `source` is exactly `sources`.
    pub fn make_new_output(&self, output_type: &str, sources: &[DataSource]) -> Result<DataSource> {
        let derived = self.session.schema().get(DERIVED_SOURCE)?;
        let entity = self.session.create(output_type)?;
        if !entity.entity_type().is_subtype_of(&derived) {
            return Err(GraphObjectError::TypeMismatch {
                property: output_type.to_owned(),
                expected: "a derived data source type",
                found: "another entity type",
            });
        }
        entity.set("translation", self.make_translation(sources)?)?;
        for source in sources {
            entity.set("source", source.entity())?;
        }
        DataSource::from_entity(entity)
    }
    /// A context named after this translator and `name`.
    pub fn new_context(&self, name: &str) -> Context {
        let namespace = format!("{}contexts/", self.session.schema().base());
        Context::new(identifier::direct(&namespace, &format!("{}/{}", self.name, name)))
    }
}
