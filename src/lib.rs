//! graphobject – typed entities stored as statements in a quad store.
//!
//! Entities are declared through a [`schema::Schema`] and populated through
//! property handles. Every entity is eventually represented as statements
//! `(subject, predicate, object, context)`:
//! * An [`entity::Entity`] is typed, owns one instance per declared property,
//!   and is *defined* once it has an [`identifier::Identifier`].
//! * Identifiers are either assigned (a full IRI or a key) or derived from the
//!   values of the defining fields of the type (see [`identifier::derive`]).
//! * A [`property::PropertyHandle`] writes values (checked against the
//!   declared cardinality and value kind) and reads them back, from memory
//!   when resident or from the store otherwise.
//! * A [`context::Context`] is a named graph. Entities are staged into it and
//!   it imports other contexts; saving writes the whole import closure.
//!
//! On top of this sits the translation machinery: a
//! [`datasource::DataSource`] is an entity that records which sources it was
//! translated from and by which translator, and a
//! [`scheduler::Scheduler`] runs `(inputs -> translator -> output)` rules
//! until nothing more can run. A [`pipeline::Pipeline`] saves and exports
//! what the scheduler realized.
//!
//! ## Modules
//! * [`identifier`] – identifiers and their derivation.
//! * [`term`] – literal datatypes and statement terms.
//! * [`schema`] – entity types and their property descriptors.
//! * [`entity`] / [`property`] – entity instances and property access.
//! * [`store`] – the [`store::QuadStore`] boundary, implemented by
//!   [`memory::MemoryStore`] and [`persist::SqliteStore`].
//! * [`context`] – named graphs with imports.
//! * [`datasource`] / [`scheduler`] / [`pipeline`] – translation of sources.
//! * [`nquads`] – N-Quads import and export.
//! * [`settings`] – layered configuration.
//!
//! ## Quick Start
//! ```
//! use graphobject::schema::{PropertySpec, TypeDeclaration};
//! use graphobject::session::Session;
//! let session = Session::in_memory().expect("session");
//! session
//!     .schema()
//!     .register(TypeDeclaration::new("Neuron").property(PropertySpec::literal("name")))
//!     .expect("register");
//! let neuron = session.create_with_key("Neuron", "AVAL").expect("neuron");
//! neuron.set("name", "AVAL").expect("set");
//! let context = session.context("http://example.org/ctx");
//! context.stage(&neuron);
//! let report = context.save(session.store().as_ref()).expect("save");
//! assert_eq!(report.entities, 1);
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod context;
pub mod datasource;
pub mod entity;
pub mod error;
pub mod identifier;
pub mod memory;
pub mod nquads;
pub mod persist;
pub mod pipeline;
pub mod property;
pub mod scheduler;
pub mod schema;
pub mod session;
pub mod settings;
pub mod store;
pub mod term;

pub use context::{Context, SaveReport};
pub use datasource::{DataSource, TranslationRun, Translator};
pub use entity::{Entity, Value};
pub use error::{GraphObjectError, Result};
pub use identifier::Identifier;
pub use pipeline::{Pipeline, PipelineReport};
pub use scheduler::{Rule, RunReport, Scheduler};
pub use schema::{PropertySpec, Schema, TypeDeclaration};
pub use session::Session;
pub use settings::{SavePolicy, Settings};
pub use store::{Quad, QuadPattern, QuadStore};
pub use term::{Literal, Term};

/// Locks a mutex, carrying on with the inner state if another thread
/// panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
