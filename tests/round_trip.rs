use std::sync::Arc;

use chrono::NaiveDate;
use graphobject::memory::MemoryStore;
use graphobject::persist::SqliteStore;
use graphobject::schema::{PropertySpec, TypeDeclaration};
use graphobject::session::Session;
use graphobject::settings::DEFAULT_BASE_IRI;
use graphobject::term::{Decimal, Literal};
use graphobject::{Identifier, QuadStore, Value};

fn declare(session: &Session) {
    let schema = session.schema();
    schema
        .register(
            TypeDeclaration::new("Cell")
                .property(PropertySpec::literal("name"))
                .property(PropertySpec::literal("size"))
                .property(PropertySpec::literal("born"))
                .property(PropertySpec::literal("diameter"))
                .property(PropertySpec::literal("alive"))
                .property(PropertySpec::reference("partner", "Cell")),
        )
        .expect("cell");
    schema
        .register(
            TypeDeclaration::new("Neuron")
                .parent("Cell")
                .property(PropertySpec::literal("kind").multiple()),
        )
        .expect("neuron");
}

fn round_trip(store: Arc<dyn QuadStore>) {
    let session = Session::new(DEFAULT_BASE_IRI, store).expect("session");
    declare(&session);

    let aval = session.create_with_key("Neuron", "AVAL").expect("aval");
    let avar = session.create_with_key("Neuron", "AVAR").expect("avar");
    let born = NaiveDate::from_ymd_opt(1983, 3, 14).expect("date");
    aval.set("name", "AVAL")
        .and_then(|e| e.set("size", 42i64))
        .and_then(|e| e.set("born", Literal::from(born)))
        .and_then(|e| e.set("diameter", Literal::from(Decimal::from_str("2.5").expect("decimal"))))
        .and_then(|e| e.set("alive", true))
        .and_then(|e| e.set("kind", "motor"))
        .and_then(|e| e.set("kind", "interneuron"))
        .and_then(|e| e.set("partner", &avar))
        .expect("set");
    avar.set("name", "AVAR").expect("name");

    let context = session.context("http://example.org/data");
    context.stage(&aval);
    let report = context.save(session.store().as_ref()).expect("save");
    assert_eq!(report.entities, 2);

    // a fresh handle has nothing resident and reads from the store
    let id = aval.identifier().expect("defined");
    let loaded = session.load(id.clone()).expect("load");
    assert_eq!(loaded.entity_type().name(), "Neuron");
    assert_eq!(loaded.identifier(), Some(id));
    for name in ["name", "size", "born", "diameter", "alive", "kind"] {
        assert_eq!(
            loaded.get(name).expect("stored"),
            aval.get(name).expect("resident"),
            "property {}",
            name
        );
    }
    assert_eq!(loaded.one("size").expect("size"), Some(Value::from(42i64)));
    assert_eq!(
        loaded.one("born").expect("born"),
        Some(Value::Literal(Literal::Date(born)))
    );

    // the partner was declared as a Cell but resolves to its stored type
    let partner = loaded
        .one("partner")
        .expect("partner")
        .and_then(|v| v.as_entity().cloned())
        .expect("an entity");
    assert_eq!(partner.identifier(), avar.identifier());
    assert_eq!(partner.entity_type().name(), "Neuron");
    assert_eq!(partner.one("name").expect("name"), Some(Value::from("AVAR")));
}

#[test]
fn entities_survive_a_memory_store() {
    round_trip(Arc::new(MemoryStore::new()));
}

#[test]
fn entities_survive_a_sqlite_store() {
    round_trip(Arc::new(SqliteStore::open_in_memory().expect("sqlite")));
}

#[test]
fn unknown_type_tags_fall_back_to_what_is_known() {
    let session = Session::in_memory().expect("session");
    declare(&session);
    let graph = Identifier::from("http://example.org/g");
    let rdf_type = Identifier::from(graphobject::schema::RDF_TYPE);
    let thing = Identifier::from("http://example.org/thing");
    session
        .store()
        .add(&[graphobject::Quad::new(
            thing.clone(),
            rdf_type,
            Identifier::from("http://example.org/schema/Unregistered"),
            graph,
        )])
        .expect("add");
    let loaded = session.load(thing).expect("load");
    assert_eq!(loaded.entity_type().name(), graphobject::schema::ENTITY);
}

#[test]
fn reading_an_undefined_entity_gives_nothing() {
    let session = Session::in_memory().expect("session");
    declare(&session);
    let anonymous = session.create("Cell").expect("cell");
    assert!(anonymous.get("name").expect("name").is_empty());
    assert_eq!(anonymous.one("partner").expect("partner"), None);
}
