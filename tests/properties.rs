use graphobject::property::Reading;
use graphobject::schema::{PropertySpec, TypeDeclaration};
use graphobject::session::Session;
use graphobject::term::Literal;
use graphobject::{GraphObjectError, Identifier, Quad, Value};

fn session() -> Session {
    let session = Session::in_memory().expect("session");
    let schema = session.schema();
    schema
        .register(
            TypeDeclaration::new("Cell")
                .property(PropertySpec::literal("name"))
                .property(PropertySpec::literal("receptor").multiple())
                .property(
                    PropertySpec::literal("lineage")
                        .default_value("unknown")
                        .display_name("Cell lineage"),
                ),
        )
        .expect("cell");
    schema
        .register(
            TypeDeclaration::new("Network")
                .property(PropertySpec::reference("cells", "Cell").multiple())
                .property(PropertySpec::reference("hub", "Cell")),
        )
        .expect("network");
    schema
        .register(
            TypeDeclaration::new("Neuron")
                .parent("Cell")
                .property(PropertySpec::inverse("networks", "Network", "cells")),
        )
        .expect("neuron");
    session
}

fn literals(values: &[Value]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn a_single_valued_property_holds_at_most_one_value() {
    let session = session();
    let cell = session.create_with_key("Cell", "ADAL").expect("cell");
    let name = cell.property("name").expect("name");
    name.set("first").expect("first");
    name.set("second").expect("second");
    assert_eq!(literals(&name.values()), vec!["second"]);
    name.unset("second").expect("unset");
    assert!(name.values().is_empty());
    assert_eq!(name.read().expect("read"), Reading::One(None));
}

#[test]
fn a_multi_valued_property_is_sorted_and_deduplicated() {
    let session = session();
    let cell = session.create_with_key("Cell", "ADAL").expect("cell");
    let receptor = cell.property("receptor").expect("receptor");
    for r in ["GLR-1", "ACR-2", "NMR-1", "ACR-2"] {
        receptor.set(r).expect("set");
    }
    assert_eq!(literals(&receptor.values()), vec!["ACR-2", "GLR-1", "NMR-1"]);
    receptor.unset("GLR-1").expect("unset");
    assert_eq!(literals(&receptor.values()), vec!["ACR-2", "NMR-1"]);
    match receptor.unset("DEG-1") {
        Err(GraphObjectError::ValueNotFound { property, value }) => {
            assert_eq!(property, "Cell.receptor");
            assert_eq!(value, "DEG-1");
        }
        other => panic!("expected ValueNotFound, got {:?}", other),
    }
    assert_eq!(literals(&receptor.values()), vec!["ACR-2", "NMR-1"]);
}

#[test]
fn the_wrong_value_kind_is_rejected_without_changes() {
    let session = session();
    let cell = session.create_with_key("Cell", "ADAL").expect("cell");
    let network = session.create_with_key("Network", "head").expect("network");
    assert!(matches!(
        network.set("cells", "ADAL"),
        Err(GraphObjectError::TypeMismatch { expected: "reference", found: "literal", .. })
    ));
    assert!(matches!(
        cell.set("name", &network),
        Err(GraphObjectError::TypeMismatch { expected: "literal", found: "reference", .. })
    ));
    assert!(network.property("cells").expect("cells").values().is_empty());
    assert!(cell.property("name").expect("name").values().is_empty());
    assert!(matches!(
        cell.property("colour"),
        Err(GraphObjectError::UnknownProperty { .. })
    ));
}

#[test]
fn write_chains_and_read_follows_cardinality() {
    let session = session();
    let cell = session.create_with_key("Cell", "ADAL").expect("cell");
    cell.property("receptor")
        .expect("receptor")
        .write("B")
        .and_then(|p| p.write("A"))
        .expect("write");
    match cell.property("receptor").expect("receptor").read().expect("read") {
        Reading::Many(values) => assert_eq!(literals(&values), vec!["A", "B"]),
        other => panic!("expected many values, got {:?}", other),
    }
    cell.set("name", "ADAL").expect("name");
    assert_eq!(
        cell.property("name").expect("name").read().expect("read"),
        Reading::One(Some(Value::Literal(Literal::from("ADAL"))))
    );
}

#[test]
fn declared_defaults_are_set_on_creation() {
    let session = session();
    let cell = session.create("Cell").expect("cell");
    assert_eq!(
        cell.one("lineage").expect("lineage"),
        Some(Value::from("unknown"))
    );
    let descriptor = session.schema().descriptor("Cell", "lineage").expect("descriptor");
    assert_eq!(descriptor.display_name(), "Cell lineage");
    assert_eq!(
        session.schema().descriptor("Cell", "name").expect("name").display_name(),
        "name"
    );
}

#[test]
fn reference_values_know_their_owners() {
    let session = session();
    let network = session.create_with_key("Network", "head").expect("network");
    let adal = session.create_with_key("Cell", "ADAL").expect("adal");
    network.set("cells", &adal).expect("cells");
    network.set("hub", &adal).expect("hub");
    assert_eq!(adal.owners("cells"), vec![network.clone()]);
    assert_eq!(adal.owners("hub"), vec![network.clone()]);

    let other = session.create_with_key("Cell", "ADAR").expect("other");
    network.set("hub", &other).expect("replace hub");
    assert!(adal.owners("hub").is_empty());
    assert_eq!(other.owners("hub"), vec![network.clone()]);

    network.unset("cells", &adal).expect("unset");
    assert!(adal.owners("cells").is_empty());
}

#[test]
fn inverse_properties_read_and_write_through_the_forward_side() {
    let session = session();
    let head = session.create_with_key("Network", "head").expect("head");
    let tail = session.create_with_key("Network", "tail").expect("tail");
    let aval = session.create_with_key("Neuron", "AVAL").expect("aval");
    head.set("cells", &aval).expect("forward");
    aval.set("networks", &tail).expect("inverse");

    let networks = aval.property("networks").expect("networks").values();
    assert_eq!(networks, vec![Value::from(&head), Value::from(&tail)]);
    assert!(tail.property("cells").expect("cells").has_value(&Value::from(&aval)));

    aval.unset("networks", &head).expect("unset inverse");
    assert!(head.property("cells").expect("cells").values().is_empty());
}

#[test]
fn reference_values_are_ordered_by_identifier() {
    let session = session();
    let network = session.create_with_key("Network", "head").expect("network");
    let b = session.create_with_key("Cell", "B").expect("b");
    let a = session.create_with_key("Cell", "A").expect("a");
    network.set("cells", &b).expect("b");
    network.set("cells", &a).expect("a");
    network.set("cells", &b).expect("b again");
    let ordered: Vec<String> = network
        .property("cells")
        .expect("cells")
        .values()
        .iter()
        .filter_map(|v| v.as_entity().and_then(|e| e.identifier()))
        .map(|i| i.to_string())
        .collect();
    assert_eq!(
        ordered,
        vec![
            "http://openworm.org/entities/Cell/A".to_string(),
            "http://openworm.org/entities/Cell/B".to_string()
        ]
    );
}

#[test]
fn a_loaded_entity_reads_inverse_values_from_the_store() {
    let session = session();
    let head = session.create_with_key("Network", "head").expect("head");
    let aval = session.create_with_key("Neuron", "AVAL").expect("aval");
    head.set("cells", &aval).expect("cells");
    let context = session.context("http://example.org/data");
    context.stage(&head);
    context.save(session.store().as_ref()).expect("save");

    // nothing is resident on a loaded handle, so the store answers
    let loaded = session
        .load(aval.identifier().expect("defined"))
        .expect("load");
    let networks = loaded.get("networks").expect("networks");
    assert_eq!(networks, vec![Value::from(&head)]);
    let network = networks[0].as_entity().expect("entity");
    assert_eq!(network.entity_type().name(), "Network");
    assert_eq!(network.identifier(), head.identifier());
}

#[test]
fn every_fetch_sees_the_store_as_it_is_then() {
    let session = session();
    let cell = session.create_with_key("Cell", "ADAL").expect("cell");
    cell.set("receptor", "GLR-1").expect("receptor");
    let context = session.context("http://example.org/data");
    context.stage(&cell);
    context.save(session.store().as_ref()).expect("save");

    let id = cell.identifier().expect("defined");
    let loaded = session.load(id.clone()).expect("load");
    let receptors = loaded.property("receptor").expect("receptor").get();
    assert_eq!(literals(&receptors.fetch().expect("first")), vec!["GLR-1"]);

    let predicate = session
        .schema()
        .descriptor("Cell", "receptor")
        .expect("descriptor")
        .predicate()
        .clone();
    session
        .store()
        .add(&[Quad::new(
            id,
            predicate,
            Literal::from("ACR-2"),
            Identifier::from("http://example.org/later"),
        )])
        .expect("add");
    assert_eq!(
        literals(&receptors.fetch().expect("second")),
        vec!["ACR-2", "GLR-1"]
    );
}
