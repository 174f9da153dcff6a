use std::collections::BTreeSet;

use graphobject::schema::{PropertySpec, TypeDeclaration};
use graphobject::session::Session;
use graphobject::{Context, GraphObjectError, Identifier, QuadPattern, QuadStore};

fn session() -> Session {
    let session = Session::in_memory().expect("session");
    session
        .schema()
        .register(
            TypeDeclaration::new("Cell")
                .property(PropertySpec::literal("name"))
                .property(PropertySpec::reference("partner", "Cell")),
        )
        .expect("cell");
    session
        .schema()
        .register(
            TypeDeclaration::new("Connection")
                .property(PropertySpec::reference("pre", "Cell"))
                .property(PropertySpec::reference("post", "Cell"))
                .identity(&["pre", "post"]),
        )
        .expect("connection");
    session
}

// each named cell is three statements: two type tags and its name
fn staged_cell(session: &Session, context: &Context, name: &str) {
    let cell = session.create_with_key("Cell", name).expect("cell");
    cell.set("name", name).expect("name");
    context.stage(&cell);
}

// A imports B and S, S imports B, B imports C
fn diamond(session: &Session) -> Context {
    let a = session.context("http://example.org/A");
    let b = session.context("http://example.org/B");
    let c = session.context("http://example.org/C");
    let s = session.context("http://example.org/S");
    a.add_import(&b);
    a.add_import(&s);
    s.add_import(&b);
    b.add_import(&c);
    staged_cell(session, &a, "a");
    staged_cell(session, &b, "b");
    staged_cell(session, &c, "c");
    staged_cell(session, &s, "s");
    a
}

#[test]
fn saving_covers_the_import_closure_once() {
    let session = session();
    let a = diamond(&session);
    let closure: Vec<String> = a.closure().iter().map(|c| c.to_string()).collect();
    assert_eq!(closure.len(), 4);
    assert_eq!(a.size(), 4);

    let report = a.save(session.store().as_ref()).expect("save");
    assert_eq!(report.entities, 4);
    assert_eq!(report.triples, 12);
    assert_eq!(report.added, 12);
    assert_eq!(session.store().len().expect("len"), 12);
    for graph in ["A", "B", "C", "S"] {
        let in_graph = session
            .store()
            .quads(&QuadPattern::new().graph(Identifier::from(format!("http://example.org/{}", graph))))
            .expect("graph");
        assert_eq!(in_graph.len(), 3, "graph {}", graph);
    }
}

#[test]
fn saving_again_emits_the_same_statements() {
    let session = session();
    let a = diamond(&session);
    let first = a.quads().expect("quads");
    a.save(session.store().as_ref()).expect("save");
    let again = a.save(session.store().as_ref()).expect("save again");
    assert_eq!(again.added, 0);
    assert_eq!(again.triples, 12);
    assert_eq!(a.quads().expect("quads"), first);
    let stored: BTreeSet<_> = session
        .store()
        .quads(&QuadPattern::new())
        .expect("all")
        .into_iter()
        .collect();
    assert_eq!(stored, first);
}

#[test]
fn an_import_cycle_terminates() {
    let session = session();
    let a = diamond(&session);
    let c = a
        .closure()
        .into_iter()
        .find(|c| c.identifier().as_str() == "http://example.org/C")
        .expect("c");
    c.add_import(&a);
    assert_eq!(a.closure().len(), 4);
    assert_eq!(c.closure().len(), 4);
    let report = a.save(session.store().as_ref()).expect("save");
    assert_eq!(report.triples, 12);
}

#[test]
fn referenced_entities_are_staged_along() {
    let session = session();
    let context = session.context("http://example.org/A");
    let adal = session.create_with_key("Cell", "ADAL").expect("adal");
    let adar = session.create_with_key("Cell", "ADAR").expect("adar");
    adal.set("partner", &adar).expect("partner");
    adar.set("partner", &adal).expect("partner back");
    context.stage(&adal);
    assert_eq!(context.staged().len(), 2);
    let report = context.save(session.store().as_ref()).expect("save");
    assert_eq!(report.entities, 2);
    // two type tags each plus one partner each
    assert_eq!(report.triples, 6);
}

#[test]
fn an_undefined_entity_fails_the_whole_save() {
    let session = session();
    let context = session.context("http://example.org/A");
    staged_cell(&session, &context, "ADAL");
    let adal = session.create_with_key("Cell", "ADAL").expect("adal");
    let connection = session.create("Connection").expect("connection");
    connection.set("pre", &adal).expect("pre");
    context.stage(&connection);
    assert!(matches!(
        context.save(session.store().as_ref()),
        Err(GraphObjectError::UndefinedIdentifier(_))
    ));
    assert_eq!(session.store().len().expect("len"), 0);
}

#[test]
fn restaging_a_large_population_keeps_each_entity_once() {
    let session = session();
    let context = session.context("http://example.org/population");
    let cells: Vec<_> = (0..5000)
        .map(|n| {
            let cell = session
                .create_with_key("Cell", &format!("cell-{}", n))
                .expect("cell");
            if n > 0 {
                cell.set("partner", &session.create_with_key("Cell", "hub").expect("hub"))
                    .expect("partner");
            }
            cell
        })
        .collect();
    for cell in cells.iter().chain(cells.iter()) {
        context.stage(cell);
    }
    // every partner is a distinct handle on the same hub
    assert_eq!(context.staged().len(), 5000 + 4999);
    assert_eq!(context.size(), 5000 + 4999);
    let report = context.save(session.store().as_ref()).expect("save");
    assert_eq!(report.entities, 5001);
}
