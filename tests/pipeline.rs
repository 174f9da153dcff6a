use std::fs;

use graphobject::datasource::{DATA_SOURCE, DERIVED_SOURCE, TranslationRun, Translator};
use graphobject::schema::{PropertySpec, TypeDeclaration};
use graphobject::session::Session;
use graphobject::{
    DataSource, GraphObjectError, Pipeline, QuadStore, Result, Rule, SavePolicy, Scheduler, Settings,
};

// produces its output together with a context holding one cell
struct CellReader;

impl Translator for CellReader {
    fn translate(&self, run: &TranslationRun, sources: &[DataSource]) -> Result<DataSource> {
        let mut output = run.make_new_output(DERIVED_SOURCE, sources)?;
        let context = run.new_context("cells");
        let cell = run.session().create_with_key("Cell", "ADAL")?;
        cell.set("name", "ADAL")?;
        context.stage(&cell);
        output.attach_context(context);
        Ok(output)
    }
}

fn scheduler(session: &Session, with_failure: bool) -> Scheduler {
    session
        .schema()
        .register(TypeDeclaration::new("Cell").property(PropertySpec::literal("name")))
        .expect("cell");
    let mut scheduler = Scheduler::new(session);
    scheduler
        .add_source(DataSource::new(session, DATA_SOURCE, "a").expect("a"))
        .expect("add a");
    scheduler.register("cells", || Ok(Box::new(CellReader)));
    scheduler.add_rule(Rule::new(&["a"], "cells").output("b"));
    if with_failure {
        scheduler.add_rule(Rule::new(&["x"], "cells").output("y"));
    }
    scheduler
}

#[test]
fn a_partial_run_saves_what_was_realized() {
    let session = Session::in_memory().expect("session");
    let mut scheduler = scheduler(&session, true);
    let pipeline = Pipeline::new(&session, session.context("http://example.org/aggregate"));
    let report = pipeline.run(&mut scheduler).expect("run");
    assert_eq!(report.run.failures.len(), 1);
    // a, b, the translation, the translator, and the cell from the attached context
    assert_eq!(report.save.entities, 5);
    assert_eq!(report.save.triples, session.store().len().expect("len"));
    assert_eq!(report.exported, None);
    assert_eq!(pipeline.aggregate().imports().len(), 1);
}

#[test]
fn all_or_nothing_refuses_an_incomplete_run() {
    let session = Session::in_memory().expect("session");
    let mut scheduler = scheduler(&session, true);
    let pipeline = Pipeline::new(&session, session.context("http://example.org/aggregate"))
        .policy(SavePolicy::AllOrNothing);
    assert!(matches!(
        pipeline.run(&mut scheduler),
        Err(GraphObjectError::Incomplete { failed: 1 })
    ));
    assert_eq!(session.store().len().expect("len"), 0);
}

#[test]
fn a_complete_run_is_exported() {
    let path = "test_graphobject_pipeline.nq";
    let _ = fs::remove_file(path);
    let settings = Settings {
        save_policy: SavePolicy::AllOrNothing,
        export_path: Some(path.to_owned()),
        ..Settings::default()
    };
    let session = Session::open(&settings).expect("session");
    let mut scheduler = scheduler(&session, false);
    let pipeline = Pipeline::from_settings(
        &session,
        session.context("http://example.org/aggregate"),
        &settings,
    );
    let report = pipeline.run(&mut scheduler).expect("run");
    assert!(report.run.succeeded());
    let written = fs::read_to_string(path).expect("export");
    let lines = written.lines().count();
    assert_eq!(report.exported, Some(lines));
    assert_eq!(lines, session.store().len().expect("len"));
    assert!(written.contains("<http://example.org/aggregate>"));
    fs::remove_file(path).expect("cleanup");
}
