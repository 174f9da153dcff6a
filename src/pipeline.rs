use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::context::{Context, SaveReport};
use crate::error::{GraphObjectError, Result};
use crate::nquads;
use crate::scheduler::{RunReport, Scheduler};
use crate::session::Session;
use crate::settings::{SavePolicy, Settings};

#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub run: RunReport,
    pub save: SaveReport,
    /// Statements written to the export file, if one was configured.
    pub exported: Option<usize>,
}

/// Runs a scheduler to completion and persists what it realized.
///
/// Every realized source is staged into the aggregate context, and every
/// context a translator attached to a source is imported by it. The
/// aggregate is then saved into the session store and, when an export path
/// is set, the store is written out as N-Quads.
pub struct Pipeline {
    session: Session,
    aggregate: Context,
    policy: SavePolicy,
    export_path: Option<String>,
}

impl Pipeline {
    pub fn new(session: &Session, aggregate: Context) -> Self {
        Self {
            session: session.clone(),
            aggregate,
            policy: SavePolicy::default(),
            export_path: None,
        }
    }
    pub fn from_settings(session: &Session, aggregate: Context, settings: &Settings) -> Self {
        Self::new(session, aggregate)
            .policy(settings.save_policy)
            .export_path(settings.export_path.as_deref())
    }
    pub fn policy(mut self, policy: SavePolicy) -> Self {
        self.policy = policy;
        self
    }
    pub fn export_path(mut self, path: Option<&str>) -> Self {
        self.export_path = path.map(str::to_owned);
        self
    }
    pub fn aggregate(&self) -> &Context {
        &self.aggregate
    }

    pub fn run(&self, scheduler: &mut Scheduler) -> Result<PipelineReport> {
        let started = Instant::now();
        let run = scheduler.run();
        if !run.succeeded() {
            match self.policy {
                SavePolicy::AllOrNothing => {
                    warn!(failed = run.failures.len(), "not saving an incomplete run");
                    return Err(GraphObjectError::Incomplete {
                        failed: run.failures.len(),
                    });
                }
                SavePolicy::Partial => warn!(
                    failed = run.failures.len(),
                    "saving what was realized despite failed rules"
                ),
            }
        }
        for source in scheduler.sources().values() {
            self.aggregate.stage(source.entity());
            for context in source.contexts() {
                self.aggregate.add_import(context);
            }
        }
        let save = self.aggregate.save(self.session.store().as_ref())?;
        let exported = match &self.export_path {
            Some(path) => Some(nquads::export_file(self.session.store().as_ref(), path)?),
            None => None,
        };
        info!(
            realized = run.realized.len(),
            triples = save.triples,
            ms = started.elapsed().as_secs_f64() * 1000.0,
            "pipeline finished"
        );
        Ok(PipelineReport {
            run,
            save,
            exported,
        })
    }
}
