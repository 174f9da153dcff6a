//! Fixpoint execution of translation rules.
//!
//! Rules are scanned pass after pass. A rule runs in the first pass in which
//! all of its inputs name realized sources; what it produces is visible to
//! the rules after it, in the same pass and in later ones. The scan stops
//! after a pass that ran nothing, and every rule still waiting is reported
//! as unresolved. This needs no dependency graph up front, and a rule
//! waiting on its own output simply never runs.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde::{Serialize, Serializer};
use tracing::{debug, error, info, warn};

use crate::datasource::{DataSource, TranslationRun, Translator};
use crate::error::{GraphObjectError, Result};
use crate::identifier::Identifier;
use crate::session::Session;

/// `inputs -> translator -> output`. Without an output key the produced
/// source is known by its own key or identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub inputs: Vec<String>,
    pub translator: String,
    pub output: Option<String>,
}

impl Rule {
    pub fn new(inputs: &[&str], translator: &str) -> Self {
        Self {
            inputs: inputs.iter().map(|i| i.to_string()).collect(),
            translator: translator.to_owned(),
            output: None,
        }
    }
    pub fn output(mut self, key: &str) -> Self {
        self.output = Some(key.to_owned());
        self
    }
}
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] -> {}", self.inputs.join(", "), self.translator)?;
        if let Some(output) = &self.output {
            write!(f, " -> {}", output)?;
        }
        Ok(())
    }
}

fn display<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Debug, Serialize)]
pub struct RuleFailure {
    #[serde(serialize_with = "display")]
    pub rule: Rule,
    #[serde(serialize_with = "display")]
    pub error: GraphObjectError,
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub passes: usize,
    /// Keys realized by this run, in the order they were realized.
    pub realized: Vec<String>,
    pub failures: Vec<RuleFailure>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

type Factory = Box<dyn Fn() -> Result<Box<dyn Translator>>>;

pub struct Scheduler {
    session: Session,
    sources: BTreeMap<String, DataSource>,
    factories: HashMap<String, Factory>,
    translators: HashMap<String, Box<dyn Translator>>,
    rules: Vec<Rule>,
}

impl Scheduler {
    pub fn new(session: &Session) -> Self {
        Self {
            session: session.clone(),
            sources: BTreeMap::new(),
            factories: HashMap::new(),
            translators: HashMap::new(),
            rules: Vec::new(),
        }
    }
    pub fn session(&self) -> &Session {
        &self.session
    }
    /// Makes a source available under its key, or its identifier without one.
    pub fn add_source(&mut self, source: DataSource) -> Result<()> {
        let key = source.name().ok_or_else(|| {
            GraphObjectError::UndefinedIdentifier(source.entity().to_string())
        })?;
        self.sources.insert(key, source);
        Ok(())
    }
    /// Registers how to build a translator. It is built at most once, the
    /// first time a runnable rule names it.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Result<Box<dyn Translator>> + 'static,
    {
        self.factories.insert(name.to_owned(), Box::new(factory));
    }
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }
    pub fn source(&self, key: &str) -> Option<&DataSource> {
        self.sources.get(key)
    }
    pub fn sources(&self) -> &BTreeMap<String, DataSource> {
        &self.sources
    }
    pub fn pending(&self) -> &[Rule] {
        &self.rules
    }

    /// Runs rules until a pass makes no progress.
    pub fn run(&mut self) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::default();
        loop {
            report.passes += 1;
            let pending = std::mem::take(&mut self.rules);
            let mut ran = 0;
            for rule in pending {
                if !rule.inputs.iter().all(|i| self.sources.contains_key(i)) {
                    self.rules.push(rule);
                    continue;
                }
                ran += 1;
                match self.execute(&rule) {
                    Ok(key) => {
                        debug!(rule = %rule, output = %key, "rule realized");
                        report.realized.push(key);
                    }
                    Err(e) => {
                        error!(rule = %rule, inputs = ?rule.inputs, error = %e, "rule failed");
                        report.failures.push(RuleFailure { rule, error: e });
                    }
                }
            }
            info!(pass = report.passes, ran, waiting = self.rules.len(), "scheduler pass");
            if ran == 0 {
                break;
            }
        }
        for rule in std::mem::take(&mut self.rules) {
            let missing: Vec<String> = rule
                .inputs
                .iter()
                .filter(|i| !self.sources.contains_key(*i))
                .cloned()
                .collect();
            warn!(rule = %rule, missing = ?missing, "rule never became runnable");
            report.failures.push(RuleFailure {
                error: GraphObjectError::UnresolvedDependency {
                    rule: rule.to_string(),
                    missing,
                },
                rule,
            });
        }
        info!(
            passes = report.passes,
            realized = report.realized.len(),
            failed = report.failures.len(),
            ms = started.elapsed().as_secs_f64() * 1000.0,
            "scheduler finished"
        );
        report
    }

    fn translator(&mut self, name: &str) -> Result<&dyn Translator> {
        if !self.translators.contains_key(name) {
            let factory = self.factories.get(name).ok_or_else(|| GraphObjectError::TranslatorFailure {
                translator: name.to_owned(),
                inputs: Vec::new(),
                message: "no translator registered under this name".to_owned(),
            })?;
            let translator = factory()?;
            debug!(translator = name, "translator instantiated");
            self.translators.insert(name.to_owned(), translator);
        }
        self.translators
            .get(name)
            .map(|t| t.as_ref())
            .ok_or_else(|| GraphObjectError::TranslatorFailure {
                translator: name.to_owned(),
                inputs: Vec::new(),
                message: "translator went missing from the cache".to_owned(),
            })
    }

    fn execute(&mut self, rule: &Rule) -> Result<String> {
        let failure = |message: String| GraphObjectError::TranslatorFailure {
            translator: rule.translator.clone(),
            inputs: rule.inputs.clone(),
            message,
        };
        let inputs: Vec<DataSource> = rule
            .inputs
            .iter()
            .filter_map(|i| self.sources.get(i).cloned())
            .collect();
        let session = self.session.clone();
        let translator = self.translator(&rule.translator)?;
        let input_type = session.schema().get(translator.input_type())?;
        if let Some(wrong) = inputs
            .iter()
            .find(|i| !i.entity().entity_type().is_subtype_of(&input_type))
        {
            return Err(failure(format!(
                "input {} is not a {}",
                wrong.entity(),
                input_type
            )));
        }
        let run = TranslationRun::new(&session, &rule.translator)?;
        let output = match panic::catch_unwind(AssertUnwindSafe(|| translator.translate(&run, &inputs))) {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(failure(e.to_string())),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "translator panicked".to_owned());
                return Err(failure(format!("panicked: {}", message)));
            }
        };
        verify(&run, &inputs, &output).map_err(failure)?;
        let key = match (&rule.output, output.name()) {
            (Some(key), _) => key.clone(),
            (None, Some(name)) => name,
            (None, None) => {
                return Err(GraphObjectError::UndefinedIdentifier(output.entity().to_string()));
            }
        };
        self.sources.insert(key.clone(), output);
        Ok(key)
    }
}

// the output must record exactly the consumed inputs and this translator
fn verify(run: &TranslationRun, inputs: &[DataSource], output: &DataSource) -> std::result::Result<(), String> {
    let mut expected: Vec<Option<Identifier>> = inputs.iter().map(|i| i.identifier()).collect();
    expected.sort();
    expected.dedup();
    let mut recorded: Vec<Option<Identifier>> = output
        .sources()
        .map_err(|e| e.to_string())?
        .iter()
        .map(|s| s.identifier())
        .collect();
    recorded.sort();
    if expected != recorded {
        return Err("output does not record exactly the consumed sources".to_owned());
    }
    let translator = output.translator().map_err(|e| e.to_string())?;
    if translator.and_then(|t| t.identifier()) != run.translator().identifier() {
        return Err("output translation does not name its translator".to_owned());
    }
    Ok(())
}
