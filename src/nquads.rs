//! N-Quads import and export.
//!
//! Each line is `<subject> <predicate> <object> <graph> .` where the object is
//! an IRI or a literal with an optional datatype or language tag. Lines
//! without a graph are read into a caller-supplied default graph. Blank
//! nodes are not supported.

use std::fs;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{GraphObjectError, Result};
use crate::identifier::Identifier;
use crate::store::{Quad, QuadPattern, QuadStore};
use crate::term::{Literal, Term, XSD_STRING, unescape};

lazy_static! {
    static ref STATEMENT: Regex = Regex::new(
        r#"^<([^>]*)>\s+<([^>]*)>\s+(?:<([^>]*)>|"((?:[^"\\]|\\.)*)"(?:\^\^<([^>]*)>|@([A-Za-z0-9-]+))?)(?:\s+<([^>]*)>)?\s*\.$"#
    )
    .expect("statement pattern compiles");
}

/// Parses one line. Blank lines and comments give `None`.
pub fn parse_line(line: &str, default_graph: &Identifier) -> Result<Option<Quad>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let captures = STATEMENT.captures(line).ok_or_else(|| GraphObjectError::Parse {
        message: format!("not an N-Quads statement: {}", line),
        line: None,
    })?;
    let group = |i: usize| captures.get(i).map(|m| m.as_str());
    let object = match (group(3), group(4)) {
        (Some(iri), _) => Term::Iri(Identifier::from(iri)),
        (None, Some(escaped)) => {
            let lexical = unescape(escaped)?;
            // language tags are dropped, the text is kept as a plain string
            let datatype = group(5).unwrap_or(XSD_STRING);
            Term::Literal(Literal::from_lexical(&lexical, Some(datatype)))
        }
        (None, None) => {
            return Err(GraphObjectError::Parse {
                message: format!("statement without an object: {}", line),
                line: None,
            });
        }
    };
    Ok(Some(Quad {
        subject: Identifier::from(group(1).unwrap_or_default()),
        predicate: Identifier::from(group(2).unwrap_or_default()),
        object,
        graph: group(7).map(Identifier::from).unwrap_or_else(|| default_graph.clone()),
    }))
}

/// Reads every statement, reporting the line number of the first bad one.
pub fn read(reader: impl BufRead, default_graph: &Identifier) -> Result<Vec<Quad>> {
    let mut quads = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_line(&line, default_graph) {
            Ok(Some(quad)) => quads.push(quad),
            Ok(None) => {}
            Err(GraphObjectError::Parse { message, .. }) => {
                return Err(GraphObjectError::Parse {
                    message,
                    line: Some(number + 1),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(quads)
}

/// Reads statements into `store`, keeping only those of `graph` when given.
/// Returns how many statements were new to the store.
pub fn import(
    store: &dyn QuadStore,
    reader: impl BufRead,
    default_graph: &Identifier,
    graph: Option<&Identifier>,
) -> Result<usize> {
    let mut quads = read(reader, default_graph)?;
    if let Some(graph) = graph {
        quads.retain(|q| &q.graph == graph);
    }
    let added = store.add(&quads)?;
    debug!(read = quads.len(), added, "imported statements");
    Ok(added)
}

/// Writes statements sorted, one per line.
pub fn write(quads: &[Quad], mut writer: impl Write) -> Result<usize> {
    let mut sorted: Vec<&Quad> = quads.iter().collect();
    sorted.sort();
    sorted.dedup();
    for quad in &sorted {
        writeln!(writer, "{}", quad)?;
    }
    writer.flush()?;
    Ok(sorted.len())
}

/// Exports the whole store to a file.
pub fn export_file(store: &dyn QuadStore, path: impl AsRef<Path>) -> Result<usize> {
    let quads = store.quads(&QuadPattern::new())?;
    let file = fs::File::create(path.as_ref())?;
    let written = write(&quads, BufWriter::new(file))?;
    info!(path = %path.as_ref().display(), statements = written, "exported N-Quads");
    Ok(written)
}
