// used for persistence
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use crate::error::{GraphObjectError, Result};
use crate::identifier::Identifier;
use crate::lock;
use crate::store::{Quad, QuadPattern, QuadStore};
use crate::term::Term;

// IRIs are stored with an empty datatype so that the uniqueness
// constraint on Term also holds for them (NULLs are never equal)
const IRI_DATATYPE: &str = "";

/// A store backed by SQLite, either in a file or in memory.
///
/// Terms are kept once in the `Term` table and statements reference them
/// through their identities in the `Quad` table.
#[derive(Debug)]
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let connection = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened sqlite store");
        Self::new(connection)
    }
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }
    fn new(connection: Connection) -> Result<Self> {
        // The "STRICT" keyword introduced in 3.37.0 breaks JDBC connections, which makes
        // debugging using an external tool like DBeaver impossible
        connection.execute_batch(
            "
            create table if not exists Term (
                Term_Identity integer not null,
                Lexical text not null,
                Datatype text not null,
                constraint referenceable_Term_Identity primary key (
                    Term_Identity
                ),
                constraint unique_Term unique (
                    Lexical,
                    Datatype
                )
            );-- STRICT;
            create table if not exists Quad (
                Subject_Identity integer not null,
                Predicate_Identity integer not null,
                Object_Identity integer not null,
                Graph_Identity integer not null,
                constraint Subject_is_Term foreign key (
                    Subject_Identity
                ) references Term(Term_Identity),
                constraint Predicate_is_Term foreign key (
                    Predicate_Identity
                ) references Term(Term_Identity),
                constraint Object_is_Term foreign key (
                    Object_Identity
                ) references Term(Term_Identity),
                constraint Graph_is_Term foreign key (
                    Graph_Identity
                ) references Term(Term_Identity),
                constraint unique_Quad primary key (
                    Subject_Identity,
                    Predicate_Identity,
                    Object_Identity,
                    Graph_Identity
                )
            );-- STRICT;
            create index if not exists Quad_by_Object on Quad (Object_Identity);
            create index if not exists Quad_by_Graph on Quad (Graph_Identity);
            ",
        )?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

fn datatype_of(term: &Term) -> &str {
    term.datatype().unwrap_or(IRI_DATATYPE)
}

fn term_identity(connection: &Connection, term: &Term) -> Result<i64> {
    let lexical = term.lexical();
    let datatype = datatype_of(term);
    connection
        .prepare_cached(
            "
            insert or ignore into Term (
                Lexical,
                Datatype
            ) values (?, ?)
        ",
        )?
        .execute(params![&lexical, datatype])?;
    let identity = connection
        .prepare_cached(
            "
            select Term_Identity
              from Term
             where Lexical = ?
               and Datatype = ?
        ",
        )?
        .query_row(params![&lexical, datatype], |r| r.get(0))?;
    Ok(identity)
}

fn restore_term(lexical: String, datatype: String) -> Term {
    if datatype == IRI_DATATYPE {
        Term::Iri(Identifier::new(lexical))
    } else {
        Term::from_parts(&lexical, Some(&datatype))
    }
}

impl QuadStore for SqliteStore {
    fn add(&self, quads: &[Quad]) -> Result<usize> {
        let mut connection = lock(&self.connection);
        let transaction = connection.transaction()?;
        let mut added = 0;
        for quad in quads {
            let subject = term_identity(&transaction, &Term::Iri(quad.subject.clone()))?;
            let predicate = term_identity(&transaction, &Term::Iri(quad.predicate.clone()))?;
            let object = term_identity(&transaction, &quad.object)?;
            let graph = term_identity(&transaction, &Term::Iri(quad.graph.clone()))?;
            added += transaction
                .prepare_cached(
                    "
                    insert or ignore into Quad (
                        Subject_Identity,
                        Predicate_Identity,
                        Object_Identity,
                        Graph_Identity
                    ) values (?, ?, ?, ?)
                ",
                )?
                .execute(params![subject, predicate, object, graph])?;
        }
        // dropping an uncommitted transaction rolls it back
        transaction.commit()?;
        Ok(added)
    }

    fn quads(&self, pattern: &QuadPattern) -> Result<Vec<Quad>> {
        let mut sql = String::from(
            "
            select s.Lexical, p.Lexical, o.Lexical, o.Datatype, g.Lexical
              from Quad q
              join Term s on s.Term_Identity = q.Subject_Identity
              join Term p on p.Term_Identity = q.Predicate_Identity
              join Term o on o.Term_Identity = q.Object_Identity
              join Term g on g.Term_Identity = q.Graph_Identity
             where 1 = 1
            ",
        );
        let mut bound: Vec<String> = Vec::new();
        let positions = [
            ("s", pattern.subject.clone().map(Term::Iri)),
            ("p", pattern.predicate.clone().map(Term::Iri)),
            ("o", pattern.object.clone()),
            ("g", pattern.graph.clone().map(Term::Iri)),
        ];
        for (alias, term) in positions.iter() {
            if let Some(term) = term {
                sql.push_str(&format!(
                    " and {alias}.Lexical = ? and {alias}.Datatype = ?"
                ));
                bound.push(term.lexical());
                bound.push(datatype_of(term).to_owned());
            }
        }
        sql.push_str(" order by q.rowid");

        let connection = lock(&self.connection);
        let mut statement = connection.prepare_cached(&sql)?;
        let rows = statement.query_map(params_from_iter(bound.iter()), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
            ))
        })?;
        let mut quads = Vec::new();
        for row in rows {
            let (subject, predicate, object, datatype, graph) = row?;
            quads.push(Quad {
                subject: Identifier::new(subject),
                predicate: Identifier::new(predicate),
                object: restore_term(object, datatype),
                graph: Identifier::new(graph),
            });
        }
        Ok(quads)
    }

    fn len(&self) -> Result<usize> {
        let connection = lock(&self.connection);
        let count: i64 = connection.query_row("select count(*) from Quad", [], |r| r.get(0))?;
        usize::try_from(count).map_err(|e| GraphObjectError::Store(e.to_string()))
    }
}
