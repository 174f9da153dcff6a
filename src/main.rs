//! Loads N-Quads files into the configured store and optionally exports it.
//!
//! Usage: `graphobject [--config FILE] [FILE.nq ...]`
//!
//! Statements without a graph are read into `<base_iri>imported`.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use graphobject::error::Result;
use graphobject::identifier::Identifier;
use graphobject::settings::Settings;
use graphobject::{nquads, store};

#[derive(Parser)]
#[command(name = "graphobject")]
#[command(about = "Load N-Quads into a graph object store", long_about = None)]
struct Args {
    /// Settings file, `graphobject.toml` when present otherwise
    #[arg(short, long)]
    config: Option<String>,

    /// N-Quads files to import
    files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Summary {
    imported: usize,
    statements: usize,
    graphs: Vec<Identifier>,
    exported: Option<usize>,
}

fn run(config: Option<&str>, files: &[PathBuf]) -> Result<Summary> {
    let settings = Settings::load(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .with_writer(std::io::stderr)
        .init();
    let store = store::open(&settings.store)?;
    let default_graph = Identifier::new(format!("{}imported", settings.base_iri));
    let mut imported = 0;
    for path in files {
        let reader = BufReader::new(File::open(path)?);
        let added = nquads::import(store.as_ref(), reader, &default_graph, None)?;
        info!(path = %path.display(), added, "file imported");
        imported += added;
    }
    let exported = match &settings.export_path {
        Some(path) => Some(nquads::export_file(store.as_ref(), path)?),
        None => None,
    };
    Ok(Summary {
        imported,
        statements: store.len()?,
        graphs: store.graphs()?,
        exported,
    })
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args.config.as_deref(), &args.files) {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!(error = %e, "graphobject failed");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_follow_an_optional_config() {
        let args = Args::try_parse_from(["graphobject", "--config", "worm.toml", "a.nq", "b.nq"])
            .expect("arguments");
        assert_eq!(args.config.as_deref(), Some("worm.toml"));
        assert_eq!(args.files, vec![PathBuf::from("a.nq"), PathBuf::from("b.nq")]);
    }

    #[test]
    fn a_config_flag_without_a_file_is_rejected() {
        assert!(Args::try_parse_from(["graphobject", "data.nq", "--config"]).is_err());
    }

    #[test]
    fn unknown_flags_are_not_taken_for_files() {
        assert!(Args::try_parse_from(["graphobject", "--verbose", "data.nq"]).is_err());
    }
}
