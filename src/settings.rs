//! Runtime settings.
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional TOML file, then environment variables such as
//! `GRAPHOBJECT__STORE__KIND=sqlite` or `GRAPHOBJECT__SAVE_POLICY=all_or_nothing`.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_FILE: &str = "graphobject.toml";
pub const ENV_PREFIX: &str = "GRAPHOBJECT";
pub const DEFAULT_BASE_IRI: &str = "http://openworm.org/entities/";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreSettings {
    Memory,
    /// Without a path the database lives in memory.
    Sqlite {
        #[serde(default)]
        path: Option<String>,
    },
}

/// What a pipeline does with the aggregate when some rules failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SavePolicy {
    /// Save whatever was realized.
    #[default]
    Partial,
    /// Save nothing unless every rule completed.
    AllOrNothing,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    pub base_iri: String,
    pub store: StoreSettings,
    #[serde(default)]
    pub save_policy: SavePolicy,
    #[serde(default)]
    pub export_path: Option<String>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_iri: DEFAULT_BASE_IRI.to_owned(),
            store: StoreSettings::Memory,
            save_policy: SavePolicy::Partial,
            export_path: None,
            log_filter: "info".to_owned(),
        }
    }
}

impl Settings {
    /// Loads settings from `file` (or `graphobject.toml` when it exists) and
    /// the `GRAPHOBJECT__` environment.
    pub fn load(file: Option<&str>) -> Result<Self> {
        Self::load_with_prefix(file, ENV_PREFIX)
    }
    pub fn load_with_prefix(file: Option<&str>, prefix: &str) -> Result<Self> {
        let file = match file {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        let settings = Config::builder()
            .set_default("base_iri", DEFAULT_BASE_IRI)?
            .set_default("store.kind", "memory")?
            .set_default("save_policy", "partial")?
            .set_default("log_filter", "info")?
            .add_source(file)
            .add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
