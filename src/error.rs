use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphObjectError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize> },
    #[error("Type mismatch on {property}: expected {expected}, got {found}")]
    TypeMismatch {
        property: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Identifier {fixed} is already fixed, cannot assign {requested}")]
    IdentifierConflict { fixed: String, requested: String },
    #[error("Undefined identifier: {0}")]
    UndefinedIdentifier(String),
    #[error("Unknown entity type: {0}")]
    UnknownType(String),
    #[error("Unknown property '{property}' on {owner}")]
    UnknownProperty { owner: String, property: String },
    #[error("Value {value} is not held by {property}")]
    ValueNotFound { property: String, value: String },
    #[error("Unresolved dependency for {rule}: missing {}", .missing.join(", "))]
    UnresolvedDependency { rule: String, missing: Vec<String> },
    #[error("Translator {translator} failed on [{}]: {message}", .inputs.join(", "))]
    TranslatorFailure {
        translator: String,
        inputs: Vec<String>,
        message: String,
    },
    #[error("Refusing to save: {failed} rule(s) did not complete")]
    Incomplete { failed: usize },
}

pub type Result<T> = std::result::Result<T, GraphObjectError>;

// Helper conversions
impl From<rusqlite::Error> for GraphObjectError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<config::ConfigError> for GraphObjectError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<std::io::Error> for GraphObjectError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
