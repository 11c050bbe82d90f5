//! CLI error surface.

use scenebook_core::db::DbError;
use scenebook_core::{
    ConfigError, DocumentId, DocumentRepoError, EditorError, LoggingError, WireError,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Config(ConfigError),
    Logging(LoggingError),
    Wire(WireError),
    Store(DocumentRepoError),
    DocumentNotFound(DocumentId),
    /// A command in an `apply` batch failed; nothing was written.
    Command {
        index: usize,
        name: &'static str,
        source: EditorError,
    },
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "invalid json input: {err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Wire(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::Command {
                index,
                name,
                source,
            } => write!(
                f,
                "command #{index} `{name}` failed ({}): {source}",
                source.kind()
            ),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Wire(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Command { source, .. } => Some(source),
            Self::DocumentNotFound(_) => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<WireError> for CliError {
    fn from(value: WireError) -> Self {
        Self::Wire(value)
    }
}

impl From<DocumentRepoError> for CliError {
    fn from(value: DocumentRepoError) -> Self {
        Self::Store(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Store(DocumentRepoError::Db(value))
    }
}
