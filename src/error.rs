use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// Telemetry could not be resolved or fetched. Never retried here.
    #[error("session data unavailable: {context}")]
    DataUnavailable {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("not ready: {0}")]
    NotReady(&'static str),

    #[error("storage error at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("training error: {0}")]
    Training(String),
}

impl Error {
    pub fn data_unavailable(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::DataUnavailable {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn missing_column(column: &str) -> Self {
        Error::Schema(format!("missing column `{column}`"))
    }

    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    /// csv errors are either I/O against `path` or malformed content.
    pub(crate) fn from_csv(path: impl Into<PathBuf>, err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(io) => Error::storage(path, io),
                other => Error::Serialization(format!("{other:?}")),
            }
        } else {
            Error::Serialization(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
