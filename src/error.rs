//! Error kinds surfaced by symbolication.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing input: {0}")]
    MissingInput(&'static str),

    #[error("input `{0}` is not of the form `<crash address> <load address>`")]
    PatternMismatch(String),

    #[error("could not convert `{0}` to a 64-bit address")]
    ConversionFailure(String),

    #[error("no DWARF executable found in {}", .0.display())]
    LookupNotFound(PathBuf),

    #[error("`{program}` failed: {reason}")]
    ExternalProcess { program: String, reason: String },

    #[error("could not read {}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed crash report: {0}")]
    MalformedReport(String),

    #[error("unsupported input {}", .0.display())]
    UnsupportedInput(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("batch was cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::FileRead {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn process(program: impl Into<String>, reason: impl ToString) -> Self {
        Error::ExternalProcess {
            program: program.into(),
            reason: reason.to_string(),
        }
    }
}
