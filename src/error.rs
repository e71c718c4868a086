use thiserror::Error;

/// Error structure representing the basic error scenarios for `sql_mirror`.
///
/// Syntax errors in the query text are not reported through this type: they are
/// data inside [`crate::ast::ParseResult`] and [`crate::MirrorResult`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("Invalid statement: {0}")]
    Parse(String),
    #[error("Unsupported construct: {0}")]
    Unsupported(String),
    #[error("Invalid pointer")]
    InvalidPointer,
    #[error("Invalid {kind} tag: {value}")]
    InvalidTag { kind: &'static str, value: u32 },
    #[error("Error parsing JSON: {0}")]
    InvalidJson(String),
    #[error("Error splitting: {0}")]
    Split(String),
}

/// Convenient Result alias for returning `sql_mirror::Error`.
pub type Result<T> = core::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidJson(err.to_string())
    }
}
