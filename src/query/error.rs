use thiserror::Error;

/// Errors raised while parsing or converting a search query.
///
/// Everything here is user-facing and maps to a 400 response, except that
/// boolean combinators get their own variant so callers can tell a malformed
/// query apart from an unsupported one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error(
        "Parse error: {token:?} (column {column}). This is commonly caused by unmatched quotes or parentheses. Enclose any text in double quotes."
    )]
    Syntax { token: String, column: usize },

    #[error("Empty value for key '{0}'")]
    EmptyValue(String),

    #[error("\"in\" syntax invalid for \"is\" search")]
    IsListSyntax,

    #[error("Invalid value for \"is\" search, valid values are {allowed:?}")]
    InvalidIsValue { allowed: Vec<&'static str> },

    #[error("invalid status value of '{0}'")]
    InvalidStatus(String),

    #[error("Invalid format for numeric search: {0:?}")]
    InvalidNumber(String),

    #[error("{0:?} is not a valid datetime query")]
    InvalidDate(String),

    #[error("Negation is not supported for range queries")]
    NegatedRange,

    #[error("Range operators are only supported for numeric and date keys, not '{0}'")]
    RangeOnStringKey(String),

    #[error("Aggregate filters ({0}) are not supported in issue searches.")]
    AggregateNotSupported(String),

    #[error("Boolean statements containing \"OR\" or \"AND\" are not supported in this search")]
    UnsupportedOperator,

    #[error("could not resolve actor {0:?}")]
    UnresolvedActor(String),

    #[error("No releases match 'latest' for the current projects and environments")]
    NoLatestRelease,
}

impl QueryError {
    /// HTTP status hint for callers that surface these directly.
    pub fn status_code(&self) -> u16 {
        400
    }
}
