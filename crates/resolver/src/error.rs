use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Failure to map a free-text reference onto a record. Always names the
/// reference so the caller can surface it; resolution never guesses
/// silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("could not resolve {what} reference '{reference}'")]
    NoMatch { what: &'static str, reference: String },

    #[error("{what} reference '{reference}' is ambiguous between: {}", candidates.join(", "))]
    Ambiguous {
        what: &'static str,
        reference: String,
        candidates: Vec<String>,
    },
}
