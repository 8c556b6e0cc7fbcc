use search::SearchError;
use thiserror::Error;

/// Errors raised while generating candidates.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CandidateError {
    /// The search backend failed; the whole request is aborted.
    #[error("search backend failure: {0}")]
    Backend(#[from] SearchError),
    /// Stored embeddings disagree on dimension.
    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// Averaging was attempted over zero vectors.
    #[error("cannot average an empty set of embeddings")]
    EmptyAverage,
    /// A caller-supplied search argument is out of range.
    #[error("invalid search query: {0}")]
    InvalidQuery(String),
    /// Generator settings are unusable.
    #[error("invalid generator config: {0}")]
    InvalidConfig(String),
}
