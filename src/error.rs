use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or extracting a single HTML page.
///
/// All variants are local to one page: callers skip the page and keep going.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not parse HTML: {0}")]
    Parse(String),
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("no document loaded")]
    NoDocument,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Fatal errors for a partitioning run. Raised before any partition is written.
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("split percentages must sum to 100 (got {train} + {dev} + {test} = {sum})")]
    InvalidSplit {
        train: u32,
        dev: u32,
        test: u32,
        sum: u64,
    },
    #[error("company {0} has no branch codes")]
    MissingCategory(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("top_n must be at least 1")]
    InvalidTopN,
    #[error("document for company {0} has no branch codes")]
    MissingCategory(String),
    #[error("prediction failed: {0}")]
    Prediction(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}
