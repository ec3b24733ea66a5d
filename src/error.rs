//! Error taxonomy for the harvest and export pipeline.
//!
//! Two of the variants are recoverable and never abort a run:
//! [`CatalogueError::MalformedRecord`] (the record is skipped) and
//! [`CatalogueError::DuplicateIdentifier`] (the later record is dropped).
//! Everything else is fatal to the invocation that raised it.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, CatalogueError>;

#[derive(Debug, Error)]
pub enum CatalogueError {
    /// Network or API failure while harvesting. Nothing is written.
    #[error("source unavailable ({url}): {reason}")]
    SourceUnavailable { url: String, reason: String },

    /// A raw record has no usable identifier.
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    /// A record maps to an identifier already present in the graph.
    #[error("duplicate identifier: {id}")]
    DuplicateIdentifier { id: String },

    /// A catalogue file is missing, truncated, or violates the node schema.
    #[error("catalogue unreadable ({}): {reason}", .path.display())]
    CatalogueUnreadable { path: PathBuf, reason: String },

    /// Filesystem write failure.
    #[error("failed to write {}: {source}", .path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings that make the requested stage impossible to run.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CatalogueError {
    pub(crate) fn source_unavailable(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CatalogueUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write_failure(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputWriteFailure {
            path: path.into(),
            source,
        }
    }

    /// Whether the pipeline recovers locally from this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord { .. } | Self::DuplicateIdentifier { .. }
        )
    }
}
