//! Typed error hierarchy for the publication pipeline.
//!
//! Four top-level enums cover the subsystems:
//! - `StoreError` — version store persistence and lookup failures
//! - `ReviewError` — human review queue failures
//! - `ProviderError` — failures reported by external collaborators
//! - `PipelineError` — run-level orchestration failures
//!
//! Every enum classifies itself into an [`ErrorKind`] so callers can
//! distinguish "nothing found" from "operation failed" without matching
//! on concrete variants.

use thiserror::Error;

/// Coarse classification of a pipeline error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input rejected at a component boundary.
    Validation,
    /// A referenced version, review, or chapter does not exist.
    NotFound,
    /// An external collaborator (provider, gate) reported failure.
    ExternalFailure,
    /// Anything else: storage faults, serialization faults, poisoned locks.
    Internal,
}

/// Errors from the version store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Version {id} not found")]
    VersionNotFound { id: String },

    #[error("Version {id} already exists")]
    DuplicateVersion { id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt stored {field}: {value}")]
    CorruptRecord { field: String, value: String },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store task failed: {0}")]
    TaskFailed(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidVersion(_) | StoreError::DuplicateVersion { .. } => {
                ErrorKind::Validation
            }
            StoreError::VersionNotFound { .. } => ErrorKind::NotFound,
            StoreError::Database(_)
            | StoreError::Serialization(_)
            | StoreError::CorruptRecord { .. }
            | StoreError::LockPoisoned
            | StoreError::TaskFailed(_) => ErrorKind::Internal,
        }
    }
}

/// Errors from the human review queue.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Review {id} not found among pending requests")]
    ReviewNotFound { id: String },

    #[error("Invalid review submission: {0}")]
    InvalidSubmission(String),

    #[error("Failed to persist queue snapshot at {path}: {source}")]
    SnapshotWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read queue snapshot at {path}: {source}")]
    SnapshotReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed queue snapshot: {0}")]
    SnapshotMalformed(#[from] serde_json::Error),
}

impl ReviewError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReviewError::ReviewNotFound { .. } => ErrorKind::NotFound,
            ReviewError::InvalidSubmission(_) => ErrorKind::Validation,
            ReviewError::SnapshotWriteFailed { .. }
            | ReviewError::SnapshotReadFailed { .. }
            | ReviewError::SnapshotMalformed(_) => ErrorKind::Internal,
        }
    }
}

/// Failure reported by an external collaborator.
///
/// Providers must report failure distinctly from an empty result; an
/// empty-but-successful response is `Ok`, never one of these.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Research failed for {source_name}: {message}")]
    Research {
        source_name: String,
        message: String,
    },

    #[error("No valid research content found")]
    NoResearchContent,

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Review gate failed for review {review_id}: {message}")]
    Gate { review_id: String, message: String },

    #[error("Source read failed at {path}: {source}")]
    SourceRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ExternalFailure
    }
}

/// Errors escaping the run loop itself.
///
/// Per-chapter failures never surface here; they become a `failed` chapter
/// state inside the run. Only structural problems (store faults, config
/// faults, the coordinating loop itself breaking) fail the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No chapters to process")]
    EmptyRun,

    #[error("Invalid chapter spec: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Chapter {chapter_id} has no {role} version recorded")]
    MissingVersion {
        chapter_id: String,
        role: &'static str,
    },

    #[error("Research task for chapter {chapter_id} panicked: {message}")]
    ResearchTaskPanicked { chapter_id: String, message: String },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::EmptyRun | PipelineError::InvalidSpec(_) => ErrorKind::Validation,
            PipelineError::Store(e) => e.kind(),
            PipelineError::Review(e) => e.kind(),
            PipelineError::Provider(e) => e.kind(),
            PipelineError::MissingVersion { .. } => ErrorKind::Internal,
            PipelineError::ResearchTaskPanicked { .. } => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_not_found_is_matchable() {
        let err = StoreError::VersionNotFound {
            id: "v-123".to_string(),
        };
        match &err {
            StoreError::VersionNotFound { id } => assert_eq!(id, "v-123"),
            _ => panic!("Expected VersionNotFound variant"),
        }
        assert!(err.to_string().contains("v-123"));
    }

    #[test]
    fn store_error_kinds_follow_taxonomy() {
        assert_eq!(
            StoreError::InvalidVersion("empty content".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            StoreError::VersionNotFound { id: "x".into() }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(StoreError::LockPoisoned.kind(), ErrorKind::Internal);
        assert_eq!(
            StoreError::DuplicateVersion { id: "x".into() }.kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn review_error_not_found_carries_id() {
        let err = ReviewError::ReviewNotFound {
            id: "rev-9".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("rev-9"));
    }

    #[test]
    fn review_error_snapshot_write_carries_path() {
        use std::path::PathBuf;
        let path = PathBuf::from("/tmp/reviews.json");
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ReviewError::SnapshotWriteFailed {
            path: path.clone(),
            source: io_err,
        };
        match &err {
            ReviewError::SnapshotWriteFailed { path: p, source: s } => {
                assert_eq!(p, &path);
                assert_eq!(s.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected SnapshotWriteFailed"),
        }
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn provider_error_is_always_external() {
        let err = ProviderError::Generation("model unavailable".to_string());
        assert_eq!(err.kind(), ErrorKind::ExternalFailure);
        assert_eq!(ProviderError::NoResearchContent.kind(), ErrorKind::ExternalFailure);
    }

    #[test]
    fn pipeline_error_converts_from_store_error() {
        let inner = StoreError::VersionNotFound { id: "v-1".into() };
        let pipeline_err: PipelineError = inner.into();
        match &pipeline_err {
            PipelineError::Store(StoreError::VersionNotFound { id }) => assert_eq!(id, "v-1"),
            _ => panic!("Expected PipelineError::Store(VersionNotFound)"),
        }
        // Kind passes through the wrapped error.
        assert_eq!(pipeline_err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn pipeline_error_empty_run_is_validation() {
        assert_eq!(PipelineError::EmptyRun.kind(), ErrorKind::Validation);
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StoreError::LockPoisoned);
        assert_std_error(&ReviewError::ReviewNotFound { id: "r".into() });
        assert_std_error(&ProviderError::NoResearchContent);
        assert_std_error(&PipelineError::EmptyRun);
    }
}
