//! Domain error taxonomy per the error handling design.

use thiserror::Error;

/// Error kinds produced by the pure orchestration core.
///
/// Adapters and the API layer wrap these (or their own IO errors) into the
/// wire-level taxonomy; this enum only covers conditions the domain logic
/// itself can detect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("configuration invalid: {reason}")]
    ConfigInvalid { reason: String },

    #[error("invariant violation: {invariant}")]
    InvariantViolation { invariant: String },

    #[error("unknown worker id: {worker_id}")]
    UnknownWorker { worker_id: String },

    #[error("unknown corpus id: {corpus_id}")]
    UnknownCorpus { corpus_id: String },
}
