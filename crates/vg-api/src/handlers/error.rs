//! API Error Types (§7).

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use vg_domain::DomainError;
use vg_ports::{EvidenceStoreError, GeneratorError, MemoryError};

use crate::run::RunError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors the HTTP boundary can surface. Per §7, a client disconnecting
/// mid-run is never represented here — cancellation is silent, not an
/// error response.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { message: String },
    CorpusUnavailable { corpus_id: String },
    GenerationUnavailable { message: String },
    ConfigInvalid { reason: String },
    Internal { message: String },
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::CorpusUnavailable { corpus_id } => {
                (StatusCode::SERVICE_UNAVAILABLE, format!("corpus unavailable: {corpus_id}"))
            }
            ApiError::GenerationUnavailable { message } => (StatusCode::BAD_GATEWAY, message.clone()),
            ApiError::ConfigInvalid { reason } => (StatusCode::INTERNAL_SERVER_ERROR, reason.clone()),
            ApiError::Internal { message } => {
                tracing::error!(error = %message, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };

        let body = ErrorResponse { error: message, code: status.as_u16() };
        (status, Json(body)).into_response()
    }
}

impl From<RunError> for ApiError {
    fn from(e: RunError) -> Self {
        match e {
            RunError::GenerationUnavailable(message) => ApiError::GenerationUnavailable { message },
        }
    }
}

impl From<EvidenceStoreError> for ApiError {
    fn from(e: EvidenceStoreError) -> Self {
        match e {
            EvidenceStoreError::CorpusUnavailable { corpus_id } => ApiError::CorpusUnavailable { corpus_id },
            EvidenceStoreError::Timeout { corpus_id } => ApiError::CorpusUnavailable { corpus_id },
            EvidenceStoreError::StorageError { message } => ApiError::Internal { message },
        }
    }
}

impl From<GeneratorError> for ApiError {
    fn from(e: GeneratorError) -> Self {
        ApiError::GenerationUnavailable { message: e.to_string() }
    }
}

impl From<MemoryError> for ApiError {
    fn from(e: MemoryError) -> Self {
        ApiError::Internal { message: e.to_string() }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::ConfigInvalid { reason } => ApiError::ConfigInvalid { reason },
            DomainError::UnknownWorker { worker_id } => ApiError::BadRequest { message: format!("unknown worker id: {worker_id}") },
            DomainError::UnknownCorpus { corpus_id } => ApiError::CorpusUnavailable { corpus_id },
            DomainError::InvariantViolation { invariant } => ApiError::Internal { message: invariant },
        }
    }
}
