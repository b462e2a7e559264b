use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use propledger_auth::AuthzError;
use propledger_core::DomainError;
use propledger_infra::{LedgerError, StoreError};

/// Map a ledger failure to the error envelope.
pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Domain(e) => domain_error_to_response(e),
        LedgerError::Store(e) => store_error_to_response(e),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invariant_violation", msg)
        }
        e @ DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", e.to_string()),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        e @ StoreError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, "not_found", e.to_string()),
        e @ StoreError::Duplicate { .. } => json_error(StatusCode::CONFLICT, "conflict", e.to_string()),
        StoreError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        e => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal storage error")
        }
    }
}

pub fn forbidden(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message.into(),
            },
        })),
    )
        .into_response()
}
