//! Request extractors and the response envelope.
//!
//! Domain drafts deserialize straight from request bodies; this module only
//! adds what HTTP needs on top: rejection mapping, query shapes, id parsing
//! and the `{ success, data, message }` envelope.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::errors::json_error;

// -------------------------
// Extractors
// -------------------------

/// JSON body extractor whose rejections use the error envelope.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())),
        }
    }
}

/// Query-string extractor whose rejections use the error envelope.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(json_error(StatusCode::BAD_REQUEST, "invalid_query", rejection.body_text())),
        }
    }
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Return every row tagged with its lifecycle state instead of active rows.
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// Reference date for overdue installments; defaults to today (UTC).
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

/// Parse a path id into a typed identifier.
pub fn parse_id<I: From<Uuid>>(raw: &str) -> Result<I, Response> {
    Uuid::parse_str(raw).map(I::from).map_err(|e| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("'{raw}' is not a valid id: {e}"),
        )
    })
}

// -------------------------
// Response envelope
// -------------------------

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn ok<T: Serialize>(status: StatusCode, data: T) -> Response {
    (
        status,
        Json(Envelope {
            success: true,
            data,
            message: None,
        }),
    )
        .into_response()
}

pub fn ok_with_message<T: Serialize>(status: StatusCode, data: T, message: impl Into<String>) -> Response {
    (
        status,
        Json(Envelope {
            success: true,
            data,
            message: Some(message.into()),
        }),
    )
        .into_response()
}
