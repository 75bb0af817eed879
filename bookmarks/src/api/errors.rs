use std::any::Any;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::types::ValidationError;
use crate::store::StoreError;

const DATABASE_ERROR: &str = "Database Error";
const DATABASE_ERROR_MESSAGE: &str = "A database operation failed.";
const INTERNAL_ERROR: &str = "Internal Server Error";
const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// The only shape an error ever takes on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorBody {
            error: error.into(),
            message: message.into(),
        }
    }

    /// Body for an error status raised by the routing layer itself (404, 405, 413, ...).
    pub fn for_status(status: StatusCode) -> Self {
        ErrorBody::new(
            status.canonical_reason().unwrap_or("Unknown Error"),
            describe(status),
        )
    }
}

fn describe(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => {
            "The browser (or proxy) sent a request that this server could not understand."
        }
        StatusCode::NOT_FOUND => {
            "The requested URL was not found on the server. If you entered the URL manually please check your spelling and try again."
        }
        StatusCode::METHOD_NOT_ALLOWED => "The method is not allowed for the requested URL.",
        StatusCode::PAYLOAD_TOO_LARGE => "The data value transmitted exceeds the capacity limit.",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => {
            "The server does not support the media type transmitted in the request."
        }
        StatusCode::UNPROCESSABLE_ENTITY => {
            "The request was well-formed but was unable to be followed due to semantic errors."
        }
        StatusCode::INTERNAL_SERVER_ERROR => INTERNAL_ERROR_MESSAGE,
        _ => status.canonical_reason().unwrap_or("An error occurred."),
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(err) => {
                tracing::debug!(error = %err, "Rejected request");
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorBody::new("Bad Request", err.to_string())),
                )
                    .into_response()
            }
            ApiError::Storage(err) => {
                // The cause stays in the logs, the client only gets the fixed message.
                let class = err.class();
                tracing::error!(error = %err, class = %class, "Database operation failed");
                common_metrics::inc("storage_errors_total", ("class", class.as_str()));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::new(DATABASE_ERROR, DATABASE_ERROR_MESSAGE)),
                )
                    .into_response()
            }
        }
    }
}

fn unexpected_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new(INTERNAL_ERROR, INTERNAL_ERROR_MESSAGE)),
    )
        .into_response()
}

/// Used by `CatchPanicLayer` for anything a handler didn't turn into an [`ApiError`].
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = detail, "Unhandled error while serving request");
    unexpected_error()
}

/// Router fallback for paths with no route.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::for_status(StatusCode::NOT_FOUND)),
    )
        .into_response()
}

/// Rewrites error responses that don't already carry a JSON body (axum's own 405s,
/// body-limit rejections, ...) into an [`ErrorBody`], keeping status and headers such as `Allow`.
pub async fn json_error_responses(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if is_json {
        return response;
    }

    let (parts, _) = response.into_parts();
    let mut rewritten = (status, Json(ErrorBody::for_status(status))).into_response();
    for (name, value) in parts.headers.iter() {
        if *name != header::CONTENT_TYPE && *name != header::CONTENT_LENGTH {
            rewritten.headers_mut().append(name.clone(), value.clone());
        }
    }
    rewritten
}
