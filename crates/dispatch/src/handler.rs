use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::Query;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use keeper_operations::{Error, Operation, OpsRequest, OpsResponse};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Prefix of response headers carrying metadata.
pub const METADATA_HEADER_PREFIX: &str = "KB.";

/// Machine-readable failure code returned in error bodies.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The body is not a valid request.
    ErrMalformedRequest,

    /// The operation's pre-check rejected the request.
    ErrPrecheckFailed,

    /// The bound engine does not implement the operation.
    ErrNotImplemented,

    /// The probe ran and detected a failure or a change.
    ErrProbeFailed,

    /// The operation did not finish within its timeout.
    ErrOperationTimeout,

    /// Any other failure.
    ErrOperationFailed,
}

impl ErrorCode {
    const fn status(self) -> StatusCode {
        match self {
            Self::ErrMalformedRequest => StatusCode::BAD_REQUEST,
            Self::ErrPrecheckFailed => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ErrNotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::ErrProbeFailed => StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
            Self::ErrOperationTimeout | Self::ErrOperationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn for_error(error: &Error) -> Self {
        match error {
            Error::PreCheck(_) => Self::ErrPrecheckFailed,
            Error::NotImplemented(_) => Self::ErrNotImplemented,
            Error::Probe(_) => Self::ErrProbeFailed,
            Error::Timeout(_) => Self::ErrOperationTimeout,
            _ => Self::ErrOperationFailed,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Failure code.
    pub error_code: ErrorCode,

    /// Human-readable detail.
    pub message: String,
}

fn error_response(code: ErrorCode, message: String) -> Response {
    (
        code.status(),
        Json(ErrorBody {
            error_code: code,
            message,
        }),
    )
        .into_response()
}

fn success_response(response: OpsResponse) -> Response {
    let body = match serde_json::to_vec(&Value::Object(response.data)) {
        Ok(body) => body,
        Err(e) => return error_response(ErrorCode::ErrOperationFailed, e.to_string()),
    };

    let mut http_response = Response::new(Body::from(body));
    let headers = http_response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (key, value) in response.metadata {
        let name = HeaderName::from_bytes(format!("{METADATA_HEADER_PREFIX}{key}").as_bytes());
        match (name, HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("dropping metadata {} that is not a valid header", key),
        }
    }

    http_response
}

/// Runs `operation` for one request and maps the outcome to HTTP.
pub(crate) async fn invoke(operation: Arc<dyn Operation>, request: OpsRequest) -> Response {
    let action = operation.action();

    let timeout = operation.timeout();

    match tokio::time::timeout(timeout, operation.pre_check(&request)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!(operation = action, "pre-check failed: {}", e);
            return error_response(ErrorCode::ErrPrecheckFailed, e.to_string());
        }
        Err(_) => {
            warn!(operation = action, "pre-check timed out after {:?}", timeout);
            return error_response(ErrorCode::ErrOperationTimeout, Error::Timeout(timeout).to_string());
        }
    }

    let start = Utc::now();
    let result = tokio::time::timeout(timeout, operation.run(request))
        .await
        .unwrap_or(Err(Error::Timeout(timeout)));
    let end = Utc::now();

    match result {
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Ok(Some(mut response)) => {
            let metadata = &mut response.metadata;
            metadata.insert("operation".to_string(), action.to_string());
            metadata.insert(
                "startTime".to_string(),
                start.to_rfc3339_opts(SecondsFormat::Millis, true),
            );
            metadata.insert(
                "endTime".to_string(),
                end.to_rfc3339_opts(SecondsFormat::Millis, true),
            );
            metadata.insert(
                "duration".to_string(),
                format!("{}ms", (end - start).num_milliseconds()),
            );
            success_response(response)
        }
        Err(e) => {
            let code = ErrorCode::for_error(&e);
            if code == ErrorCode::ErrProbeFailed {
                debug!(operation = action, "probe failed: {}", e);
            } else {
                warn!(operation = action, "operation failed: {}", e);
            }
            error_response(code, e.to_string())
        }
    }
}

/// GET: query pairs become parameters.
pub(crate) async fn handle_get(
    operation: Arc<dyn Operation>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    invoke(operation, OpsRequest::with_parameters(query)).await
}

/// POST: the body is an `OpsRequest`; an empty body is an empty request.
pub(crate) async fn handle_post(operation: Arc<dyn Operation>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        OpsRequest::default()
    } else {
        match serde_json::from_slice::<OpsRequest>(&body) {
            Ok(request) => request,
            Err(e) => return error_response(ErrorCode::ErrMalformedRequest, e.to_string()),
        }
    };

    invoke(operation, request).await
}
