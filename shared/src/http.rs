//! HTTP helpers for Lambda functions.

use lambda_http::http::header::{HeaderValue, CONTENT_TYPE};
use lambda_http::http::{HeaderMap, StatusCode};
use lambda_http::{Body, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

/// Standard API error envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>> {
    let json = serde_json::to_string(data)?;
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json))
        .map_err(|e| Error::Internal(format!("Failed to build response: {}", e)))
}

/// Create a response without a body (e.g. 204).
pub fn empty_response(status: u16) -> Result<Response<Body>> {
    Response::builder()
        .status(status)
        .body(Body::Empty)
        .map_err(|e| Error::Internal(format!("Failed to build response: {}", e)))
}

/// Render an error as the standard envelope. Never fails.
pub fn error_response(error: &Error) -> Response<Body> {
    let json = serde_json::to_string(&ApiResponse::error(error.to_string()))
        .unwrap_or_else(|_| r#"{"success":false}"#.to_string());

    let mut response = Response::new(Body::from(json));
    *response.status_mut() =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Parse request body as JSON, mapping failures to a validation error.
pub fn parse_json_body<T: DeserializeOwned>(body: &Body) -> Result<T> {
    serde_json::from_slice(body.as_ref())
        .map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))
}

/// Read a header as a trimmed string, ignoring non-visible values.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Strip the API Gateway stage prefix if present.
pub fn strip_stage(path: &str) -> &str {
    match path.strip_prefix("/api") {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}
