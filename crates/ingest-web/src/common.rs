use axum::extract::{OriginalUri, Request};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::MethodFilter;
use axum::Json;
use serde::{Deserialize, Serialize};

pub type RouteResult<O> = Result<O, RouteErrorResponse>;

/// A `MethodFilter` that matches all http methods.
pub(crate) const METHOD_FILTER_ALL: MethodFilter = MethodFilter::GET.or(MethodFilter::POST).or(MethodFilter::PATCH).or(MethodFilter::PUT).or(MethodFilter::DELETE);

/// `{message}` on success, `{message, error}` on failure, per the ingestion
/// endpoint's response contract.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteErrorResponse {
    #[serde(skip)]
    pub status_code: StatusCode,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteErrorResponse {
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self { status_code, message: message.into(), error: None }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "request could not be processed").with_error(error)
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "request could not be processed").with_error(error)
    }
}

impl IntoResponse for RouteErrorResponse {
    fn into_response(self) -> axum::response::Response {
        (self.status_code, Json(self)).into_response()
    }
}

pub(crate) async fn route_not_found(OriginalUri(original_uri): OriginalUri, req: Request) -> impl IntoResponse {
    not_found_response(req.method(), original_uri.path())
}

pub(crate) fn not_found_response(method: &Method, uri: &str) -> impl IntoResponse {
    RouteErrorResponse::not_found(format!("no route for {method} {uri}"))
}
