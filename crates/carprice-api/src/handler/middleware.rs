//! Middleware for request processing
//!
//! - Request ids: propagated from `x-request-id` or generated, echoed on the response
//! - Request logging with method, path, status and latency
//! - JSON bodies for 405 responses produced by the router

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::routes::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id attached to request extensions
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Log each request and tag it with a request id
pub async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    debug!(request_id = %request_id, method = %method, uri = %uri, "Request received");

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    let status = response.status();
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    if status.is_server_error() {
        warn!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms,
            "Request failed"
        );
    } else {
        info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms,
            "Request completed"
        );
    }

    response
}

/// Replace the router's empty 405 body with the JSON error envelope
pub async fn json_method_not_allowed(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let allow = response.headers().get(axum::http::header::ALLOW).cloned();
    let mut replaced = ApiError::MethodNotAllowed.into_response();
    if let Some(allow) = allow {
        replaced
            .headers_mut()
            .insert(axum::http::header::ALLOW, allow);
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(middleware::from_fn(json_method_not_allowed))
            .layer(middleware::from_fn(request_logging_middleware))
    }

    #[tokio::test]
    async fn test_request_id_generated() {
        let response = app()
            .oneshot(axum::http::Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert_eq!(id.to_str().unwrap().len(), 36);
    }

    #[tokio::test]
    async fn test_request_id_propagated() {
        let response = app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/ping")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "abc-123");
    }

    #[tokio::test]
    async fn test_method_not_allowed_is_json() {
        let response = app()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error_type"], "MethodNotAllowedError");
        assert_eq!(json["success"], false);
    }
}
