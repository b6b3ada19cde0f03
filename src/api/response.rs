use crate::error::{AppError, AppResult};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Full};
use hyper::body::Bytes;
use http::header::{self, HeaderValue};
use http::StatusCode;
use hyper::Response;
use serde::Serialize;
use std::convert::Infallible;

pub type BoxBody = UnsyncBoxBody<Bytes, Infallible>;

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Serialize `value` as the JSON body of a response with `status`
pub fn json<T: Serialize>(status: StatusCode, value: &T) -> AppResult<Response<BoxBody>> {
    let body = serde_json::to_vec(value)?;
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

pub fn ok<T: Serialize>(value: &T) -> AppResult<Response<BoxBody>> {
    json(StatusCode::OK, value)
}

pub fn created<T: Serialize>(value: &T) -> AppResult<Response<BoxBody>> {
    json(StatusCode::CREATED, value)
}

pub fn no_content() -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

fn error_body(status: StatusCode, message: &str) -> Response<BoxBody> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// `{"error": ...}` with the status the error maps to. Internal details are not echoed.
pub fn error_response(err: &AppError) -> Response<BoxBody> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_body(status, &err.client_message())
}

pub fn not_found() -> Response<BoxBody> {
    error_body(StatusCode::NOT_FOUND, "Not found")
}

/// Attach CORS headers. An origin that is not a valid header value falls back to `*`.
pub fn with_cors(mut response: Response<BoxBody>, origin: &str) -> Response<BoxBody> {
    let origin = HeaderValue::from_str(origin).unwrap_or_else(|_| HeaderValue::from_static("*"));
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response<BoxBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_json_response() {
        let response = created(&serde_json::json!({ "id": 7 })).unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_json(response).await["id"], 7);
    }

    #[tokio::test]
    async fn test_error_response_maps_status() {
        let response = error_response(&AppError::Conflict("Book is not available".to_string()));
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(response).await["error"],
            "Conflict: Book is not available"
        );

        let response = error_response(&AppError::BusinessLogic("Insufficient Brocks".to_string()));
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_internal_errors_are_masked() {
        let response = error_response(&AppError::Message("pool exploded".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Internal server error");
    }

    #[test]
    fn test_cors_headers() {
        let response = with_cors(no_content(), "https://bookshare.example");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://bookshare.example"
        );

        let response = with_cors(not_found(), "bad\norigin");
        assert_eq!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    }
}
