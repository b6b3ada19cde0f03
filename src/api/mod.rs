//! REST API served over hyper's HTTP/1 connection builder

pub mod handlers;
pub mod request;
pub mod response;
pub mod router;

use crate::error::{AppError, AppResult};
use crate::AppState;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use request::{ApiRequest, MAX_BODY_BYTES};
use response::BoxBody;
use router::Route;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Accept connections forever, one task per connection
pub async fn serve(listener: TcpListener, state: Arc<AppState>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("HTTP accept error: {}", e);
                continue;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(req, state).await }
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), svc)
                .await
            {
                debug!("HTTP connection from {} ended with error: {}", peer, e);
            }
        });
    }
}

/// Route one request and always answer, with CORS headers attached
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, Infallible> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = if method == Method::OPTIONS {
        response::no_content()
    } else {
        match Route::resolve(&method, &path) {
            None => response::not_found(),
            Some(route) => match route_request(route, req, &state).await {
                Ok(response) => response,
                Err(e) => {
                    match e.status_code() {
                        500..=599 => error!("{} {} failed: {}", method, path, e),
                        401 | 403 => warn!("{} {} rejected: {}", method, path, e),
                        _ => debug!("{} {} -> {}", method, path, e),
                    }
                    response::error_response(&e)
                }
            },
        }
    };

    let response = response::with_cors(response, &state.config.cors_origin);
    info!(
        "{} {} {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    Ok(response)
}

async fn route_request(
    route: Route,
    req: Request<Incoming>,
    state: &AppState,
) -> AppResult<Response<BoxBody>> {
    let query = req.uri().query().map(str::to_string);
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| AppError::Validation(format!("Could not read request body: {}", e)))?
        .to_bytes();

    handlers::dispatch(state, ApiRequest::new(route, query.as_deref(), authorization, body)).await
}
