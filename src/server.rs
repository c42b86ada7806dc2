//! HTTP/1.1 transport for the replayer.
//!
//! Accepts connections, converts hyper requests into `InboundRequest`s and
//! writes the dispatched result back. Content-Length is always derived from
//! the body actually written.

use crate::matcher::parse_query_string;
use crate::recording::{InboundRequest, Method, OutboundResult};
use crate::replayer::Replayer;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderName, HeaderValue, ALLOW};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

const ALLOWED_METHODS: &str = "GET, HEAD, POST, PUT, DELETE";

/// The replay HTTP server.
pub struct ReplayServer {
    replayer: Arc<Replayer>,
    request_timeout: Option<Duration>,
}

impl ReplayServer {
    pub fn new(replayer: Arc<Replayer>) -> Self {
        Self {
            replayer,
            request_timeout: None,
        }
    }

    /// Answer 504 when a request takes longer than `timeout`.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Bind `addr` and serve until the task is dropped.
    pub async fn run(self, addr: SocketAddr) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!("Listening on http://{}", listener.local_addr()?);

        let server = Arc::new(self);

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let server = Arc::clone(&server);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }

    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let Some(method) = replay_method(req.method()) else {
            debug!(method = %req.method(), "Rejecting unsupported method");
            return Ok(method_not_allowed());
        };

        let inbound = match to_inbound(method, req).await {
            Ok(inbound) => inbound,
            Err(err) => {
                warn!("Failed to read request body: {}", err);
                return Ok(empty_response(StatusCode::BAD_REQUEST));
            }
        };

        let result = match self.request_timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.replayer.handle(&inbound)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(
                            method = %inbound.method,
                            path = %inbound.path,
                            timeout_secs = timeout.as_secs(),
                            "Request timed out"
                        );
                        return Ok(empty_response(StatusCode::GATEWAY_TIMEOUT));
                    }
                }
            }
            None => self.replayer.handle(&inbound).await,
        };

        Ok(to_response(result))
    }
}

/// Map a wire method onto a replayable one. Method tokens are case-sensitive.
fn replay_method(method: &hyper::Method) -> Option<Method> {
    match method {
        &hyper::Method::GET => Some(Method::Get),
        &hyper::Method::HEAD => Some(Method::Head),
        &hyper::Method::POST => Some(Method::Post),
        &hyper::Method::PUT => Some(Method::Put),
        &hyper::Method::DELETE => Some(Method::Delete),
        _ => None,
    }
}

async fn to_inbound(method: Method, req: Request<Incoming>) -> Result<InboundRequest, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();

    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    Ok(InboundRequest {
        method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(parse_query_string).unwrap_or_default(),
        headers,
        body,
    })
}

/// Write the dispatched result as a hyper response.
///
/// Headers keep their recorded order, but hyper emits every header name in
/// lowercase; the recorded case survives only in `OutboundResult`.
fn to_response(result: OutboundResult) -> Response<Full<Bytes>> {
    let (status, headers, body) = match result {
        OutboundResult::Matched {
            status,
            headers,
            body,
        } => (status, headers, body),
        OutboundResult::NotFound => return empty_response(StatusCode::NOT_FOUND),
    };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or_else(|_| {
        error!(status, "Recorded status is not a valid HTTP status");
        StatusCode::INTERNAL_SERVER_ERROR
    });

    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "Skipping recorded header that is not valid HTTP"),
        }
    }

    response
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn method_not_allowed() -> Response<Full<Bytes>> {
    let mut response = empty_response(StatusCode::METHOD_NOT_ALLOWED);
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    response
}
