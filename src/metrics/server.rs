//! Prometheus scrape endpoint
//!
//! A second listener, separate from the upload server, answering
//! `GET /metrics` in the Prometheus text format and `GET /health`.
//!
//! # Example
//!
//! ```no_run
//! use bucket_courier::metrics::server::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MetricsServer::bind("127.0.0.1:9090").await?;
//! println!("Metrics on {}", server.local_addr());
//!
//! let handle = server.spawn();
//! // ... serve uploads ...
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::server::{accept_backoff, text_response};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Metrics server errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsServerError {
    #[error("Invalid metrics address '{0}'")]
    InvalidAddress(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Bound, not yet serving, metrics listener
pub struct MetricsServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl MetricsServer {
    /// Bind the listener; port 0 picks a free port
    pub async fn bind(address: &str) -> Result<Self, MetricsServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|_| MetricsServerError::InvalidAddress(address.to_string()))?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve on a background task until [`MetricsHandle::shutdown`]
    pub fn spawn(self) -> MetricsHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        info!("Metrics server listening on {}", self.local_addr);

        let task = tokio::spawn(serve(self.listener, shutdown_rx));

        MetricsHandle {
            local_addr: self.local_addr,
            shutdown_tx,
            task,
        }
    }
}

/// Running metrics server
pub struct MetricsHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl MetricsHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting scrapes and wait for the accept loop to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("Metrics server task failed: {}", e);
        }
    }
}

async fn serve(listener: TcpListener, mut shutdown_rx: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                info!("Shutting down metrics server");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept metrics connection: {}", e);
                        accept_backoff().await;
                        continue;
                    }
                };

                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(io, service_fn(route))
                        .await
                    {
                        error!("Error serving metrics connection from {}: {}", peer_addr, e);
                    }
                });
            }
        }
    }
}

async fn route(req: Request<hyper::body::Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => scrape(),
        (&Method::GET, "/health") => text_response(StatusCode::OK, "ok"),
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    };
    Ok(response)
}

/// Encode the default registry
fn scrape() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        );
    }

    let mut response = Response::new(Full::new(Bytes::from(buffer)));
    if let Ok(value) = HeaderValue::from_str(encoder.format_type()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}
