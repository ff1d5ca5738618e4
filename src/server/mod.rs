//! HTTP server module
//!
//! Accepts connections and routes requests to the upload handler, the health
//! check and static file serving.
//!
//! # Architecture
//!
//! The server is built directly on `hyper` and `tokio`:
//! - one tokio task per connection, HTTP/1.1
//! - shared, read-only [`AppState`] behind an `Arc`
//! - shutdown on Ctrl-C ([`Server::run`]) or on any future ([`Server::run_until`])
//!
//! # Example
//!
//! ```no_run
//! use bucket_courier::config::Config;
//! use bucket_courier::server::Server;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let server = Server::new(config).await?;
//! println!("Listening on {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

mod routes;

use crate::config::Config;
use crate::storage::s3::S3Storage;
use crate::storage::{StorageBackend, StorageError};
use crate::upload::UploadHandler;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info};

pub use routes::UPLOAD_PATH;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Storage initialization failed: {0}")]
    StorageError(#[from] StorageError),

    #[error("Server error: {0}")]
    RuntimeError(String),
}

/// State shared by every connection
pub struct AppState {
    pub handler: UploadHandler,
    pub staging_dir: PathBuf,
    pub max_file_size: Option<u64>,
    pub static_files: ServeDir,
}

impl AppState {
    /// Build the state from configuration and a storage backend
    pub fn new(config: &Config, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            handler: UploadHandler::new(storage, config.storage.bucket.clone()),
            staging_dir: config.server.staging_dir.clone(),
            max_file_size: config.upload.max_file_size,
            static_files: ServeDir::new(&config.server.static_dir),
        }
    }
}

/// HTTP server
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Create a server backed by S3
    ///
    /// The S3 client is constructed once here and shared by all requests.
    pub async fn new(config: Config) -> Result<Self, ServerError> {
        let storage = S3Storage::new(&config.storage).await?;
        Self::with_storage(config, Arc::new(storage)).await
    }

    /// Create a server with an explicit storage backend
    ///
    /// Binds immediately. If port 0 is configured, the OS assigns one;
    /// use [`Server::local_addr`] to discover it.
    pub async fn with_storage(
        config: Config,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!(
            address = %local_addr,
            bucket = %config.storage.bucket,
            backend = storage.name(),
            static_dir = %config.server.static_dir.display(),
            staging_dir = %config.server.staging_dir.display(),
            "Server bound"
        );

        Ok(Self {
            state: Arc::new(AppState::new(&config, storage)),
            listener,
            local_addr,
        })
    }

    /// The address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the process receives Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!("Starting server on {}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            accept_backoff().await;
                            continue;
                        }
                    };

                    let state = Arc::clone(&self.state);

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { routes::handle_request(req, state).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!("Error serving connection from {}: {}", peer_addr, e);
                        }
                    });
                }
            }
        }

        Ok(())
    }
}

/// Pause applied after a failed `accept()`, e.g. on EMFILE
pub(crate) const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub(crate) async fn accept_backoff() {
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Plain-text response with the given status
pub(crate) fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
