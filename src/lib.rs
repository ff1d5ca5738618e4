//! Bucket Courier Library
//!
//! Accepts a single file upload over HTTP and forwards it to an S3 bucket,
//! answering with the stored object's location.
//!
//! # Features
//!
//! - **One request, one object**: `POST /upload` with a multipart `file` field
//! - **Verbatim keys**: the uploaded file name is the object key
//! - **Pluggable storage**: S3 via `aws-sdk-s3`, or an in-memory store
//! - **Static files**: a local directory served at the HTTP root
//!
//! # Example
//!
//! ```no_run
//! use bucket_courier::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let server = Server::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod server;
pub mod storage;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
