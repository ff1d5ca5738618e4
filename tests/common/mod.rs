//! Common Integration Test Infrastructure
//!
//! Provides shared utilities for integration tests:
//! - Test server management (ephemeral port, temp staging/static dirs)
//! - Multipart upload helpers

#![allow(dead_code)]

use bucket_courier::config::{
    Config, MetricsConfig, ServerConfig, StorageConfig, UploadConfig,
};
use bucket_courier::server::Server;
use bucket_courier::storage::StorageBackend;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::oneshot;

/// Bucket every test server writes into
pub const TEST_BUCKET: &str = "test-bucket";

/// Build a configuration bound to an ephemeral local port
pub fn test_config(staging_dir: &Path, static_dir: &Path) -> Config {
    Config {
        server: ServerConfig {
            address: "127.0.0.1:0".into(),
            static_dir: static_dir.to_path_buf(),
            staging_dir: staging_dir.to_path_buf(),
        },
        storage: StorageConfig {
            bucket: TEST_BUCKET.into(),
            region: "us-east-1".into(),
            endpoint: None,
            access_key: Some("test-access".into()),
            secret_key: Some("test-secret".into()),
            force_path_style: false,
        },
        upload: UploadConfig::default(),
        metrics: MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        },
    }
}

/// Running server plus the directories it uses
pub struct TestServer {
    pub addr: SocketAddr,
    pub staging_dir: TempDir,
    pub static_dir: TempDir,
    pub client: reqwest::Client,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a server over `storage` with default test configuration
    pub async fn start(storage: Arc<dyn StorageBackend>) -> Self {
        Self::start_with(storage, |_| {}).await
    }

    /// Start a server, letting the caller adjust the configuration first
    pub async fn start_with(
        storage: Arc<dyn StorageBackend>,
        configure: impl FnOnce(&mut Config),
    ) -> Self {
        let staging_dir = tempfile::tempdir().expect("Failed to create staging dir");
        let static_dir = tempfile::tempdir().expect("Failed to create static dir");

        let mut config = test_config(staging_dir.path(), static_dir.path());
        configure(&mut config);

        let server = Server::with_storage(config, storage)
            .await
            .expect("Failed to create server");
        let addr = server.local_addr();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = server
                .run_until(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Self {
            addr,
            staging_dir,
            static_dir,
            client: reqwest::Client::new(),
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Get the base URL for the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Upload `data` as the `file` field under `file_name`
    pub async fn upload(
        &self,
        file_name: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let part = reqwest::multipart::Part::bytes(data.into())
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;

        // Send names exactly as given so key passthrough can be observed
        let form = reqwest::multipart::Form::new()
            .percent_encode_noop()
            .part("file", part);

        self.send_form(form).await
    }

    /// POST an arbitrary multipart form to `/upload`
    pub async fn send_form(
        &self,
        form: reqwest::multipart::Form,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(format!("{}/upload", self.base_url()))
            .multipart(form)
            .send()
            .await
    }

    /// Number of entries left in the staging directory
    pub fn staged_file_count(&self) -> usize {
        std::fs::read_dir(self.staging_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Stop accepting connections and wait for the accept loop to exit
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
