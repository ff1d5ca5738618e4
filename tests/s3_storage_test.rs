//! S3 Storage Backend Tests
//!
//! Points the `aws-sdk-s3` backed storage at a `wiremock` server standing in
//! for an S3-compatible endpoint.
//!
//! ## Test Coverage
//!
//! - PutObject request shape (method, path-style URL, body, content type)
//! - Reported location and ETag
//! - Error responses map to `StorageError` without retries
//! - Full HTTP flow through the server against the mock endpoint

mod common;

use bucket_courier::config::StorageConfig;
use bucket_courier::server::Server;
use bucket_courier::storage::s3::S3Storage;
use bucket_courier::storage::{PutObjectRequest, StorageBackend, StorageError};
use bytes::Bytes;
use common::TEST_BUCKET;
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn storage_config(endpoint: &str) -> StorageConfig {
    StorageConfig {
        bucket: TEST_BUCKET.to_string(),
        region: "us-east-1".to_string(),
        endpoint: Some(endpoint.to_string()),
        access_key: Some("test-access".to_string()),
        secret_key: Some("test-secret".to_string()),
        force_path_style: true,
    }
}

const ACCESS_DENIED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>AccessDenied</Code>
  <Message>Access Denied</Message>
  <RequestId>test-request</RequestId>
</Error>"#;

#[tokio::test]
async fn test_put_object_reports_location_and_etag() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(format!("/{}/report.txt", TEST_BUCKET)))
        .and(body_bytes(b"quarterly numbers".to_vec()))
        .respond_with(
            ResponseTemplate::new(200).insert_header("ETag", "\"d41d8cd98f00b204e9800998ecf8427e\""),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let storage = S3Storage::new(&storage_config(&mock_server.uri()))
        .await
        .unwrap();

    let output = storage
        .put_object(PutObjectRequest::new(
            TEST_BUCKET,
            "report.txt",
            Bytes::from("quarterly numbers"),
        ))
        .await
        .unwrap();

    assert_eq!(
        output.location,
        format!("{}/{}/report.txt", mock_server.uri(), TEST_BUCKET)
    );
    assert_eq!(
        output.etag.as_deref(),
        Some("\"d41d8cd98f00b204e9800998ecf8427e\"")
    );
}

#[tokio::test]
async fn test_put_object_sends_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(format!("/{}/document.json", TEST_BUCKET)))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"json-etag\""))
        .expect(1)
        .mount(&mock_server)
        .await;

    let storage = S3Storage::new(&storage_config(&mock_server.uri()))
        .await
        .unwrap();

    let result = storage
        .put_object(
            PutObjectRequest::new(TEST_BUCKET, "document.json", Bytes::from("{}"))
                .with_content_type("application/json"),
        )
        .await;

    assert!(result.is_ok(), "PutObject failed: {:?}", result.err());
}

#[tokio::test]
async fn test_empty_body_is_written() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(format!("/{}/empty.txt", TEST_BUCKET)))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"empty\""))
        .expect(1)
        .mount(&mock_server)
        .await;

    let storage = S3Storage::new(&storage_config(&mock_server.uri()))
        .await
        .unwrap();

    let result = storage
        .put_object(PutObjectRequest::new(TEST_BUCKET, "empty.txt", Bytes::new()))
        .await;

    assert!(result.is_ok(), "PutObject failed: {:?}", result.err());
}

#[tokio::test]
async fn test_access_denied_maps_to_service_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("Content-Type", "application/xml")
                .set_body_string(ACCESS_DENIED),
        )
        .mount(&mock_server)
        .await;

    let storage = S3Storage::new(&storage_config(&mock_server.uri()))
        .await
        .unwrap();

    let result = storage
        .put_object(PutObjectRequest::new(TEST_BUCKET, "k", Bytes::from("x")))
        .await;

    match result {
        Err(StorageError::ServiceError { status, .. }) => assert_eq!(status, Some(403)),
        other => panic!("expected service error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let storage = S3Storage::new(&storage_config(&mock_server.uri()))
        .await
        .unwrap();

    let result = storage
        .put_object(PutObjectRequest::new(TEST_BUCKET, "k", Bytes::from("x")))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_unreachable_endpoint_is_request_error() {
    // Nothing listens on port 1
    let storage = S3Storage::new(&storage_config("http://127.0.0.1:1"))
        .await
        .unwrap();

    let result = storage
        .put_object(PutObjectRequest::new(TEST_BUCKET, "k", Bytes::from("x")))
        .await;

    assert!(matches!(result, Err(StorageError::RequestError(_))));
}

#[tokio::test]
async fn test_server_forwards_upload_to_s3() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(format!("/{}/photo.png", TEST_BUCKET)))
        .and(body_bytes(b"png-bytes".to_vec()))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"photo\""))
        .expect(1)
        .mount(&mock_server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let static_dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(staging.path(), static_dir.path());
    config.storage = storage_config(&mock_server.uri());

    let server = Server::new(config).await.unwrap();
    let addr = server.local_addr();
    let handle = tokio::spawn(async move {
        let _ = server.run().await;
    });

    let part = reqwest::multipart::Part::bytes(b"png-bytes".to_vec())
        .file_name("photo.png")
        .mime_str("image/png")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = reqwest::Client::new()
        .post(format!("http://{}/upload", addr))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        format!(
            "File uploaded successfully. {}/{}/photo.png",
            mock_server.uri(),
            TEST_BUCKET
        )
    );

    handle.abort();
}

#[tokio::test]
async fn test_server_maps_s3_failure_to_500() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("Content-Type", "application/xml")
                .set_body_string(ACCESS_DENIED),
        )
        .mount(&mock_server)
        .await;

    let staging = tempfile::tempdir().unwrap();
    let static_dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(staging.path(), static_dir.path());
    config.storage = storage_config(&mock_server.uri());

    let server = Server::new(config).await.unwrap();
    let addr = server.local_addr();
    let handle = tokio::spawn(async move {
        let _ = server.run().await;
    });

    let part = reqwest::multipart::Part::bytes(b"data".to_vec()).file_name("denied.txt");
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = reqwest::Client::new()
        .post(format!("http://{}/upload", addr))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "Error uploading file");

    handle.abort();
}
