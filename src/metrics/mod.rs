//! Metrics module
//!
//! Provides Prometheus metrics for uploads.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "courier_uploads_total",
        "Total number of uploads forwarded to storage",
        &["bucket", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "courier_upload_bytes_total",
        "Total bytes stored"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "courier_upload_duration_seconds",
        "Time spent forwarding an upload to storage, in seconds",
        &["bucket", "backend"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).unwrap();

    // Requests rejected before reaching storage
    pub static ref REJECTED_UPLOADS: CounterVec = register_counter_vec!(
        "courier_rejected_uploads_total",
        "Upload requests rejected during multipart extraction",
        &["reason"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "courier_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bucket: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(bucket: &str) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(bucket: &str, backend: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[bucket, backend])
        .observe(duration_secs);
}

/// Record a request rejected before the storage write
pub fn record_rejected_upload(reason: &str) {
    REJECTED_UPLOADS.with_label_values(&[reason]).inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
