//! Request routing
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/upload` | multipart extraction, then [`UploadHandler`](crate::upload::UploadHandler) |
//! | `GET` | `/health` | `ok` |
//! | `GET`/`HEAD` | anything else | static files from `server.static_dir` |
//!
//! Everything else is `404 Not Found`, or `405` for `/upload` with another method.

use super::{text_response, AppState};
use crate::metrics;
use crate::upload::form::{extract_upload, ExtractOptions};
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ALLOW};
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tower::ServiceExt;
use tracing::{debug, warn};

/// Path accepting uploads
pub const UPLOAD_PATH: &str = "/upload";

/// Body type of every response the server writes
pub type ResponseBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// Route a request
pub(super) async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<ResponseBody>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Handling {} {}", method, path);

    let response = match (&method, path.as_str()) {
        (&Method::POST, UPLOAD_PATH) => upload(req, &state).await,
        (_, UPLOAD_PATH) => {
            let mut response =
                text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("POST"));
            response
        }
        (&Method::GET, "/health") => text_response(StatusCode::OK, "ok"),
        (&Method::GET, _) | (&Method::HEAD, _) => return Ok(serve_static(req, &state).await),
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response.map(full_body))
}

/// Extract the multipart upload and hand it to the upload handler
async fn upload(req: Request<Incoming>, state: &AppState) -> Response<Full<Bytes>> {
    let options = ExtractOptions {
        staging_dir: &state.staging_dir,
        max_file_size: state.max_file_size,
    };

    match extract_upload(req, &options).await {
        Ok(upload) => state.handler.handle(upload).await,
        Err(e) => {
            warn!(error = %e, "Rejected upload request");
            metrics::record_rejected_upload(e.kind());
            text_response(e.status_code(), e.client_message())
        }
    }
}

/// Serve a file from the static directory
async fn serve_static(req: Request<Incoming>, state: &AppState) -> Response<ResponseBody> {
    match state.static_files.clone().oneshot(req).await {
        Ok(response) => response.map(|body| body.boxed_unsync()),
        Err(never) => match never {},
    }
}

fn full_body(body: Full<Bytes>) -> ResponseBody {
    body.map_err(|never| match never {}).boxed_unsync()
}
