//! HTTP request router for the blob API.
//!
//! The wire contract: `PUT /upload` and `PUT /<sha256>` store blobs,
//! `GET /<sha256>` serves them back, `HEAD /<sha256>` probes them, `GET /`
//! prints a usage banner, and `OPTIONS` anywhere is a CORS preflight. Every
//! response carries the CORS headers.

use std::sync::Arc;

use actix_web::http::{header, Method};
use actix_web::{middleware, web, HttpRequest, HttpResponse};
use futures::StreamExt;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::info;

use blossom_store::digest::is_valid_digest;
use blossom_store::{Blob, ObjectStore};

use crate::auth;
use crate::error::ApiError;

/// Headers required on every response, success or error.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, PUT, HEAD, OPTIONS"),
    ("Access-Control-Allow-Headers", "*"),
];

const USAGE: &str = "\
blossom blob server

  PUT  /upload     upload a blob, returns its descriptor
  PUT  /<sha256>   upload a blob, rejected unless the body hashes to <sha256>
  GET  /<sha256>   fetch a blob
  HEAD /<sha256>   check whether a blob exists
";

/// Shared application state
pub struct AppState {
    pub store: Arc<ObjectStore>,
    pub auth_token: Option<String>,
}

/// Middleware stamping the CORS headers onto every successful response.
/// (Error responses get the same headers in `ApiError::error_response`.)
pub fn cors_headers() -> middleware::DefaultHeaders {
    let mut headers = middleware::DefaultHeaders::new();
    for (name, value) in CORS_HEADERS {
        headers = headers.add((name, value));
    }
    headers
}

/// Configure API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .route(web::get().to(usage))
            .default_service(web::to(fallback)),
    )
    .service(
        web::resource("/upload")
            .route(web::put().to(upload))
            .default_service(web::to(fallback)),
    )
    .service(
        web::resource("/{hash}")
            .route(web::get().to(fetch))
            .route(web::head().to(head_blob))
            .route(web::put().to(upload_to_hash))
            .default_service(web::to(fallback)),
    )
    .default_service(web::to(fallback));
}

/// Upload success manifest, shaped for Blossom/NIP-96 clients.
#[derive(Debug, Serialize)]
pub struct BlobDescriptor {
    pub url: String,
    pub sha256: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub nip96: Nip96Envelope,
}

/// Compatibility envelope carried on every upload response. The fallback
/// list holds the primary URL once; some clients require it to be present.
#[derive(Debug, Serialize)]
pub struct Nip96Envelope {
    pub message: String,
    pub fallback: Vec<String>,
}

fn descriptor(req: &HttpRequest, blob: &Blob) -> BlobDescriptor {
    let conn = req.connection_info();
    let url = format!("{}://{}/{}", conn.scheme(), conn.host(), blob.digest);
    BlobDescriptor {
        url: url.clone(),
        sha256: blob.digest.clone(),
        size: blob.size,
        content_type: blob.content_type.clone(),
        nip96: Nip96Envelope {
            message: "Upload successful".to_string(),
            fallback: vec![url],
        },
    }
}

fn authorization(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

fn declared_content_type(req: &HttpRequest) -> String {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Adapt the actix payload into the io-flavored byte stream the store
/// stages from. A client disconnect surfaces as a stream error, which makes
/// the store discard the staged bytes.
fn body_stream(
    payload: web::Payload,
) -> impl futures::Stream<Item = std::io::Result<bytes::Bytes>> + Unpin {
    payload.map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)))
}

/// `GET /` — plain-text usage banner
async fn usage() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(USAGE)
}

/// Catch-all: `OPTIONS` anywhere is a preflight (204, no body); any other
/// unmatched request is a 404.
async fn fallback(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    if req.method() == Method::OPTIONS {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(ApiError::NotFound)
    }
}

/// `PUT /upload` — store a blob under its computed digest
async fn upload(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    auth::authorize(state.auth_token.as_deref(), authorization(&req))?;

    let staged = state.store.stage(body_stream(payload)).await?;
    let blob = state
        .store
        .commit(staged, &declared_content_type(&req))
        .await?;

    info!("Uploaded blob {} ({} bytes)", blob.digest, blob.size);
    Ok(HttpResponse::Ok().json(descriptor(&req, &blob)))
}

/// `PUT /<hash>` — store a blob under a client-named digest
///
/// The body is staged and hashed first; a mismatch discards the staged
/// bytes, so nothing ever becomes visible under the wrong name.
async fn upload_to_hash(
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    auth::authorize(state.auth_token.as_deref(), authorization(&req))?;

    let expected = path.into_inner();
    if !is_valid_digest(&expected) {
        return Err(ApiError::InvalidHash);
    }

    let staged = state.store.stage(body_stream(payload)).await?;
    if staged.digest != expected {
        return Err(ApiError::HashMismatch);
    }

    let blob = state
        .store
        .commit(staged, &declared_content_type(&req))
        .await?;

    info!("Uploaded blob {} ({} bytes)", blob.digest, blob.size);
    Ok(HttpResponse::Ok().json(descriptor(&req, &blob)))
}

/// `GET /<hash>` — serve a blob
///
/// Blobs are immutable under their digest, so the cache lifetime is as long
/// as HTTP allows.
async fn fetch(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let digest = path.into_inner();

    let (file, blob) = state
        .store
        .get(&digest)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(HttpResponse::Ok()
        .content_type(blob.content_type.as_str())
        .insert_header((header::CACHE_CONTROL, "public, max-age=31536000, immutable"))
        .no_chunking(blob.size)
        .streaming(ReaderStream::new(file)))
}

/// `HEAD /<hash>` — existence probe, no body
async fn head_blob(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let digest = path.into_inner();

    let (_, blob) = state
        .store
        .get(&digest)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(HttpResponse::Ok()
        .content_type(blob.content_type.as_str())
        .finish())
}
