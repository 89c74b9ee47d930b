//! Integration tests for the blob API surface.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::Value;
use tempfile::TempDir;

use blossom_server::api::{self, AppState};
use blossom_store::{ObjectStore, StorageConfig};

/// SHA-256 of "hello"
const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

fn open_store(dir: &TempDir, config: Option<StorageConfig>) -> Arc<ObjectStore> {
    let config = config.unwrap_or_else(|| StorageConfig::with_root(dir.path()));
    Arc::new(ObjectStore::open(config).unwrap())
}

fn app_state(store: Arc<ObjectStore>, auth_token: Option<&str>) -> web::Data<AppState> {
    web::Data::new(AppState {
        store,
        auth_token: auth_token.map(String::from),
    })
}

macro_rules! make_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state)
                .wrap(api::cors_headers())
                .configure(api::configure),
        )
        .await
    };
}

fn put_upload(body: &'static [u8]) -> actix_web::test::TestRequest {
    test::TestRequest::put()
        .uri("/upload")
        .insert_header(("Content-Type", "text/plain"))
        .set_payload(body)
}

#[actix_web::test]
async fn test_upload_then_fetch_roundtrip() {
    let dir = TempDir::new().unwrap();
    let app = make_app!(app_state(open_store(&dir, None), None));

    let resp = test::call_service(&app, put_upload(b"hello").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let manifest: Value = test::read_body_json(resp).await;
    assert_eq!(manifest["sha256"], HELLO_SHA256);
    assert_eq!(manifest["size"], 5);
    assert_eq!(manifest["type"], "text/plain");
    assert_eq!(manifest["nip96"]["message"], "Upload successful");

    let url = manifest["url"].as_str().unwrap();
    assert!(url.ends_with(&format!("/{}", HELLO_SHA256)));
    assert_eq!(manifest["nip96"]["fallback"], serde_json::json!([url]));

    let req = test::TestRequest::get()
        .uri(&format!("/{}", HELLO_SHA256))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("Cache-Control").unwrap(),
        "public, max-age=31536000, immutable"
    );
    assert_eq!(resp.headers().get("Content-Type").unwrap(), "text/plain");
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"hello");
}

#[actix_web::test]
async fn test_upload_to_matching_hash() {
    let dir = TempDir::new().unwrap();
    let app = make_app!(app_state(open_store(&dir, None), None));

    let req = test::TestRequest::put()
        .uri(&format!("/{}", HELLO_SHA256))
        .set_payload(b"hello".as_slice())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let manifest: Value = test::read_body_json(resp).await;
    assert_eq!(manifest["sha256"], HELLO_SHA256);
}

#[actix_web::test]
async fn test_upload_to_wrong_hash_is_rejected_and_stores_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, None);
    let app = make_app!(app_state(store.clone(), None));

    let wrong = "0".repeat(64);
    let req = test::TestRequest::put()
        .uri(&format!("/{}", wrong))
        .set_payload(b"hello".as_slice())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Hash mismatch");

    assert!(store.stat_all().await.unwrap().is_empty());

    let req = test::TestRequest::get().uri(&format!("/{}", wrong)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_upload_to_malformed_hash_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, None);
    let app = make_app!(app_state(store.clone(), None));

    let req = test::TestRequest::put()
        .uri("/not-a-digest")
        .set_payload(b"hello".as_slice())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(store.stat_all().await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_get_missing_or_malformed_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = make_app!(app_state(open_store(&dir, None), None));

    // well-formed but absent
    let req = test::TestRequest::get()
        .uri(&format!("/{}", "0".repeat(64)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Not found");

    // malformed: same 404, indistinguishable from a miss
    let req = test::TestRequest::get().uri("/zz").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_traversal_attempts_never_reach_storage() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, None);
    let app = make_app!(app_state(store.clone(), None));

    // encoded slashes decode into the hash slot and fail digest validation
    let req = test::TestRequest::get()
        .uri("/..%2F..%2Fetc%2Fpasswd")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::put()
        .uri("/..%2Fescape")
        .set_payload(b"x".as_slice())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(store.stat_all().await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_upload_requires_token_when_configured() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, None);
    let app = make_app!(app_state(store.clone(), Some("secret")));

    // no header
    let resp = test::call_service(&app, put_upload(b"hello").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // wrong token
    let req = put_upload(b"hello")
        .insert_header(("Authorization", "Bearer wrong"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    assert!(store.stat_all().await.unwrap().is_empty());

    // bearer form
    let req = put_upload(b"hello")
        .insert_header(("Authorization", "Bearer secret"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // raw form
    let req = put_upload(b"hello")
        .insert_header(("Authorization", "secret"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // reads are never gated
    let req = test::TestRequest::get()
        .uri(&format!("/{}", HELLO_SHA256))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_every_response_carries_cors_headers() {
    let dir = TempDir::new().unwrap();
    let app = make_app!(app_state(open_store(&dir, None), Some("secret")));

    let responses = vec![
        // 200 banner
        test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await,
        // 404 miss
        test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/{}", "0".repeat(64)))
                .to_request(),
        )
        .await,
        // 401 denied write
        test::call_service(&app, put_upload(b"hello").to_request()).await,
        // 204 preflight
        test::call_service(
            &app,
            test::TestRequest::with_uri("/anything")
                .method(actix_web::http::Method::OPTIONS)
                .to_request(),
        )
        .await,
    ];

    for resp in responses {
        let status = resp.status();
        assert_eq!(
            resp.headers()
                .get("Access-Control-Allow-Origin")
                .and_then(|v| v.to_str().ok()),
            Some("*"),
            "missing CORS origin header on {} response",
            status
        );
        assert_eq!(
            resp.headers()
                .get("Access-Control-Allow-Methods")
                .and_then(|v| v.to_str().ok()),
            Some("GET, PUT, HEAD, OPTIONS"),
            "missing CORS methods header on {} response",
            status
        );
    }
}

#[actix_web::test]
async fn test_options_returns_204_with_no_body_on_any_path() {
    let dir = TempDir::new().unwrap();
    let app = make_app!(app_state(open_store(&dir, None), None));

    for path in ["/", "/upload", "/abcdef", "/deep/nested/path"] {
        let req = test::TestRequest::with_uri(path)
            .method(actix_web::http::Method::OPTIONS)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT, "OPTIONS {}", path);
        let body = test::read_body(resp).await;
        assert!(body.is_empty(), "OPTIONS {} returned a body", path);
    }
}

#[actix_web::test]
async fn test_usage_banner() {
    let dir = TempDir::new().unwrap();
    let app = make_app!(app_state(open_store(&dir, None), None));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .starts_with("text/plain"));
    let body = test::read_body(resp).await;
    assert!(std::str::from_utf8(&body).unwrap().contains("blossom"));
}

#[actix_web::test]
async fn test_head_probes_existence() {
    let dir = TempDir::new().unwrap();
    let app = make_app!(app_state(open_store(&dir, None), None));

    test::call_service(&app, put_upload(b"hello").to_request()).await;

    let req = test::TestRequest::default()
        .method(actix_web::http::Method::HEAD)
        .uri(&format!("/{}", HELLO_SHA256))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(body.is_empty());

    let req = test::TestRequest::default()
        .method(actix_web::http::Method::HEAD)
        .uri(&format!("/{}", "0".repeat(64)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_duplicate_upload_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, None);
    let app = make_app!(app_state(store.clone(), None));

    let resp = test::call_service(&app, put_upload(b"hello").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = test::call_service(&app, put_upload(b"hello").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(store.stat_all().await.unwrap().len(), 1);
}

#[actix_web::test]
async fn test_oversize_upload_yields_413_and_stores_nothing() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig {
        max_blob_size: 4,
        ..StorageConfig::with_root(dir.path())
    };
    let store = open_store(&dir, Some(config));
    let app = make_app!(app_state(store.clone(), None));

    let resp = test::call_service(&app, put_upload(b"hello").to_request()).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(store.stat_all().await.unwrap().is_empty());
}
