#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use encsvc_core::config::EncsvcConfig;
use encsvc_storage::ArtifactStore;
use encsvcd::{build_router, AppState};

pub const BOUNDARY: &str = "encsvc-test-boundary";

/// Router over a scratch store with cheap Argon2 parameters
pub fn test_app(root: &std::path::Path) -> (axum::Router, ArtifactStore) {
    let mut config = EncsvcConfig::default();
    config.storage.root = root.to_path_buf();
    config.server.workers = 2;
    config.server.max_upload_mb = 1;
    config.server.health_timeout_ms = 10_000;
    config.crypto.frame_size = 1024;
    config.crypto.argon2_mem_cost_kib = 1024;
    config.crypto.argon2_time_cost = 1;
    let store = ArtifactStore::open(root).expect("store");
    (build_router(AppState::new(config, store.clone())), store)
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .expect("request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = read_bytes(response).await;
    serde_json::from_slice(&bytes).expect("json")
}

pub async fn read_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}
