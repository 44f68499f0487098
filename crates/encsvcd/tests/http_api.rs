mod common;

use axum::http::StatusCode;
use common::{get, multipart_request, read_bytes, read_json, test_app, Part};
use tower::ServiceExt;

const PASSPHRASE: &str = "correct-horse-battery-staple";

#[tokio::test]
async fn encrypt_download_decrypt_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(dir.path());

    let request = multipart_request(
        "/api/encrypt",
        &[
            Part::File("file", "hello.txt", b"hello worl"),
            Part::Text("algorithm", "aes256"),
            Part::Text("key", PASSPHRASE),
        ],
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["original_file"], "hello.txt");
    assert_eq!(body["algorithm"], "aes256");
    assert!(!body["message"].as_str().unwrap().is_empty());
    let encrypted_path = body["encrypted_file"].as_str().unwrap().to_string();
    assert!(encrypted_path.starts_with("/download/"));
    assert!(encrypted_path.ends_with("/hello.txt.enc"));

    let response = app.clone().oneshot(get(&encrypted_path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ciphertext = read_bytes(response).await;
    assert_ne!(&ciphertext[..], b"hello worl");
    assert_eq!(body["size_bytes"], ciphertext.len() as u64);

    let request = multipart_request(
        "/api/decrypt",
        &[
            Part::Text("algorithm", "aes256"),
            Part::Text("key", PASSPHRASE),
            Part::File("file", "hello.txt.enc", &ciphertext),
        ],
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["original_file"], "hello.txt.enc");
    let decrypted_path = body["decrypted_file"].as_str().unwrap().to_string();
    assert!(decrypted_path.ends_with("/hello.txt"));

    let response = app.oneshot(get(&decrypted_path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_bytes(response).await, b"hello worl");
}

#[tokio::test]
async fn unknown_algorithm_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, store) = test_app(dir.path());

    let request = multipart_request(
        "/api/encrypt",
        &[
            Part::Text("algorithm", "rot13"),
            Part::Text("key", PASSPHRASE),
            Part::File("file", "hello.txt", b"hello worl"),
        ],
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(!body["detail"].as_str().unwrap().is_empty());
    assert_eq!(body["code"], "unsupported_algorithm");
    assert_eq!(std::fs::read_dir(store.artifacts_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn unknown_algorithm_after_file_part_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, store) = test_app(dir.path());

    // Browser form order: file, algorithm, key
    let request = multipart_request(
        "/api/encrypt",
        &[
            Part::File("file", "hello.txt", b"hello worl"),
            Part::Text("algorithm", "rot13"),
            Part::Text("key", PASSPHRASE),
        ],
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "unsupported_algorithm");
    assert_eq!(std::fs::read_dir(store.artifacts_dir()).unwrap().count(), 0);
    assert_eq!(std::fs::read_dir(store.staging_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn oversized_upload_with_unknown_algorithm_follows_field_order() {
    let dir = tempfile::tempdir().unwrap();
    let (app, store) = test_app(dir.path());
    let big = vec![0u8; 2 * 1024 * 1024];

    // Algorithm first: rejected before the file part is read
    let response = app
        .clone()
        .oneshot(multipart_request(
            "/api/encrypt",
            &[
                Part::Text("algorithm", "rot13"),
                Part::Text("key", PASSPHRASE),
                Part::File("file", "big.bin", &big),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "unsupported_algorithm");

    // File first: the body limit trips while the file is still streaming
    let response = app
        .oneshot(multipart_request(
            "/api/encrypt",
            &[
                Part::File("file", "big.bin", &big),
                Part::Text("algorithm", "rot13"),
                Part::Text("key", PASSPHRASE),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(read_json(response).await["code"], "payload_too_large");
    assert_eq!(std::fs::read_dir(store.staging_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn missing_fields_are_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(dir.path());

    let cases: [(&[Part<'_>], &str); 3] = [
        (
            &[Part::Text("algorithm", "aes128"), Part::Text("key", PASSPHRASE)],
            "file",
        ),
        (
            &[
                Part::Text("key", PASSPHRASE),
                Part::File("file", "a.txt", b"x"),
            ],
            "algorithm",
        ),
        (
            &[
                Part::Text("algorithm", "aes128"),
                Part::Text("key", ""),
                Part::File("file", "a.txt", b"x"),
            ],
            "key",
        ),
    ];
    for (parts, missing) in cases {
        let response = app
            .clone()
            .oneshot(multipart_request("/api/encrypt", parts))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "missing {missing}");
        let body = read_json(response).await;
        assert_eq!(body["code"], "validation_error");
        assert!(body["detail"].as_str().unwrap().contains(missing));
    }
}

#[tokio::test]
async fn non_multipart_body_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(dir.path());

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/encrypt")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "validation_error");
}

#[tokio::test]
async fn wrong_key_is_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(dir.path());

    let response = app
        .clone()
        .oneshot(multipart_request(
            "/api/encrypt",
            &[
                Part::Text("algorithm", "blowfish"),
                Part::Text("key", "right"),
                Part::File("file", "secret.txt", b"top secret"),
            ],
        ))
        .await
        .unwrap();
    let path = read_json(response).await["encrypted_file"]
        .as_str()
        .unwrap()
        .to_string();
    let ciphertext = read_bytes(app.clone().oneshot(get(&path)).await.unwrap()).await;

    let response = app
        .oneshot(multipart_request(
            "/api/decrypt",
            &[
                Part::Text("algorithm", "blowfish"),
                Part::Text("key", "wrong"),
                Part::File("file", "secret.txt.enc", &ciphertext),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json(response).await["code"], "decryption_failed");
}

#[tokio::test]
async fn concurrent_same_name_uploads_get_distinct_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(dir.path());

    let mut handles = Vec::new();
    for i in 0..4u8 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let content = vec![i; 100];
            let response = app
                .oneshot(multipart_request(
                    "/api/encrypt",
                    &[
                        Part::Text("algorithm", "aes128"),
                        Part::Text("key", "00112233445566778899aabbccddeeff"),
                        Part::File("file", "same.bin", &content),
                    ],
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            read_json(response).await["encrypted_file"]
                .as_str()
                .unwrap()
                .to_string()
        }));
    }

    let mut paths = Vec::new();
    for handle in handles {
        paths.push(handle.await.unwrap());
    }
    let mut unique = paths.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), paths.len());

    for path in paths {
        let response = app.clone().oneshot(get(&path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(dir.path());

    // test_app caps uploads at 1 MiB
    let big = vec![0u8; 2 * 1024 * 1024];
    let response = app
        .oneshot(multipart_request(
            "/api/encrypt",
            &[
                Part::Text("algorithm", "aes128"),
                Part::Text("key", PASSPHRASE),
                Part::File("file", "big.bin", &big),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = read_json(response).await;
    assert_eq!(body["code"], "payload_too_large");
    assert!(!body["detail"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn generate_key_lengths() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(dir.path());

    let response = app
        .clone()
        .oneshot(get("/api/generate-key?algorithm=aes256&length=32"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["algorithm"], "aes256");
    assert_eq!(body["length"], 32);
    assert!(body.get("public_key").is_none());
    let key = hex::decode(body["key"].as_str().unwrap()).unwrap();
    assert_eq!(key.len(), 32);

    let response = app
        .clone()
        .oneshot(get("/api/generate-key?algorithm=aes128&length=15"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!read_json(response).await["detail"].as_str().unwrap().is_empty());

    let response = app.oneshot(get("/api/generate-key")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["algorithm"], "aes256");
}

#[tokio::test]
async fn generated_key_encrypts_as_raw_key() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(dir.path());

    let response = app
        .clone()
        .oneshot(get("/api/generate-key?algorithm=blowfish&length=16"))
        .await
        .unwrap();
    let key = read_json(response).await["key"].as_str().unwrap().to_string();

    let response = app
        .oneshot(multipart_request(
            "/api/encrypt",
            &[
                Part::Text("algorithm", "blowfish"),
                Part::Text("key", &key),
                Part::File("file", "data.bin", b"payload"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_is_ok_and_stable() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(dir.path());

    let first = read_json(app.clone().oneshot(get("/api/health")).await.unwrap()).await;
    let second = read_json(app.oneshot(get("/api/health")).await.unwrap()).await;
    assert_eq!(first["status"], "ok");
    assert_eq!(first, second);
}

#[tokio::test]
async fn health_degraded_when_storage_missing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    let (app, store) = test_app(&root);
    std::fs::remove_dir_all(store.root()).unwrap();

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "degraded");
}

#[tokio::test]
async fn unknown_routes_and_downloads_are_json_404() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(dir.path());

    for uri in ["/api/nope", "/download/00000000-0000-0000-0000-000000000000/x.enc"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(read_json(response).await["code"], "not_found");
    }
}

#[tokio::test]
async fn banner_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(dir.path());

    let banner = read_json(app.clone().oneshot(get("/")).await.unwrap()).await;
    assert_eq!(banner["service"], "encsvc");
    assert_eq!(banner["algorithms"].as_array().unwrap().len(), 4);

    app.clone()
        .oneshot(get("/api/generate-key?algorithm=aes128&length=16"))
        .await
        .unwrap();
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(read_bytes(response).await).unwrap();
    assert!(text.contains("encsvc_requests_total"));
    assert!(text.contains("operation=\"generate_key\""));
}
