//! Integration tests for uploads, downloads, quotas, and listing filters.

mod helpers;

use axum::http::{StatusCode, header};
use serde_json::json;

use helpers::TestApp;

#[tokio::test]
async fn test_direct_upload_round_trip() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;

    let ticket = app
        .post(
            "/api/files/upload-url",
            json!({ "name": "photo.png", "mime_type": "image/png", "size": 4 }),
            &alice,
        )
        .await;
    assert_eq!(ticket.status, StatusCode::OK, "{}", ticket.body);
    let node_id = ticket.data()["node_id"].as_str().unwrap().to_string();
    let key = ticket.data()["key"].as_str().unwrap().to_string();
    assert!(key.starts_with(&format!("files/{}/{}", alice.id, node_id)), "{key}");
    assert_eq!(ticket.data()["upload"]["method"], "PUT");

    // Completing before the bytes land is refused.
    let early = app
        .post(
            "/api/files/upload-complete",
            json!({ "node_id": node_id, "key": key }),
            &alice,
        )
        .await;
    assert_eq!(early.status, StatusCode::BAD_REQUEST);

    app.put_object(&key, b"\x89PNG").await;
    let done = app
        .post(
            "/api/files/upload-complete",
            json!({ "node_id": node_id, "key": key, "size": 4 }),
            &alice,
        )
        .await;
    assert_eq!(done.status, StatusCode::OK, "{}", done.body);
    assert_eq!(done.data()["size"], 4);

    // A second completion is a no-op.
    let again = app
        .post("/api/files/upload-complete", json!({ "node_id": node_id }), &alice)
        .await;
    assert_eq!(again.status, StatusCode::OK);

    let download = app
        .get(&format!("/api/files/{node_id}/download"), Some(&alice))
        .await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(&download.raw[..], b"\x89PNG");
    assert_eq!(download.headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(download.headers[header::CONTENT_LENGTH], "4");
    assert_eq!(download.headers[header::CACHE_CONTROL], "no-cache");
}

#[tokio::test]
async fn test_rename_between_begin_and_complete() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let ticket = app
        .post(
            "/api/files/upload-url",
            json!({ "name": "Report.pdf", "mimeType": "application/pdf", "size": 3 }),
            &alice,
        )
        .await;
    let node_id = ticket.data()["node_id"].as_str().unwrap().to_string();
    let key = ticket.data()["key"].as_str().unwrap().to_string();
    app.put_object(&key, b"pdf").await;

    let renamed = app
        .patch(&format!("/api/files/{node_id}"), json!({ "name": "Report.txt" }), &alice)
        .await;
    assert_eq!(renamed.status, StatusCode::OK);

    let done = app
        .post("/api/files/upload-complete", json!({ "nodeId": node_id }), &alice)
        .await;
    assert_eq!(done.status, StatusCode::OK, "{}", done.body);
    assert_eq!(done.data()["name"], "Report.txt");

    let download = app
        .get(&format!("/api/files/{node_id}/download"), Some(&alice))
        .await;
    assert_eq!(&download.raw[..], b"pdf");
}

#[tokio::test]
async fn test_complete_rejects_a_foreign_key() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let ticket = app
        .post(
            "/api/files/upload-url",
            json!({ "name": "a.txt", "mime_type": "text/plain", "size": 1 }),
            &alice,
        )
        .await;
    let node_id = ticket.data()["node_id"].as_str().unwrap().to_string();

    let response = app
        .post(
            "/api/files/upload-complete",
            json!({ "node_id": node_id, "key": "files/someone/else.txt" }),
            &alice,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_url_validates_the_declaration() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;

    let zero = app
        .post(
            "/api/files/upload-url",
            json!({ "name": "a.txt", "mime_type": "text/plain", "size": 0 }),
            &alice,
        )
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let too_big = app
        .post(
            "/api/files/upload-url",
            json!({ "name": "a.bin", "mime_type": "application/octet-stream", "size": 2 * 1024 * 1024 }),
            &alice,
        )
        .await;
    assert_eq!(too_big.status, StatusCode::BAD_REQUEST);

    let missing_parent = app
        .post(
            "/api/files/upload-url",
            json!({
                "name": "a.txt",
                "mime_type": "text/plain",
                "size": 1,
                "parent_id": uuid::Uuid::new_v4()
            }),
            &alice,
        )
        .await;
    assert_eq!(missing_parent.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_quota_is_enforced_on_both_upload_paths() {
    let app = TestApp::with_quota(10);
    let alice = app.signed_in("Alice").await;
    app.file(&alice, "eight.txt", b"12345678", None).await;

    let direct = app
        .post(
            "/api/files/upload-url",
            json!({ "name": "b.txt", "mime_type": "text/plain", "size": 3 }),
            &alice,
        )
        .await;
    assert_eq!(direct.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(direct.error(), "QUOTA_EXCEEDED");

    let proxied = app.upload(&alice, "c.txt", "text/plain", b"abc", &[]).await;
    assert_eq!(proxied.status, StatusCode::PAYLOAD_TOO_LARGE);

    let storage = app.get("/api/storage", Some(&alice)).await;
    assert_eq!(storage.data()["used_bytes"], 8);
    assert_eq!(storage.data()["limit_bytes"], 10);
    assert_eq!(storage.data()["remaining_bytes"], 2);
}

#[tokio::test]
async fn test_proxy_upload_into_folder_and_name_conflict() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let docs = app.folder(&alice, "Docs", None).await;
    let docs_str = docs.to_string();

    let first = app
        .upload(&alice, "a.txt", "text/plain", b"one", &[("parentId", &docs_str)])
        .await;
    assert_eq!(first.status, StatusCode::CREATED, "{}", first.body);
    assert_eq!(first.data()["parent_id"], docs_str);
    assert_eq!(first.data()["mime_type"], "text/plain");

    let clash = app
        .upload(&alice, "a.txt", "text/plain", b"two", &[("parentId", &docs_str)])
        .await;
    assert_eq!(clash.status, StatusCode::CONFLICT);

    let renamed = app
        .upload(
            &alice,
            "a.txt",
            "text/plain",
            b"two",
            &[("parentId", &docs_str), ("name", "b.txt")],
        )
        .await;
    assert_eq!(renamed.status, StatusCode::CREATED);
    assert_eq!(renamed.data()["name"], "b.txt");
}

#[tokio::test]
async fn test_download_url_for_owner() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let file = app.file(&alice, "a.txt", b"abc", None).await;

    let response = app
        .get(&format!("/api/files/{file}/download-url"), Some(&alice))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["name"], "a.txt");
    assert_eq!(response.data()["size"], 3);
    assert_eq!(response.data()["download"]["method"], "GET");
}

#[tokio::test]
async fn test_folders_are_not_downloadable() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let docs = app.folder(&alice, "Docs", None).await;

    let response = app
        .get(&format!("/api/files/{docs}/download"), Some(&alice))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_filters_by_type_and_recursion() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let docs = app.folder(&alice, "Docs", None).await;
    let docs_str = docs.to_string();
    app.upload(&alice, "pic.png", "image/png", b"p", &[("parentId", &docs_str)])
        .await;
    app.upload(&alice, "top.png", "image/png", b"p", &[]).await;
    app.file(&alice, "notes.txt", b"n", None).await;

    let photos = app.get("/api/files?type=photos", Some(&alice)).await;
    assert_eq!(photos.status, StatusCode::OK);
    assert_eq!(photos.names(), vec!["top.png"]);

    let mut everywhere = app
        .get("/api/files?type=photos&recursive=true", Some(&alice))
        .await
        .names();
    everywhere.sort();
    assert_eq!(everywhere, vec!["pic.png", "top.png"]);

    let today = app.get("/api/files?modified=today&type=all", Some(&alice)).await;
    assert_eq!(today.status, StatusCode::OK);
    assert_eq!(today.names().len(), 3);

    let bad = app.get("/api/files?type=spaceships", Some(&alice)).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}
